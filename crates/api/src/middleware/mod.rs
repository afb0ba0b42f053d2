//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span opened by `TraceLayer`)
//!
//! Authentication is an extractor rather than a layer so public routes
//! never touch the account store.

pub mod auth;
pub mod request_id;

pub use auth::RequireAccount;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
