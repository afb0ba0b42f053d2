//! userhub core - shared types library.
//!
//! This crate provides common types used across all userhub components:
//! - `api` - The account HTTP service
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails, IDs, and accepted image types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
