//! Domain models for the account service.
//!
//! These types represent validated domain objects separate from database row
//! types and from the JSON shapes served over HTTP.

pub mod account;
pub mod picture;

pub use account::{Account, AccountPatch, AccountView, CreateAccountRequest, NewAccount};
pub use picture::{Picture, PictureView};
