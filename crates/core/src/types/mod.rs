//! Core types for userhub.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod image;

pub use email::{Email, EmailError};
pub use id::*;
pub use image::ImageType;
