//! Banner Common - shared types for the Banner feature-flag service
//!
//! This crate provides:
//! - The domain error enum used across the service and HTTP layers
//! - Key-format validation for URL-safe identifiers

pub mod error;
pub mod key;

pub use error::BannerError;
pub use key::validate_key;
