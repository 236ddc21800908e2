//! Bantay Core — domain models, repository traits and error types
//! shared by every Bantay crate.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{BantayError, BantayResult};
