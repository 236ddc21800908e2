//! Domain models for Bantay.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod join_request;
pub mod managed_group;
pub mod user_record;
