//! Shared helpers for the authgate crates: logging setup and small response types.

pub mod types;
pub mod utils;
