//! Shared types for the CallScribe services
//!
//! Carries the common error type and configuration loading used by the
//! enrichment service (and any future siblings sharing the same data folder).

pub mod config;
pub mod error;

pub use error::{Error, Result};
