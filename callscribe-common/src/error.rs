//! Error type shared by the CallScribe crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that cross crate boundaries: storage, filesystem, and
/// configuration. Service-specific taxonomies (external-call errors, the
/// HTTP error envelope) live in the service crate and wrap this one.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read, parsed, or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invariant violation with no more specific variant, e.g. a stored
    /// row that no longer deserializes
    #[error("Internal error: {0}")]
    Internal(String),
}
