//! Error types for pipewright-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Failures detected synchronously are returned as `Err` values;
//! failures reported asynchronously by the engine never appear here — they are
//! delivered as [`crate::events::PlayerEvent::Error`] events instead.

use thiserror::Error;

/// Main error type for pipewright-player
#[derive(Error, Debug)]
pub enum Error {
    /// Operation invoked with no live pipeline
    #[error("pipeline not initialized")]
    NotInitialized,

    /// Malformed data-source string, bad file descriptor, mapping failure
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Engine reported a hard failure changing state
    #[error("state transition failed: {0}")]
    Transition(String),

    /// Position/duration query unsupported or returned a unit mismatch
    #[error("query failed: {0}")]
    Query(String),

    /// Configuration file loading errors
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using pipewright-player Error
pub type Result<T> = std::result::Result<T, Error>;
