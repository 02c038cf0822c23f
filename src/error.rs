//! Error types for the mlarchive library.
//!
//! This module provides custom error types using `thiserror` for better error handling
//! and more specific error messages throughout the archive.
//!
//! Duplicate content is deliberately NOT an error: re-archiving byte-identical
//! content is an idempotent success that returns the existing message.

use thiserror::Error;

/// Errors that can occur while archiving, removing, or querying messages.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The target mailing list does not exist
    #[error("Unknown list: {0}")]
    UnknownList(String),

    /// The inbound message could not be parsed; the raw bytes were preserved
    /// under the list's `_failed` directory
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input (list name, flag bit, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// List-info cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Membership-export notification command failure; callers log and
    /// swallow this per policy
    #[error("External command failed: {0}")]
    ExternalCommand(String),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with ArchiveError
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl From<anyhow::Error> for ArchiveError {
    fn from(err: anyhow::Error) -> Self {
        ArchiveError::Other(err.to_string())
    }
}

impl From<sled::Error> for ArchiveError {
    fn from(err: sled::Error) -> Self {
        ArchiveError::Cache(err.to_string())
    }
}

impl From<bincode::Error> for ArchiveError {
    fn from(err: bincode::Error) -> Self {
        ArchiveError::Cache(err.to_string())
    }
}
