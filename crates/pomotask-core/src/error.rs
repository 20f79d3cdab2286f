//! Core error types for pomotask-core.
//!
//! Every fallible operation in the library returns [`CoreError`] (via the
//! [`Result`] alias) or one of its sub-enums.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomotask-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Reconciliation errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Session store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Stored value could not be decoded
    #[error("Corrupt value under '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Backend refused the write (quota, read-only medium, injected failure)
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// A store lock was poisoned by a panicking writer
    #[error("Session cache lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Task id missing or blank
    #[error("task id must not be empty")]
    EmptyTaskId,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Reconciliation errors.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server rejected session (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Server URL could not be built
    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Upload stopped part-way; the uploaded prefix was already removed
    #[error("Uploaded {uploaded} of {total} sessions before failing: {source}")]
    Partial {
        uploaded: usize,
        total: usize,
        #[source]
        source: Box<SyncError>,
    },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
