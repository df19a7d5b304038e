//! Core error types for heroic-core.
//!
//! Backends report [`StoreError`]; the session controller folds those into
//! [`EngineError`], whose [`ErrorKind`] is what the notification sink sees.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error classification surfaced through `Event::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backend not configured or not reachable.
    StoreUnavailable,
    /// Mutation rejected by the backend.
    WriteFailed,
    /// Input rejected locally, never sent to a store.
    ValidationFailed,
    /// Mutate/delete on a missing id.
    NotFound,
    /// No owner is active (signed out and not in guest mode).
    NoSession,
}

/// Top-level error returned by session operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to {operation}: {message}")]
    WriteFailed {
        operation: &'static str,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("No active session: sign in or enter guest mode first")]
    NoSession,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            EngineError::WriteFailed { .. } => ErrorKind::WriteFailed,
            EngineError::Validation(_) => ErrorKind::ValidationFailed,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::NoSession => ErrorKind::NoSession,
        }
    }

    /// Classify a backend failure that happened while reading.
    pub fn from_read(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::StoreUnavailable(other.to_string()),
        }
    }

    /// Classify a backend failure that happened during a mutation.
    pub fn from_write(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::NotConfigured(msg) => EngineError::StoreUnavailable(msg),
            other => EngineError::WriteFailed {
                operation,
                message: other.to_string(),
            },
        }
    }
}

/// Errors raised by task store backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend has no usable configuration (e.g. missing base URL).
    #[error("Store not configured: {0}")]
    NotConfigured(String),

    /// Backend could not be reached or refused the request.
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    /// Backend answered but rejected the mutation.
    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Could not determine data directory: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Input validation errors. Always raised before a store is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Task title must not be empty")]
    EmptyTitle,

    #[error("Work duration must be within {min}..={max} minutes, got {got}")]
    WorkDurationOutOfRange { min: u32, max: u32, got: u32 },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
