//! Error types for OffsetDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using OffsetDbError
pub type Result<T> = std::result::Result<T, OffsetDbError>;

/// Unified error type for OffsetDB operations
#[derive(Debug, Error)]
pub enum OffsetDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    /// Missing or malformed record id, or an invalid page request
    #[error("Validation error: {0}")]
    Validation(String),

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    /// Snapshot missing, unreadable or inconsistent with the log.
    /// The engine recovers from this by rescanning the log.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
