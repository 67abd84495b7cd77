//! Reelindex Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Query Errors
    // =========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Filter Errors
    // =========================================================================
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("Filter dimension mismatch: {0}")]
    FilterMismatch(String),

    #[error("Invalid filter parameters: {0}")]
    InvalidFilterParams(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;
