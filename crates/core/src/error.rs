//! Error types for the OpsClaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; there is no catch-all.

use std::time::Duration;
use thiserror::Error;

// --- Bounded context errors ---

/// Failures of the natural-language extractor.
///
/// The extraction contract is fail-closed: the session treats every
/// variant the same way (no candidates, no dispatch).
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Extractor not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Malformed extractor output: {0}")]
    Malformed(String),

    #[error("Extractor output was filtered")]
    Filtered,

    #[error("Extractor output was truncated")]
    Truncated,
}

/// Batch-level validation failures raised before anything is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FusionError {
    #[error("Cannot inspect {resource_kind} without a resource name. {usage}")]
    MissingIdentifier { resource_kind: String, usage: String },
}

/// The failure reason carried by a settled worker task.
///
/// These never propagate as `Err` past the dispatcher: they are stored in
/// [`crate::Outcome::Failure`] so sibling tasks keep running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Failed to start worker: {0}")]
    Spawn(String),

    #[error("Worker I/O error: {0}")]
    Io(String),

    #[error("Timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Worker exited with code {code}")]
    Exited { code: i32 },

    #[error("Worker terminated by signal")]
    Signalled,

    #[error("{0}")]
    Remote(String),
}
