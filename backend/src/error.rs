//! Error types for the bulk ingestion pipeline.
//!
//! - [`CsvError`] - CSV parsing and row validation errors
//! - [`RegistryError`] - Remote registry call failures (absorbed per row)
//! - [`BatchError`] - Batch store lookups
//! - [`PipelineError`] - Submission-level errors
//! - [`ServerError`] - HTTP mapping of everything above
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors during CSV parsing and row validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CsvError {
    /// Content is empty or whitespace only.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("CSV file has no headers")]
    NoHeaders,

    /// Required headers absent. Names are sorted.
    #[error("Missing required headers: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    /// A required field is blank on a data row.
    #[error("Row {row}: {field} is required")]
    MissingField { row: usize, field: &'static str },

    /// Invalid CSV format.
    #[error("Invalid CSV format: {0}")]
    ParseError(String),

    /// Bytes could not be decoded.
    #[error("Failed to decode file: {0}")]
    EncodingError(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the remote registry client.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transport failure or timeout.
    #[error("Failed to create entity: {0}")]
    RequestFailed(String),

    /// Non-success HTTP status.
    #[error("Failed to create entity: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not carry an entity id.
    #[error("Failed to create entity: invalid response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Batch Store Errors
// =============================================================================

/// Errors from the batch store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BatchError {
    /// Unknown batch identifier.
    #[error("Batch ID not found: {0}")]
    NotFound(String),

    /// Batch ids are never reused within a process.
    #[error("Batch ID already registered: {0}")]
    AlreadyExists(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Submission errors. Raised before a batch is created; a started batch
/// never fails.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("{0}")]
    Csv(#[from] CsvError),

    /// File parsed but held no data rows.
    #[error("No valid entity data found in CSV")]
    EmptyInput,

    /// Row count above the configured limit.
    #[error("Too many entities. Found {found}, maximum allowed: {limit}")]
    TooManyRows { found: usize, limit: usize },

    /// Batch could not be registered.
    #[error("{0}")]
    Batch(#[from] BatchError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid request.
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Server internal error. The message is logged, never returned.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ServerError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Batch(e) => e.into(),
            other => ServerError::BadRequest(other.to_string()),
        }
    }
}

impl From<BatchError> for ServerError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::NotFound(_) => ServerError::NotFound(err.to_string()),
            BatchError::AlreadyExists(_) => ServerError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
