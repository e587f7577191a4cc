//! Error types for the Vigil core pipeline.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the evaluation-run lifecycle, support-desk handoff, and
//! configuration domains.

/// Top-level error type for the Vigil core library.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Handoff error: {0}")]
    Handoff(#[from] HandoffError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the evaluation-run engine and its store.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("Invalid evaluation request: {message}")]
    Validation { message: String },

    #[error("Run {run_id} is in state '{actual}', expected '{expected}'")]
    InvalidState {
        run_id: String,
        expected: String,
        actual: String,
    },

    #[error("Store error: {message}")]
    Store { message: String },
}

impl EvaluationError {
    /// Shorthand for a missing keyed resource.
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }
}

/// Errors from the support-desk handoff client and webhook endpoint.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("Support desk resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Support desk rejected the request: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Support desk API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Webhook signature verification failed")]
    Signature,

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `VigilError`.
pub type Result<T> = std::result::Result<T, VigilError>;
