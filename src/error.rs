//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
///
/// Every core operation is non-throwing at its boundary: errors are returned
/// through this type, never left to unwind the caller's control flow.
#[derive(Error, Debug)]
pub enum WeftError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Data access errors (WEFT-010 to WEFT-013)
    // ─────────────────────────────────────────────────────────────

    /// The remote API's convention for surfacing failures is to return an
    /// error string (or a falsy value) in place of data.
    #[error("WEFT-010: API error for operation '{operation}': {message}")]
    RemoteSignal { operation: String, message: String },

    #[error("WEFT-011: Missing required parameter '{param}' for operation '{operation}'")]
    MissingParameter { operation: String, param: String },

    #[error("WEFT-012: Operation '{name}' not supported")]
    UnknownOperation { name: String },

    #[error("WEFT-013: Invalid API endpoint '{endpoint}'")]
    InvalidEndpoint { endpoint: String },

    // ─────────────────────────────────────────────────────────────
    // Template errors (WEFT-020 to WEFT-021)
    // ─────────────────────────────────────────────────────────────

    #[error("WEFT-020: Missing required template '{name}'")]
    MissingTemplate { name: String },

    #[error("WEFT-021: Data is not iterable (expected {expected})")]
    NotIterable { expected: String },

    // ─────────────────────────────────────────────────────────────
    // Store errors (WEFT-030)
    // ─────────────────────────────────────────────────────────────

    #[error("WEFT-030: Persisted cache blob is not valid JSON: {details}")]
    CacheBlob { details: String },
}

impl FixSuggestion for WeftError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            WeftError::Transport(_) => Some("Check network connectivity and the API endpoint"),
            WeftError::Io(_) => Some("Check file path and permissions of the storage medium"),
            WeftError::RemoteSignal { .. } => {
                Some("Verify the API key and the request parameters")
            }
            WeftError::MissingParameter { .. } => {
                Some("Supply the parameter via attributes or URL parameters")
            }
            WeftError::UnknownOperation { .. } => {
                Some("Use one of the registered operation names (see Operation::ALL)")
            }
            WeftError::InvalidEndpoint { .. } => {
                Some("Endpoint must be an absolute http(s) URL")
            }
            WeftError::MissingTemplate { .. } => {
                Some("Author the named template; only optional templates may be omitted")
            }
            WeftError::NotIterable { .. } => {
                Some("Remove the iterable template or fetch a list-shaped operation")
            }
            WeftError::CacheBlob { .. } => {
                Some("Clear the persisted store; external writers must keep the blob valid JSON")
            }
        }
    }
}
