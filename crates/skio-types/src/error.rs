use thiserror::Error;

/// Errors produced by array and element type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("unsupported data type: {0}")]
    UnsupportedDType(String),

    #[error("nested lists do not form a regular array")]
    RaggedList,

    #[error("value is not numeric: {0}")]
    NotNumeric(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
