use skio_types::TypeError;

/// Errors from codec operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// An argument is outside what the codec accepts (non-floating decode
    /// target, non-integer encode target, malformed array).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<TypeError> for CodecError {
    fn from(err: TypeError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
