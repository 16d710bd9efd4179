//! Error types for the group crate.

use skio_types::TypeError;

/// Errors that can occur while reading or writing a [`Group`](crate::Group).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GroupError {
    /// The key has neither a registered value nor a default.
    #[error("no registered or default value for '{0}'")]
    KeyNotFound(String),

    /// The write policy or a nested group forbids the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A value could not be cast to the declared type, or an accessor was
    /// called with arguments it does not accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<TypeError> for GroupError {
    fn from(err: TypeError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// Convenience alias for group results.
pub type GroupResult<T> = Result<T, GroupError>;
