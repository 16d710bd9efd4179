//! Error types for file operations.

use std::path::PathBuf;

use skio_codec::CodecError;
use skio_group::GroupError;
use thiserror::Error;

/// Errors that can occur while loading, saving or naming files.
#[derive(Debug, Error)]
pub enum FileError {
    /// A driver was given input that is not in its format. Drivers return
    /// this before touching the target group.
    #[error("file not in expected format: {0}")]
    FormatMismatch(String),

    /// Every registered driver rejected the input.
    #[error("no driver could load '{}'", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    /// The input is in the driver's format but its content is malformed.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Convenience type alias for file operations.
pub type FileResult<T> = std::result::Result<T, FileError>;
