//! Error types for GXF decoding.

use thiserror::Error;

/// Errors raised while decoding a GXF grid.
#[derive(Error, Debug)]
pub enum GxfError {
    /// IO error when reading the input stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed header, missing mandatory keyword or bad grid token.
    #[error("GXF format error: {0}")]
    Format(String),

    /// The grid section ended before `rows * points` samples were read.
    #[error("Truncated grid data: expected {expected} samples, found {found}")]
    TruncatedData { expected: usize, found: usize },

    /// The `#MAP_PROJECTION` block could not be turned into a reference system.
    #[error("Unsupported projection: {0}")]
    UnsupportedProjection(String),

    /// ZIP archive could not be read.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl GxfError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        GxfError::Format(msg.into())
    }

    /// Whether the error aborts a decode.
    ///
    /// Projection problems only degrade georeferencing.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GxfError::UnsupportedProjection(_))
    }
}

/// Result type alias using [`GxfError`].
pub type Result<T> = std::result::Result<T, GxfError>;
