//! Error types for model decoding, encoding and conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type.
///
/// Structural variants name the record kind and the absolute byte offset at
/// which the problem was detected. Nothing is returned alongside them.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File extension or magic does not name a known format
    #[error("Unknown model format: {0}")]
    UnknownFormat(String),

    /// Magic identifier mismatch
    #[error("Bad magic in {kind} at offset {offset}: expected {expected:?}, found {found:?}")]
    BadMagic {
        kind: &'static str,
        offset: u64,
        expected: [u8; 4],
        found: [u8; 4],
    },

    /// Version field mismatch
    #[error("Unsupported {kind} version {found} (expected {expected})")]
    UnsupportedVersion {
        kind: &'static str,
        expected: i32,
        found: i32,
    },

    /// A record or array runs past the end of the buffer
    #[error("Truncated {kind} at offset {offset}: need {needed} bytes, buffer has {len}")]
    Truncated {
        kind: &'static str,
        offset: u64,
        needed: u64,
        len: u64,
    },

    /// An offset field points outside its container
    #[error("Bad offset in {kind} at offset {offset}: {value}")]
    BadOffset {
        kind: &'static str,
        offset: u64,
        value: i64,
    },

    /// An index references a vertex, bone, frame or tag that does not exist
    #[error("Bad index in {kind} at offset {offset}: {index} (count: {count})")]
    BadIndex {
        kind: &'static str,
        offset: u64,
        index: i64,
        count: usize,
    },

    /// The model cannot be expressed in the requested format
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A value does not fit its on-disk encoding
    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: f64 },

    /// A name does not fit its fixed-length field
    #[error("Name {name:?} exceeds {max} bytes")]
    NameTooLong { name: String, max: usize },

    /// Mesh reduction exceeded its configured bound
    #[error("Mesh of {count} vertices exceeds the reduction limit of {limit}")]
    LimitExceeded { count: usize, limit: usize },

    /// Mesh reduction was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal layout plan and emitted bytes disagree
    #[error("Layout mismatch in {kind}: planned offset {planned}, written {actual}")]
    LayoutMismatch {
        kind: &'static str,
        planned: u64,
        actual: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an unsupported-conversion error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// True for errors caused by malformed input bytes.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. }
                | Self::UnsupportedVersion { .. }
                | Self::Truncated { .. }
                | Self::BadOffset { .. }
                | Self::BadIndex { .. }
        )
    }
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;
