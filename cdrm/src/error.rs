//! Error types for CDRM decompression

use thiserror::Error;

/// Result type for CDRM operations
pub type Result<T> = std::result::Result<T, Error>;

/// CDRM error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Header, index or payload runs past the end of the input
    #[error("Truncated data: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// Unsupported container version
    #[error("Unsupported CDRM version: {0}")]
    UnsupportedVersion(u32),

    /// Declared padding disagrees with the aligned index size
    #[error("Malformed CDRM header: padding does not match the aligned index end")]
    MalformedHeader,

    /// A block's payload does not decode to its declared size
    #[error("Malformed block {index}: {reason}")]
    MalformedBlock { index: usize, reason: String },

    /// Unknown block type
    #[error("Unknown block type: {0:#04x}")]
    UnknownBlockType(u8),
}
