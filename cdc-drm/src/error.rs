//! Error types for archive loading and payload access
//!
//! Three outcome classes stay separate: format errors abort the load of
//! one file, [`Error::OutOfBounds`]/[`Error::NullReference`] abort one
//! read, and an unresolved lookup is not an error at all — it yields the
//! null [`crate::Reference`].

use thiserror::Error;

/// Result type for DRM operations
pub type Result<T> = std::result::Result<T, Error>;

/// DRM error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Decompression of the backing buffer failed
    #[error("CDRM error: {0}")]
    Cdrm(#[from] cdrm::Error),

    /// Unsupported archive format version
    #[error("Unsupported archive version: {0}, only 21 is supported")]
    UnsupportedVersion(u32),

    /// The reserved header field that must be zero is not
    #[error("Archive header mismatch: reserved field is not zero")]
    HeaderMismatch,

    /// A section declares a tag outside the closed content-type range
    #[error("Unknown content type: {0}")]
    UnknownContentType(u8),

    /// A header, the dependency list, a fixup block or a payload runs
    /// past the end of the buffer
    #[error("Truncated archive: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    /// A fixup entry stream runs past its declared block length
    #[error("Fixup block of section {section} is truncated")]
    TruncatedFixups { section: u16 },

    /// Category-3 fixups have no known decoding
    #[error("Unsupported fixup category: {0}")]
    UnsupportedFixup(u8),

    /// A category-1 fixup names a section the container does not have
    #[error("Section index {0} is out of range, must be less than {1}")]
    SectionIndexOutOfRange(u16, usize),

    /// A fixup patch site does not leave room for a 4-byte slot
    #[error("Patch site {offset:#x} does not fit in a payload of {payload_size} bytes")]
    PatchSiteOutOfRange { offset: u32, payload_size: u32 },

    /// A reference access or deref reaches beyond the section payload
    #[error("Access at {offset:#x}+{size} is outside a payload of {payload_size} bytes")]
    OutOfBounds {
        offset: u64,
        size: usize,
        payload_size: u32,
    },

    /// Access or deref through the null reference
    #[error("Access through a null reference")]
    NullReference,
}
