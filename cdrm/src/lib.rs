//! CDRM block-compression container
//!
//! CDRM is the compression wrapper around cdc-engine DRM archives: a
//! 16-byte header, a packed block index, and a payload of independently
//! 16-byte-aligned blocks that are either stored verbatim or deflated.
//! This crate turns such a container back into the flat archive buffer;
//! buffers without the magic are passed through untouched, since plain
//! archives ship uncompressed.

mod decompress;
mod error;

pub use decompress::{BlockType, decompress};
pub use error::{Error, Result};

/// CDRM magic bytes
pub const MAGIC: [u8; 4] = *b"CDRM";

/// Only container version accepted by [`decompress`].
pub const VERSION: u32 = 2;
