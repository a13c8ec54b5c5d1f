//! CDRM container decompression
//!
//! A container is a 16-byte header (magic, version, block count, index
//! padding), a block index of `(uncompressed size << 8 | type, compressed
//! size)` pairs, and the block payloads. Both the compressed and the
//! uncompressed stream place every block on its own 16-byte boundary.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use std::io::{Cursor, Read};
use tracing::{debug, trace};

use crate::{Error, MAGIC, Result, VERSION};

/// Block encodings used inside a CDRM container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Stored as-is; compressed and uncompressed sizes must match.
    Verbatim,
    /// Zlib stream; must inflate to exactly the declared size.
    Zlib,
}

impl BlockType {
    /// Map a raw type byte, `None` for unknown encodings.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Verbatim),
            2 => Some(Self::Zlib),
            _ => None,
        }
    }

    /// The on-disk type byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Verbatim => 1,
            Self::Zlib => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockInfo {
    uncompressed_size: u32,
    compressed_size: u32,
    type_byte: u8,
}

/// Round `value` up to the next 16-byte boundary.
const fn align16(value: u64) -> u64 {
    (value + 15) & !15
}

/// Decompress a CDRM container into a flat archive buffer.
///
/// Buffers that do not start with the CDRM magic are returned unchanged.
/// On any error no partial output is produced.
pub fn decompress(input: Vec<u8>) -> Result<Vec<u8>> {
    if input.len() < MAGIC.len() || input[..MAGIC.len()] != MAGIC {
        trace!("no CDRM magic, passing {} bytes through", input.len());
        return Ok(input);
    }
    if input.len() < 16 {
        return Err(Error::Truncated {
            expected: 16,
            actual: input.len() as u64,
        });
    }

    let mut header = Cursor::new(&input[4..16]);
    let version = header.read_u32::<LittleEndian>()?;
    let count = header.read_u32::<LittleEndian>()?;
    let padding = header.read_u32::<LittleEndian>()?;

    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let index_end = 16 + u64::from(count) * 8;
    let payload_start = align16(index_end);
    if payload_start != index_end + u64::from(padding) {
        return Err(Error::MalformedHeader);
    }
    if (input.len() as u64) < payload_start {
        return Err(Error::Truncated {
            expected: payload_start,
            actual: input.len() as u64,
        });
    }

    // Each block starts on a 16-byte boundary in both streams, so the
    // totals accumulate as aligned-running-total plus block size.
    let mut index = Vec::with_capacity(count as usize);
    let mut entries = Cursor::new(&input[16..index_end as usize]);
    let mut total_out = 0u64;
    let mut total_in = 0u64;
    for _ in 0..count {
        let size_and_type = entries.read_u32::<LittleEndian>()?;
        let compressed_size = entries.read_u32::<LittleEndian>()?;
        let block = BlockInfo {
            uncompressed_size: size_and_type >> 8,
            compressed_size,
            type_byte: size_and_type as u8,
        };
        total_out = align16(total_out) + u64::from(block.uncompressed_size);
        total_in = align16(total_in) + u64::from(block.compressed_size);
        index.push(block);
    }

    let expected = payload_start + total_in;
    if (input.len() as u64) < expected {
        return Err(Error::Truncated {
            expected,
            actual: input.len() as u64,
        });
    }

    debug!("decompressing {count} blocks, {total_in} -> {total_out} bytes");

    let mut output = vec![0u8; total_out as usize];
    let mut in_cursor = payload_start;
    let mut out_cursor = 0u64;

    for (i, block) in index.iter().enumerate() {
        in_cursor = align16(in_cursor);
        out_cursor = align16(out_cursor);

        let source = &input[in_cursor as usize..][..block.compressed_size as usize];
        let target = &mut output[out_cursor as usize..][..block.uncompressed_size as usize];

        match BlockType::from_byte(block.type_byte) {
            Some(BlockType::Verbatim) => {
                if block.compressed_size != block.uncompressed_size {
                    return Err(Error::MalformedBlock {
                        index: i,
                        reason: format!(
                            "verbatim sizes differ: {} stored, {} declared",
                            block.compressed_size, block.uncompressed_size
                        ),
                    });
                }
                target.copy_from_slice(source);
            }
            Some(BlockType::Zlib) => inflate_block(source, target, i)?,
            None => return Err(Error::UnknownBlockType(block.type_byte)),
        }

        in_cursor += u64::from(block.compressed_size);
        out_cursor += u64::from(block.uncompressed_size);
    }

    Ok(output)
}

/// Inflate one zlib block; the output must match the declared size exactly.
fn inflate_block(source: &[u8], target: &mut [u8], index: usize) -> Result<()> {
    let mut decoder = ZlibDecoder::new(source);
    let mut decoded = Vec::with_capacity(target.len());
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| Error::MalformedBlock {
            index,
            reason: format!("zlib: {e}"),
        })?;

    if decoded.len() != target.len() {
        return Err(Error::MalformedBlock {
            index,
            reason: format!(
                "inflated to {} bytes, {} declared",
                decoded.len(),
                target.len()
            ),
        });
    }

    target.copy_from_slice(&decoded);
    Ok(())
}
