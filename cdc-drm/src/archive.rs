//! Archive parsing: header, section table, and buffer layout

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use tracing::debug;

use crate::section::{Section, SectionHeader};
use crate::{Error, Result};

/// Only archive format version accepted by the parser.
pub const ARCHIVE_VERSION: u32 = 21;

const HEADER_SIZE: usize = 32;

/// Round `value` up to the next 16-byte boundary.
pub(crate) const fn align16(value: u64) -> u64 {
    (value + 15) & !15
}

/// One parsed archive: an ordered, fixed run of sections over a single
/// backing buffer, plus the dependency paths the archive declares.
///
/// Containers are never mutated or resized after parsing, so section
/// handles into them stay valid for the life of the session.
#[derive(Debug)]
pub struct Container {
    pub(crate) data: Vec<u8>,
    pub(crate) sections: Vec<Section>,
    origin: String,
    root_section: u32,
    dependencies: Vec<String>,
}

impl Container {
    /// Parse an uncompressed archive buffer. `origin` labels the source
    /// path for diagnostics and listings.
    pub fn parse(data: Vec<u8>, origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();

        if data.len() < HEADER_SIZE {
            return Err(Error::Truncated {
                expected: HEADER_SIZE as u64,
                actual: data.len() as u64,
            });
        }

        let mut header = Cursor::new(&data[..HEADER_SIZE]);
        let version = header.read_u32::<LittleEndian>()?;
        let dependency_list_size = header.read_u32::<LittleEndian>()?;
        let reserved_blob_size = header.read_u32::<LittleEndian>()?;
        let reserved_0c = header.read_u32::<LittleEndian>()?;
        let _reserved_10 = header.read_u32::<LittleEndian>()?;
        let flags = header.read_u32::<LittleEndian>()?;
        let section_count = header.read_u32::<LittleEndian>()?;
        let root_section = header.read_u32::<LittleEndian>()?;

        if version != ARCHIVE_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        if reserved_0c != 0 {
            return Err(Error::HeaderMismatch);
        }

        // Flag bit 0: pad every region out to a 16-byte boundary.
        let realign = flags & 1 != 0;

        let table_end = HEADER_SIZE as u64 + u64::from(section_count) * SectionHeader::SIZE as u64;
        in_buffer(&data, table_end)?;

        let mut table = Cursor::new(&data[HEADER_SIZE..table_end as usize]);
        let mut headers = Vec::with_capacity(section_count as usize);
        for _ in 0..section_count {
            headers.push(SectionHeader::parse(&mut table)?);
        }

        let mut cursor = table_end;

        // One reserved blob, then the dependency path list.
        cursor += u64::from(reserved_blob_size);
        in_buffer(&data, cursor)?;
        if realign {
            cursor = align16(cursor);
        }

        let list_end = cursor + u64::from(dependency_list_size);
        in_buffer(&data, list_end)?;
        let dependencies = parse_dependency_list(&data[cursor as usize..list_end as usize]);
        cursor = list_end;
        if realign {
            cursor = align16(cursor);
        }

        // Sections are laid out in index order: fixup block, then payload.
        let mut sections = Vec::with_capacity(headers.len());
        for (index, header) in headers.into_iter().enumerate() {
            let fixup_cursor = cursor;
            cursor += u64::from(header.fixup_size());
            in_buffer(&data, cursor)?;
            if realign {
                cursor = align16(cursor);
            }

            let payload_cursor = cursor;
            cursor += u64::from(header.payload_size);
            in_buffer(&data, cursor)?;
            if realign {
                cursor = align16(cursor);
            }

            sections.push(Section::new(
                header,
                index as u16,
                index as u32 == root_section,
                fixup_cursor,
                payload_cursor,
            ));
        }

        debug!(
            "parsed {}: {} sections, {} dependencies, realign={realign}",
            origin,
            sections.len(),
            dependencies.len(),
        );

        Ok(Self {
            data,
            sections,
            origin,
            root_section,
            dependencies,
        })
    }

    /// Source path this container was parsed from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Sections in index order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Index of the root section.
    pub fn root_section(&self) -> u32 {
        self.root_section
    }

    /// Dependency paths in declared order, separators normalized to `/`.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn payload(&self, section: &Section) -> &[u8] {
        &self.data[section.payload_cursor as usize..][..section.header.payload_size as usize]
    }
}

fn in_buffer(data: &[u8], end: u64) -> Result<()> {
    if (data.len() as u64) < end {
        return Err(Error::Truncated {
            expected: end,
            actual: data.len() as u64,
        });
    }
    Ok(())
}

/// Dependency paths are stored as consecutive NUL-terminated strings.
fn parse_dependency_list(region: &[u8]) -> Vec<String> {
    let mut dependencies = Vec::new();
    let mut rest = region;
    while !rest.is_empty() {
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let path = String::from_utf8_lossy(&rest[..end]).replace('\\', "/");
        dependencies.push(path);
        rest = &rest[(end + 1).min(rest.len())..];
    }
    dependencies
}
