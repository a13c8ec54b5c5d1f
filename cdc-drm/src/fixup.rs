//! Decoding and resolution of section fixup blocks
//!
//! A section's fixup block is five little-endian entry counts followed by
//! that many entries per category, in category order. Resolution turns
//! every entry into a patch-site -> [`Reference`] mapping on the owning
//! section; the raw patch-site words in the payload are never rewritten.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use tracing::trace;

use crate::archive::Container;
use crate::database::{ContainerId, SectionHandle};
use crate::section::ContentType;
use crate::{Error, Reference, Result};

/// Resolve every fixup block in `container`, consulting `objects` for
/// cross-file targets registered by files loaded earlier.
///
/// A section's table is committed only once its whole block decodes; a
/// malformed block leaves that section without partial entries and fails
/// the container.
pub(crate) fn apply_fixups(
    container: &mut Container,
    container_id: ContainerId,
    objects: &HashMap<(ContentType, u32), SectionHandle>,
) -> Result<()> {
    let section_count = container.sections.len();
    let Container { data, sections, .. } = container;

    for section in sections.iter_mut() {
        let size = section.header.fixup_size();
        if size == 0 {
            continue;
        }

        let block = &data[section.fixup_cursor as usize..][..size as usize];
        let payload =
            &data[section.payload_cursor as usize..][..section.header.payload_size as usize];
        let this = SectionHandle {
            container: container_id,
            section: section.index,
        };

        let table = decode_block(block, payload, this, section_count, objects)?;
        section.set_fixups(table);
    }

    Ok(())
}

fn decode_block(
    block: &[u8],
    payload: &[u8],
    this: SectionHandle,
    section_count: usize,
    objects: &HashMap<(ContentType, u32), SectionHandle>,
) -> Result<BTreeMap<u32, Reference>> {
    let truncated = || Error::TruncatedFixups {
        section: this.section,
    };
    let mut stream = Cursor::new(block);

    let mut counts = [0u32; 5];
    for count in &mut counts {
        *count = stream.read_u32::<LittleEndian>().map_err(|_| truncated())?;
    }
    trace!(
        "section {} fixup counts: {counts:?}",
        this.section
    );

    let payload_size = payload.len() as u32;
    let mut table = BTreeMap::new();

    // Category 0: intra-section. Patch site in the low half, target
    // offset in the high half.
    for _ in 0..counts[0] {
        let value = stream.read_u64::<LittleEndian>().map_err(|_| truncated())?;
        let patch = value as u32;
        let target_offset = (value >> 32) as u32;
        check_patch_site(patch, payload_size)?;
        table.insert(patch, Reference::new(this, target_offset));
    }

    // Category 1: another section of the same container. The low 14 bits
    // index the section table; the 24-bit field at bits 14-37 counts
    // 4-byte slots, so the byte offset is that field times four.
    for _ in 0..counts[1] {
        let value = stream.read_u64::<LittleEndian>().map_err(|_| truncated())?;
        let target_index = (value & 0x3fff) as u16;
        let patch = ((value & 0x0000_003f_ffff_c000) >> 12) as u32;
        let target_offset = ((value & 0xffff_ffc0_0000_0000) >> 38) as u32;

        if usize::from(target_index) >= section_count {
            return Err(Error::SectionIndexOutOfRange(target_index, section_count));
        }
        check_patch_site(patch, payload_size)?;

        let target = SectionHandle {
            container: this.container,
            section: target_index,
        };
        table.insert(patch, Reference::new(target, target_offset));
    }

    for _ in 0..counts[2] {
        let value = stream.read_u32::<LittleEndian>().map_err(|_| truncated())?;
        let (patch, reference) = resolve_indexed(value, payload, objects)?;
        table.insert(patch, reference);
    }

    // Category 3 has no known decoding.
    if counts[3] > 0 {
        return Err(Error::UnsupportedFixup(3));
    }

    // Category 4 shares the category-2 encoding.
    for _ in 0..counts[4] {
        let value = stream.read_u32::<LittleEndian>().map_err(|_| truncated())?;
        let (patch, reference) = resolve_indexed(value, payload, objects)?;
        table.insert(patch, reference);
    }

    Ok(table)
}

/// Categories 2 and 4: a cross-file pointer. The entry carries the target
/// content type in its top 7 bits and the patch site (in 4-byte slots) in
/// the rest; the payload word already stored at the patch site is the
/// target id. A key missing from the object index is not an error.
fn resolve_indexed(
    value: u32,
    payload: &[u8],
    objects: &HashMap<(ContentType, u32), SectionHandle>,
) -> Result<(u32, Reference)> {
    let patch = (value & 0x01ff_ffff) * 4;
    check_patch_site(patch, payload.len() as u32)?;

    let id = LittleEndian::read_u32(&payload[patch as usize..]);
    let target_type = (value >> 25) as u8;

    let reference = match ContentType::from_u8(target_type).and_then(|ty| objects.get(&(ty, id))) {
        Some(&section) => Reference::new(section, 0),
        None => Reference::NULL,
    };

    Ok((patch, reference))
}

/// Every patch site is a 4-byte slot that must fit inside the payload.
fn check_patch_site(patch: u32, payload_size: u32) -> Result<()> {
    if u64::from(patch) + 4 > u64::from(payload_size) {
        return Err(Error::PatchSiteOutOfRange {
            offset: patch,
            payload_size,
        });
    }
    Ok(())
}
