//! Bounds-checked cursors into section payloads
//!
//! A [`Reference`] is the only way consumers read typed data out of a
//! loaded session or follow resolved pointers. It owns nothing: just a
//! section handle and a byte offset, valid as long as the
//! [`Database`](crate::Database) that produced the handle.

use crate::database::{Database, SectionHandle};
use crate::section::Section;
use crate::{Error, Result};

/// Little-endian plain-data types that can be read out of a payload.
pub trait Readable: Sized + Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode from exactly [`Self::SIZE`] bytes.
    fn read_from(buf: &[u8]) -> Self;
}

macro_rules! impl_readable {
    ($($t:ty),* $(,)?) => {$(
        impl Readable for $t {
            const SIZE: usize = size_of::<$t>();

            fn read_from(buf: &[u8]) -> Self {
                Self::from_le_bytes(buf.try_into().expect("caller checks the slice length"))
            }
        }
    )*};
}

impl_readable!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl<const N: usize> Readable for [u8; N] {
    const SIZE: usize = N;

    fn read_from(buf: &[u8]) -> Self {
        buf.try_into().expect("caller checks the slice length")
    }
}

/// A non-owning cursor: a section handle plus a byte offset into that
/// section's payload. `section == None` is the null reference — the
/// ordinary value of an unresolved lookup, not an error.
///
/// Equality is structural: same section identity, same offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    section: Option<SectionHandle>,
    offset: u32,
}

impl Reference {
    /// The null reference.
    pub const NULL: Self = Self {
        section: None,
        offset: 0,
    };

    /// A reference `offset` bytes into the section behind `handle`.
    pub fn new(handle: SectionHandle, offset: u32) -> Self {
        Self {
            section: Some(handle),
            offset,
        }
    }

    pub fn is_null(self) -> bool {
        self.section.is_none()
    }

    pub fn section(self) -> Option<SectionHandle> {
        self.section
    }

    pub fn offset(self) -> u32 {
        self.offset
    }

    /// The same section, `extra` bytes further in.
    pub fn add(self, extra: u32) -> Self {
        Self {
            section: self.section,
            offset: self.offset.saturating_add(extra),
        }
    }

    /// Read a `T` at `offset + extra`.
    ///
    /// Fails with [`Error::OutOfBounds`] when the read does not fit in
    /// the section payload, and [`Error::NullReference`] on the null
    /// reference.
    pub fn access<T: Readable>(self, db: &Database, extra: u32) -> Result<T> {
        let (section, payload) = self.target(db)?;
        let offset = u64::from(self.offset) + u64::from(extra);
        let end = offset + T::SIZE as u64;
        if end > u64::from(section.header.payload_size) {
            return Err(Error::OutOfBounds {
                offset,
                size: T::SIZE,
                payload_size: section.header.payload_size,
            });
        }
        Ok(T::read_from(&payload[offset as usize..end as usize]))
    }

    /// Follow the pointer patched in at `offset + extra`.
    ///
    /// The patch site is checked as a 4-byte slot; an offset with no
    /// fixup entry yields the null reference.
    pub fn deref(self, db: &Database, extra: u32) -> Result<Reference> {
        let (section, _) = self.target(db)?;
        let offset = u64::from(self.offset) + u64::from(extra);
        if offset + size_of::<u32>() as u64 > u64::from(section.header.payload_size) {
            return Err(Error::OutOfBounds {
                offset,
                size: size_of::<u32>(),
                payload_size: section.header.payload_size,
            });
        }
        Ok(section.fixup(offset as u32).unwrap_or(Self::NULL))
    }

    fn target(self, db: &Database) -> Result<(&Section, &[u8])> {
        let handle = self.section.ok_or(Error::NullReference)?;
        Ok(db.section_and_payload(handle))
    }
}
