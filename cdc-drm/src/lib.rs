//! cdc-engine DRM archive loader
//!
//! DRM archives store game assets as a graph of typed, relocatable
//! sections spread across files. This crate parses the container layout,
//! decodes the five packed fixup encodings into per-section pointer
//! tables, and loads files together with their declared dependencies in
//! the order that makes cross-file pointers resolve. Payloads are read
//! exclusively through bounds-checked [`Reference`] cursors.
//!
//! ```no_run
//! use cdc_drm::{ContentType, Database, DirReader};
//!
//! let mut db = Database::new();
//! let mut reader = DirReader::new("extracted/");
//! let unit = db.load("unit.drm", &mut reader).expect("load failed");
//!
//! let root = db.root_reference(unit);
//! let first_word: u32 = root.access(&db, 0)?;
//! let pointer = root.deref(&db, 4)?;
//! let script = db.find(ContentType::Script, 5);
//! # Ok::<(), cdc_drm::Error>(())
//! ```

mod archive;
mod database;
mod error;
mod fixup;
mod reference;
mod section;

#[cfg(test)]
pub(crate) mod test_utils;

pub use archive::{ARCHIVE_VERSION, Container};
pub use database::{ArchiveReader, ContainerId, Database, DirReader, SectionHandle};
pub use error::{Error, Result};
pub use reference::{Readable, Reference};
pub use section::{ContentType, Section, SectionHeader};
