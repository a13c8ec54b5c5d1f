//! Fixture builders shared by the parser, fixup, and loader tests

use std::collections::HashMap;
use std::io;

use crate::archive::ARCHIVE_VERSION;
use crate::database::{ContainerId, Database};
use crate::section::ContentType;

/// One section to be emitted by [`ArchiveBuilder`].
pub(crate) struct SectionSpec {
    content_type: ContentType,
    id: u32,
    payload: Vec<u8>,
    fixup_block: Vec<u8>,
}

impl SectionSpec {
    pub(crate) fn new(content_type: ContentType, id: u32) -> Self {
        Self {
            content_type,
            id,
            payload: Vec::new(),
            fixup_block: Vec::new(),
        }
    }

    pub(crate) fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub(crate) fn fixups(mut self, spec: FixupSpec) -> Self {
        self.fixup_block = spec.encode();
        self
    }

    /// A fixup block taken verbatim, for malformed-stream tests.
    pub(crate) fn raw_fixups(mut self, block: Vec<u8>) -> Self {
        self.fixup_block = block;
        self
    }
}

/// Entry lists for the five fixup categories.
#[derive(Default)]
pub(crate) struct FixupSpec {
    cat0: Vec<u64>,
    cat1: Vec<u64>,
    cat2: Vec<u32>,
    cat3: Vec<u32>,
    cat4: Vec<u32>,
}

impl FixupSpec {
    pub(crate) fn cat0(mut self, entry: u64) -> Self {
        self.cat0.push(entry);
        self
    }

    pub(crate) fn cat1(mut self, entry: u64) -> Self {
        self.cat1.push(entry);
        self
    }

    pub(crate) fn cat2(mut self, entry: u32) -> Self {
        self.cat2.push(entry);
        self
    }

    pub(crate) fn cat3(mut self, entry: u32) -> Self {
        self.cat3.push(entry);
        self
    }

    pub(crate) fn cat4(mut self, entry: u32) -> Self {
        self.cat4.push(entry);
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for count in [
            self.cat0.len(),
            self.cat1.len(),
            self.cat2.len(),
            self.cat3.len(),
            self.cat4.len(),
        ] {
            out.extend_from_slice(&(count as u32).to_le_bytes());
        }
        for entry in &self.cat0 {
            out.extend_from_slice(&entry.to_le_bytes());
        }
        for entry in &self.cat1 {
            out.extend_from_slice(&entry.to_le_bytes());
        }
        for entry in &self.cat2 {
            out.extend_from_slice(&entry.to_le_bytes());
        }
        for entry in &self.cat3 {
            out.extend_from_slice(&entry.to_le_bytes());
        }
        for entry in &self.cat4 {
            out.extend_from_slice(&entry.to_le_bytes());
        }
        out
    }
}

/// Encode a category-0 entry: patch site and target offset in the same
/// section.
pub(crate) fn cat0(patch: u32, target_offset: u32) -> u64 {
    u64::from(patch) | (u64::from(target_offset) << 32)
}

/// Encode a category-1 entry: patch site, target section index, target
/// offset.
pub(crate) fn cat1(patch: u32, section: u16, target_offset: u32) -> u64 {
    assert_eq!(patch % 4, 0, "patch sites are 4-byte slots");
    u64::from(section) | (u64::from(patch / 4) << 14) | (u64::from(target_offset) << 38)
}

/// Encode a category-2/4 entry; the target id is whatever u32 the payload
/// holds at the patch site.
pub(crate) fn cat2(patch: u32, content_type: ContentType) -> u32 {
    assert_eq!(patch % 4, 0, "patch sites are 4-byte slots");
    (patch / 4) | (u32::from(content_type as u8) << 25)
}

/// Emits archive buffers the way the packer lays them out.
pub(crate) struct ArchiveBuilder {
    version: u32,
    reserved_0c: u32,
    realign: bool,
    root: u32,
    reserved_blob: Vec<u8>,
    dependencies: Vec<String>,
    sections: Vec<SectionSpec>,
}

impl ArchiveBuilder {
    pub(crate) fn new() -> Self {
        Self {
            version: ARCHIVE_VERSION,
            reserved_0c: 0,
            realign: false,
            root: 0,
            reserved_blob: Vec::new(),
            dependencies: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub(crate) fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn reserved_0c(mut self, value: u32) -> Self {
        self.reserved_0c = value;
        self
    }

    pub(crate) fn realign(mut self) -> Self {
        self.realign = true;
        self
    }

    pub(crate) fn root(mut self, index: u32) -> Self {
        self.root = index;
        self
    }

    pub(crate) fn reserved_blob(mut self, blob: Vec<u8>) -> Self {
        self.reserved_blob = blob;
        self
    }

    pub(crate) fn dependency(mut self, path: &str) -> Self {
        self.dependencies.push(path.to_string());
        self
    }

    pub(crate) fn section(mut self, spec: SectionSpec) -> Self {
        self.sections.push(spec);
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut deps = Vec::new();
        for path in &self.dependencies {
            deps.extend_from_slice(path.as_bytes());
            deps.push(0);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(deps.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.reserved_blob.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.reserved_0c.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&u32::from(self.realign).to_le_bytes());
        out.extend_from_slice(&(self.sections.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.root.to_le_bytes());

        for spec in &self.sections {
            out.extend_from_slice(&(spec.payload.len() as u32).to_le_bytes());
            out.push(spec.content_type as u8);
            out.push(0);
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&((spec.fixup_block.len() as u32) << 8).to_le_bytes());
            out.extend_from_slice(&spec.id.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
        }

        out.extend_from_slice(&self.reserved_blob);
        if self.realign {
            pad16(&mut out);
        }
        out.extend_from_slice(&deps);
        if self.realign {
            pad16(&mut out);
        }

        for spec in &self.sections {
            out.extend_from_slice(&spec.fixup_block);
            if self.realign {
                pad16(&mut out);
            }
            out.extend_from_slice(&spec.payload);
            if self.realign {
                pad16(&mut out);
            }
        }

        out
    }
}

fn pad16(out: &mut Vec<u8>) {
    while out.len() % 16 != 0 {
        out.push(0);
    }
}

/// A reader over an in-memory path -> bytes map.
pub(crate) fn map_reader<const N: usize>(
    files: [(&str, Vec<u8>); N],
) -> impl FnMut(&str) -> io::Result<Vec<u8>> {
    let map: HashMap<String, Vec<u8>> = files
        .into_iter()
        .map(|(path, bytes)| (path.to_string(), bytes))
        .collect();
    move |path: &str| {
        map.get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// Load one archive buffer as `test.drm` into a fresh database.
pub(crate) fn load_single(data: Vec<u8>) -> (Database, ContainerId) {
    let mut db = Database::new();
    let mut reader = map_reader([("test.drm", data)]);
    let id = db.load("test.drm", &mut reader).expect("fixture must load");
    (db, id)
}
