//! The loading session: container arena, object index, and file cache

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::archive::Container;
use crate::fixup;
use crate::section::{ContentType, Section};
use crate::{Reference, Result};

/// Identifies one loaded container within its [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub(crate) u32);

/// Identifies one section of one loaded container.
///
/// Handles are plain indices into the owning database's arena and are
/// only meaningful with the database that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionHandle {
    pub(crate) container: ContainerId,
    pub(crate) section: u16,
}

impl SectionHandle {
    pub fn container(self) -> ContainerId {
        self.container
    }

    /// Index of the section within its container.
    pub fn index(self) -> u16 {
        self.section
    }
}

/// Supplies raw archive bytes for a declared path.
///
/// File access and path case handling stay with the caller; the loader
/// only hands over paths from dependency lists, separators already
/// normalized to `/`. Implemented for any
/// `FnMut(&str) -> io::Result<Vec<u8>>`.
pub trait ArchiveReader {
    fn read(&mut self, path: &str) -> io::Result<Vec<u8>>;
}

impl<F> ArchiveReader for F
where
    F: FnMut(&str) -> io::Result<Vec<u8>>,
{
    fn read(&mut self, path: &str) -> io::Result<Vec<u8>> {
        self(path)
    }
}

/// Reads archives from a base directory with `std::fs`.
#[derive(Debug, Clone)]
pub struct DirReader {
    base: PathBuf,
}

impl DirReader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl ArchiveReader for DirReader {
    fn read(&mut self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.base.join(path))
    }
}

/// One loading session.
///
/// The database owns every container loaded into it, the
/// `(content type, id) -> section` object index built in dependency
/// order, and the per-path cache that memoizes loads, failed ones
/// included. Loading takes `&mut self` and is order-sensitive; once
/// loading is done the database is read-only and can be shared freely.
/// Teardown is dropping it whole — outstanding [`Reference`]s are not
/// tracked, so nothing is evicted selectively.
#[derive(Debug, Default)]
pub struct Database {
    containers: Vec<Container>,
    objects: HashMap<(ContentType, u32), SectionHandle>,
    files: HashMap<String, Option<ContainerId>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` and, recursively, every archive it declares as a
    /// dependency, in declared order.
    ///
    /// The outcome per path is cached: a repeated load returns it
    /// unchanged, which also terminates dependency cycles. Objects
    /// defined inside a not-yet-finished cycle are not visible to the
    /// files that close the cycle; their fixups resolve to null. A path
    /// that cannot be read or parsed yields `None` and does not abort
    /// the rest of the session.
    pub fn load<R>(&mut self, path: &str, reader: &mut R) -> Option<ContainerId>
    where
        R: ArchiveReader + ?Sized,
    {
        if let Some(&cached) = self.files.get(path) {
            return cached;
        }

        let bytes = match reader.read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to read {path}: {e}");
                self.files.insert(path.to_string(), None);
                return None;
            }
        };

        let container = match Self::unpack(bytes, path) {
            Ok(container) => container,
            Err(e) => {
                warn!("failed to parse {path}: {e}");
                self.files.insert(path.to_string(), None);
                return None;
            }
        };

        let id = ContainerId(self.containers.len() as u32);
        let dependencies = container.dependencies().to_vec();
        self.containers.push(container);
        // Cached before the dependency walk so that cycles terminate.
        self.files.insert(path.to_string(), Some(id));

        for dependency in &dependencies {
            self.load(dependency, reader);
        }

        self.register(id);

        if let Err(e) = self.resolve(id) {
            warn!("failed to resolve fixups in {path}: {e}");
            self.unregister(id);
            self.files.insert(path.to_string(), None);
            return None;
        }

        debug!("loaded {path} as container {}", id.0);
        Some(id)
    }

    fn unpack(bytes: Vec<u8>, origin: &str) -> Result<Container> {
        let data = cdrm::decompress(bytes)?;
        Container::parse(data, origin)
    }

    /// Make every section of `id` visible to fixup resolution. A later
    /// registration silently replaces an earlier one with the same key.
    fn register(&mut self, id: ContainerId) {
        let container = &self.containers[id.0 as usize];
        for section in container.sections() {
            let key = (section.header.content_type, section.header.id);
            let handle = SectionHandle {
                container: id,
                section: section.index,
            };
            self.objects.insert(key, handle);
        }
    }

    fn unregister(&mut self, id: ContainerId) {
        self.objects.retain(|_, handle| handle.container != id);
    }

    fn resolve(&mut self, id: ContainerId) -> Result<()> {
        let Self {
            containers,
            objects,
            ..
        } = self;
        fixup::apply_fixups(&mut containers[id.0 as usize], id, objects)
    }

    /// Look up a registered object. Returns a reference to the start of
    /// its section, or the null reference.
    pub fn find(&self, content_type: ContentType, id: u32) -> Reference {
        match self.objects.get(&(content_type, id)) {
            Some(&handle) => Reference::new(handle, 0),
            None => Reference::NULL,
        }
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id.0 as usize]
    }

    /// Loaded containers in load order.
    pub fn containers(&self) -> impl Iterator<Item = (ContainerId, &Container)> {
        self.containers
            .iter()
            .enumerate()
            .map(|(i, container)| (ContainerId(i as u32), container))
    }

    pub fn section(&self, handle: SectionHandle) -> &Section {
        &self.containers[handle.container.0 as usize].sections()[usize::from(handle.section)]
    }

    /// Every attempted path and its cached outcome.
    pub fn files(&self) -> impl Iterator<Item = (&str, Option<ContainerId>)> {
        self.files.iter().map(|(path, &id)| (path.as_str(), id))
    }

    /// A reference to the start of the container's root section, or the
    /// null reference if the declared root index is out of range.
    pub fn root_reference(&self, id: ContainerId) -> Reference {
        let container = self.container(id);
        match container.sections().get(container.root_section() as usize) {
            Some(section) => Reference::new(
                SectionHandle {
                    container: id,
                    section: section.index,
                },
                0,
            ),
            None => Reference::NULL,
        }
    }

    pub(crate) fn section_and_payload(&self, handle: SectionHandle) -> (&Section, &[u8]) {
        let container = &self.containers[handle.container.0 as usize];
        let section = &container.sections()[usize::from(handle.section)];
        (section, container.payload(section))
    }
}
