//! Mount registry: the set of containers visible through one virtual namespace
//!
//! Resolution walks mounted containers from the most recently mounted to the
//! oldest and stops at the first one containing the full path, so later
//! mounts shadow earlier ones. Unmounting removes only that container and
//! leaves the relative order of the rest untouched.
//!
//! Mutations take `&mut self` and lookups take `&self`, so callers sharing a
//! registry across threads serialise mount/unmount against reads with their
//! own lock; the registry itself does no locking.

use crate::container::RawContainer;
use crate::decompress::decompress;
use crate::error::Result;
use crate::path;
use crate::tree::{DirectoryTree, EntryId, FileNode, TreeEntry};
use bytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// A parsed container together with its directory tree
#[derive(Debug, Clone)]
pub struct Container {
    raw: RawContainer,
    tree: DirectoryTree,
}

impl Container {
    /// Parse and build in one step
    pub fn load(data: impl Into<Bytes>) -> Result<Self> {
        let raw = RawContainer::parse(data)?;
        let tree = DirectoryTree::build(&raw)?;
        Ok(Self { raw, tree })
    }

    pub fn raw(&self) -> &RawContainer {
        &self.raw
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    /// Decode one file variant of this container
    pub fn read_variant(&self, node: &FileNode, label: &str) -> Result<Bytes> {
        decompress(node, &self.raw, label)
    }
}

/// Opaque identifier of one mount; never reused within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountHandle(u64);

impl MountHandle {
    /// Sequence number assigned at mount time (higher = more recent)
    pub fn mount_order(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct MountEntry {
    handle: MountHandle,
    container: Container,
}

/// Result of resolving a path against the registry
///
/// Holds only identifiers into the owning mount; use
/// [`MountRegistry::revalidate`] or [`MountRegistry::read_resolved`] to get
/// at the data, which fail once that mount is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    mount: MountHandle,
    entry: EntryId,
    key: String,
    file: Option<FileNode>,
}

impl ResolvedEntry {
    /// Mount that won resolution
    pub fn mount(&self) -> MountHandle {
        self.mount
    }

    pub fn entry_id(&self) -> EntryId {
        self.entry
    }

    /// Normalised absolute path
    pub fn path(&self) -> String {
        path::display(&self.key)
    }

    pub fn is_directory(&self) -> bool {
        self.file.is_none()
    }

    /// Selected file variant, `None` for directories
    pub fn file(&self) -> Option<&FileNode> {
        self.file.as_ref()
    }
}

/// Registry of mounted containers
#[derive(Debug, Default)]
pub struct MountRegistry {
    /// Mount order, oldest first
    entries: Vec<MountEntry>,
    next_order: u64,
}

impl MountRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `data` as a container and mount it on top of every existing mount
    ///
    /// A buffer that fails to parse or build leaves the registry unchanged.
    pub fn mount(&mut self, data: impl Into<Bytes>) -> Result<MountHandle> {
        match Container::load(data) {
            Ok(container) => Ok(self.mount_container(container)),
            Err(err) => {
                warn!(error = %err, "rejected container");
                Err(err)
            }
        }
    }

    /// Memory-map a container file and mount it without copying
    pub fn mount_file<P: AsRef<Path>>(&mut self, file_path: P) -> Result<MountHandle> {
        let file_path = file_path.as_ref();
        let file = File::open(file_path)?;
        // SAFETY: the mapping is read-only and its lifetime is tied to the Bytes
        // handle; callers must not truncate the file while it is mounted.
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };

        debug!(path = %file_path.display(), len = map.len(), "mapped container file");
        self.mount(Bytes::from_owner(map))
    }

    /// Mount an already loaded container
    pub fn mount_container(&mut self, container: Container) -> MountHandle {
        self.next_order += 1;
        let handle = MountHandle(self.next_order);
        debug!(
            handle = handle.0,
            entries = container.tree().len(),
            mounted = self.entries.len() + 1,
            "mounted container"
        );
        self.entries.push(MountEntry { handle, container });
        handle
    }

    /// Remove a mount
    ///
    /// Returns `false` (and does nothing) if the handle is not mounted, so
    /// unmounting twice is harmless.
    pub fn unmount(&mut self, handle: MountHandle) -> bool {
        match self.entries.iter().position(|e| e.handle == handle) {
            Some(position) => {
                self.entries.remove(position);
                debug!(handle = handle.0, remaining = self.entries.len(), "unmounted container");
                true
            }
            None => false,
        }
    }

    pub fn is_mounted(&self, handle: MountHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mounted handles in resolution order (most recent first)
    pub fn handles(&self) -> impl Iterator<Item = MountHandle> + '_ {
        self.entries.iter().rev().map(|e| e.handle)
    }

    pub fn container(&self, handle: MountHandle) -> Option<&Container> {
        self.entries
            .iter()
            .find(|e| e.handle == handle)
            .map(|e| &e.container)
    }

    pub(crate) fn newest_first(&self) -> impl Iterator<Item = (MountHandle, &Container)> + '_ {
        self.entries.iter().rev().map(|e| (e.handle, &e.container))
    }

    /// Find the most recent mount that contains `key`, whatever its kind
    pub(crate) fn locate(&self, key: &str) -> Option<(MountHandle, &Container, EntryId)> {
        self.newest_first().find_map(|(handle, container)| {
            container
                .tree()
                .lookup_key(key)
                .map(|id| (handle, container, id))
        })
    }

    /// Resolve a path, selecting a file variant for `locale`
    ///
    /// The most recent mount containing the path wins regardless of whether it
    /// holds a file or a directory there. Within the winner, a file resolves to
    /// the exact locale variant, else the no-locale fallback, else nothing; an
    /// older mount is never consulted once a newer one holds the path.
    pub fn resolve(&self, virtual_path: &str, locale: Option<&str>) -> Option<ResolvedEntry> {
        let key = path::key(virtual_path);
        let (mount, container, entry) = self.locate(&key)?;

        let file = match container.tree().entry(entry).variants() {
            Some(variants) => Some(variants.select(locale)?.clone()),
            None => None,
        };

        Some(ResolvedEntry {
            mount,
            entry,
            key,
            file,
        })
    }

    /// Look up the tree entry behind a resolution result, if its mount is still present
    pub fn revalidate(&self, resolved: &ResolvedEntry) -> Option<&TreeEntry> {
        self.container(resolved.mount)?.tree().get(resolved.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerWriter;
    use crate::error::ErrorKind;

    fn container_with(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ContainerWriter::new();
        for (path, data) in files {
            writer.add_file(path, data).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_mount_and_resolve() {
        let mut registry = MountRegistry::new();
        assert!(registry.is_empty());

        let handle = registry.mount(container_with(&[("/a/b.txt", b"b")])).unwrap();
        assert!(registry.is_mounted(handle));
        assert_eq!(registry.len(), 1);

        let resolved = registry.resolve("/a/b.txt", None).unwrap();
        assert_eq!(resolved.mount(), handle);
        assert!(!resolved.is_directory());
        assert_eq!(resolved.path(), "/a/b.txt");

        assert!(registry.resolve("/a", None).unwrap().is_directory());
        assert!(registry.resolve("/missing", None).is_none());
    }

    #[test]
    fn test_handles_order_and_stability() {
        let mut registry = MountRegistry::new();
        let a = registry.mount(container_with(&[("/a", b"a")])).unwrap();
        let b = registry.mount(container_with(&[("/b", b"b")])).unwrap();
        let c = registry.mount(container_with(&[("/c", b"c")])).unwrap();
        assert!(a.mount_order() < b.mount_order() && b.mount_order() < c.mount_order());

        assert_eq!(registry.handles().collect::<Vec<_>>(), vec![c, b, a]);
        assert!(registry.unmount(b));
        assert_eq!(registry.handles().collect::<Vec<_>>(), vec![c, a]);
        assert!(!registry.unmount(b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_failed_mount_leaves_registry_unchanged() {
        let mut registry = MountRegistry::new();
        let good = registry.mount(container_with(&[("/ok", b"ok")])).unwrap();

        let err = registry.mount(b"not a container at all, definitely not".to_vec()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("/ok", None).unwrap().mount(), good);
    }

    #[test]
    fn test_revalidate_after_unmount() {
        let mut registry = MountRegistry::new();
        let handle = registry.mount(container_with(&[("/x", b"x")])).unwrap();
        let resolved = registry.resolve("/x", None).unwrap();
        assert_eq!(registry.revalidate(&resolved).unwrap().name(), "x");

        registry.unmount(handle);
        assert!(registry.revalidate(&resolved).is_none());
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MountRegistry>();
        assert_send_sync::<ResolvedEntry>();
    }
}
