//! In-memory directory tree reconstructed from a container's flat node table
//!
//! Entries live in an arena and refer to each other by [`EntryId`]. Locale
//! variants of one file share a single entry holding a [`VariantSet`], and a
//! path index gives constant-time lookup by normalised path.

use crate::container::{CompressionMethod, NodeBody, NodeRecord, RawContainer};
use crate::error::{ResourceError, Result};
use crate::path;
use std::collections::HashMap;
use tracing::debug;

/// Index of an entry in a [`DirectoryTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

impl EntryId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One stored variant of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// Index of the record in the container's node table
    pub node_index: usize,
    /// Locale tag, `None` for the fallback variant
    pub locale: Option<String>,
    pub compression: CompressionMethod,
    pub data_offset: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// CRC-32 of the uncompressed content (format version 2 and later)
    pub crc32: Option<u32>,
}

impl FileNode {
    fn from_record(container: &RawContainer, node_index: usize, record: &NodeRecord) -> Result<Self> {
        let NodeBody::File {
            data_offset,
            compressed_size,
            uncompressed_size,
            locale_offset,
            crc32,
        } = record.body
        else {
            return Err(ResourceError::corrupt(format!(
                "node {node_index} is not a file record"
            )));
        };

        let compression = record.compression()?;
        container.block_range(data_offset, compressed_size)?;
        if compression == CompressionMethod::None && compressed_size != uncompressed_size {
            return Err(ResourceError::corrupt(format!(
                "stored node {node_index} has size {compressed_size} but declares {uncompressed_size}"
            )));
        }

        let locale = match locale_offset {
            Some(offset) => Some(container.name(offset)?.to_string()).filter(|l| !l.is_empty()),
            None => None,
        };

        Ok(Self {
            node_index,
            locale,
            compression,
            data_offset,
            compressed_size,
            uncompressed_size,
            crc32,
        })
    }
}

/// The locale variants of one logical file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSet {
    variants: Vec<FileNode>,
    fallback: Option<usize>,
}

impl VariantSet {
    fn new(first: FileNode) -> Self {
        let fallback = first.locale.is_none().then_some(0);
        Self {
            variants: vec![first],
            fallback,
        }
    }

    fn insert(&mut self, node: FileNode) -> std::result::Result<(), FileNode> {
        if self.variants.iter().any(|v| v.locale == node.locale) {
            return Err(node);
        }
        if node.locale.is_none() {
            self.fallback = Some(self.variants.len());
        }
        self.variants.push(node);
        Ok(())
    }

    /// Pick the variant for `locale`: exact match, else the fallback
    ///
    /// `None` and `Some("")` both ask for the fallback only.
    pub fn select(&self, locale: Option<&str>) -> Option<&FileNode> {
        if let Some(wanted) = locale.filter(|l| !l.is_empty()) {
            if let Some(node) = self
                .variants
                .iter()
                .find(|v| v.locale.as_deref() == Some(wanted))
            {
                return Some(node);
            }
        }
        self.fallback()
    }

    pub fn fallback(&self) -> Option<&FileNode> {
        self.fallback.map(|i| &self.variants[i])
    }

    pub fn has_locale_variants(&self) -> bool {
        self.variants.iter().any(|v| v.locale.is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileNode> {
        self.variants.iter()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Directory(Vec<EntryId>),
    File(VariantSet),
}

#[derive(Debug, Clone)]
pub struct TreeEntry {
    name: String,
    key: String,
    parent: Option<EntryId>,
    kind: EntryKind,
}

impl TreeEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path of this entry (`/` for the root)
    pub fn path(&self) -> String {
        path::display(&self.key)
    }

    /// Normalised lookup key (no leading `/`, empty for the root)
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory(_))
    }

    pub fn children(&self) -> &[EntryId] {
        match &self.kind {
            EntryKind::Directory(children) => children,
            EntryKind::File(_) => &[],
        }
    }

    pub fn variants(&self) -> Option<&VariantSet> {
        match &self.kind {
            EntryKind::File(variants) => Some(variants),
            EntryKind::Directory(_) => None,
        }
    }
}

/// Read-only directory tree of one container
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    entries: Vec<TreeEntry>,
    index: HashMap<String, EntryId>,
}

impl DirectoryTree {
    const ROOT: EntryId = EntryId(0);

    /// Reconstruct the tree from a container's node table
    ///
    /// Each directory's `{first_child, child_count}` must name a run of nodes
    /// that starts after the directory, stays inside the table and whose
    /// records all point back at that directory. Every node must be reached.
    pub fn build(container: &RawContainer) -> Result<Self> {
        let node_count = container.node_count();
        let root = container.node(0)?;
        if !root.is_directory() || root.parent_index != -1 {
            return Err(ResourceError::corrupt(
                "node 0 must be a directory with parent -1",
            ));
        }

        let mut tree = Self {
            entries: vec![TreeEntry {
                name: String::new(),
                key: String::new(),
                parent: None,
                kind: EntryKind::Directory(Vec::new()),
            }],
            index: HashMap::from([(String::new(), Self::ROOT)]),
        };

        let mut visited = 1usize;
        let mut stack = vec![(0usize, Self::ROOT, root)];

        while let Some((node_index, dir, record)) = stack.pop() {
            let NodeBody::Directory {
                first_child,
                child_count,
            } = record.body
            else {
                return Err(ResourceError::corrupt(format!(
                    "node {node_index} is not a directory record"
                )));
            };
            if child_count == 0 {
                continue;
            }

            let first = first_child as usize;
            let end = first
                .checked_add(child_count as usize)
                .filter(|end| *end <= node_count)
                .ok_or_else(|| {
                    ResourceError::corrupt(format!(
                        "children {first}+{child_count} of node {node_index} exceed {node_count} nodes"
                    ))
                })?;
            if first <= node_index {
                return Err(ResourceError::corrupt(format!(
                    "children of node {node_index} start at {first}, not after it"
                )));
            }

            let mut siblings: HashMap<String, EntryId> = HashMap::new();
            let mut localized_flags = Vec::new();
            for child_index in first..end {
                let child = container.node(child_index)?;
                if child.parent_index != node_index as i32 {
                    return Err(ResourceError::corrupt(format!(
                        "node {child_index} names parent {} but is listed under {node_index}",
                        child.parent_index
                    )));
                }
                visited += 1;

                let name = container.name(child.name_offset)?;
                if matches!(name, "" | "." | "..") || name.contains(['/', '\\']) {
                    return Err(ResourceError::corrupt(format!(
                        "invalid name {name:?} at node {child_index}"
                    )));
                }

                if child.is_directory() {
                    if siblings.contains_key(name) {
                        return Err(ResourceError::corrupt(format!(
                            "duplicate entry {name:?} under node {node_index}"
                        )));
                    }
                    let id = tree.push(dir, name, EntryKind::Directory(Vec::new()));
                    siblings.insert(name.to_string(), id);
                    stack.push((child_index, id, child));
                    continue;
                }

                let file = FileNode::from_record(container, child_index, &child)?;
                localized_flags.push((name, child_index, child.is_localized()));
                match siblings.get(name) {
                    Some(&existing) => match &mut tree.entries[existing.0].kind {
                        EntryKind::File(variants) => {
                            variants.insert(file).map_err(|dup| {
                                ResourceError::corrupt(format!(
                                    "duplicate locale {:?} for {name:?} at node {child_index}",
                                    dup.locale.unwrap_or_default()
                                ))
                            })?;
                        }
                        EntryKind::Directory(_) => {
                            return Err(ResourceError::corrupt(format!(
                                "{name:?} under node {node_index} is both file and directory"
                            )));
                        }
                    },
                    None => {
                        let id = tree.push(dir, name, EntryKind::File(VariantSet::new(file)));
                        siblings.insert(name.to_string(), id);
                    }
                }
            }

            // Every record of a file must agree with the grouped variants
            for (name, child_index, flagged) in localized_flags {
                let grouped = siblings
                    .get(name)
                    .and_then(|&id| tree.entries[id.0].variants())
                    .is_some_and(|v| v.len() > 1 || v.has_locale_variants());
                if flagged != grouped {
                    return Err(ResourceError::corrupt(format!(
                        "node {child_index}: localized flag disagrees with variants of {name:?}"
                    )));
                }
            }
        }

        if visited != node_count {
            return Err(ResourceError::corrupt(format!(
                "{} of {node_count} nodes are unreachable from the root",
                node_count - visited
            )));
        }

        debug!(
            nodes = node_count,
            entries = tree.entries.len(),
            "built directory tree"
        );
        Ok(tree)
    }

    fn push(&mut self, parent: EntryId, name: &str, kind: EntryKind) -> EntryId {
        let id = EntryId(self.entries.len());
        let key = path::join(&self.entries[parent.0].key, name);
        self.index.insert(key.clone(), id);
        self.entries.push(TreeEntry {
            name: name.to_string(),
            key,
            parent: Some(parent),
            kind,
        });
        if let EntryKind::Directory(children) = &mut self.entries[parent.0].kind {
            children.push(id);
        }
        id
    }

    pub fn root(&self) -> EntryId {
        Self::ROOT
    }

    /// Find an entry by virtual path
    pub fn lookup(&self, virtual_path: &str) -> Option<EntryId> {
        self.lookup_key(&path::key(virtual_path))
    }

    /// Find an entry by normalised key
    pub fn lookup_key(&self, key: &str) -> Option<EntryId> {
        self.index.get(key).copied()
    }

    pub fn entry(&self, id: EntryId) -> &TreeEntry {
        &self.entries[id.0]
    }

    pub fn get(&self, id: EntryId) -> Option<&TreeEntry> {
        self.entries.get(id.0)
    }

    pub fn children(&self, id: EntryId) -> &[EntryId] {
        self.entry(id).children()
    }

    /// Number of entries, including the root
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the container holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}
