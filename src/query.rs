//! Path-level queries over a [`MountRegistry`]: stat, list and read
//!
//! Listing merges the children of a directory across every mount in which
//! that path is a directory. A child name appears once, with the kind it has
//! in the most recent mount holding it.

use crate::error::{ResourceError, Result};
use crate::path;
use crate::registry::{MountRegistry, ResolvedEntry};
use bytes::Bytes;
use std::collections::HashSet;

/// Metadata about a resolved path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub is_directory: bool,
    /// Uncompressed size of the selected variant, 0 for directories
    pub size: u64,
    /// Whether the file has at least one variant tagged with a locale
    pub has_locale_variants: bool,
}

/// One item produced by [`MountRegistry::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub path: String,
    pub is_directory: bool,
}

/// Top-level directory reserved for toolkit-internal resources
///
/// [`ListIter::without_private`] skips it and everything below it.
pub const PRIVATE_NAMESPACE: &str = "qt-project.org";

fn is_private(key: &str) -> bool {
    key.strip_prefix(PRIVATE_NAMESPACE)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[derive(Debug, Clone)]
struct Child {
    key: String,
    is_directory: bool,
}

#[derive(Debug, Clone)]
struct Frame {
    children: Vec<Child>,
    next: usize,
}

/// Lazy depth-first listing
///
/// Directories are yielded before their contents. Each directory's merged
/// children are collected only when the iterator descends into it.
#[derive(Debug, Clone)]
pub struct ListIter<'a> {
    registry: &'a MountRegistry,
    recursive: bool,
    hide_private: bool,
    stack: Vec<Frame>,
}

impl ListIter<'_> {
    /// Skip the [`PRIVATE_NAMESPACE`] subtree
    pub fn without_private(mut self) -> Self {
        self.hide_private = true;
        self
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = ListEntry;

    fn next(&mut self) -> Option<ListEntry> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(child) = frame.children.get(frame.next).cloned() else {
                self.stack.pop();
                continue;
            };
            frame.next += 1;

            if self.hide_private && is_private(&child.key) {
                continue;
            }
            if self.recursive && child.is_directory {
                let children = self.registry.merged_children(&child.key);
                self.stack.push(Frame { children, next: 0 });
            }

            return Some(ListEntry {
                path: path::display(&child.key),
                is_directory: child.is_directory,
            });
        }
    }
}

impl MountRegistry {
    /// Metadata for `path` using the fallback variant
    pub fn stat(&self, virtual_path: &str) -> Option<Stat> {
        self.stat_localized(virtual_path, None)
    }

    /// Metadata for `path` using the variant selected for `locale`
    pub fn stat_localized(&self, virtual_path: &str, locale: Option<&str>) -> Option<Stat> {
        let resolved = self.resolve(virtual_path, locale)?;
        let entry = self.revalidate(&resolved)?;

        Some(match resolved.file() {
            Some(file) => Stat {
                is_directory: false,
                size: file.uncompressed_size as u64,
                has_locale_variants: entry
                    .variants()
                    .map(|v| v.has_locale_variants())
                    .unwrap_or(false),
            },
            None => Stat {
                is_directory: true,
                size: 0,
                has_locale_variants: false,
            },
        })
    }

    /// List the contents of a directory
    ///
    /// With `recursive` the whole subtree is walked depth-first. The listed
    /// path itself is not included, except that listing a file yields that
    /// one file.
    pub fn list(&self, virtual_path: &str, recursive: bool) -> Result<ListIter<'_>> {
        let key = path::key(virtual_path);
        let (_, container, id) = self
            .locate(&key)
            .ok_or_else(|| ResourceError::NotFound(path::display(&key)))?;

        let children = if container.tree().entry(id).is_directory() {
            self.merged_children(&key)
        } else {
            vec![Child {
                key,
                is_directory: false,
            }]
        };

        Ok(ListIter {
            registry: self,
            recursive,
            hide_private: false,
            stack: vec![Frame { children, next: 0 }],
        })
    }

    /// Read a file's uncompressed content
    pub fn read(&self, virtual_path: &str, locale: Option<&str>) -> Result<Bytes> {
        let resolved = self
            .resolve(virtual_path, locale)
            .ok_or_else(|| ResourceError::NotFound(path::display(&path::key(virtual_path))))?;
        self.read_resolved(&resolved)
    }

    /// Read the variant captured by an earlier [`MountRegistry::resolve`]
    ///
    /// Fails with `NotFound` if the owning mount has since been removed.
    pub fn read_resolved(&self, resolved: &ResolvedEntry) -> Result<Bytes> {
        let label = resolved.path();
        let container = self
            .container(resolved.mount())
            .ok_or_else(|| ResourceError::NotFound(format!("{label} (unmounted)")))?;
        let file = resolved
            .file()
            .ok_or_else(|| ResourceError::NotFound(format!("{label} is a directory")))?;
        container.read_variant(file, &label)
    }

    fn merged_children(&self, key: &str) -> Vec<Child> {
        let mut seen = HashSet::new();
        let mut children = Vec::new();

        for (_, container) in self.newest_first() {
            let tree = container.tree();
            let Some(id) = tree.lookup_key(key) else {
                continue;
            };
            for &child_id in tree.children(id) {
                let child = tree.entry(child_id);
                if seen.insert(child.name().to_string()) {
                    children.push(Child {
                        key: child.key().to_string(),
                        is_directory: child.is_directory(),
                    });
                }
            }
        }
        children
    }
}
