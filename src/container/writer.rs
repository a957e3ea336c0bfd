use crate::container::format::{
    encode_name, CompressionMethod, ContainerHeader, NodeBody, NodeRecord, FLAG_DIRECTORY,
    FORMAT_VERSION_2, HEADER_SIZE,
};
use crate::error::{ResourceError, Result};
use crate::path;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Encoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Container format version to emit (1 or 2)
    pub format_version: u32,
    /// Method used by [`ContainerWriter::add_file`]
    pub compression: CompressionMethod,
    /// Files smaller than this many bytes are stored uncompressed by `add_file`
    pub compression_threshold: usize,
    pub zlib_level: u32,
    pub zstd_level: i32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION_2,
            compression: CompressionMethod::Zstd,
            compression_threshold: 64,
            zlib_level: 6,
            zstd_level: 6,
        }
    }
}

#[derive(Debug)]
struct PendingVariant {
    locale: Option<String>,
    data_offset: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    compression: CompressionMethod,
    crc32: u32,
}

#[derive(Debug)]
enum PendingKind {
    Directory(Vec<usize>),
    File(Vec<PendingVariant>),
}

#[derive(Debug)]
struct PendingNode {
    name: String,
    kind: PendingKind,
}

/// Builds container images in memory
///
/// Entries keep insertion order; that order is what readers list.
pub struct ContainerWriter {
    options: WriterOptions,
    nodes: Vec<PendingNode>,
    data: Vec<u8>,
}

impl ContainerWriter {
    /// Create a writer with default options (format version 2, zstd)
    pub fn new() -> Self {
        Self::with_options(WriterOptions::default())
    }

    pub fn with_options(options: WriterOptions) -> Self {
        Self {
            options,
            nodes: vec![PendingNode {
                name: String::new(),
                kind: PendingKind::Directory(Vec::new()),
            }],
            data: Vec::new(),
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Add a directory (and any missing parents)
    pub fn add_directory(&mut self, dir_path: &str) -> Result<()> {
        let segments = path::segments(dir_path);
        self.ensure_directory(&segments)?;
        Ok(())
    }

    /// Add a file with automatic compression selection
    pub fn add_file(&mut self, file_path: &str, data: &[u8]) -> Result<()> {
        let compression = self.select_compression(file_path, data.len());
        self.add_variant(file_path, None, data, compression)
    }

    /// Add a file with a specific compression method
    pub fn add_file_with_compression(
        &mut self,
        file_path: &str,
        data: &[u8],
        compression: CompressionMethod,
    ) -> Result<()> {
        self.add_variant(file_path, None, data, compression)
    }

    /// Add a locale variant of a file
    ///
    /// An empty `locale` adds the no-locale fallback variant.
    pub fn add_localized_file(
        &mut self,
        file_path: &str,
        locale: &str,
        data: &[u8],
        compression: CompressionMethod,
    ) -> Result<()> {
        let locale = (!locale.is_empty()).then_some(locale);
        self.add_variant(file_path, locale, data, compression)
    }

    /// Add a file from disk
    pub fn add_file_from_disk(&mut self, file_path: &str, disk_path: &Path) -> Result<()> {
        let data = std::fs::read(disk_path)?;
        self.add_file(file_path, &data)
    }

    fn add_variant(
        &mut self,
        file_path: &str,
        locale: Option<&str>,
        data: &[u8],
        compression: CompressionMethod,
    ) -> Result<()> {
        let version = self.options.format_version;
        if locale.is_some() && version < FORMAT_VERSION_2 {
            return Err(ResourceError::InvalidFormat(format!(
                "locale variants require format version {FORMAT_VERSION_2}"
            )));
        }
        if !compression.supported_by(version) {
            return Err(ResourceError::InvalidFormat(format!(
                "{compression:?} compression requires format version {FORMAT_VERSION_2}"
            )));
        }

        let segments = path::segments(file_path);
        let Some((name, parents)) = segments.split_last() else {
            return Err(ResourceError::PathError(format!(
                "file path has no name: {file_path:?}"
            )));
        };
        let parent = self.ensure_directory(parents)?;

        let existing = self.child_named(parent, name);
        if let Some(index) = existing {
            match &self.nodes[index].kind {
                PendingKind::Directory(_) => {
                    return Err(ResourceError::PathError(format!(
                        "{file_path} is already a directory"
                    )));
                }
                PendingKind::File(variants) => {
                    if variants.iter().any(|v| v.locale.as_deref() == locale) {
                        return Err(ResourceError::PathError(format!(
                            "duplicate entry {file_path} (locale {:?})",
                            locale.unwrap_or("")
                        )));
                    }
                }
            }
        }

        let uncompressed_size = u32::try_from(data.len()).map_err(|_| {
            ResourceError::PathError(format!("{file_path} exceeds 4 GiB"))
        })?;
        let (payload, actual_compression) = self.compress_data(data, compression)?;
        let data_offset = u32::try_from(self.data.len())
            .map_err(|_| ResourceError::InvalidFormat("data table exceeds 4 GiB".to_string()))?;
        self.data.extend_from_slice(&payload);

        let variant = PendingVariant {
            locale: locale.map(str::to_string),
            data_offset,
            compressed_size: payload.len() as u32,
            uncompressed_size,
            compression: actual_compression,
            crc32: crc32fast::hash(data),
        };

        match existing {
            Some(index) => {
                if let PendingKind::File(variants) = &mut self.nodes[index].kind {
                    variants.push(variant);
                }
            }
            None => {
                let index = self.push_node(parent, name, PendingKind::File(vec![variant]));
                debug!(path = file_path, node = index, "added file");
            }
        }

        Ok(())
    }

    /// Walk/create directories along `segments`, returning the last one
    fn ensure_directory(&mut self, segments: &[&str]) -> Result<usize> {
        let mut current = 0;
        for (depth, name) in segments.iter().enumerate() {
            current = match self.child_named(current, name) {
                Some(index) => match self.nodes[index].kind {
                    PendingKind::Directory(_) => index,
                    PendingKind::File(_) => {
                        return Err(ResourceError::PathError(format!(
                            "/{} is a file, not a directory",
                            segments[..=depth].join("/")
                        )));
                    }
                },
                None => self.push_node(current, name, PendingKind::Directory(Vec::new())),
            };
        }
        Ok(current)
    }

    fn child_named(&self, parent: usize, name: &str) -> Option<usize> {
        match &self.nodes[parent].kind {
            PendingKind::Directory(children) => children
                .iter()
                .copied()
                .find(|&child| self.nodes[child].name == name),
            PendingKind::File(_) => None,
        }
    }

    fn push_node(&mut self, parent: usize, name: &str, kind: PendingKind) -> usize {
        let index = self.nodes.len();
        self.nodes.push(PendingNode {
            name: name.to_string(),
            kind,
        });
        if let PendingKind::Directory(children) = &mut self.nodes[parent].kind {
            children.push(index);
        }
        index
    }

    /// Serialize the container
    ///
    /// Nodes are laid out breadth-first so that every directory's children
    /// form one contiguous run placed after the directory itself.
    pub fn finish(self) -> Result<Vec<u8>> {
        let version = self.options.format_version;
        let mut names = NameTable::default();

        let mut records: Vec<NodeRecord> = Vec::new();
        records.push(NodeRecord {
            name_offset: names.intern("")?,
            flags: FLAG_DIRECTORY,
            parent_index: -1,
            body: NodeBody::Directory {
                first_child: 0,
                child_count: 0,
            },
        });

        let mut queue = VecDeque::from([(0usize, 0usize)]);
        while let Some((pending, record)) = queue.pop_front() {
            let PendingKind::Directory(children) = &self.nodes[pending].kind else {
                continue;
            };
            let first_child = records.len();
            for &child in children {
                let node = &self.nodes[child];
                let name_offset = names.intern(&node.name)?;
                match &node.kind {
                    PendingKind::Directory(_) => {
                        queue.push_back((child, records.len()));
                        records.push(NodeRecord {
                            name_offset,
                            flags: FLAG_DIRECTORY,
                            parent_index: record as i32,
                            body: NodeBody::Directory {
                                first_child: 0,
                                child_count: 0,
                            },
                        });
                    }
                    PendingKind::File(variants) => {
                        let localized =
                            variants.len() > 1 || variants.iter().any(|v| v.locale.is_some());
                        for variant in variants {
                            let locale_offset = match &variant.locale {
                                Some(locale) => Some(names.intern(locale)?),
                                None => None,
                            };
                            let v2 = version >= FORMAT_VERSION_2;
                            records.push(NodeRecord {
                                name_offset,
                                flags: NodeRecord::make_flags(
                                    false,
                                    localized,
                                    variant.compression,
                                ),
                                parent_index: record as i32,
                                body: NodeBody::File {
                                    data_offset: variant.data_offset,
                                    compressed_size: variant.compressed_size,
                                    uncompressed_size: variant.uncompressed_size,
                                    locale_offset,
                                    crc32: v2.then_some(variant.crc32),
                                },
                            });
                        }
                    }
                }
            }
            records[record].body = NodeBody::Directory {
                first_child: first_child as u32,
                child_count: (records.len() - first_child) as u32,
            };
        }

        let names = names.bytes;
        let mut header = ContainerHeader::new(version);
        let tree_size = records.len() * header.node_stride();
        header.tree_offset = HEADER_SIZE as u32;
        header.node_count = to_u32(records.len())?;
        header.name_offset = to_u32(HEADER_SIZE + tree_size)?;
        header.name_size = to_u32(names.len())?;
        header.data_offset = to_u32(HEADER_SIZE + tree_size + names.len())?;
        header.data_size = to_u32(self.data.len())?;
        to_u32(HEADER_SIZE + tree_size + names.len() + self.data.len())?;

        let mut out = Vec::with_capacity(HEADER_SIZE + tree_size + names.len() + self.data.len());
        header.write_to(&mut out)?;
        for record in &records {
            record.write_to(version, &mut out)?;
        }
        out.extend_from_slice(&names);
        out.extend_from_slice(&self.data);

        debug!(
            version,
            nodes = records.len(),
            bytes = out.len(),
            "finished container"
        );
        Ok(out)
    }

    /// Serialize the container straight to a file
    pub fn write_to_path<P: AsRef<Path>>(self, dest: P) -> Result<()> {
        let bytes = self.finish()?;
        let mut file = std::fs::File::create(dest)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    /// Select compression based on file characteristics
    pub(crate) fn select_compression(&self, file_path: &str, size: usize) -> CompressionMethod {
        if size < self.options.compression_threshold {
            return CompressionMethod::None;
        }
        let preferred = match self.options.compression {
            method if method.supported_by(self.options.format_version) => method,
            _ => CompressionMethod::Zlib,
        };
        CompressionMethod::choose_for_file(file_path, preferred)
    }

    /// Compress data with fallback to uncompressed if not beneficial
    fn compress_data(
        &self,
        data: &[u8],
        compression: CompressionMethod,
    ) -> Result<(Vec<u8>, CompressionMethod)> {
        let compressed = match compression {
            CompressionMethod::None => return Ok((data.to_vec(), CompressionMethod::None)),
            CompressionMethod::Zlib => self.compress_zlib(data)?,
            CompressionMethod::Zstd => self.compress_zstd(data)?,
        };

        // Use compressed only if it's actually smaller
        if compressed.len() < data.len() {
            Ok((compressed, compression))
        } else {
            Ok((data.to_vec(), CompressionMethod::None))
        }
    }

    fn compress_zlib(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.options.zlib_level));
        encoder
            .write_all(data)
            .map_err(|e| ResourceError::CompressionFailed(format!("Zlib compression failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| ResourceError::CompressionFailed(format!("Zlib compression failed: {e}")))
    }

    fn compress_zstd(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.options.zstd_level)
            .map_err(|e| ResourceError::CompressionFailed(format!("Zstd compression failed: {e}")))
    }
}

impl Default for ContainerWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Deduplicating string table; equal names share one offset
#[derive(Default)]
struct NameTable {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl NameTable {
    fn intern(&mut self, name: &str) -> Result<u32> {
        if let Some(offset) = self.offsets.get(name) {
            return Ok(*offset);
        }
        let offset = encode_name(&mut self.bytes, name)?;
        self.offsets.insert(name.to_string(), offset);
        Ok(offset)
    }
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ResourceError::InvalidFormat("container exceeds 4 GiB".to_string()))
}
