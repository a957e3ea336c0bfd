use crate::error::{ResourceError, Result};
use std::io::{Read, Write};

/// Magic number: 0x89 'R' 'C' 'V' 0x0D 0x0A 0x1A 0x0A
/// Follows PNG pattern for corruption detection
pub const MAGIC_NUMBER: [u8; 8] = [0x89, b'R', b'C', b'V', 0x0D, 0x0A, 0x1A, 0x0A];

/// First format: no locale tags, no content CRC, zlib only
pub const FORMAT_VERSION_1: u32 = 1;

/// Adds locale tags, content CRC and zstd
pub const FORMAT_VERSION_2: u32 = 2;

/// Version written by default
pub const CURRENT_FORMAT_VERSION: u32 = FORMAT_VERSION_2;

/// Header size in bytes (same for every version)
pub const HEADER_SIZE: usize = 40;

/// Bytes covered by the header CRC
const HEADER_CRC_SPAN: usize = 36;

/// Node record stride per version
pub const NODE_STRIDE_V1: usize = 24;
pub const NODE_STRIDE_V2: usize = 32;

/// Sentinel for "no locale" in v2 file records
pub const NO_LOCALE: u32 = u32::MAX;

/// Maximum name length in bytes (UTF-8), bounded by the u16 length prefix
pub const MAX_NAME_LENGTH: usize = u16::MAX as usize;

pub const FLAG_DIRECTORY: u16 = 0b0001;
pub const FLAG_LOCALIZED: u16 = 0b0010;
const COMPRESSION_SHIFT: u16 = 2;
const COMPRESSION_MASK: u16 = 0b1100;
const RESERVED_FLAGS: u16 = !0b1111;

/// Returns the node record stride for a format version
pub fn node_stride(version: u32) -> Result<usize> {
    match version {
        FORMAT_VERSION_1 => Ok(NODE_STRIDE_V1),
        FORMAT_VERSION_2 => Ok(NODE_STRIDE_V2),
        other => Err(ResourceError::UnsupportedVersion(other)),
    }
}

/// Compression methods supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionMethod {
    None = 0,
    Zlib = 1,
    Zstd = 2,
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::Zstd),
            _ => Err(ResourceError::corrupt(format!(
                "invalid compression method: {value}"
            ))),
        }
    }

    /// Whether this method can be stored in containers of the given version
    pub fn supported_by(self, version: u32) -> bool {
        !(self == Self::Zstd && version < FORMAT_VERSION_2)
    }

    /// Skip compression for formats that are already compressed
    pub fn choose_for_file(path: &str, preferred: Self) -> Self {
        let extension = path.rsplit('.').next().unwrap_or("").to_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "mp3" | "mp4" | "zip" | "gz" | "bz2"
            | "zst" | "7z" => Self::None,
            _ => preferred,
        }
    }
}

/// Fixed header at the start of every container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub format_version: u32,
    pub tree_offset: u32,
    pub node_count: u32,
    pub name_offset: u32,
    pub name_size: u32,
    pub data_offset: u32,
    pub data_size: u32,
}

impl ContainerHeader {
    pub fn new(format_version: u32) -> Self {
        Self {
            format_version,
            tree_offset: 0,
            node_count: 0,
            name_offset: 0,
            name_size: 0,
            data_offset: 0,
            data_size: 0,
        }
    }

    /// Write header (including its CRC) to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&MAGIC_NUMBER);
        buf.extend_from_slice(&self.format_version.to_le_bytes());
        buf.extend_from_slice(&self.tree_offset.to_le_bytes());
        buf.extend_from_slice(&self.node_count.to_le_bytes());
        buf.extend_from_slice(&self.name_offset.to_le_bytes());
        buf.extend_from_slice(&self.name_size.to_le_bytes());
        buf.extend_from_slice(&self.data_offset.to_le_bytes());
        buf.extend_from_slice(&self.data_size.to_le_bytes());
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        writer.write_all(&buf)?;
        Ok(())
    }

    /// Read and check the header at the start of `bytes`
    ///
    /// Magic and version are checked before the CRC so that a foreign or newer
    /// container reports a format error rather than corruption.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ResourceError::InvalidFormat(format!(
                "buffer too small for header: {} bytes (need {})",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let mut reader = &bytes[..HEADER_SIZE];
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_NUMBER {
            return Err(ResourceError::InvalidMagic);
        }

        let format_version = read_u32(&mut reader)?;
        node_stride(format_version)?;

        let tree_offset = read_u32(&mut reader)?;
        let node_count = read_u32(&mut reader)?;
        let name_offset = read_u32(&mut reader)?;
        let name_size = read_u32(&mut reader)?;
        let data_offset = read_u32(&mut reader)?;
        let data_size = read_u32(&mut reader)?;
        let stored_crc = read_u32(&mut reader)?;

        let actual_crc = crc32fast::hash(&bytes[..HEADER_CRC_SPAN]);
        if stored_crc != actual_crc {
            return Err(ResourceError::HeaderCrcMismatch {
                expected: stored_crc,
                actual: actual_crc,
            });
        }

        Ok(Self {
            format_version,
            tree_offset,
            node_count,
            name_offset,
            name_size,
            data_offset,
            data_size,
        })
    }

    /// Size of one node record for this header's version
    pub fn node_stride(&self) -> usize {
        // Version was validated on parse; fall back to the v2 stride otherwise.
        node_stride(self.format_version).unwrap_or(NODE_STRIDE_V2)
    }
}

/// Directory-only or file-only fields of a node record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    Directory {
        first_child: u32,
        child_count: u32,
    },
    File {
        data_offset: u32,
        compressed_size: u32,
        uncompressed_size: u32,
        /// Name-table offset of the locale tag (v2 only)
        locale_offset: Option<u32>,
        /// CRC-32 of the uncompressed content (v2 only)
        crc32: Option<u32>,
    },
}

/// One entry of the flat node table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub name_offset: u32,
    pub flags: u16,
    pub parent_index: i32,
    pub body: NodeBody,
}

impl NodeRecord {
    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    pub fn is_localized(&self) -> bool {
        self.flags & FLAG_LOCALIZED != 0
    }

    pub fn compression(&self) -> Result<CompressionMethod> {
        CompressionMethod::from_u8(((self.flags & COMPRESSION_MASK) >> COMPRESSION_SHIFT) as u8)
    }

    /// Build the flags word for a record
    pub fn make_flags(directory: bool, localized: bool, compression: CompressionMethod) -> u16 {
        let mut flags = (compression as u16) << COMPRESSION_SHIFT;
        if directory {
            flags |= FLAG_DIRECTORY;
        }
        if localized {
            flags |= FLAG_LOCALIZED;
        }
        flags
    }

    /// Write record using the stride of `version`
    pub fn write_to<W: Write>(&self, version: u32, mut writer: W) -> Result<()> {
        let stride = node_stride(version)?;

        writer.write_all(&self.name_offset.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?;
        writer.write_all(&self.parent_index.to_le_bytes())?;

        let (a, b, c, d, e) = match self.body {
            NodeBody::Directory {
                first_child,
                child_count,
            } => (first_child, child_count, 0, NO_LOCALE, 0),
            NodeBody::File {
                data_offset,
                compressed_size,
                uncompressed_size,
                locale_offset,
                crc32,
            } => (
                data_offset,
                compressed_size,
                uncompressed_size,
                locale_offset.unwrap_or(NO_LOCALE),
                crc32.unwrap_or(0),
            ),
        };

        writer.write_all(&a.to_le_bytes())?;
        writer.write_all(&b.to_le_bytes())?;
        writer.write_all(&c.to_le_bytes())?;
        if stride == NODE_STRIDE_V2 {
            writer.write_all(&d.to_le_bytes())?;
            writer.write_all(&e.to_le_bytes())?;
        }

        Ok(())
    }

    /// Read record using the stride of `version`
    pub fn read_from<R: Read>(version: u32, mut reader: R) -> Result<Self> {
        let stride = node_stride(version)?;

        let name_offset = read_u32(&mut reader)?;
        let flags = read_u16(&mut reader)?;
        let reserved = read_u16(&mut reader)?;
        let parent_index = read_u32(&mut reader)? as i32;
        let a = read_u32(&mut reader)?;
        let b = read_u32(&mut reader)?;
        let c = read_u32(&mut reader)?;
        let (d, e) = if stride == NODE_STRIDE_V2 {
            (read_u32(&mut reader)?, read_u32(&mut reader)?)
        } else {
            (NO_LOCALE, 0)
        };

        if flags & RESERVED_FLAGS != 0 || reserved != 0 {
            return Err(ResourceError::corrupt(format!(
                "reserved bits set in node flags {flags:#06x}"
            )));
        }

        let record = Self {
            name_offset,
            flags,
            parent_index,
            body: NodeBody::Directory {
                first_child: 0,
                child_count: 0,
            },
        };
        let compression = record.compression()?;

        let body = if record.is_directory() {
            if compression != CompressionMethod::None || c != 0 || d != NO_LOCALE || e != 0 {
                return Err(ResourceError::corrupt(
                    "directory record carries file fields",
                ));
            }
            NodeBody::Directory {
                first_child: a,
                child_count: b,
            }
        } else {
            if !compression.supported_by(version) {
                return Err(ResourceError::corrupt(format!(
                    "compression {compression:?} not available in format version {version}"
                )));
            }
            let v2 = stride == NODE_STRIDE_V2;
            NodeBody::File {
                data_offset: a,
                compressed_size: b,
                uncompressed_size: c,
                locale_offset: (v2 && d != NO_LOCALE).then_some(d),
                crc32: v2.then_some(e),
            }
        };

        Ok(Self { body, ..record })
    }
}

/// Append a length-prefixed name to a name table, returning its offset
pub fn encode_name(table: &mut Vec<u8>, name: &str) -> Result<u32> {
    let bytes = name.as_bytes();
    if bytes.len() > MAX_NAME_LENGTH {
        return Err(ResourceError::PathError(format!(
            "Name too long: {} bytes (max {})",
            bytes.len(),
            MAX_NAME_LENGTH
        )));
    }

    let offset = u32::try_from(table.len())
        .map_err(|_| ResourceError::PathError("name table exceeds 4 GiB".to_string()))?;
    table.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    table.extend_from_slice(bytes);
    Ok(offset)
}

/// Decode the name stored at `offset` of a name table
pub fn decode_name(table: &[u8], offset: u32) -> Result<&str> {
    let start = offset as usize;
    let len_bytes = table
        .get(start..start.saturating_add(2))
        .filter(|b| b.len() == 2)
        .ok_or_else(|| ResourceError::corrupt(format!("name offset {offset} out of range")))?;
    let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;

    let bytes = table
        .get(start + 2..start + 2 + len)
        .ok_or_else(|| ResourceError::corrupt(format!("name at offset {offset} overruns table")))?;
    std::str::from_utf8(bytes)
        .map_err(|e| ResourceError::corrupt(format!("invalid UTF-8 in name at {offset}: {e}")))
}

// Helper functions for reading primitive types
fn read_u16<R: Read>(mut reader: R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
