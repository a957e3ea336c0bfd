//! Block decompression
//!
//! Stored blocks are returned as zero-copy slices of the container buffer.
//! Compressed blocks are inflated through a reader capped one byte past the
//! declared size, so a block that expands beyond what its record claims fails
//! without allocating more than that.

use crate::container::{CompressionMethod, RawContainer};
use crate::error::{ResourceError, Result};
use crate::tree::FileNode;
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use std::io::Read;
use tracing::trace;

/// Upper bound on buffer space reserved from a record's declared size
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Produce the uncompressed content of a file variant
///
/// `label` names the file in error messages. Calling this repeatedly on the
/// same node yields identical bytes.
pub fn decompress(node: &FileNode, container: &RawContainer, label: &str) -> Result<Bytes> {
    let block = container.data_block(node.data_offset, node.compressed_size)?;
    let expected = node.uncompressed_size as u64;

    trace!(
        file = label,
        method = ?node.compression,
        compressed = node.compressed_size,
        uncompressed = node.uncompressed_size,
        "decoding block"
    );

    let content = match node.compression {
        CompressionMethod::None => {
            if block.len() as u64 != expected {
                return Err(ResourceError::SizeMismatch {
                    path: label.to_string(),
                    expected,
                    actual: block.len() as u64,
                });
            }
            block
        }
        CompressionMethod::Zlib => {
            let decoder = ZlibDecoder::new(&block[..]);
            Bytes::from(read_bounded(decoder, expected, label, "Zlib")?)
        }
        CompressionMethod::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(&block[..]).map_err(|e| {
                ResourceError::DecompressionFailed(format!("Zstd decoder for {label}: {e}"))
            })?;
            Bytes::from(read_bounded(decoder, expected, label, "Zstd")?)
        }
    };

    if let Some(expected_crc) = node.crc32 {
        let actual = crc32fast::hash(&content);
        if actual != expected_crc {
            return Err(ResourceError::CrcMismatch {
                path: label.to_string(),
                expected: expected_crc,
                actual,
            });
        }
    }

    Ok(content)
}

fn read_bounded<R: Read>(decoder: R, expected: u64, label: &str, method: &str) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected.min(MAX_PREALLOCATION) as usize);
    decoder
        .take(expected + 1)
        .read_to_end(&mut output)
        .map_err(|e| {
            ResourceError::DecompressionFailed(format!("{method} decompression of {label} failed: {e}"))
        })?;

    if output.len() as u64 != expected {
        return Err(ResourceError::SizeMismatch {
            path: label.to_string(),
            expected,
            actual: output.len() as u64,
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerWriter;
    use crate::tree::DirectoryTree;

    fn single(data: &[u8], method: CompressionMethod) -> (RawContainer, FileNode) {
        let mut writer = ContainerWriter::new();
        writer.add_file_with_compression("/f", data, method).unwrap();
        let container = RawContainer::parse(writer.finish().unwrap()).unwrap();
        let tree = DirectoryTree::build(&container).unwrap();
        let id = tree.lookup("/f").unwrap();
        let node = tree.entry(id).variants().unwrap().fallback().unwrap().clone();
        (container, node)
    }

    #[test]
    fn test_all_methods() {
        let data = b"The quick brown fox jumps over the lazy dog. ".repeat(50);
        for method in [
            CompressionMethod::None,
            CompressionMethod::Zlib,
            CompressionMethod::Zstd,
        ] {
            let (container, node) = single(&data, method);
            assert_eq!(node.compression, method);
            let out = decompress(&node, &container, "/f").unwrap();
            assert_eq!(&out[..], &data[..]);
        }
    }

    #[test]
    fn test_stored_is_zero_copy() {
        let (container, node) = single(b"plain bytes", CompressionMethod::None);
        let out = decompress(&node, &container, "/f").unwrap();
        let base = container.bytes().as_ptr() as usize;
        let ptr = out.as_ptr() as usize;
        assert!(ptr >= base && ptr < base + container.bytes().len());
    }

    #[test]
    fn test_idempotent() {
        let data = b"abcabcabc".repeat(100);
        let (container, node) = single(&data, CompressionMethod::Zstd);
        let first = decompress(&node, &container, "/f").unwrap();
        let second = decompress(&node, &container, "/f").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_declared_size_too_small() {
        let data = vec![7u8; 4096];
        let (container, mut node) = single(&data, CompressionMethod::Zlib);
        node.uncompressed_size = 100;
        assert!(matches!(
            decompress(&node, &container, "/f"),
            Err(ResourceError::SizeMismatch { actual: 101, .. })
        ));
    }

    #[test]
    fn test_declared_size_too_large() {
        let data = vec![7u8; 4096];
        let (container, mut node) = single(&data, CompressionMethod::Zstd);
        node.uncompressed_size = 5000;
        assert!(matches!(
            decompress(&node, &container, "/f"),
            Err(ResourceError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_crc_mismatch() {
        let data = vec![1u8; 1024];
        let (container, mut node) = single(&data, CompressionMethod::Zlib);
        node.crc32 = node.crc32.map(|c| c ^ 1);
        assert!(matches!(
            decompress(&node, &container, "/f"),
            Err(ResourceError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_garbage_block() {
        let (container, mut node) = single(b"0123456789abcdef", CompressionMethod::None);
        node.compression = CompressionMethod::Zlib;
        let err = decompress(&node, &container, "/f").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Decode);
    }
}
