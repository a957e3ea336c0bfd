use crate::container::format::{decode_name, ContainerHeader, NodeRecord, HEADER_SIZE};
use crate::error::{ResourceError, Result};
use bytes::Bytes;
use std::ops::Range;
use tracing::debug;

/// A validated, immutable container buffer
///
/// Only the header and table bounds are checked here; node records, names and
/// data blocks are decoded on demand. Cloning is cheap and shares the buffer.
#[derive(Debug, Clone)]
pub struct RawContainer {
    data: Bytes,
    header: ContainerHeader,
    tree: Range<usize>,
    names: Range<usize>,
    blocks: Range<usize>,
}

impl RawContainer {
    /// Parse a container from a shared byte buffer
    pub fn parse(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let header = ContainerHeader::parse(&data)?;

        if header.node_count == 0 {
            return Err(ResourceError::corrupt("node table is empty (no root)"));
        }

        let tree_len = (header.node_count as usize)
            .checked_mul(header.node_stride())
            .ok_or_else(|| ResourceError::corrupt("node table size overflows"))?;
        let tree = table_range("node", header.tree_offset, tree_len, data.len())?;
        let names = table_range("name", header.name_offset, header.name_size as usize, data.len())?;
        let blocks = table_range("data", header.data_offset, header.data_size as usize, data.len())?;

        let tables = [("node", &tree), ("name", &names), ("data", &blocks)];
        for (i, (a_name, a)) in tables.iter().enumerate() {
            for (b_name, b) in &tables[i + 1..] {
                if overlaps(a, b) {
                    return Err(ResourceError::corrupt(format!(
                        "{a_name} table {a:?} overlaps {b_name} table {b:?}"
                    )));
                }
            }
        }

        debug!(
            version = header.format_version,
            nodes = header.node_count,
            names = header.name_size,
            data = header.data_size,
            "parsed container header"
        );

        Ok(Self {
            data,
            header,
            tree,
            names,
            blocks,
        })
    }

    /// Get container header information
    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn format_version(&self) -> u32 {
        self.header.format_version
    }

    pub fn node_count(&self) -> usize {
        self.header.node_count as usize
    }

    /// The whole backing buffer
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Decode the node record at `index`
    pub fn node(&self, index: usize) -> Result<NodeRecord> {
        if index >= self.node_count() {
            return Err(ResourceError::corrupt(format!(
                "node index {index} out of range ({} nodes)",
                self.node_count()
            )));
        }
        let stride = self.header.node_stride();
        let start = self.tree.start + index * stride;
        NodeRecord::read_from(self.header.format_version, &self.data[start..start + stride])
    }

    /// Decode a name-table string
    pub fn name(&self, offset: u32) -> Result<&str> {
        decode_name(&self.data[self.names.clone()], offset)
    }

    /// Check that a block lies inside the data table, returning its absolute range
    pub fn block_range(&self, offset: u32, len: u32) -> Result<Range<usize>> {
        let start = self.blocks.start + offset as usize;
        let end = start
            .checked_add(len as usize)
            .filter(|end| *end <= self.blocks.end)
            .ok_or_else(|| {
                ResourceError::corrupt(format!(
                    "data block {offset}+{len} exceeds data table ({} bytes)",
                    self.blocks.len()
                ))
            })?;
        Ok(start..end)
    }

    /// Zero-copy view of a data block
    pub fn data_block(&self, offset: u32, len: u32) -> Result<Bytes> {
        let range = self.block_range(offset, len)?;
        Ok(self.data.slice(range))
    }
}

fn table_range(table: &str, offset: u32, len: usize, buffer_len: usize) -> Result<Range<usize>> {
    let start = offset as usize;
    let end = start.checked_add(len).ok_or_else(|| {
        ResourceError::corrupt(format!("{table} table bounds overflow"))
    })?;

    if len > 0 && start < HEADER_SIZE {
        return Err(ResourceError::corrupt(format!(
            "{table} table at {start} overlaps the header"
        )));
    }
    if end > buffer_len {
        return Err(ResourceError::corrupt(format!(
            "{table} table {start}..{end} exceeds buffer of {buffer_len} bytes"
        )));
    }
    Ok(start..end)
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    !a.is_empty() && !b.is_empty() && a.start < b.end && b.start < a.end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::format::{ContainerHeader, FORMAT_VERSION_2};
    use crate::container::ContainerWriter;

    fn sample() -> Vec<u8> {
        let mut writer = ContainerWriter::new();
        writer.add_file("/a/1", b"one").unwrap();
        writer.finish().unwrap()
    }

    fn rewrite_header(bytes: &mut [u8], edit: impl FnOnce(&mut ContainerHeader)) {
        let mut header = ContainerHeader::parse(bytes).unwrap();
        edit(&mut header);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        bytes[..HEADER_SIZE].copy_from_slice(&buf);
    }

    #[test]
    fn test_parse_valid() {
        let container = RawContainer::parse(sample()).unwrap();
        assert_eq!(container.format_version(), FORMAT_VERSION_2);
        assert_eq!(container.node_count(), 3);
        assert!(container.node(0).unwrap().is_directory());
        assert!(container.node(3).is_err());
    }

    #[test]
    fn test_table_out_of_bounds() {
        let mut bytes = sample();
        let len = bytes.len() as u32;
        rewrite_header(&mut bytes, |h| h.data_size = len);
        assert!(matches!(
            RawContainer::parse(bytes),
            Err(ResourceError::Corrupt(_))
        ));
    }

    #[test]
    fn test_overlapping_tables() {
        let mut bytes = sample();
        rewrite_header(&mut bytes, |h| h.name_offset = h.tree_offset);
        assert!(matches!(
            RawContainer::parse(bytes),
            Err(ResourceError::Corrupt(_))
        ));
    }

    #[test]
    fn test_empty_node_table() {
        let mut bytes = sample();
        rewrite_header(&mut bytes, |h| h.node_count = 0);
        assert!(RawContainer::parse(bytes).is_err());
    }

    #[test]
    fn test_node_count_overflow() {
        let mut bytes = sample();
        rewrite_header(&mut bytes, |h| h.node_count = u32::MAX);
        assert!(matches!(
            RawContainer::parse(bytes),
            Err(ResourceError::Corrupt(_))
        ));
    }

    #[test]
    fn test_block_range_checked() {
        let container = RawContainer::parse(sample()).unwrap();
        let size = container.header().data_size;
        assert!(container.data_block(0, size).is_ok());
        assert!(container.data_block(1, size).is_err());
        assert!(container.data_block(u32::MAX, u32::MAX).is_err());
    }
}
