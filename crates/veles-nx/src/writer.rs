//! Writing NX files.
//!
//! The output is created at its exact final size and write-mapped, so the
//! sections are filled in place and no buffering or remapping happens.
//! Alignment gaps stay zero (the file starts zeroed), which keeps the
//! output byte-deterministic.

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;
use zerocopy::IntoBytes;

use crate::header::Layout;
use crate::node::{NxNode, NODE_LEN};
use crate::strings::StringTable;
use crate::{Error, Result};

fn check_len(buf: &[u8], layout: &Layout) -> Result<()> {
    if buf.len() as u64 != layout.file_size {
        return Err(Error::LayoutMismatch {
            what: "output buffer size",
            expected: layout.file_size,
            actual: buf.len() as u64,
        });
    }
    Ok(())
}

/// Write the header and the node array into `buf`.
pub(crate) fn write_nodes_into(buf: &mut [u8], layout: &Layout, nodes: &[NxNode]) -> Result<()> {
    check_len(buf, layout)?;
    if nodes.len() as u64 != u64::from(layout.node_count) {
        return Err(Error::LayoutMismatch {
            what: "node count",
            expected: u64::from(layout.node_count),
            actual: nodes.len() as u64,
        });
    }

    let header = layout.header();
    buf[..std::mem::size_of_val(&header)].copy_from_slice(header.as_bytes());

    let start = layout.node_offset as usize;
    let end = start + nodes.len() * NODE_LEN;
    buf[start..end].copy_from_slice(nodes.as_bytes());
    Ok(())
}

/// Write the string offset table and the string blob into `buf`.
pub(crate) fn write_strings_into(
    buf: &mut [u8],
    layout: &Layout,
    strings: &StringTable,
) -> Result<()> {
    check_len(buf, layout)?;
    if strings.len() as u64 != u64::from(layout.string_count) {
        return Err(Error::LayoutMismatch {
            what: "string count",
            expected: u64::from(layout.string_count),
            actual: strings.len() as u64,
        });
    }

    let mut table = layout.string_table_offset as usize;
    let mut blob = layout.string_blob_offset as usize;
    for s in strings.iter() {
        buf[table..table + 8].copy_from_slice(&(blob as u64).to_le_bytes());
        table += 8;
        buf[blob..blob + 2].copy_from_slice(&(s.len() as u16).to_le_bytes());
        buf[blob + 2..blob + 2 + s.len()].copy_from_slice(s);
        blob += 2 + s.len();
    }
    Ok(())
}

/// Write a complete NX file image into `buf`.
///
/// `buf` must be zeroed and exactly `layout.file_size` bytes.
pub fn write_into(
    buf: &mut [u8],
    layout: &Layout,
    nodes: &[NxNode],
    strings: &StringTable,
) -> Result<()> {
    write_nodes_into(buf, layout, nodes)?;
    write_strings_into(buf, layout, strings)
}

/// A write-mapped NX output file.
///
/// Created at exact final size; filled in stages so a front end can
/// report progress between them. Dropping without
/// [`finish`](NxWriter::finish) leaves whatever was written — partial
/// output is treated as scratch.
pub struct NxWriter {
    mmap: MmapMut,
    layout: Layout,
}

impl NxWriter {
    /// Create (or truncate) the file at `path` sized for `layout` and
    /// map it for writing.
    pub fn create<P: AsRef<Path>>(path: P, layout: Layout) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(layout.file_size)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap, layout })
    }

    /// The layout this writer was created for.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Write the header and node array.
    pub fn write_nodes(&mut self, nodes: &[NxNode]) -> Result<()> {
        write_nodes_into(&mut self.mmap, &self.layout, nodes)
    }

    /// Write the string offset table and blob.
    pub fn write_strings(&mut self, strings: &StringTable) -> Result<()> {
        write_strings_into(&mut self.mmap, &self.layout, strings)
    }

    /// Flush the mapping to disk.
    pub fn finish(self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}
