//! The breadth-first directory walk.

use crate::convert::{checked_offset, Converter};
use crate::{Error, Result};

impl Converter<'_> {
    /// Parse one directory's entry table.
    ///
    /// Subdirectories and images are enqueued, not descended: the walk is
    /// breadth-first, and image data follows the directory section in
    /// queue order. A type-2 entry stores its type byte and name at an
    /// offset into the directory section instead of inline.
    pub(crate) fn directory(&mut self, dir_node: u32) -> Result<()> {
        let count = self.read_child_count()?;
        let first = self.tree.alloc_children(dir_node, count);

        for i in 0..u32::from(count) {
            let index = first + i;
            let mut entry_type = self.cur.read_u8()?;
            let name = match entry_type {
                1 => return Err(Error::Type1Entry),
                2 => {
                    let offset = self.cur.read_i32()?;
                    let pos = self.cur.tell();
                    self.cur
                        .seek(checked_offset(self.file_start, i64::from(offset))?);
                    entry_type = self.cur.read_u8()?;
                    let name = self.read_enc_string()?;
                    self.cur.seek(pos);
                    name
                }
                3 | 4 => self.read_enc_string()?,
                t => return Err(Error::UnknownEntryType(t)),
            };
            self.tree.nodes_mut()[index as usize].name = name;

            let size = self.cur.read_cint()?;
            if size <= 0 {
                return Err(Error::InvalidEntrySize(size));
            }
            self.cur.read_cint()?; // checksum, discarded
            self.cur.skip(4);

            match entry_type {
                3 => self.dirs.push_back(index),
                4 => self.imgs.push_back((index, size)),
                t => return Err(Error::IndirectEntryType(t)),
            }
        }
        Ok(())
    }
}
