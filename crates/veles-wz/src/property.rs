//! The depth-first image walk.

use crate::convert::{checked_offset, Converter};
use crate::{Error, Result};

/// The extended property types an image can carry.
enum Extended {
    Property,
    Canvas,
    Vector,
    Convex,
    Sound,
    Link,
}

impl Converter<'_> {
    /// Parse one image: its property tree, then a seek to its recorded
    /// end regardless of how much the tree consumed.
    pub(crate) fn image(&mut self, node: u32, size: i32) -> Result<()> {
        let base = self.cur.tell();
        self.cur.skip(1);
        self.skip_oracle_string()?;
        self.cur.skip(2);
        self.sub_property(node, base)?;
        self.cur.seek(base + size as usize);
        Ok(())
    }

    /// Parse a property list into `node`'s children.
    pub(crate) fn sub_property(&mut self, node: u32, image_base: usize) -> Result<()> {
        let count = self.read_child_count()?;
        let first = self.tree.alloc_children(node, count);

        for i in 0..u32::from(count) {
            let index = first + i;
            let name = self.read_prop_string(image_base)?;
            self.tree.nodes_mut()[index as usize].name = name;

            let tag = self.cur.read_u8()?;
            match tag {
                // Payload-free entries carry their ordinal, which keeps
                // order tables meaningful after the sibling sort.
                0x00 => self.tree.nodes_mut()[index as usize].set_integer(i64::from(i)),
                0x02 | 0x0B => {
                    let value = self.cur.read_u16()?;
                    self.tree.nodes_mut()[index as usize].set_integer(i64::from(value));
                }
                0x03 => {
                    let value = self.cur.read_cint()?;
                    self.tree.nodes_mut()[index as usize].set_integer(i64::from(value));
                }
                0x04 => {
                    let value = if self.cur.read_u8()? == 0x80 {
                        f64::from(self.cur.read_f32()?)
                    } else {
                        0.0
                    };
                    self.tree.nodes_mut()[index as usize].set_real(value);
                }
                0x05 => {
                    let value = self.cur.read_f64()?;
                    self.tree.nodes_mut()[index as usize].set_real(value);
                }
                0x08 => {
                    let value = self.read_prop_string(image_base)?;
                    self.tree.nodes_mut()[index as usize].set_string(value);
                }
                0x09 => {
                    let block = self.cur.read_i32()?;
                    let resume = checked_offset(self.cur.tell(), i64::from(block))?;
                    self.extended_property(index, image_base)?;
                    self.cur.seek(resume);
                }
                t => return Err(Error::UnknownPropertyTag(t)),
            }
        }
        Ok(())
    }

    /// Parse an extended property, dispatching on its type name.
    pub(crate) fn extended_property(&mut self, node: u32, image_base: usize) -> Result<()> {
        let type_name = self.read_prop_string(image_base)?;
        let extended = match self.tree.strings().bytes(type_name) {
            b"Property" => Extended::Property,
            b"Canvas" => Extended::Canvas,
            b"Shape2D#Vector2D" => Extended::Vector,
            b"Shape2D#Convex2D" => Extended::Convex,
            b"Sound_DX8" => Extended::Sound,
            b"UOL" => Extended::Link,
            other => {
                return Err(Error::UnknownExtendedType(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        };

        match extended {
            Extended::Property => {
                self.cur.skip(2);
                self.sub_property(node, image_base)
            }
            Extended::Canvas => {
                self.cur.skip(1);
                if self.cur.read_u8()? == 1 {
                    self.cur.skip(2);
                    self.sub_property(node, image_base)?;
                }
                // Pixel data is not carried over; the caller's block
                // length restores the cursor past it.
                Ok(())
            }
            Extended::Vector => {
                let x = self.cur.read_cint()?;
                let y = self.cur.read_cint()?;
                self.tree.nodes_mut()[node as usize].set_vector(x, y);
                Ok(())
            }
            Extended::Convex => {
                let count = self.read_child_count()?;
                let first = self.tree.alloc_children(node, count);
                for i in 0..u32::from(count) {
                    let name = self.tree.strings_mut().intern(i.to_string().as_bytes());
                    self.tree.nodes_mut()[(first + i) as usize].name = name;
                    // Each element reads its own type name at its own
                    // position, but the record filled is the head of the
                    // range; shipped archives depend on exactly this.
                    self.extended_property(first, image_base)?;
                }
                Ok(())
            }
            Extended::Sound => {
                // Audio payload is not carried over.
                Ok(())
            }
            Extended::Link => {
                self.cur.skip(1);
                let path = self.read_prop_string(image_base)?;
                self.tree.nodes_mut()[node as usize].set_link(path);
                Ok(())
            }
        }
    }
}
