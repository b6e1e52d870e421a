//! The WZ → NX converter.

use std::collections::VecDeque;

use veles_common::ByteCursor;
use veles_nx::NxTree;

use crate::file::WZ_MAGIC;
use crate::keys::{KeyRing, Region};
use crate::{Error, Result};

/// Resolve a signed displacement against a base offset.
pub(crate) fn checked_offset(base: usize, displacement: i64) -> Result<usize> {
    usize::try_from(base as i64 + displacement).map_err(|_| {
        Error::from(veles_common::Error::OffsetOverflow { base, displacement })
    })
}

/// Converts one WZ archive into an NX tree.
///
/// All conversion state lives here — cursor, key selection, node and
/// string tables, traversal queues — so several archives can be converted
/// in one process by building several converters.
///
/// Stages run in a fixed order: the breadth-first directory walk, then
/// the per-image depth-first property walk, then link resolution, then
/// the sibling sort. [`Converter::convert`] runs them all; the staged
/// methods exist so a front end can report progress in between.
pub struct Converter<'a> {
    pub(crate) cur: ByteCursor<'a>,
    pub(crate) file_start: usize,
    pub(crate) keys: KeyRing,
    pub(crate) region: Option<Region>,
    pub(crate) ambiguous_key: bool,
    pub(crate) tree: NxTree,
    pub(crate) dirs: VecDeque<u32>,
    pub(crate) imgs: VecDeque<(u32, i32)>,
    scratch: Vec<u8>,
    scratch16: Vec<u16>,
}

impl<'a> Converter<'a> {
    /// Validate the archive header and queue the root directory.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut cur = ByteCursor::new(data);
        let magic = cur.read_u32()?;
        if magic != WZ_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        cur.skip(8);
        let file_start = cur.read_u32()? as usize;
        // Directory data begins two bytes past file_start.
        cur.seek(file_start + 2);

        let mut converter = Self {
            cur,
            file_start,
            keys: KeyRing::new(),
            region: None,
            ambiguous_key: false,
            tree: NxTree::new(),
            dirs: VecDeque::new(),
            imgs: VecDeque::new(),
            scratch: Vec::new(),
            scratch16: Vec::new(),
        };
        converter.dirs.push_back(0);
        Ok(converter)
    }

    /// Run every stage and return the finished tree.
    pub fn convert(data: &'a [u8]) -> Result<NxTree> {
        let mut converter = Converter::new(data)?;
        converter.parse_directories()?;
        converter.parse_images()?;
        converter.resolve_links();
        converter.sort_siblings()?;
        Ok(converter.into_tree())
    }

    /// The region whose key decrypted the archive, once deduced.
    pub fn region(&self) -> Option<Region> {
        self.region
    }

    /// Whether more than one candidate key looked valid. The last one
    /// won; a front end may want to warn.
    pub fn key_is_ambiguous(&self) -> bool {
        self.ambiguous_key
    }

    /// The tree built so far.
    pub fn tree(&self) -> &NxTree {
        &self.tree
    }

    /// Give up the converter, keeping the tree.
    pub fn into_tree(self) -> NxTree {
        self.tree
    }

    /// Images queued by the directory walk and not yet parsed.
    pub fn image_count(&self) -> usize {
        self.imgs.len()
    }

    /// Drain the directory queue breadth-first.
    pub fn parse_directories(&mut self) -> Result<()> {
        while let Some(node) = self.dirs.pop_front() {
            self.directory(node)?;
        }
        Ok(())
    }

    /// Parse every queued image.
    pub fn parse_images(&mut self) -> Result<()> {
        self.parse_images_with(|_| {})
    }

    /// Parse every queued image, reporting the number finished after
    /// each one.
    pub fn parse_images_with(&mut self, mut progress: impl FnMut(usize)) -> Result<()> {
        let mut done = 0;
        while let Some((node, size)) = self.imgs.pop_front() {
            self.image(node, size)?;
            done += 1;
            progress(done);
        }
        Ok(())
    }

    /// Rewrite every link node in place. Runs after all images are
    /// parsed; unresolvable links collapse silently.
    pub fn resolve_links(&mut self) {
        let (nodes, strings) = self.tree.nodes_and_strings_mut();
        crate::resolve::resolve_links(nodes, strings);
    }

    /// Sort every sibling range by name. Runs after link resolution so
    /// relocated targets are visible.
    pub fn sort_siblings(&mut self) -> Result<()> {
        self.tree.sort_siblings()?;
        Ok(())
    }

    /// Read a `cint` child count and check it fits a node record.
    pub(crate) fn read_child_count(&mut self) -> Result<u16> {
        let count = self.cur.read_cint()?;
        u16::try_from(count).map_err(|_| Error::InvalidChildCount(count))
    }

    fn checked_len(value: i32) -> Result<usize> {
        if (0..=i32::from(u16::MAX)).contains(&value) {
            Ok(value as usize)
        } else {
            Err(Error::StringTooLong(i64::from(value)))
        }
    }

    /// Trial-select the key against `len` bytes at the cursor.
    fn deduce_key(&mut self, len: usize) -> Result<()> {
        let cipher = self.cur.peek_bytes(len)?;
        let selection = self.keys.select(cipher).ok_or(Error::LocaleNotFound)?;
        self.region = Some(selection.region);
        self.ambiguous_key |= selection.ambiguous;
        Ok(())
    }

    /// Read and decrypt an encrypted string, interning the result.
    ///
    /// The first ASCII-masked string also selects the key: the walk
    /// reaches strings in file order, so this is the trial decryption of
    /// the first encrypted string in the archive.
    pub(crate) fn read_enc_string(&mut self) -> Result<u32> {
        let prefix = self.cur.read_i8()?;
        if prefix == 0 {
            return Ok(0);
        }

        if prefix > 0 {
            // UTF-16 masked; 127 means an i32 count follows.
            let units = if prefix == 127 {
                self.cur.read_i32()?
            } else {
                i32::from(prefix)
            };
            let units = Self::checked_len(units)?;
            let raw = self.cur.read_bytes(units * 2)?;
            let region = self.region.ok_or(Error::OracleString)?;
            let key = self.keys.key(region);
            self.scratch16.clear();
            for (i, pair) in raw.chunks_exact(2).enumerate() {
                let unit = u16::from_le_bytes([pair[0], pair[1]]);
                self.scratch16.push(key.decode_utf16(i, unit));
            }
            let decoded: String = char::decode_utf16(self.scratch16.iter().copied())
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect();
            if decoded.len() > usize::from(u16::MAX) {
                return Err(Error::StringTooLong(decoded.len() as i64));
            }
            return Ok(self.tree.strings_mut().intern(decoded.as_bytes()));
        }

        // ASCII masked; -128 means an i32 count follows.
        let count = if prefix == -128 {
            self.cur.read_i32()?
        } else {
            -i32::from(prefix)
        };
        let count = Self::checked_len(count)?;
        if self.region.is_none() {
            self.deduce_key(count)?;
        }
        let raw = self.cur.read_bytes(count)?;
        let region = self.region.ok_or(Error::LocaleNotFound)?;
        let key = self.keys.key(region);
        self.scratch.clear();
        for (i, &b) in raw.iter().enumerate() {
            self.scratch.push(key.decode_ascii(i, b));
        }
        Ok(self.tree.strings_mut().intern(&self.scratch))
    }

    /// Read a property string: inline, or an offset back into the image.
    pub(crate) fn read_prop_string(&mut self, image_base: usize) -> Result<u32> {
        let tag = self.cur.read_u8()?;
        match tag {
            0x00 | 0x73 => self.read_enc_string(),
            0x01 | 0x1B => {
                let offset = self.cur.read_i32()?;
                let target = checked_offset(image_base, i64::from(offset))?;
                let pos = self.cur.tell();
                self.cur.seek(target);
                let id = self.read_enc_string()?;
                self.cur.seek(pos);
                Ok(id)
            }
            t => Err(Error::UnknownStringTag(t)),
        }
    }

    /// Step over the encrypted string every image starts with; on first
    /// use, deduce the key from it instead.
    pub(crate) fn skip_oracle_string(&mut self) -> Result<()> {
        let prefix = self.cur.read_i8()?;
        if prefix >= 0 {
            return Err(Error::OracleString);
        }
        let count = if prefix == -128 {
            self.cur.read_i32()?
        } else {
            -i32::from(prefix)
        };
        let count = Self::checked_len(count)?;
        if self.region.is_none() {
            self.deduce_key(count)?;
        }
        self.cur.skip(count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{WzKey, KEY_LEN};
    use veles_nx::{write_into, NodeKind, NxReader, NxTree};

    // -- fixture building ------------------------------------------------
    //
    // The XOR masking is an involution, so the decoder's own key material
    // doubles as the encoder in these builders. Everything is encrypted
    // with the last region key: selection keeps the last valid candidate,
    // so these archives always deduce deterministically.

    fn test_ring() -> KeyRing {
        KeyRing::new()
    }

    fn cint(out: &mut Vec<u8>, value: i32) {
        if (-127..=127).contains(&value) {
            out.push(value as i8 as u8);
        } else {
            out.push(0x80);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn enc_string(out: &mut Vec<u8>, key: &WzKey, s: &[u8]) {
        if s.len() >= 128 {
            out.push(0x80);
            out.extend_from_slice(&(s.len() as i32).to_le_bytes());
        } else {
            out.push((-(s.len() as i32)) as i8 as u8);
        }
        for (i, &b) in s.iter().enumerate() {
            out.push(key.decode_ascii(i, b));
        }
    }

    fn enc_string_utf16(out: &mut Vec<u8>, key: &WzKey, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        if units.len() >= 127 {
            out.push(127);
            out.extend_from_slice(&(units.len() as i32).to_le_bytes());
        } else {
            out.push(units.len() as u8);
        }
        for (i, &u) in units.iter().enumerate() {
            out.extend_from_slice(&key.decode_utf16(i, u).to_le_bytes());
        }
    }

    fn prop_string(out: &mut Vec<u8>, key: &WzKey, s: &[u8]) {
        out.push(0x00);
        enc_string(out, key, s);
    }

    /// Archive header; directory data starts right after.
    fn wz_prelude() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&WZ_MAGIC.to_le_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&16u32.to_le_bytes()); // file_start
        out.extend_from_slice(&[0u8; 2]); // version stamp
        out
    }

    fn dir_entry(out: &mut Vec<u8>, key: &WzKey, entry_type: u8, name: &[u8], size: usize) {
        out.push(entry_type);
        enc_string(out, key, name);
        cint(out, size as i32);
        cint(out, 0); // checksum, discarded
        out.extend_from_slice(&[0u8; 4]);
    }

    /// An image wrapping one top-level property list.
    fn image(key: &WzKey, children: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0x73];
        enc_string(&mut out, key, b"Property");
        out.extend_from_slice(&[0, 0]);
        cint(&mut out, children.len() as i32);
        for child in children {
            out.extend_from_slice(child);
        }
        out
    }

    fn int_child(key: &WzKey, name: &[u8], value: i32) -> Vec<u8> {
        let mut out = Vec::new();
        prop_string(&mut out, key, name);
        out.push(0x03);
        cint(&mut out, value);
        out
    }

    fn extended_child(key: &WzKey, name: &[u8], block: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        prop_string(&mut out, key, name);
        out.push(0x09);
        out.extend_from_slice(&(block.len() as i32).to_le_bytes());
        out.extend_from_slice(block);
        out
    }

    fn vector_block(key: &WzKey, x: i32, y: i32) -> Vec<u8> {
        let mut out = vec![0x73];
        enc_string(&mut out, key, b"Shape2D#Vector2D");
        cint(&mut out, x);
        cint(&mut out, y);
        out
    }

    fn link_block(key: &WzKey, path: &[u8]) -> Vec<u8> {
        let mut out = vec![0x73];
        enc_string(&mut out, key, b"UOL");
        out.push(0);
        prop_string(&mut out, key, path);
        out
    }

    /// A complete archive: one root directory listing `images` in order,
    /// followed by their data in the same order.
    fn archive(key: &WzKey, images: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut out = wz_prelude();
        cint(&mut out, images.len() as i32);
        for (name, img) in images {
            dir_entry(&mut out, key, 4, name.as_bytes(), img.len());
        }
        for (_, img) in images {
            out.extend_from_slice(img);
        }
        out
    }

    fn to_nx_bytes(tree: &NxTree) -> Vec<u8> {
        let layout = tree.layout();
        let mut buf = vec![0u8; layout.file_size as usize];
        write_into(&mut buf, &layout, tree.nodes(), tree.strings()).unwrap();
        buf
    }

    // -- golden scenarios ------------------------------------------------

    #[test]
    fn empty_archive() {
        let mut data = wz_prelude();
        cint(&mut data, 0);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.strings().len(), 1);

        let layout = tree.layout();
        assert_eq!(layout.node_offset, 64);
        assert_eq!(layout.string_table_offset, 96);
        assert_eq!(layout.string_blob_offset, 112);
        assert_eq!(layout.file_size, 128);
        assert_eq!(to_nx_bytes(&tree).len(), 128);
    }

    #[test]
    fn single_integer_leaf() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img = image(key, &[int_child(key, b"x", 42)]);
        let data = archive(key, &[("test.img", img)]);

        let mut converter = Converter::new(&data).unwrap();
        converter.parse_directories().unwrap();
        assert_eq!(converter.region(), Some(Region::Sea));
        assert_eq!(converter.image_count(), 1);
        converter.parse_images().unwrap();
        converter.resolve_links();
        converter.sort_siblings().unwrap();
        assert!(!converter.key_is_ambiguous());

        let tree = converter.into_tree();
        tree.verify().unwrap();
        assert_eq!(tree.node_count(), 3);

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let img_node = nx.child_named(nx.root(), b"test.img").unwrap();
        let leaf = nx.child_named(img_node, b"x").unwrap();
        assert_eq!(leaf.kind(), NodeKind::Integer);
        assert_eq!(leaf.integer(), 42);
    }

    #[test]
    fn vector_property() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img = image(
            key,
            &[extended_child(key, b"pos", &vector_block(key, 10, -5))],
        );
        let data = archive(key, &[("map.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let map = nx.child_named(nx.root(), b"map.img").unwrap();
        let pos = nx.child_named(map, b"pos").unwrap();
        assert_eq!(pos.kind(), NodeKind::Vector);
        assert_eq!(pos.vector(), (10, -5));
    }

    #[test]
    fn link_to_sibling_resolves() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img = image(
            key,
            &[
                int_child(key, b"x", 7),
                extended_child(key, b"y", &link_block(key, b"x")),
            ],
        );
        let data = archive(key, &[("a", img)]);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let a = nx.child_named(nx.root(), b"a").unwrap();
        let y = nx.child_named(a, b"y").unwrap();
        assert_eq!(y.kind(), NodeKind::Integer);
        assert_eq!(y.integer(), 7);
    }

    #[test]
    fn link_with_parent_step_resolves() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        // a/x = 9, a/b/link = "../x"
        let mut property = vec![0x73];
        enc_string(&mut property, key, b"Property");
        property.extend_from_slice(&[0, 0]);
        cint(&mut property, 1);
        property.extend_from_slice(&extended_child(key, b"link", &link_block(key, b"../x")));

        let img = image(
            key,
            &[
                extended_child(key, b"b", &property),
                int_child(key, b"x", 9),
            ],
        );
        let data = archive(key, &[("a", img)]);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let a = nx.child_named(nx.root(), b"a").unwrap();
        let b = nx.child_named(a, b"b").unwrap();
        let link = nx.child_named(b, b"link").unwrap();
        assert_eq!(link.kind(), NodeKind::Integer);
        assert_eq!(link.integer(), 9);
    }

    #[test]
    fn unresolvable_link_collapses() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img = image(
            key,
            &[extended_child(key, b"y", &link_block(key, b"nonexistent"))],
        );
        let data = archive(key, &[("a", img)]);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let a = nx.child_named(nx.root(), b"a").unwrap();
        let y = nx.child_named(a, b"y").unwrap();
        assert_eq!(y.kind(), NodeKind::None);
        assert_eq!({ y.first_child }, 0);
        assert_eq!({ y.child_count }, 0);
    }

    // -- pinned behaviors ------------------------------------------------

    #[test]
    fn convex_elements_populate_first_slot() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let mut convex = vec![0x73];
        enc_string(&mut convex, key, b"Shape2D#Convex2D");
        cint(&mut convex, 2);
        convex.extend_from_slice(&vector_block(key, 1, 2));
        convex.extend_from_slice(&vector_block(key, 3, 4));

        let img = image(key, &[extended_child(key, b"hull", &convex)]);
        let data = archive(key, &[("shape.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let shape = nx.child_named(nx.root(), b"shape.img").unwrap();
        let hull = nx.child_named(shape, b"hull").unwrap();
        assert_eq!({ hull.child_count }, 2);

        // Every element recurses on the head of the range, so the last
        // element's payload is what sticks there; the rest stay empty
        // containers with their synthetic names.
        let first = nx.child_named(hull, b"0").unwrap();
        assert_eq!(first.kind(), NodeKind::Vector);
        assert_eq!(first.vector(), (3, 4));
        let second = nx.child_named(hull, b"1").unwrap();
        assert_eq!(second.kind(), NodeKind::None);
    }

    #[test]
    fn canvas_children_parse_and_payload_skips() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let mut canvas = vec![0x73];
        enc_string(&mut canvas, key, b"Canvas");
        canvas.push(0);
        canvas.push(1); // has children
        canvas.extend_from_slice(&[0, 0]);
        cint(&mut canvas, 1);
        canvas.extend_from_slice(&int_child(key, b"origin", 4));
        canvas.extend_from_slice(&[0xDE; 13]); // pixel payload, not parsed

        let img = image(
            key,
            &[
                extended_child(key, b"sprite", &canvas),
                int_child(key, b"after", 1),
            ],
        );
        let data = archive(key, &[("c.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let c = nx.child_named(nx.root(), b"c.img").unwrap();
        let sprite = nx.child_named(c, b"sprite").unwrap();
        assert_eq!(nx.child_named(sprite, b"origin").unwrap().integer(), 4);
        // The sibling after the canvas parses cleanly past the payload.
        assert_eq!(nx.child_named(c, b"after").unwrap().integer(), 1);
    }

    #[test]
    fn sound_payload_is_skipped() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let mut sound = vec![0x73];
        enc_string(&mut sound, key, b"Sound_DX8");
        sound.extend_from_slice(&[0xAB; 21]); // audio payload, not parsed

        let img = image(
            key,
            &[
                extended_child(key, b"bgm", &sound),
                int_child(key, b"after", 2),
            ],
        );
        let data = archive(key, &[("s.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let s = nx.child_named(nx.root(), b"s.img").unwrap();
        let bgm = nx.child_named(s, b"bgm").unwrap();
        assert_eq!(bgm.kind(), NodeKind::None);
        assert_eq!({ bgm.child_count }, 0);
        assert_eq!(nx.child_named(s, b"after").unwrap().integer(), 2);
    }

    #[test]
    fn indirect_directory_entry() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img_a = image(key, &[int_child(key, b"v", 1)]);
        let img_b = image(key, &[int_child(key, b"v", 2)]);

        // Root lists a normal image entry and a type-2 entry whose name
        // record lives past the image data.
        let mut out = wz_prelude();
        cint(&mut out, 2);
        dir_entry(&mut out, key, 4, b"a.img", img_a.len());
        out.push(2);
        let patch_at = out.len();
        out.extend_from_slice(&[0u8; 4]); // target offset, patched below
        cint(&mut out, img_b.len() as i32);
        cint(&mut out, 0);
        out.extend_from_slice(&[0u8; 4]);

        out.extend_from_slice(&img_a);
        out.extend_from_slice(&img_b);

        let target = out.len() as u32 - 16; // relative to file_start
        out[patch_at..patch_at + 4].copy_from_slice(&(target as i32).to_le_bytes());
        out.push(4);
        enc_string(&mut out, key, b"b.img");

        let tree = Converter::convert(&out).unwrap();
        tree.verify().unwrap();

        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let b = nx.child_named(nx.root(), b"b.img").unwrap();
        let v = nx.child_named(b, b"v").unwrap();
        assert_eq!(v.integer(), 2);
    }

    #[test]
    fn offset_form_property_string() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        // The second child's name is an offset reference to the
        // "Property" string at image offset 1.
        let mut second = vec![0x01];
        second.extend_from_slice(&1i32.to_le_bytes());
        second.push(0x03);
        cint(&mut second, 5);

        let img = image(key, &[int_child(key, b"x", 1), second]);
        let data = archive(key, &[("i.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let i = nx.child_named(nx.root(), b"i.img").unwrap();
        let named = nx.child_named(i, b"Property").unwrap();
        assert_eq!(named.integer(), 5);
    }

    #[test]
    fn real_property_forms() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);

        let mut short_real = Vec::new();
        prop_string(&mut short_real, key, b"zero");
        short_real.push(0x04);
        short_real.push(0x00); // no f32 follows

        let mut f32_real = Vec::new();
        prop_string(&mut f32_real, key, b"single");
        f32_real.push(0x04);
        f32_real.push(0x80);
        f32_real.extend_from_slice(&1.5f32.to_le_bytes());

        let mut f64_real = Vec::new();
        prop_string(&mut f64_real, key, b"double");
        f64_real.push(0x05);
        f64_real.extend_from_slice(&(-0.25f64).to_le_bytes());

        let img = image(key, &[short_real, f32_real, f64_real]);
        let data = archive(key, &[("r.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let r = nx.child_named(nx.root(), b"r.img").unwrap();

        let zero = nx.child_named(r, b"zero").unwrap();
        assert_eq!(zero.kind(), NodeKind::Real);
        assert_eq!(zero.real(), 0.0);
        let single = nx.child_named(r, b"single").unwrap();
        assert_eq!(single.real(), 1.5);
        let double = nx.child_named(r, b"double").unwrap();
        assert_eq!(double.real(), -0.25);
    }

    #[test]
    fn short_integer_and_index_tags() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);

        let mut by_index = Vec::new();
        prop_string(&mut by_index, key, b"first");
        by_index.push(0x00);

        let mut word = Vec::new();
        prop_string(&mut word, key, b"word");
        word.push(0x02);
        word.extend_from_slice(&40_000u16.to_le_bytes());

        let mut word_b = Vec::new();
        prop_string(&mut word_b, key, b"wordb");
        word_b.push(0x0B);
        word_b.extend_from_slice(&7u16.to_le_bytes());

        let mut text = Vec::new();
        prop_string(&mut text, key, b"text");
        text.push(0x08);
        prop_string(&mut text, key, b"payload");

        let img = image(key, &[by_index, word, word_b, text]);
        let data = archive(key, &[("t.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let t = nx.child_named(nx.root(), b"t.img").unwrap();

        // Tag 0x00 stores the child's ordinal before sorting.
        let first = nx.child_named(t, b"first").unwrap();
        assert_eq!(first.kind(), NodeKind::Integer);
        assert_eq!(first.integer(), 0);
        assert_eq!(nx.child_named(t, b"word").unwrap().integer(), 40_000);
        assert_eq!(nx.child_named(t, b"wordb").unwrap().integer(), 7);

        let text = nx.child_named(t, b"text").unwrap();
        assert_eq!(text.kind(), NodeKind::String);
        assert_eq!(nx.string(text.string_id()).unwrap(), b"payload");
    }

    #[test]
    fn utf16_names_transcode() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);

        let mut child = vec![0x00];
        enc_string_utf16(&mut child, key, "über");
        child.push(0x03);
        cint(&mut child, 1);

        let img = image(key, &[child]);
        let data = archive(key, &[("u.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let u = nx.child_named(nx.root(), b"u.img").unwrap();
        assert!(nx.child_named(u, "über".as_bytes()).is_some());
    }

    #[test]
    fn extended_length_prefixes() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);

        let long_ascii = vec![b'a'; 200];
        let long_utf16: String = std::iter::repeat('x').take(150).collect();

        let mut child_a = vec![0x00];
        enc_string(&mut child_a, key, &long_ascii);
        child_a.push(0x03);
        cint(&mut child_a, 1);

        let mut child_b = vec![0x00];
        enc_string_utf16(&mut child_b, key, &long_utf16);
        child_b.push(0x03);
        cint(&mut child_b, 2);

        let img = image(key, &[child_a, child_b]);
        let data = archive(key, &[("long.img", img)]);

        let tree = Converter::convert(&data).unwrap();
        let bytes = to_nx_bytes(&tree);
        let nx = NxReader::parse(&bytes).unwrap();
        let node = nx.child_named(nx.root(), b"long.img").unwrap();
        assert!(nx.child_named(node, &long_ascii).is_some());
        assert!(nx.child_named(node, long_utf16.as_bytes()).is_some());
    }

    #[test]
    fn siblings_come_out_sorted() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img_b = image(key, &[]);
        let img_a = image(key, &[]);
        let data = archive(key, &[("b.img", img_b), ("a.img", img_a), ]);

        let tree = Converter::convert(&data).unwrap();
        tree.verify().unwrap();

        let names: Vec<&[u8]> = tree.nodes()[1..=2]
            .iter()
            .map(|n| tree.strings().bytes(n.name))
            .collect();
        assert_eq!(names, vec![&b"a.img"[..], b"b.img"]);
    }

    #[test]
    fn conversion_is_deterministic() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img = image(
            key,
            &[
                int_child(key, b"x", 42),
                extended_child(key, b"pos", &vector_block(key, 3, 4)),
            ],
        );
        let data = archive(key, &[("d.img", img)]);

        let first = to_nx_bytes(&Converter::convert(&data).unwrap());
        let second = to_nx_bytes(&Converter::convert(&data).unwrap());
        assert_eq!(first, second);
    }

    // -- failures --------------------------------------------------------

    #[test]
    fn rejects_bad_magic() {
        let mut data = wz_prelude();
        data[0] ^= 0xFF;
        cint(&mut data, 0);
        assert!(matches!(
            Converter::convert(&data),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn rejects_unknown_directory_types() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);

        for (entry_type, expect_type1) in [(1u8, true), (5u8, false)] {
            let mut data = wz_prelude();
            cint(&mut data, 1);
            dir_entry(&mut data, key, entry_type, b"x.img", 4);
            let err = Converter::convert(&data).unwrap_err();
            match err {
                Error::Type1Entry => assert!(expect_type1),
                Error::UnknownEntryType(5) => assert!(!expect_type1),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn rejects_non_positive_entry_size() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let mut data = wz_prelude();
        cint(&mut data, 1);
        dir_entry(&mut data, key, 4, b"x.img", 0);
        assert!(matches!(
            Converter::convert(&data),
            Err(Error::InvalidEntrySize(0))
        ));
    }

    #[test]
    fn rejects_unknown_property_tag() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let mut child = Vec::new();
        prop_string(&mut child, key, b"odd");
        child.push(0x07);
        let img = image(key, &[child]);
        let data = archive(key, &[("x.img", img)]);
        assert!(matches!(
            Converter::convert(&data),
            Err(Error::UnknownPropertyTag(0x07))
        ));
    }

    #[test]
    fn rejects_unknown_extended_type() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let mut block = vec![0x73];
        enc_string(&mut block, key, b"Shape3D#Octahedron");
        let img = image(key, &[extended_child(key, b"odd", &block)]);
        let data = archive(key, &[("x.img", img)]);
        match Converter::convert(&data) {
            Err(Error::UnknownExtendedType(name)) => {
                assert_eq!(name, "Shape3D#Octahedron");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_string_tag() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let mut child = vec![0x42]; // bogus property-string tag
        child.push(0x03);
        cint(&mut child, 1);
        let img = image(key, &[child]);
        let data = archive(key, &[("x.img", img)]);
        assert!(matches!(
            Converter::convert(&data),
            Err(Error::UnknownStringTag(0x42))
        ));
    }

    #[test]
    fn rejects_duplicate_sibling_names() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img = image(key, &[int_child(key, b"x", 1), int_child(key, b"x", 2)]);
        let data = archive(key, &[("dup.img", img)]);
        assert!(matches!(
            Converter::convert(&data),
            Err(Error::Nx(veles_nx::Error::DuplicateSibling { .. }))
        ));
    }

    #[test]
    fn rejects_truncated_archive() {
        let ring = test_ring();
        let key = ring.key(Region::Sea);
        let img = image(key, &[int_child(key, b"x", 42)]);
        let mut data = archive(key, &[("t.img", img)]);
        data.truncate(data.len() - 5);
        assert!(matches!(
            Converter::convert(&data),
            Err(Error::Common(veles_common::Error::UnexpectedEof { .. }))
        ));
    }

    #[test]
    fn rejects_undecryptable_oracle_string() {
        let mut data = wz_prelude();
        cint(&mut data, 1);
        data.push(4);
        data.push(-64i8 as u8);
        data.extend_from_slice(&[0u8; 64]);
        cint(&mut data, 1);
        cint(&mut data, 0);
        data.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            Converter::convert(&data),
            Err(Error::LocaleNotFound)
        ));
    }

    #[test]
    fn rejects_oversized_child_count() {
        let mut data = wz_prelude();
        cint(&mut data, 70_000);
        assert!(matches!(
            Converter::convert(&data),
            Err(Error::InvalidChildCount(70_000))
        ));
    }

    #[test]
    fn string_length_guard_covers_keystream() {
        // Longest legal string uses the last keystream index.
        assert!(usize::from(u16::MAX) <= KEY_LEN / 2);
    }
}
