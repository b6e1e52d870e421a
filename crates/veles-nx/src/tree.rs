//! The in-memory node table being assembled by a converter.

use crate::header::Layout;
use crate::node::{NodeKind, NxNode};
use crate::strings::StringTable;
use crate::{Error, Result};

/// A growing NX tree: node records, interned strings, and the sibling
/// ranges still waiting to be sorted.
///
/// Nodes are append-only. A parent's child range is claimed once with
/// [`alloc_children`](NxTree::alloc_children); the records are then filled
/// in place by the converter. [`sort_siblings`](NxTree::sort_siblings)
/// runs once at the end, after link resolution, so every lookup in the
/// written file can be a binary search.
#[derive(Debug)]
pub struct NxTree {
    nodes: Vec<NxNode>,
    strings: StringTable,
    unsorted: Vec<(u32, u16)>,
}

impl NxTree {
    /// Create a tree holding the root record and the empty string.
    pub fn new() -> Self {
        Self {
            nodes: vec![NxNode::default()],
            strings: StringTable::new(),
            unsorted: Vec::new(),
        }
    }

    /// All node records in index order.
    #[inline]
    pub fn nodes(&self) -> &[NxNode] {
        &self.nodes
    }

    /// Mutable access to the node records.
    #[inline]
    pub fn nodes_mut(&mut self) -> &mut [NxNode] {
        &mut self.nodes
    }

    /// The string table.
    #[inline]
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Mutable access to the string table.
    #[inline]
    pub fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    /// Both halves at once, for passes that rewrite nodes while reading
    /// string contents.
    #[inline]
    pub fn nodes_and_strings_mut(&mut self) -> (&mut [NxNode], &StringTable) {
        (&mut self.nodes, &self.strings)
    }

    /// Number of nodes.
    #[inline]
    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Claim a child range for `parent`: record the range on the parent,
    /// append `count` zeroed records, and register the range for the
    /// final sibling sort. Returns the index of the first child.
    pub fn alloc_children(&mut self, parent: u32, count: u16) -> u32 {
        let first = self.nodes.len() as u32;
        let p = &mut self.nodes[parent as usize];
        p.first_child = first;
        p.child_count = count;
        self.nodes
            .resize(self.nodes.len() + count as usize, NxNode::default());
        self.unsorted.push((first, count));
        first
    }

    /// Sort every registered sibling range by name.
    ///
    /// The order is byte-wise comparison with shorter strings first on a
    /// tie, which is exactly slice ordering on the name bytes. Two
    /// siblings with identical names are a hard error: the written file
    /// could not be binary-searched.
    pub fn sort_siblings(&mut self) -> Result<()> {
        let Self {
            nodes,
            strings,
            unsorted,
        } = self;

        for &(first, count) in unsorted.iter() {
            let start = first as usize;
            let range = &mut nodes[start..start + count as usize];
            range.sort_unstable_by(|a, b| strings.bytes(a.name).cmp(strings.bytes(b.name)));
            for pair in range.windows(2) {
                let name = strings.bytes(pair[0].name);
                if name == strings.bytes(pair[1].name) {
                    return Err(Error::DuplicateSibling {
                        name: String::from_utf8_lossy(name).into_owned(),
                    });
                }
            }
        }
        unsorted.clear();
        Ok(())
    }

    /// The output layout for the current node and string counts.
    pub fn layout(&self) -> Layout {
        Layout::compute(
            self.node_count(),
            self.strings.len() as u32,
            self.strings.total_bytes(),
        )
    }

    /// Check the structural invariants of a finished tree.
    ///
    /// Intended for tests and debugging: child ranges in bounds and
    /// non-overlapping, sibling ranges strictly sorted, no unresolved
    /// links, every referenced string ID in range, the empty string at
    /// ID 0, the root at index 0 with name 0.
    pub fn verify(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Invariant(msg));

        if self.strings.len() == 0 || !self.strings.bytes(0).is_empty() {
            return fail("string 0 is not the empty string".into());
        }
        let root = match self.nodes.first() {
            Some(root) => root,
            None => return fail("node table is empty".into()),
        };
        if root.name != 0 {
            return fail("root node is named".into());
        }

        let node_count = self.nodes.len() as u64;
        let string_count = self.strings.len() as u32;
        let mut claimed = vec![false; self.nodes.len()];
        let mut seen_ranges = std::collections::HashSet::new();

        for (index, node) in self.nodes.iter().enumerate() {
            let first = u64::from(node.first_child);
            let count = u64::from(node.child_count);
            if first + count > node_count {
                return fail(format!("node {index} child range out of bounds"));
            }
            if node.name >= string_count {
                return fail(format!("node {index} name id out of range"));
            }
            match node.kind() {
                NodeKind::Uol => {
                    return fail(format!("node {index} is an unresolved link"));
                }
                NodeKind::String => {
                    if node.string_id() >= string_count {
                        return fail(format!("node {index} string id out of range"));
                    }
                }
                _ => {}
            }
            // A resolved link shares its target's whole range; only a
            // partial overlap between different ranges is an error.
            if count > 0 && seen_ranges.insert((node.first_child, node.child_count)) {
                for child in first..first + count {
                    let child = child as usize;
                    if child == 0 {
                        return fail(format!("node {index} claims the root as a child"));
                    }
                    if claimed[child] {
                        return fail(format!("node {child} appears in two sibling ranges"));
                    }
                    claimed[child] = true;
                }
            }
            if count > 1 {
                for pair in self.nodes[first as usize..(first + count) as usize].windows(2) {
                    if self.strings.bytes(pair[0].name) >= self.strings.bytes(pair[1].name) {
                        return fail(format!("node {index} has unsorted children"));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for NxTree {
    fn default() -> Self {
        Self::new()
    }
}
