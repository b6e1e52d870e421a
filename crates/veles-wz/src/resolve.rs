//! Symbolic-link resolution.
//!
//! Link nodes carry a slash-separated path (with `..` steps) relative to
//! their parent. After all images are parsed, a single depth-first pass
//! rewrites each link into a copy of its target's value and child range;
//! the link keeps its own name. A path that cannot be walked — or that
//! loops — collapses the link to a payload-free node, the one soft
//! failure of the whole conversion.

use rustc_hash::FxHashSet;

use veles_nx::{NodeKind, NxNode, StringTable};

/// Resolve every link node in `nodes` in place.
pub(crate) fn resolve_links(nodes: &mut [NxNode], strings: &StringTable) {
    let mut converted = FxHashSet::default();
    let mut in_flight = FxHashSet::default();
    let mut ancestors: Vec<&[u8]> = Vec::new();
    visit(
        nodes,
        strings,
        0,
        &mut ancestors,
        &mut converted,
        &mut in_flight,
    );
}

fn visit<'s>(
    nodes: &mut [NxNode],
    strings: &'s StringTable,
    index: u32,
    ancestors: &mut Vec<&'s [u8]>,
    converted: &mut FxHashSet<u32>,
    in_flight: &mut FxHashSet<u32>,
) {
    let node = nodes[index as usize];
    if node.kind() == NodeKind::Uol {
        resolve_chain(nodes, strings, index, ancestors, converted, in_flight);
        return;
    }
    if converted.contains(&index) {
        // A former link: its children are the target's and get visited
        // at their own position.
        return;
    }
    if index != 0 {
        ancestors.push(strings.bytes(node.name));
    }
    for i in 0..u32::from(node.child_count) {
        visit(
            nodes,
            strings,
            node.first_child + i,
            ancestors,
            converted,
            in_flight,
        );
    }
    if index != 0 {
        ancestors.pop();
    }
}

/// Resolve the link at `link`, whose ancestors (root excluded) are named
/// by `base`. Recurses when the target is itself an unresolved link; a
/// revisited node means a cycle and collapses.
fn resolve_chain<'s>(
    nodes: &mut [NxNode],
    strings: &'s StringTable,
    link: u32,
    base: &[&'s [u8]],
    converted: &mut FxHashSet<u32>,
    in_flight: &mut FxHashSet<u32>,
) {
    if !in_flight.insert(link) {
        nodes[link as usize].clear_value();
        converted.insert(link);
        return;
    }

    // The link's absolute target path: ancestors, then the path string
    // with `..` popping a segment.
    let mut segments: Vec<&[u8]> = base.to_vec();
    let path = strings.bytes(nodes[link as usize].string_id());
    for part in path.split(|&b| b == b'/') {
        if part == b".." {
            segments.pop();
        } else {
            segments.push(part);
        }
    }

    let mut current = 0u32;
    let mut found = true;
    'walk: for segment in &segments {
        let node = nodes[current as usize];
        for i in 0..u32::from(node.child_count) {
            let child = node.first_child + i;
            if strings.bytes(nodes[child as usize].name) == *segment {
                current = child;
                continue 'walk;
            }
        }
        found = false;
        break;
    }

    if !found {
        nodes[link as usize].clear_value();
    } else {
        if nodes[current as usize].kind() == NodeKind::Uol {
            // The target is itself a link; the walk just spelled out its
            // absolute path, so resolve it first.
            let parent = &segments[..segments.len() - 1];
            resolve_chain(nodes, strings, current, parent, converted, in_flight);
        }
        let target = nodes[current as usize];
        nodes[link as usize].adopt_value(&target);
    }
    converted.insert(link);
    in_flight.remove(&link);
}
