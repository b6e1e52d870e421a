//! The fixed-width node record.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of one node record on disk.
pub const NODE_LEN: usize = 20;

/// What a node's payload holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NodeKind {
    /// No payload (pure container, or a collapsed link).
    None = 0,
    /// Signed 64-bit integer.
    Integer = 1,
    /// 64-bit float.
    Real = 2,
    /// Interned string ID.
    String = 3,
    /// Pair of signed 32-bit coordinates.
    Vector = 4,
    /// Bitmap reference: ID plus width and height.
    Bitmap = 5,
    /// Audio reference: ID plus length in milliseconds.
    Audio = 6,
    /// Symbolic link carrying a path string ID. Transient: a finished
    /// tree contains none of these.
    Uol = 7,
}

impl NodeKind {
    /// Decode a raw kind value.
    pub fn from_raw(raw: u16) -> Option<NodeKind> {
        Some(match raw {
            0 => NodeKind::None,
            1 => NodeKind::Integer,
            2 => NodeKind::Real,
            3 => NodeKind::String,
            4 => NodeKind::Vector,
            5 => NodeKind::Bitmap,
            6 => NodeKind::Audio,
            7 => NodeKind::Uol,
            _ => return None,
        })
    }
}

/// One 20-byte node record, exactly as it appears in an NX file.
///
/// The payload is an 8-byte field interpreted per [`NodeKind`]; the typed
/// accessors below read and write it little-endian, so the in-memory table
/// can be byte-cast straight into the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct NxNode {
    /// Intern ID of the node's name (0 for the root).
    pub name: u32,
    /// Index of the first child in the node table.
    pub first_child: u32,
    /// Number of children.
    pub child_count: u16,
    kind: u16,
    data: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<NxNode>() == NODE_LEN);

impl Default for NxNode {
    fn default() -> Self {
        Self {
            name: 0,
            first_child: 0,
            child_count: 0,
            kind: 0,
            data: [0; 8],
        }
    }
}

impl NxNode {
    /// The node's kind. Unknown raw values read as [`NodeKind::None`].
    #[inline]
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_raw(self.kind).unwrap_or(NodeKind::None)
    }

    /// The raw kind value.
    #[inline]
    pub fn kind_raw(&self) -> u16 {
        self.kind
    }

    /// Integer payload.
    #[inline]
    pub fn integer(&self) -> i64 {
        i64::from_le_bytes(self.data)
    }

    /// Real payload.
    #[inline]
    pub fn real(&self) -> f64 {
        f64::from_le_bytes(self.data)
    }

    /// String ID payload (kinds `String` and `Uol`).
    #[inline]
    pub fn string_id(&self) -> u32 {
        u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
    }

    /// Vector payload.
    #[inline]
    pub fn vector(&self) -> (i32, i32) {
        (
            i32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]),
            i32::from_le_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]),
        )
    }

    /// Bitmap payload: `(id, width, height)`.
    #[inline]
    pub fn bitmap(&self) -> (u32, u16, u16) {
        (
            u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]),
            u16::from_le_bytes([self.data[4], self.data[5]]),
            u16::from_le_bytes([self.data[6], self.data[7]]),
        )
    }

    /// Audio payload: `(id, length_ms)`.
    #[inline]
    pub fn audio(&self) -> (u32, u32) {
        (
            u32::from_le_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]),
            u32::from_le_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]),
        )
    }

    /// Make this an integer node.
    #[inline]
    pub fn set_integer(&mut self, value: i64) {
        self.kind = NodeKind::Integer as u16;
        self.data = value.to_le_bytes();
    }

    /// Make this a real node.
    #[inline]
    pub fn set_real(&mut self, value: f64) {
        self.kind = NodeKind::Real as u16;
        self.data = value.to_le_bytes();
    }

    /// Make this a string node.
    #[inline]
    pub fn set_string(&mut self, id: u32) {
        self.kind = NodeKind::String as u16;
        self.data = [0; 8];
        self.data[..4].copy_from_slice(&id.to_le_bytes());
    }

    /// Make this a vector node.
    #[inline]
    pub fn set_vector(&mut self, x: i32, y: i32) {
        self.kind = NodeKind::Vector as u16;
        self.data[..4].copy_from_slice(&x.to_le_bytes());
        self.data[4..].copy_from_slice(&y.to_le_bytes());
    }

    /// Make this a bitmap node.
    #[inline]
    pub fn set_bitmap(&mut self, id: u32, width: u16, height: u16) {
        self.kind = NodeKind::Bitmap as u16;
        self.data[..4].copy_from_slice(&id.to_le_bytes());
        self.data[4..6].copy_from_slice(&width.to_le_bytes());
        self.data[6..].copy_from_slice(&height.to_le_bytes());
    }

    /// Make this an audio node.
    #[inline]
    pub fn set_audio(&mut self, id: u32, length_ms: u32) {
        self.kind = NodeKind::Audio as u16;
        self.data[..4].copy_from_slice(&id.to_le_bytes());
        self.data[4..].copy_from_slice(&length_ms.to_le_bytes());
    }

    /// Make this an unresolved link node carrying a path string.
    #[inline]
    pub fn set_link(&mut self, path_id: u32) {
        self.kind = NodeKind::Uol as u16;
        self.data = [0; 8];
        self.data[..4].copy_from_slice(&path_id.to_le_bytes());
    }

    /// Copy another node's kind, child range, and raw payload. The name
    /// is deliberately left alone: a resolved link keeps its own name.
    #[inline]
    pub fn adopt_value(&mut self, other: &NxNode) {
        self.kind = other.kind;
        self.first_child = other.first_child;
        self.child_count = other.child_count;
        self.data = other.data;
    }

    /// Collapse to a payload-free node, keeping name and child range.
    #[inline]
    pub fn clear_value(&mut self) {
        self.kind = NodeKind::None as u16;
        self.data = [0; 8];
    }
}
