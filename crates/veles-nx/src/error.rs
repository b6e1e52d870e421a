//! Error types for veles-nx.

use thiserror::Error;

/// Error type for NX reading, writing, and tree assembly.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid magic bytes encountered.
    #[error("invalid magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    /// A file section does not fit the available bytes.
    #[error("{section} section out of bounds")]
    Truncated { section: &'static str },

    /// A buffer or slice does not match the computed layout.
    #[error("layout mismatch: {what} is {actual}, layout says {expected}")]
    LayoutMismatch {
        what: &'static str,
        expected: u64,
        actual: u64,
    },

    /// String ID outside the string table.
    #[error("string id {id} out of range (table holds {count})")]
    StringRange { id: u32, count: u32 },

    /// Two siblings share a name.
    #[error("duplicate sibling name {name:?}")]
    DuplicateSibling { name: String },

    /// A finished tree violates a structural invariant.
    #[error("tree invariant violated: {0}")]
    Invariant(String),
}

/// Result type alias using the NX Error type.
pub type Result<T> = std::result::Result<T, Error>;
