//! Error types for veles-wz.

use thiserror::Error;

/// Error type for WZ parsing and conversion.
///
/// Every variant is fatal to the conversion; the only soft failure in the
/// pipeline is an unresolvable link, which collapses in place instead of
/// erroring.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not a WZ archive.
    #[error("not a WZ archive: bad magic {0:#010x}")]
    InvalidMagic(u32),

    /// No candidate key decrypts the oracle string to printable ASCII.
    #[error("failed to identify the locale")]
    LocaleNotFound,

    /// Key deduction needs an ASCII-masked string and got something else.
    #[error("expected an ascii-masked string for key deduction")]
    OracleString,

    /// Directory entry type 1, which no known archive produces.
    #[error("found the elusive type 1 directory entry")]
    Type1Entry,

    /// Unknown directory entry type byte.
    #[error("unknown directory entry type {0}")]
    UnknownEntryType(u8),

    /// An indirect entry pointed at something that is neither a
    /// subdirectory nor an image.
    #[error("indirect directory entry resolved to type {0}")]
    IndirectEntryType(u8),

    /// Directory or image entry with a non-positive size.
    #[error("directory entry has invalid size {0}")]
    InvalidEntrySize(i32),

    /// A child count that cannot be stored in a node record.
    #[error("child count {0} out of range")]
    InvalidChildCount(i32),

    /// Unknown sub-property tag byte.
    #[error("unknown property tag {0:#04x}")]
    UnknownPropertyTag(u8),

    /// Unknown property-string tag byte.
    #[error("unknown property string tag {0:#04x}")]
    UnknownStringTag(u8),

    /// Unknown extended property type name.
    #[error("unknown extended property type {0:?}")]
    UnknownExtendedType(String),

    /// A decoded string length that does not fit the string table.
    #[error("string length {0} does not fit the string table")]
    StringTooLong(i64),

    /// Cursor or offset arithmetic error.
    #[error(transparent)]
    Common(#[from] veles_common::Error),

    /// NX-side error (sibling sort, layout, writing).
    #[error(transparent)]
    Nx(#[from] veles_nx::Error),
}

/// Result type alias using the WZ Error type.
pub type Result<T> = std::result::Result<T, Error>;
