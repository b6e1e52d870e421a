//! Error types for veles-common.

use thiserror::Error;

/// Common error type for Veles operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// A computed offset left the addressable range.
    #[error("offset arithmetic overflowed: base {base} with displacement {displacement}")]
    OffsetOverflow { base: usize, displacement: i64 },
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
