//! Common utilities for Veles.
//!
//! This crate provides the foundational pieces shared by the WZ and NX
//! crates:
//!
//! - [`ByteCursor`] - Bounds-checked little-endian reading over a byte slice
//! - [`ByteArena`] - Append-only byte storage with stable offsets
//! - [`Error`] - Shared error type

mod arena;
mod error;
mod reader;

pub use arena::ByteArena;
pub use error::{Error, Result};
pub use reader::ByteCursor;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
