//! Veles - WZ to NX game archive conversion.
//!
//! This crate is the unified interface to the Veles library ecosystem.
//!
//! # Crates
//!
//! - [`veles_common`] - Byte cursor, byte arena, shared errors
//! - [`veles_wz`] - WZ archive parsing, key deduction, conversion
//! - [`veles_nx`] - NX format: records, interning, layout, reader, writer
//!
//! # Example
//!
//! ```no_run
//! use veles::prelude::*;
//!
//! let wz = WzFile::open("Data.wz")?;
//! let tree = Converter::convert(wz.data())?;
//!
//! let mut writer = NxWriter::create("Data.nx", tree.layout())?;
//! writer.write_nodes(tree.nodes())?;
//! writer.write_strings(tree.strings())?;
//! writer.finish()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use veles_common as common;
pub use veles_nx as nx;
pub use veles_wz as wz;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use veles_common::{ByteArena, ByteCursor};
    pub use veles_nx::{Layout, NodeKind, NxNode, NxReader, NxTree, NxWriter};
    pub use veles_wz::{Converter, KeyRing, Region, WzFile};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
