//! WZ archive parsing and one-shot conversion to NX.
//!
//! WZ is a hierarchical, XOR-obfuscated container: a breadth-first
//! directory section followed by self-contained "images", each a
//! depth-first property tree with encrypted names, symbolic links, and a
//! region-specific keystream that has to be discovered by trial
//! decryption. [`Converter`] walks all of it into a [`veles_nx::NxTree`],
//! which the NX writer then lays out as a flat file.
//!
//! # Example
//!
//! ```no_run
//! use veles_wz::{Converter, WzFile};
//! use veles_nx::NxWriter;
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

mod convert;
mod directory;
mod error;
mod file;
mod keys;
mod property;
mod resolve;

pub use convert::Converter;
pub use error::{Error, Result};
pub use file::{WzFile, WZ_MAGIC};
pub use keys::{KeyRing, Region, Selection, WzKey, KEY_LEN};
