//! Opening WZ archives.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::Result;

/// WZ magic, "PKG1".
pub const WZ_MAGIC: u32 = 0x3147_4B50;

/// A read-mapped WZ archive.
///
/// The mapping stays alive for the whole conversion and unmaps on drop,
/// on every exit path. Header validation happens in
/// [`Converter::new`](crate::Converter::new), which works on any byte
/// slice so tests can feed in-memory archives.
pub struct WzFile {
    mmap: Mmap,
}

impl WzFile {
    /// Open and map an archive read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        // The conversion reads front to back; the advice is best-effort.
        #[cfg(unix)]
        let _ = mmap.advise(memmap2::Advice::Sequential);
        Ok(Self { mmap })
    }

    /// The mapped bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.mmap
    }

    /// Size of the archive in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the file is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}
