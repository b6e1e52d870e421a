//! Region keystreams and trial key selection.
//!
//! Encrypted strings are XORed with a 128 KiB region-specific keystream
//! plus a walking mask. Which region an archive uses is not recorded
//! anywhere; it is discovered by trial-decrypting the first encrypted
//! string and checking for printable ASCII.
//!
//! The keystreams are expanded at startup from compact constants instead
//! of being embedded as tables: AES-256-ECB over a fixed expansion key,
//! chaining encrypted blocks starting from the region's 4-byte IV
//! repeated to a block. The all-zero IV variant is the all-zero
//! keystream. Expansion is deterministic, so selection behaves exactly
//! as fixed tables would.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;

/// Keystream length in bytes: 64 Ki 16-bit values.
pub const KEY_LEN: usize = 0x2_0000;

/// The AES-256 key the client expands string keystreams from. Hardcoded
/// in the client; not a secret.
const EXPANSION_KEY: [u8; 32] = [
    0x13, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0xB4, 0x00, 0x00,
    0x00, 0x1B, 0x00, 0x00, 0x00, 0x0F, 0x00, 0x00, 0x00, 0x33, 0x00, 0x00, 0x00, 0x52, 0x00,
    0x00, 0x00,
];

/// The region variants a WZ archive can be keyed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Region {
    /// No string obfuscation beyond the walking mask.
    Classic = 0,
    /// The global client.
    Global = 1,
    /// The overseas clients.
    Sea = 2,
}

impl Region {
    /// All variants, in trial order. Selection keeps the last match.
    pub const ALL: [Region; 3] = [Region::Classic, Region::Global, Region::Sea];

    fn iv(self) -> [u8; 4] {
        match self {
            Region::Classic => [0x00, 0x00, 0x00, 0x00],
            Region::Global => [0x4D, 0x23, 0xC7, 0x2B],
            Region::Sea => [0xB9, 0x7D, 0x63, 0xE9],
        }
    }
}

/// One region's 128 KiB XOR keystream.
pub struct WzKey {
    bytes: Box<[u8]>,
}

impl WzKey {
    fn expand(iv: [u8; 4]) -> Self {
        let mut bytes = vec![0u8; KEY_LEN];
        if iv != [0; 4] {
            let cipher = Aes256::new(GenericArray::from_slice(&EXPANSION_KEY));
            let mut block = GenericArray::from([0u8; 16]);
            for chunk in block.chunks_exact_mut(4) {
                chunk.copy_from_slice(&iv);
            }
            for out in bytes.chunks_exact_mut(16) {
                cipher.encrypt_block(&mut block);
                out.copy_from_slice(&block);
            }
        }
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Keystream byte at `index`.
    #[inline]
    pub fn u8_at(&self, index: usize) -> u8 {
        self.bytes[index]
    }

    /// Keystream 16-bit value at `index` (little-endian pair).
    #[inline]
    pub fn u16_at(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.bytes[2 * index], self.bytes[2 * index + 1]])
    }

    /// Decode byte `index` of an ASCII-masked string. XOR, so encoding
    /// is the same operation.
    #[inline]
    pub fn decode_ascii(&self, index: usize, byte: u8) -> u8 {
        byte ^ self.u8_at(index) ^ 0xAAu8.wrapping_add(index as u8)
    }

    /// Decode code unit `index` of a UTF-16-masked string. XOR, so
    /// encoding is the same operation.
    #[inline]
    pub fn decode_utf16(&self, index: usize, unit: u16) -> u16 {
        unit ^ self.u16_at(index) ^ 0xAAAAu16.wrapping_add(index as u16)
    }
}

/// The outcome of trial key selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// The selected region (the last valid candidate).
    pub region: Region,
    /// More than one candidate decoded to printable ASCII.
    pub ambiguous: bool,
}

/// All three region keystreams.
pub struct KeyRing {
    keys: [WzKey; 3],
}

impl KeyRing {
    /// Expand all three keystreams.
    pub fn new() -> Self {
        Self {
            keys: Region::ALL.map(|r| WzKey::expand(r.iv())),
        }
    }

    /// The keystream for `region`.
    #[inline]
    pub fn key(&self, region: Region) -> &WzKey {
        &self.keys[region as usize]
    }

    /// Trial-decrypt an ASCII-masked cipher with every candidate key.
    ///
    /// A candidate is valid iff every decoded byte is printable ASCII
    /// (`0x20..0x80`). Returns `None` when no candidate is valid; when
    /// several are, the last one wins and the selection is flagged
    /// ambiguous.
    pub fn select(&self, cipher: &[u8]) -> Option<Selection> {
        let mut selected = None;
        let mut matches = 0u32;
        for region in Region::ALL {
            let key = self.key(region);
            let valid = cipher
                .iter()
                .enumerate()
                .all(|(i, &b)| (0x20..0x80).contains(&key.decode_ascii(i, b)));
            if valid {
                selected = Some(region);
                matches += 1;
            }
        }
        selected.map(|region| Selection {
            region,
            ambiguous: matches > 1,
        })
    }
}

impl Default for KeyRing {
    fn default() -> Self {
        Self::new()
    }
}
