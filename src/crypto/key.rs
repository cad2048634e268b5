//! AES-128 key descriptors and partial-range decryption.
//!
//! A key record carries a 16-byte AES key and the list of byte ranges of the
//! file that are ciphertext. Each range is transformed with AES-128 in ECB
//! mode (zero IV, no padding); bytes outside every range are stored in the
//! clear and are never touched.
//!
//! ## Record layout
//! ```text
//! [0x00] Key          (16 bytes)
//! [0x10] RangeCount   (i32)
//! [0x14] Ranges       (RangeCount × (i64 start, i64 end))
//! ```
//!
//! Every function here builds its own cipher from the key it is given, so
//! decrypting different files from different threads needs no locking.

use std::io::Read;

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use super::range::{Range, active_spans, read_ranges, write_ranges};
use crate::utils::{PatchWriter, bytesa};
use crate::{Error, Result};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// AES key plus the ranges of a file that are encrypted with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub key: [u8; 16],
    pub ranges: Vec<Range>,
}

impl KeyDescriptor {
    pub fn new(key: [u8; 16], ranges: Vec<Range>) -> Self {
        Self { key, ranges }
    }

    /// Decrypt every non-sentinel range of `buf` in place.
    pub fn decrypt(&self, buf: &mut [u8]) -> Result<()> {
        decrypt_ranges(&self.key, &self.ranges, buf)
    }

    /// Encrypt every non-sentinel range of `buf` in place.
    ///
    /// Inverse of [`KeyDescriptor::decrypt`] over the same ranges.
    pub fn encrypt(&self, buf: &mut [u8]) -> Result<()> {
        encrypt_ranges(&self.key, &self.ranges, buf)
    }

    /// Parse a key record from `r`.
    pub fn parse<R: Read>(r: &mut R, big_endian: bool) -> Result<Self> {
        Self::read(r, !big_endian)
    }

    /// Serialize this record on its own.
    pub fn serialize(&self, big_endian: bool) -> Result<Vec<u8>> {
        let mut w = PatchWriter::<()>::new(!big_endian);
        self.write(&mut w)?;
        w.finish()
    }

    pub(crate) fn read<R: Read>(r: &mut R, le: bool) -> Result<Self> {
        let key = bytesa::<16>(r)?;
        let ranges = read_ranges(r, le)?;
        Ok(Self { key, ranges })
    }

    pub(crate) fn write<K>(&self, w: &mut PatchWriter<K>) -> Result<()>
    where
        K: std::hash::Hash + Eq + Copy + std::fmt::Debug,
    {
        w.bytes(&self.key);
        write_ranges(w, &self.ranges)
    }
}

/// Decrypt `ranges` of `buf` in place with AES-128-ECB under `key`.
///
/// Ranges are validated before any byte is modified: a range that leaves
/// the buffer, or whose length is not a multiple of [`AES_BLOCK_SIZE`],
/// fails with [`Error::InvalidRange`] and `buf` is left as it was.
pub fn decrypt_ranges(key: &[u8; 16], ranges: &[Range], buf: &mut [u8]) -> Result<()> {
    let spans = cipher_spans(ranges, buf.len())?;
    let cipher = Aes128::new(&GenericArray::from(*key));
    for span in spans {
        for block in buf[span].chunks_exact_mut(AES_BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
    }
    Ok(())
}

/// Encrypt `ranges` of `buf` in place with AES-128-ECB under `key`.
pub fn encrypt_ranges(key: &[u8; 16], ranges: &[Range], buf: &mut [u8]) -> Result<()> {
    let spans = cipher_spans(ranges, buf.len())?;
    let cipher = Aes128::new(&GenericArray::from(*key));
    for span in spans {
        for block in buf[span].chunks_exact_mut(AES_BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
    }
    Ok(())
}

fn cipher_spans(ranges: &[Range], len: usize) -> Result<Vec<std::ops::Range<usize>>> {
    let spans = active_spans(ranges, len)?;
    // Sentinels are already gone, so every span here is non-empty.
    for (span, range) in spans.iter().zip(ranges.iter().filter(|r| !r.is_sentinel())) {
        if span.len() % AES_BLOCK_SIZE != 0 {
            return Err(Error::InvalidRange {
                start: range.start,
                end: range.end,
                len,
            });
        }
    }
    Ok(spans)
}
