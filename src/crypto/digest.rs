//! SHA-256 digest descriptors.
//!
//! A digest record holds a SHA-256 hash and the ranges of the decrypted file
//! that were fed to it, in order. Often only part of a file is hashed.
//!
//! ## Record layout
//! ```text
//! [0x00] Hash         (32 bytes)
//! [0x20] RangeCount   (i32)
//! [0x24] Ranges       (RangeCount × (i64 start, i64 end))
//! ```

use std::io::Read;

use sha2::{Digest, Sha256};

use super::range::{Range, active_spans, read_ranges, write_ranges};
use crate::Result;
use crate::utils::{PatchWriter, bytesa};

/// SHA-256 hash plus the ranges it was computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestDescriptor {
    pub hash: [u8; 32],
    pub ranges: Vec<Range>,
}

impl DigestDescriptor {
    pub fn new(hash: [u8; 32], ranges: Vec<Range>) -> Self {
        Self { hash, ranges }
    }

    /// Hash `ranges` of `buf` and build the matching descriptor.
    pub fn compute(ranges: Vec<Range>, buf: &[u8]) -> Result<Self> {
        let hash = hash_ranges(&ranges, buf)?;
        Ok(Self { hash, ranges })
    }

    /// Recompute the hash over this descriptor's ranges of `buf` and
    /// compare it with the stored one.
    ///
    /// Out-of-bounds ranges are an error, not a mismatch.
    pub fn matches(&self, buf: &[u8]) -> Result<bool> {
        Ok(hash_ranges(&self.ranges, buf)? == self.hash)
    }

    /// Parse a digest record from `r`.
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
        let hash = bytesa::<32>(r)?;
        let ranges = read_ranges(r, le)?;
        Ok(Self { hash, ranges })
    }

    pub(crate) fn write<K>(&self, w: &mut PatchWriter<K>) -> Result<()>
    where
        K: std::hash::Hash + Eq + Copy + std::fmt::Debug,
    {
        w.bytes(&self.hash);
        write_ranges(w, &self.ranges)
    }
}

/// SHA-256 over the concatenation of every non-sentinel range of `buf`.
pub fn hash_ranges(ranges: &[Range], buf: &[u8]) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    for span in active_spans(ranges, buf.len())? {
        hasher.update(&buf[span]);
    }
    Ok(hasher.finalize().into())
}
