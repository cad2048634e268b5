//! Low-level I/O primitives shared by the parsers and serializers.
//!
//! Readers take the stream's endianness as a `le` flag; each reads exactly
//! the bytes it promises or returns an error. A short stream surfaces as
//! [`Error::Truncated`].
//!
//! [`PatchWriter`] is the write-side counterpart: an in-memory sink that
//! records named placeholders and overwrites them once the value they
//! refer to (usually a position later in the stream) is known.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::io::Read;

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};

use crate::{Error, Result};

/// Read one unsigned byte.
#[inline]
pub(crate) fn u8<R: Read>(r: &mut R) -> Result<u8> {
    Ok(r.read_u8()?)
}

/// Read one signed byte.
#[inline]
pub(crate) fn i8<R: Read>(r: &mut R) -> Result<i8> {
    Ok(r.read_i8()?)
}

/// Read a `u32` with caller-supplied endianness.
#[inline]
pub(crate) fn end_u32<R: Read>(r: &mut R, le: bool) -> Result<u32> {
    Ok(if le {
        r.read_u32::<LittleEndian>()?
    } else {
        r.read_u32::<BigEndian>()?
    })
}

/// Read an `i32` with caller-supplied endianness.
#[inline]
pub(crate) fn end_i32<R: Read>(r: &mut R, le: bool) -> Result<i32> {
    Ok(if le {
        r.read_i32::<LittleEndian>()?
    } else {
        r.read_i32::<BigEndian>()?
    })
}

/// Read an `i64` with caller-supplied endianness.
#[inline]
pub(crate) fn end_i64<R: Read>(r: &mut R, le: bool) -> Result<i64> {
    Ok(if le {
        r.read_i64::<LittleEndian>()?
    } else {
        r.read_i64::<BigEndian>()?
    })
}

/// Read an `i32` count or length field, rejecting negative values.
#[inline]
pub(crate) fn end_count<R: Read>(r: &mut R, le: bool, what: &'static str) -> Result<usize> {
    let v = end_i32(r, le)?;
    usize::try_from(v).map_err(|_| Error::Parse(what))
}

/// Read exactly `N` bytes into a fixed-size array.
#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Read exactly `len` bytes into a `Vec`.
///
/// The buffer grows as data arrives so that a corrupt length field cannot
/// force a huge up-front allocation.
#[inline]
pub(crate) fn bytesv<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut b = Vec::with_capacity(len.min(MAX_PREALLOC));
    r.take(len as u64).read_to_end(&mut b)?;
    if b.len() != len {
        return Err(Error::Truncated);
    }
    Ok(b)
}

/// Verify that the next `N` bytes in the stream match `expected`.
///
/// Returns [`Error::BadMagic`] on mismatch.
#[inline]
pub(crate) fn magic<R: Read, const N: usize>(r: &mut R, expected: &[u8; N]) -> Result<()> {
    let got = bytesa::<N>(r)?;
    if &got != expected {
        return Err(Error::BadMagic);
    }
    Ok(())
}

/// Upper bound for capacity hints taken from untrusted count fields.
pub(crate) const MAX_PREALLOC: usize = 0x1_0000;

#[derive(Debug, Clone, Copy)]
enum Width {
    I32,
    I64,
}

/// Growable, position-tracked output buffer with named patch sites.
///
/// `K` names a placeholder; each name may be reserved once and must be
/// resolved exactly once before [`PatchWriter::finish`].
pub(crate) struct PatchWriter<K> {
    buf: Vec<u8>,
    le: bool,
    sites: HashMap<K, (usize, Width)>,
}

impl<K: Hash + Eq + Copy + Debug> PatchWriter<K> {
    pub(crate) fn new(le: bool) -> Self {
        Self {
            buf: Vec::new(),
            le,
            sites: HashMap::new(),
        }
    }

    /// Current write position (equal to the number of bytes written).
    pub(crate) fn position(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    pub(crate) fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub(crate) fn u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        if self.le {
            LittleEndian::write_u32(&mut b, v);
        } else {
            BigEndian::write_u32(&mut b, v);
        }
        self.bytes(&b);
    }

    pub(crate) fn i32(&mut self, v: i32) {
        self.u32(v as u32);
    }

    pub(crate) fn i64(&mut self, v: i64) {
        let mut b = [0u8; 8];
        if self.le {
            LittleEndian::write_i64(&mut b, v);
        } else {
            BigEndian::write_i64(&mut b, v);
        }
        self.bytes(&b);
    }

    /// Write a count or length as an `i32`.
    pub(crate) fn count(&mut self, n: usize) -> Result<()> {
        let v = i32::try_from(n).map_err(|_| Error::Parse("count exceeds 32-bit field"))?;
        self.i32(v);
        Ok(())
    }

    /// Reserve four zero bytes for a later 32-bit value.
    pub(crate) fn reserve_i32(&mut self, site: K) {
        self.reserve(site, Width::I32);
    }

    /// Reserve eight zero bytes for a later 64-bit value.
    pub(crate) fn reserve_i64(&mut self, site: K) {
        self.reserve(site, Width::I64);
    }

    fn reserve(&mut self, site: K, width: Width) {
        let pos = self.position();
        let prev = self.sites.insert(site, (pos, width));
        debug_assert!(prev.is_none(), "patch site {site:?} reserved twice");
        match width {
            Width::I32 => self.i32(0),
            Width::I64 => self.i64(0),
        }
    }

    /// Resolve `site` with the current write position.
    pub(crate) fn patch_here(&mut self, site: K) -> Result<()> {
        let pos = self.position() as i64;
        self.patch(site, pos)
    }

    /// Resolve `site` with an explicit value.
    pub(crate) fn patch(&mut self, site: K, value: i64) -> Result<()> {
        let (pos, width) = self
            .sites
            .remove(&site)
            .ok_or(Error::Parse("patch site was never reserved"))?;
        match width {
            Width::I32 => {
                let v = i32::try_from(value)
                    .map_err(|_| Error::Parse("offset exceeds 32-bit field"))?;
                let slot = &mut self.buf[pos..pos + 4];
                if self.le {
                    LittleEndian::write_i32(slot, v);
                } else {
                    BigEndian::write_i32(slot, v);
                }
            }
            Width::I64 => {
                let slot = &mut self.buf[pos..pos + 8];
                if self.le {
                    LittleEndian::write_i64(slot, value);
                } else {
                    BigEndian::write_i64(slot, value);
                }
            }
        }
        Ok(())
    }

    /// Return the finished buffer, failing if any placeholder is unresolved.
    pub(crate) fn finish(self) -> Result<Vec<u8>> {
        if !self.sites.is_empty() {
            return Err(Error::Parse("unresolved patch site"));
        }
        Ok(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Site {
        A,
        B,
    }

    #[test]
    fn patch_sites_are_backfilled() {
        let mut w = PatchWriter::new(true);
        w.reserve_i32(Site::A);
        w.reserve_i64(Site::B);
        w.u8(0xAA);
        w.patch_here(Site::A).unwrap();
        w.patch(Site::B, -2).unwrap();
        let buf = w.finish().unwrap();

        assert_eq!(buf.len(), 13);
        let mut r = Cursor::new(&buf);
        assert_eq!(end_i32(&mut r, true).unwrap(), 13);
        assert_eq!(end_i64(&mut r, true).unwrap(), -2);
        assert_eq!(u8(&mut r).unwrap(), 0xAA);
    }

    #[test]
    fn big_endian_patch() {
        let mut w = PatchWriter::new(false);
        w.reserve_i32(Site::A);
        w.patch(Site::A, 0x0102_0304).unwrap();
        assert_eq!(w.finish().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn unresolved_site_is_an_error() {
        let mut w = PatchWriter::new(true);
        w.reserve_i32(Site::A);
        assert!(matches!(w.finish(), Err(Error::Parse(_))));
    }

    #[test]
    fn oversized_value_for_32_bit_site() {
        let mut w = PatchWriter::new(true);
        w.reserve_i32(Site::A);
        assert!(w.patch(Site::A, i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn short_reads_are_truncated() {
        let mut r = Cursor::new([0u8; 3]);
        assert!(matches!(end_i32(&mut r, true), Err(Error::Truncated)));
        let mut r = Cursor::new([0u8; 3]);
        assert!(matches!(bytesv(&mut r, 4), Err(Error::Truncated)));
    }

    #[test]
    fn negative_count_rejected() {
        let mut r = Cursor::new((-1i32).to_le_bytes());
        assert!(matches!(end_count(&mut r, true, "count"), Err(Error::Parse(_))));
    }
}
