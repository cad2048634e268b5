//! BDF3 - dvdbnd data blob.
//!
//! The companion of a [`HeaderIndex`](crate::formats::bhd5::HeaderIndex):
//! a large file holding the raw (possibly partially encrypted) bytes of every
//! indexed file. Beyond its four-byte signature the blob's layout is opaque;
//! it is addressed only by the `offset`/`padded_size` pairs stored in
//! [`FileEntry`] records.
//!
//! ## Layout
//! ```text
//! [0x00] Magic "BDF3"   (4 bytes)
//! [....] File data      (addressed by absolute offsets from the header)
//! ```

use std::io::{Read, Seek, SeekFrom, Take};

use crate::formats::bhd5::FileEntry;
use crate::utils::{bytesv, magic};
use crate::{Error, Result};

/// Signature at the start of every BDF3 data blob.
pub const MAGIC: &[u8; 4] = b"BDF3";

/// Reader over a BDF3 data blob.
///
/// Owns the underlying reader. Entry offsets are applied relative to the
/// position the blob started at when the reader was created.
pub struct Bdf3Reader<R> {
    inner: R,
    base: u64,
}

impl<R: Read + Seek> Bdf3Reader<R> {
    /// Check the BDF3 signature and wrap the provided reader.
    pub fn new(mut reader: R) -> Result<Self> {
        let base = reader.stream_position()?;
        magic(&mut reader, MAGIC)?;
        Ok(Self {
            inner: reader,
            base,
        })
    }

    /// Open an entry's stored bytes for streaming access, without
    /// decryption.
    ///
    /// Seeks to the entry's start and returns a [`Take`] limited to
    /// `padded_size` bytes. The borrow ends when the [`Take`] is dropped.
    pub fn read_file(&mut self, entry: &FileEntry) -> Result<Take<&mut R>> {
        self.seek_to(entry)?;
        let len = entry.padded_len()? as u64;
        Ok(self.inner.by_ref().take(len))
    }

    /// Read exactly `padded_size` bytes for `entry` and decrypt its key
    /// ranges.
    pub fn read_and_decrypt(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
        self.seek_to(entry)?;
        let mut buf = bytesv(&mut self.inner, entry.padded_len()?)?;
        entry.decrypt(&mut buf)?;
        Ok(buf)
    }

    /// Like [`Bdf3Reader::read_and_decrypt`], then check the entry's digest.
    ///
    /// Fails with [`Error::Integrity`] on a mismatch. Entries without a
    /// digest are returned unchecked.
    pub fn read_verified(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
        let buf = self.read_and_decrypt(entry)?;
        if !entry.verify(&buf)? {
            return Err(Error::Integrity {
                name_hash: entry.name_hash,
            });
        }
        Ok(buf)
    }

    /// Consume the reader, returning the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn seek_to(&mut self, entry: &FileEntry) -> Result<()> {
        let pos = self.absolute(entry)?;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn absolute(&self, entry: &FileEntry) -> Result<u64> {
        let offset =
            u64::try_from(entry.offset).map_err(|_| Error::Parse("negative data offset"))?;
        self.base
            .checked_add(offset)
            .ok_or(Error::Parse("data offset overflows"))
    }
}
