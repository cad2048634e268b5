//! BHD5 - dvdbnd archive header.
//!
//! A dvdbnd archive is split in two: this header (`.bhd`) indexes the files
//! stored in a much larger companion data blob (`.bdt`, see
//! [`crate::formats::bdf3`]). Files are grouped into hash buckets by the
//! archive builder; each entry records where its bytes live in the blob and,
//! on later generations, how to decrypt and verify them.
//!
//! ## Layout
//! ```text
//! [0x00] Magic "BHD5"              (4 bytes)
//! [0x04] Endian marker             (i8: 0 = big, -1 = little)
//! [0x05] Flag                      (u8 bool)
//! [0x06] Reserved                  (2 bytes)
//! [0x08] Sentinel (always 1)       (i32)
//! [0x0C] TotalFileSize             (i32)
//! [0x10] BucketCount               (i32)
//! [0x14] BucketTableOffset         (i32)
//! [0x18] SaltLength                (i32)        V2+
//! [0x1C] Salt                      (ASCII, no padding) V2+
//! ```
//! All multi-byte integers follow the endian marker.
//!
//! ## Bucket descriptor (0x08 bytes)
//! ```text
//! [0x00] EntryCount        (i32)
//! [0x04] EntryTableOffset  (i32)
//! ```
//!
//! ## File entry
//! ```text
//! [0x00] NameHash          (u32)
//! [0x04] PaddedSize        (i32)
//! [0x08] DataOffset        (i64) - absolute offset in the data blob
//! [0x10] DigestOffset      (i64, 0 = none)  V2+
//! [0x18] KeyOffset         (i64, 0 = none)  V2+
//! [0x20] UnpaddedSize      (i64)            V3+
//! ```
//! Digest and key records ([`DigestDescriptor`], [`KeyDescriptor`]) are
//! stored out of line after all entry tables.
//!
//! ## Versions
//! The header does not say which generation it is; the caller supplies a
//! [`FormatVersion`] and parsing is gated on its [`Capabilities`].

use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, trace};

use crate::crypto::{DigestDescriptor, KeyDescriptor};
use crate::utils::{
    MAX_PREALLOC, PatchWriter, bytesa, bytesv, end_count, end_i32, end_i64, end_u32, i8, magic,
    u8,
};
use crate::{Error, Result};

/// Signature at the start of every BHD5 header.
pub const MAGIC: &[u8; 4] = b"BHD5";

/// On-disk generation of a BHD5 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// Baseline: name hash, padded size and data offset only.
    V1,
    /// Adds the salt string and digest/key record offsets.
    V2,
    /// Adds the unpadded file size.
    V3,
    /// Same field set as V3.
    V4,
}

impl FormatVersion {
    /// The optional fields this generation carries.
    pub fn capabilities(self) -> Capabilities {
        Capabilities {
            has_salt: self >= FormatVersion::V2,
            has_digest_key_offsets: self >= FormatVersion::V2,
            has_unpadded_size: self >= FormatVersion::V3,
        }
    }
}

/// Optional-field set derived once from a [`FormatVersion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub has_salt: bool,
    pub has_digest_key_offsets: bool,
    pub has_unpadded_size: bool,
}

/// Parsed BHD5 header index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    pub version: FormatVersion,
    pub big_endian: bool,
    /// Boolean byte following the endian marker.
    pub flag: bool,
    /// Salt for the external path-hashing routine. Present iff V2+.
    pub salt: Option<String>,
    pub buckets: Vec<Bucket>,
}

/// Hash-chain group of entries sharing `name_hash % bucket_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    pub entries: Vec<FileEntry>,
}

/// Metadata for one file stored in the data blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name_hash: u32,
    /// Size of the stored (block-padded) data.
    pub padded_size: i32,
    /// Absolute offset of the data in the blob.
    pub offset: i64,
    /// Real file size. Present iff V3+.
    pub unpadded_size: Option<i64>,
    pub digest: Option<DigestDescriptor>,
    pub key: Option<KeyDescriptor>,
}

impl HeaderIndex {
    /// Create an empty index for building a new archive.
    ///
    /// `salt` must be `Some` for V2+ and `None` for V1; [`HeaderIndex::validate`]
    /// enforces this before serialization.
    pub fn new(version: FormatVersion, big_endian: bool, salt: Option<String>) -> Self {
        Self {
            version,
            big_endian,
            flag: false,
            salt,
            buckets: Vec::new(),
        }
    }

    /// Create an index with `count` empty buckets.
    pub fn with_bucket_count(
        version: FormatVersion,
        big_endian: bool,
        salt: Option<String>,
        count: usize,
    ) -> Self {
        let mut index = Self::new(version, big_endian, salt);
        index.buckets = vec![Bucket::default(); count];
        index
    }

    pub fn capabilities(&self) -> Capabilities {
        self.version.capabilities()
    }

    /// Parse a BHD5 header from `r` as the given generation.
    ///
    /// The reader must be positioned at the BHD5 magic. Offsets inside the
    /// header are taken relative to that position. Any error aborts the
    /// whole parse; there is no partially-loaded index.
    pub fn parse<R: Read + Seek>(r: &mut R, version: FormatVersion) -> Result<Self> {
        let caps = version.capabilities();
        let base = r.stream_position()?;

        magic(r, MAGIC)?;
        let le = match i8(r)? {
            0 => false,
            -1 => true,
            m => return Err(Error::BadEndianMarker(m)),
        };
        let flag = u8(r)? != 0;
        let _reserved = bytesa::<2>(r)?;
        let sentinel = end_i32(r, le)?;
        if sentinel != 1 {
            return Err(Error::BadSentinel(sentinel));
        }
        let total_size = end_i32(r, le)?;
        let bucket_count = end_count(r, le, "negative bucket count")?;
        let buckets_offset = end_count(r, le, "negative bucket table offset")?;

        let salt = if caps.has_salt {
            let len = end_count(r, le, "negative salt length")?;
            let bytes = bytesv(r, len)?;
            if !bytes.is_ascii() {
                return Err(Error::Parse("salt is not ASCII"));
            }
            Some(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            None
        };

        debug!(
            ?version,
            big_endian = !le,
            total_size,
            bucket_count,
            "parsing BHD5 header"
        );

        r.seek(SeekFrom::Start(base + buckets_offset as u64))?;
        let mut descriptors = Vec::with_capacity(bucket_count.min(MAX_PREALLOC));
        for _ in 0..bucket_count {
            let count = end_count(r, le, "negative bucket entry count")?;
            let offset = end_count(r, le, "negative entry table offset")?;
            descriptors.push((count, offset));
        }

        let mut buckets = Vec::with_capacity(descriptors.len());
        for (i, (count, offset)) in descriptors.into_iter().enumerate() {
            trace!(bucket = i, entries = count, offset, "reading bucket");
            buckets.push(Bucket::read(r, base, le, caps, count, offset)?);
        }

        Ok(Self {
            version,
            big_endian: !le,
            flag,
            salt,
            buckets,
        })
    }

    /// Serialize the index.
    ///
    /// The layout is: fixed header, bucket descriptors, every bucket's entry
    /// table in order, then every entry's digest and key records in order.
    /// Offsets are backpatched once their targets are written. The result
    /// parses back to an equal index but need not match a historical file
    /// byte for byte.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let caps = self.capabilities();
        let le = !self.big_endian;
        let mut w = PatchWriter::new(le);

        w.bytes(MAGIC);
        w.i8(if le { -1 } else { 0 });
        w.u8(self.flag as u8);
        w.bytes(&[0, 0]);
        w.i32(1);
        w.reserve_i32(Site::TotalSize);
        w.count(self.buckets.len())?;
        w.reserve_i32(Site::BucketTable);
        if let Some(salt) = &self.salt {
            w.count(salt.len())?;
            w.bytes(salt.as_bytes());
        }

        w.patch_here(Site::BucketTable)?;
        for (i, bucket) in self.buckets.iter().enumerate() {
            w.count(bucket.entries.len())?;
            w.reserve_i32(Site::EntryTable(i));
        }

        for (i, bucket) in self.buckets.iter().enumerate() {
            w.patch_here(Site::EntryTable(i))?;
            for (j, entry) in bucket.entries.iter().enumerate() {
                entry.write(&mut w, caps, i, j);
            }
        }

        if caps.has_digest_key_offsets {
            for (i, bucket) in self.buckets.iter().enumerate() {
                for (j, entry) in bucket.entries.iter().enumerate() {
                    match &entry.digest {
                        Some(digest) => {
                            w.patch_here(Site::Digest(i, j))?;
                            digest.write(&mut w)?;
                        }
                        None => w.patch(Site::Digest(i, j), 0)?,
                    }
                    match &entry.key {
                        Some(key) => {
                            w.patch_here(Site::Key(i, j))?;
                            key.write(&mut w)?;
                        }
                        None => w.patch(Site::Key(i, j), 0)?,
                    }
                }
            }
        }

        let total = w.position() as i64;
        w.patch(Site::TotalSize, total)?;
        debug!(
            version = ?self.version,
            buckets = self.buckets.len(),
            total,
            "serialized BHD5 header"
        );
        w.finish()
    }

    /// Check that every optional field agrees with the declared version.
    pub fn validate(&self) -> Result<()> {
        let caps = self.capabilities();
        match (&self.salt, caps.has_salt) {
            (None, true) => return Err(Error::VersionMismatch("salt is required from V2")),
            (Some(_), false) => return Err(Error::VersionMismatch("salt is not allowed in V1")),
            (Some(salt), true) if !salt.is_ascii() => {
                return Err(Error::Parse("salt is not ASCII"));
            }
            _ => {}
        }
        for entry in self.entries() {
            entry.validate(caps)?;
        }
        Ok(())
    }

    /// Find the entry for `hash`, looking only in bucket `hash % bucket_count`.
    pub fn lookup(&self, hash: u32) -> Option<&FileEntry> {
        self.bucket_for(hash)?.lookup(hash)
    }

    /// The bucket `hash` belongs to, or [`None`] for an index with no buckets.
    pub fn bucket_for(&self, hash: u32) -> Option<&Bucket> {
        if self.buckets.is_empty() {
            return None;
        }
        self.buckets.get(hash as usize % self.buckets.len())
    }

    /// Append `entry` to bucket `entry.name_hash % bucket_count`.
    ///
    /// Returns the entry back if the index has no buckets.
    pub fn insert(&mut self, entry: FileEntry) -> std::result::Result<(), FileEntry> {
        let count = self.buckets.len();
        if count == 0 {
            return Err(entry);
        }
        self.buckets[entry.name_hash as usize % count].push(entry);
        Ok(())
    }

    pub fn push_bucket(&mut self, bucket: Bucket) {
        self.buckets.push(bucket);
    }

    /// Remove and return the bucket at `index`, if any.
    pub fn remove_bucket(&mut self, index: usize) -> Option<Bucket> {
        (index < self.buckets.len()).then(|| self.buckets.remove(index))
    }

    /// Iterate over every entry, bucket by bucket.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.buckets.iter().flat_map(|b| b.entries.iter())
    }

    /// Total number of entries across all buckets.
    pub fn file_count(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }
}

/// Placeholders reserved while serializing a [`HeaderIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Site {
    TotalSize,
    BucketTable,
    EntryTable(usize),
    Digest(usize, usize),
    Key(usize, usize),
}

impl Bucket {
    pub fn new(entries: Vec<FileEntry>) -> Self {
        Self { entries }
    }

    /// Linear scan for the first entry with `name_hash == hash`.
    pub fn lookup(&self, hash: u32) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.name_hash == hash)
    }

    pub fn push(&mut self, entry: FileEntry) {
        self.entries.push(entry);
    }

    /// Remove and return the first entry with `name_hash == hash`.
    pub fn remove(&mut self, hash: u32) -> Option<FileEntry> {
        let pos = self.entries.iter().position(|e| e.name_hash == hash)?;
        Some(self.entries.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn read<R: Read + Seek>(
        r: &mut R,
        base: u64,
        le: bool,
        caps: Capabilities,
        count: usize,
        offset: usize,
    ) -> Result<Self> {
        r.seek(SeekFrom::Start(base + offset as u64))?;
        let mut raw = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            raw.push(FileEntry::read(r, le, caps)?);
        }

        // Descriptor records live out of line; visit them once the table
        // itself has been consumed.
        let mut entries = Vec::with_capacity(raw.len());
        for (mut entry, digest_offset, key_offset) in raw {
            if digest_offset != 0 {
                seek_record(r, base, digest_offset)?;
                entry.digest = Some(DigestDescriptor::read(r, le)?);
            }
            if key_offset != 0 {
                seek_record(r, base, key_offset)?;
                entry.key = Some(KeyDescriptor::read(r, le)?);
            }
            entries.push(entry);
        }
        Ok(Self { entries })
    }
}

fn seek_record<R: Seek>(r: &mut R, base: u64, offset: i64) -> Result<()> {
    let offset = u64::try_from(offset).map_err(|_| Error::Parse("negative record offset"))?;
    r.seek(SeekFrom::Start(base + offset))?;
    Ok(())
}

impl FileEntry {
    /// Create a V1-shaped entry with no optional fields.
    pub fn new(name_hash: u32, padded_size: i32, offset: i64) -> Self {
        Self {
            name_hash,
            padded_size,
            offset,
            unpadded_size: None,
            digest: None,
            key: None,
        }
    }

    /// Decrypt this entry's key ranges of `buf` in place.
    ///
    /// Does nothing if the entry has no key.
    pub fn decrypt(&self, buf: &mut [u8]) -> Result<()> {
        match &self.key {
            Some(key) => key.decrypt(buf),
            None => Ok(()),
        }
    }

    /// Seek to this entry in the data blob, read `padded_size` bytes and
    /// decrypt its key ranges.
    ///
    /// `blob` is addressed absolutely: `offset` is a position in the stream.
    pub fn read_and_decrypt<R: Read + Seek>(&self, blob: &mut R) -> Result<Vec<u8>> {
        let offset =
            u64::try_from(self.offset).map_err(|_| Error::Parse("negative data offset"))?;
        blob.seek(SeekFrom::Start(offset))?;
        let mut buf = bytesv(blob, self.padded_len()?)?;
        self.decrypt(&mut buf)?;
        Ok(buf)
    }

    /// Check decrypted bytes against this entry's digest.
    ///
    /// Returns `true` when the digest matches or when there is no digest to
    /// check.
    pub fn verify(&self, plain: &[u8]) -> Result<bool> {
        match &self.digest {
            Some(digest) => digest.matches(plain),
            None => Ok(true),
        }
    }

    pub(crate) fn padded_len(&self) -> Result<usize> {
        usize::try_from(self.padded_size).map_err(|_| Error::Parse("negative padded size"))
    }

    fn validate(&self, caps: Capabilities) -> Result<()> {
        if self.unpadded_size.is_some() != caps.has_unpadded_size {
            return Err(Error::VersionMismatch(if caps.has_unpadded_size {
                "unpadded size is required from V3"
            } else {
                "unpadded size is not allowed before V3"
            }));
        }
        if !caps.has_digest_key_offsets && (self.digest.is_some() || self.key.is_some()) {
            return Err(Error::VersionMismatch(
                "digest and key records are not allowed in V1",
            ));
        }
        Ok(())
    }

    /// Read one table entry, returning it with its raw digest and key
    /// record offsets.
    fn read<R: Read>(r: &mut R, le: bool, caps: Capabilities) -> Result<(Self, i64, i64)> {
        let name_hash = end_u32(r, le)?;
        let padded_size = end_i32(r, le)?;
        let offset = end_i64(r, le)?;
        let (digest_offset, key_offset) = if caps.has_digest_key_offsets {
            (end_i64(r, le)?, end_i64(r, le)?)
        } else {
            (0, 0)
        };
        let unpadded_size = if caps.has_unpadded_size {
            Some(end_i64(r, le)?)
        } else {
            None
        };
        let entry = Self {
            name_hash,
            padded_size,
            offset,
            unpadded_size,
            digest: None,
            key: None,
        };
        Ok((entry, digest_offset, key_offset))
    }

    fn write(&self, w: &mut PatchWriter<Site>, caps: Capabilities, bucket: usize, index: usize) {
        w.u32(self.name_hash);
        w.i32(self.padded_size);
        w.i64(self.offset);
        if caps.has_digest_key_offsets {
            w.reserve_i64(Site::Digest(bucket, index));
            w.reserve_i64(Site::Key(bucket, index));
        }
        if caps.has_unpadded_size {
            w.i64(self.unpadded_size.unwrap_or_default());
        }
    }
}
