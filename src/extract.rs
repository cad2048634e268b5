//! Batch extraction of every file an index describes.
//!
//! Each file is read, decrypted and optionally verified on its own: a bad
//! range, cipher failure or digest mismatch is reported in that file's
//! [`Extracted`] slot and the batch carries on. The index is only read, so
//! with the `parallel` feature files are processed on the rayon pool with
//! one blob handle per worker thread.
//!
//! Cancellation is cooperative. The flag is checked before each file is
//! started; a file that is already being decrypted always finishes.

use std::io::{Read, Seek};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::formats::bdf3::Bdf3Reader;
use crate::formats::bhd5::{FileEntry, HeaderIndex};
use crate::{Error, Result};

/// Options controlling batch extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Check each file's SHA-256 digest after decryption.
    pub verify: bool,
}

/// Outcome for one file of a batch.
#[derive(Debug)]
pub struct Extracted {
    pub name_hash: u32,
    pub result: Result<Vec<u8>>,
}

/// Extract every file from the blob `reader`, in index order.
pub fn extract_with<R: Read + Seek>(
    reader: &mut Bdf3Reader<R>,
    index: &HeaderIndex,
    options: ExtractOptions,
    cancel: &AtomicBool,
) -> Vec<Extracted> {
    index
        .entries()
        .map(|entry| extract_one(reader, entry, options, cancel))
        .collect()
}

/// Extract every file in index order, opening blob handles with `open`.
///
/// The first handle is opened eagerly and any error from it (including a
/// bad BDF3 signature) fails the whole call. Without the `parallel` feature
/// that single handle serves the batch.
pub fn extract_all<R, F>(
    index: &HeaderIndex,
    open: F,
    options: ExtractOptions,
    cancel: &AtomicBool,
) -> Result<Vec<Extracted>>
where
    R: Read + Seek,
    F: Fn() -> Result<Bdf3Reader<R>> + Sync + Send,
{
    let first = open()?;
    Ok(run_batch(first, index, &open, options, cancel))
}

#[cfg(not(feature = "parallel"))]
fn run_batch<R, F>(
    mut reader: Bdf3Reader<R>,
    index: &HeaderIndex,
    _open: &F,
    options: ExtractOptions,
    cancel: &AtomicBool,
) -> Vec<Extracted>
where
    R: Read + Seek,
    F: Fn() -> Result<Bdf3Reader<R>>,
{
    extract_with(&mut reader, index, options, cancel)
}

#[cfg(feature = "parallel")]
fn run_batch<R, F>(
    first: Bdf3Reader<R>,
    index: &HeaderIndex,
    open: &F,
    options: ExtractOptions,
    cancel: &AtomicBool,
) -> Vec<Extracted>
where
    R: Read + Seek,
    F: Fn() -> Result<Bdf3Reader<R>> + Sync + Send,
{
    use rayon::prelude::*;

    drop(first);
    let entries: Vec<&FileEntry> = index.entries().collect();
    entries
        .par_iter()
        .map_init(open, |reader, entry| match reader {
            Ok(reader) => extract_one(reader, entry, options, cancel),
            Err(e) => Extracted {
                name_hash: entry.name_hash,
                result: Err(Error::Io(std::io::Error::other(e.to_string()))),
            },
        })
        .collect()
}

fn extract_one<R: Read + Seek>(
    reader: &mut Bdf3Reader<R>,
    entry: &FileEntry,
    options: ExtractOptions,
    cancel: &AtomicBool,
) -> Extracted {
    let result = if cancel.load(Ordering::Relaxed) {
        debug!(name_hash = entry.name_hash, "skipped after cancellation");
        Err(Error::Cancelled)
    } else if options.verify {
        reader.read_verified(entry)
    } else {
        reader.read_and_decrypt(entry)
    };
    if let Err(e) = &result
        && !matches!(e, Error::Cancelled)
    {
        warn!(name_hash = entry.name_hash, error = %e, "file extraction failed");
    }
    Extracted {
        name_hash: entry.name_hash,
        result,
    }
}
