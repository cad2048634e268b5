//! Byte intervals over a file's decrypted contents.

use std::io::Read;
use std::ops;

use crate::utils::{PatchWriter, end_count, end_i64};
use crate::{Error, Result};

/// A half-open byte interval `[start, end)`.
///
/// A range is a no-op sentinel when `start == end` or either bound is `-1`;
/// sentinels are skipped by every hash and cipher pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: i64,
    pub end: i64,
}

impl Range {
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whether this range is a sentinel that must never touch a buffer.
    pub fn is_sentinel(&self) -> bool {
        self.start == -1 || self.end == -1 || self.start == self.end
    }

    /// Resolve to a slice index over a buffer of `len` bytes.
    ///
    /// Fails with [`Error::InvalidRange`] if the bounds are negative,
    /// inverted or past the end of the buffer.
    pub fn span(&self, len: usize) -> Result<ops::Range<usize>> {
        let invalid = || Error::InvalidRange {
            start: self.start,
            end: self.end,
            len,
        };
        let start = usize::try_from(self.start).map_err(|_| invalid())?;
        let end = usize::try_from(self.end).map_err(|_| invalid())?;
        if start > end || end > len {
            return Err(invalid());
        }
        Ok(start..end)
    }
}

/// Resolve every non-sentinel range against a buffer of `len` bytes.
///
/// All ranges are checked before any is returned, so callers can validate
/// up front and leave the buffer untouched on failure.
pub(crate) fn active_spans(ranges: &[Range], len: usize) -> Result<Vec<ops::Range<usize>>> {
    ranges
        .iter()
        .filter(|r| !r.is_sentinel())
        .map(|r| r.span(len))
        .collect()
}

pub(crate) fn read_ranges<R: Read>(r: &mut R, le: bool) -> Result<Vec<Range>> {
    let count = end_count(r, le, "negative range count")?;
    let mut ranges = Vec::with_capacity(count.min(crate::utils::MAX_PREALLOC));
    for _ in 0..count {
        let start = end_i64(r, le)?;
        let end = end_i64(r, le)?;
        ranges.push(Range { start, end });
    }
    Ok(ranges)
}

pub(crate) fn write_ranges<K>(w: &mut PatchWriter<K>, ranges: &[Range]) -> Result<()>
where
    K: std::hash::Hash + Eq + Copy + std::fmt::Debug,
{
    w.count(ranges.len())?;
    for range in ranges {
        w.i64(range.start);
        w.i64(range.end);
    }
    Ok(())
}
