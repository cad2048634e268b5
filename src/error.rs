//! Library-wide error and result types.

use std::io;

use thiserror::Error;

/// Result alias used throughout dvdkit.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Parse-time errors are fatal for the whole index. Errors raised while
/// extracting a single file ([`Error::InvalidRange`], [`Error::Integrity`],
/// [`Error::Io`]) only concern that file.
#[derive(Debug, Error)]
pub enum Error {
    /// A magic/signature field did not match the expected value.
    #[error("bad magic value")]
    BadMagic,
    /// The endianness marker was neither `0` (big) nor `-1` (little).
    #[error("bad endianness marker: {0}")]
    BadEndianMarker(i8),
    /// The literal format sentinel after the flag bytes was not `1`.
    #[error("bad format sentinel: {0}")]
    BadSentinel(i32),
    /// The stream ended before all expected bytes could be read.
    #[error("unexpected end of stream")]
    Truncated,
    /// A field is present (or absent) in a way the declared format
    /// version does not allow.
    #[error("version mismatch: {0}")]
    VersionMismatch(&'static str),
    /// A hash or cipher range falls outside the buffer, or an encrypted
    /// range is not a positive multiple of the AES block size.
    #[error("invalid range [{start}, {end}) for buffer of {len} bytes")]
    InvalidRange { start: i64, end: i64, len: usize },
    /// The SHA-256 digest recomputed over a file's ranges did not match.
    #[error("integrity check failed for file {name_hash:#010x}")]
    Integrity { name_hash: u32 },
    /// A structural constraint was violated (message describes which one).
    #[error("parse error: {0}")]
    Parse(&'static str),
    /// A batch extraction was cancelled before this file was started.
    #[error("operation cancelled")]
    Cancelled,
    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Io(e)
        }
    }
}
