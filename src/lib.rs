//! **dvdkit** - reader and writer for FromSoftware dvdbnd archive headers.
//!
//! A dvdbnd archive is a BHD5 header index plus a BDF3 data blob. The header
//! locates each file in the blob by name hash and, on later generations,
//! describes which byte ranges are AES-encrypted and which were hashed.
//!
//! # Supported formats
//! | Module | Format |
//! |--------|--------|
//! | [`formats::bhd5`] | BHD5 - hash-bucketed header index (V1-V4) |
//! | [`formats::bdf3`] | BDF3 - companion data blob |
//!
//! # Example
//! ```no_run
//! use std::fs::File;
//!
//! use dvdkit::formats::bdf3::Bdf3Reader;
//! use dvdkit::formats::bhd5::{FormatVersion, HeaderIndex};
//!
//! let index = HeaderIndex::parse(&mut File::open("Data0.bhd")?, FormatVersion::V3)?;
//! let mut blob = Bdf3Reader::new(File::open("Data0.bdt")?)?;
//! if let Some(entry) = index.lookup(0x1234_5678) {
//!     let bytes = blob.read_and_decrypt(entry)?;
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok::<(), dvdkit::Error>(())
//! ```
//!
//! # Features
//! * `parallel` - run [`extract::extract_all`] on the rayon thread pool.

pub mod crypto;
pub mod error;
pub mod extract;
pub mod formats;
pub mod utils;

pub use error::{Error, Result};
