//! Parsers and serializers for the dvdbnd archive pair.
//!
//! Both modules follow the same conventions:
//!
//! * **Generic over** [`std::io::Read`] + [`std::io::Seek`] - pass a
//!   [`std::fs::File`], a [`std::io::Cursor`], or anything else that
//!   implements both traits.
//! * **Metadata only** - [`bhd5::HeaderIndex::parse`] reads the index and
//!   never touches file data.
//! * **Reader wrapper** - [`bdf3::Bdf3Reader`] owns the data blob reader and
//!   hands back bounded, raw or decrypted file contents for an index entry.
//!
//! ## Format overview
//!
//! | Module   | Format | Description |
//! |----------|--------|-------------|
//! | [`bhd5`] | BHD5   | Header index: buckets of file entries, salt, AES key and SHA-256 digest records |
//! | [`bdf3`] | BDF3   | Data blob addressed by the offsets in a BHD5 index |

pub mod bdf3;
pub mod bhd5;
