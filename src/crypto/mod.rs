//! Partial-range encryption and hashing for dvdbnd file data.
//!
//! Files stored in a BDF3 data blob may be encrypted or hashed only over
//! specific byte intervals. Both kinds of record share the [`Range`]
//! primitive; everything outside the listed ranges is plain data.
//!
//! All functions take their key material and ranges as arguments and keep
//! no shared state, so they can run concurrently for different files.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`range`]  | `[start, end)` intervals and the no-op sentinel rule |
//! | [`key`]    | AES-128-ECB key descriptors, range decrypt/encrypt |
//! | [`digest`] | SHA-256 digest descriptors, range hashing |

pub mod digest;
pub mod key;
pub mod range;

pub use digest::DigestDescriptor;
pub use key::KeyDescriptor;
pub use range::Range;
