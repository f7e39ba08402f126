//! # Modpool store
//!
//! The on-disk half of the distribution server: a content-addressed
//! pool of gzip-compressed blobs keyed by MD5 digest, plus the file
//! digester that produces those keys.
//!
//! A blob for hex digest `d` lives at `<root>/<d[0:2]>/<d[2:]>.gz`;
//! the two-character prefix fan-out keeps directories small. Writes
//! are idempotent: a temporary file in the prefix directory is
//! renamed into place, so racing writers of the same digest converge
//! on one blob.

mod digest;
mod error;
mod pool;

pub use digest::{FileDigest, digest_file};
pub use error::StoreError;
pub use pool::BlobPool;

pub type Result<T> = std::result::Result<T, StoreError>;
