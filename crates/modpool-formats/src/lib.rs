//! # Modpool formats
//!
//! Wire and descriptor formats shared between the modpool ingestion
//! pipeline and the sync service:
//!
//! - **SDP**: the package manifest record stream served to clients. A
//!   manifest is a plain concatenation of records with no framing
//!   header or trailer; end of stream terminates it.
//! - **Manifest identity**: the MD5 digest over an ordered record set
//!   that becomes a version's public address.
//! - **modinfo**: the small `return { key = value }` descriptor a mod
//!   may carry in its tree root.
//!
//! ## Quick Start
//!
//! ```
//! use modpool_formats::sdp::SdpRecord;
//!
//! let records = vec![SdpRecord {
//!     filename: "maps/alpha.smf".to_string(),
//!     md5: [0x11; 16],
//!     crc32: 0xDEAD_BEEF,
//!     size: 1024,
//! }];
//!
//! let mut buf = Vec::new();
//! modpool_formats::sdp::write_all(&mut buf, &records)?;
//! let decoded = modpool_formats::sdp::read_all(&mut buf.as_slice())?;
//! assert_eq!(decoded, records);
//! # Ok::<(), modpool_formats::Error>(())
//! ```

mod error;
pub mod manifest;
pub mod modinfo;
pub mod sdp;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
