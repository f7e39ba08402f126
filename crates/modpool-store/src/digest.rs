//! Dual-checksum file digester
//!
//! Every ingested file is identified by two sums: the MD5 digest
//! keys the blob in the pool and in the catalog, while the CRC32
//! (IEEE polynomial) provides the manifest sort order and a cheap
//! client-side integrity check. Both travel in every SDP record.

use std::fs;
use std::path::Path;

use crate::Result;

/// Checksums and length of one file's uncompressed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDigest {
    /// MD5 of the file content
    pub md5: [u8; 16],
    /// CRC32 (IEEE) of the file content
    pub crc32: u32,
    /// Content length in bytes
    pub len: u64,
}

impl FileDigest {
    /// Lowercase hex form of the MD5 digest.
    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }

    /// Digest an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut crc = crc32fast::Hasher::new();
        crc.update(data);
        Self {
            md5: md5::compute(data).0,
            crc32: crc.finalize(),
            len: data.len() as u64,
        }
    }
}

/// Digest a regular file's content.
pub fn digest_file<P: AsRef<Path>>(path: P) -> Result<FileDigest> {
    let data = fs::read(path)?;
    Ok(FileDigest::of_bytes(&data))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_known_sums_hello() {
        let digest = FileDigest::of_bytes(b"hello");
        assert_eq!(digest.md5_hex(), "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(digest.crc32, 0x3610A686);
        assert_eq!(digest.len, 5);
    }

    #[test]
    fn test_known_sums_world() {
        let digest = FileDigest::of_bytes(b"world");
        assert_eq!(digest.md5_hex(), "7d793037a0760186574b0282f2f435e7");
        assert_eq!(digest.crc32, 0x3A771143);
        assert_eq!(digest.len, 5);
    }

    #[test]
    fn test_empty_input() {
        let digest = FileDigest::of_bytes(b"");
        assert_eq!(digest.md5_hex(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest.crc32, 0);
        assert_eq!(digest.len, 0);
    }

    #[test]
    fn test_digest_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(b"hello").unwrap();
        drop(f);

        let digest = digest_file(&path).unwrap();
        assert_eq!(digest, FileDigest::of_bytes(b"hello"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(digest_file(dir.path().join("absent")).is_err());
    }
}
