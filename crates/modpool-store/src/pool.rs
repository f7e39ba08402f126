//! Content-addressed blob pool
//!
//! Blobs are stored gzip-compressed under a two-level layout,
//! `<root>/<d[0:2]>/<d[2:]>.gz` for hex digest `d`. The pool knows
//! nothing about content semantics; callers hand it a digest and a
//! source file. Writes go through a temporary file in the prefix
//! directory followed by a rename, so concurrent idempotent writers
//! and readers never observe a partial blob.

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::{Result, StoreError};

/// Permissions for newly created prefix directories.
#[cfg(unix)]
const PREFIX_DIR_MODE: u32 = 0o750;

/// Content-addressed store rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct BlobPool {
    root: PathBuf,
}

impl BlobPool {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path of the blob for `digest`, creating the prefix
    /// directory if it does not exist yet.
    pub fn path_for(&self, digest: &str) -> Result<PathBuf> {
        validate_digest(digest)?;

        let prefix = self.root.join(&digest[..2]);
        if !prefix.is_dir() {
            debug!("Creating pool prefix directory {}", prefix.display());
            create_prefix_dir(&prefix)?;
        }

        Ok(prefix.join(format!("{}.gz", &digest[2..])))
    }

    /// Whether a blob for `digest` is already present.
    pub fn contains(&self, digest: &str) -> Result<bool> {
        Ok(self.path_for(digest)?.is_file())
    }

    /// Store the content of `src` under `digest`, gzip-compressed.
    ///
    /// A no-op when the blob already exists. Otherwise the source is
    /// stream-compressed into a temporary file in the prefix
    /// directory, synced, and renamed into place.
    pub fn store(&self, digest: &str, src: &Path) -> Result<()> {
        let blob_path = self.path_for(digest)?;
        if blob_path.is_file() {
            trace!("Blob {digest} already pooled");
            return Ok(());
        }

        let meta = fs::metadata(src)?;
        if !meta.is_file() {
            return Err(StoreError::NotRegularFile {
                path: src.to_path_buf(),
            });
        }

        let prefix = blob_path.parent().unwrap_or(&self.root);
        let tmp = NamedTempFile::new_in(prefix)?;
        {
            let mut encoder = GzEncoder::new(tmp.as_file(), Compression::default());
            let mut reader = BufReader::new(File::open(src)?);
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?.flush()?;
        }
        tmp.as_file().sync_all()?;

        tmp.persist(&blob_path)
            .map_err(|e| StoreError::PersistFailed {
                path: blob_path.clone(),
                source: e.error,
            })?;

        debug!("Pooled blob {digest} ({} bytes uncompressed)", meta.len());
        Ok(())
    }

    /// Open the compressed blob for reading; returns the handle and
    /// the compressed size in bytes.
    pub fn open(&self, digest: &str) -> Result<(File, u64)> {
        let blob_path = self.path_for(digest)?;
        let file = File::open(&blob_path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::BlobNotFound {
                    digest: digest.to_string(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;
        let len = file.metadata()?.len();
        Ok((file, len))
    }

    /// Compressed on-disk size of the blob for `digest`.
    pub fn compressed_size(&self, digest: &str) -> Result<u64> {
        let blob_path = self.path_for(digest)?;
        match fs::metadata(&blob_path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::BlobNotFound {
                digest: digest.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_digest(digest: &str) -> Result<()> {
    let valid = digest.len() == 32
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidDigest(digest.to_string()))
    }
}

fn create_prefix_dir(prefix: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(PREFIX_DIR_MODE);
    }
    builder.create(prefix)
}
