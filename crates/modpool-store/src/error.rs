use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid blob digest: {0:?}")]
    InvalidDigest(String),

    #[error("Blob {digest} not found in pool")]
    BlobNotFound {
        /// Hex digest of the missing blob
        digest: String,
    },

    #[error("Failed to persist blob at {path}: {source}")]
    PersistFailed {
        /// Final blob path the rename targeted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a regular file")]
    NotRegularFile {
        /// Offending source path
        path: PathBuf,
    },
}
