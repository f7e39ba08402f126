//! Error types for the distribution server.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        /// Path to the YAML configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid YAML in the configuration file
    #[error("Invalid YAML in config file {path}: {source}")]
    ParseFailed {
        /// Path to the YAML configuration file
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_yaml::Error,
    },

    /// A configuration value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures talking to the upstream VCS. Recoverable; the affected
/// game is skipped until the next poll.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git binary could not be spawned
    #[error("Failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    /// git exited with a nonzero status
    #[error("git {command} failed with {status}: {stderr}")]
    CommandFailed {
        /// The subcommand that failed (e.g. "fetch")
        command: String,
        /// Exit status as reported by the process
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// git produced output that was not UTF-8 text
    #[error("git {command} produced non-UTF-8 output")]
    BadOutput {
        /// The subcommand with unreadable output
        command: String,
    },

    /// git produced output that could not be interpreted
    #[error("Unexpected git {command} output: {output:?}")]
    UnexpectedOutput {
        /// The subcommand with unexpected output
        command: String,
        /// The offending output, trimmed
        output: String,
    },
}

/// Failures inside the ingestion pipeline. Scoped to one revision:
/// the enclosing transaction is rolled back and the poller moves on.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Upstream error: {0}")]
    Git(#[from] GitError),

    #[error("Catalog error: {0}")]
    Db(#[from] modpool_db::DbError),

    #[error("Pool error: {0}")]
    Store(#[from] modpool_store::StoreError),

    #[error("Format error: {0}")]
    Format(#[from] modpool_formats::Error),

    #[error("Tree walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A catalog row carried a digest that is not valid hex
    #[error("Corrupt digest in catalog: {0}")]
    CorruptDigest(String),
}

/// Server runtime errors. Fatal.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Db(#[from] modpool_db::DbError),

    #[error("Failed to create {what} directory {path}: {source}")]
    CreateDirFailed {
        /// Which configured tree ("pool", "repos")
        what: &'static str,
        /// The directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to bind the HTTP listener
    #[error("Failed to bind HTTP server to {addr}: {source}")]
    BindFailed {
        /// Address that failed to bind
        addr: std::net::SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server terminated with an error
    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The poller thread could not be spawned
    #[error("Failed to spawn poller thread: {0}")]
    SpawnPoller(#[source] std::io::Error),
}
