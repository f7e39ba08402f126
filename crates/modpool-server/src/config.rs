//! Server configuration
//!
//! Configuration is a YAML file whose path is the first CLI
//! argument:
//!
//! ```yaml
//! database_url: /var/lib/modpool/catalog.db
//! repos_path: /var/lib/modpool/repos
//! pool_path: /var/lib/modpool/pool
//! back_log: 30
//! cookiesecret: change-me
//! http_bind: 0.0.0.0:8080
//! ```
//!
//! `cookiesecret` signs administrative sessions; it is carried for
//! the admin surface and unused by the sync core.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::ConfigError;

/// Command line of the server binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "modpool-server",
    about = "Content-addressed distribution server for game mods",
    version
)]
pub struct Cli {
    /// Path to the YAML configuration file
    pub config: PathBuf,
}

impl Cli {
    /// Parse the command line.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }
}

fn default_http_bind() -> SocketAddr {
    // The port the protocol has always lived on.
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Server configuration loaded from the YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SQLite catalog database path
    pub database_url: PathBuf,

    /// Filesystem root for working clones, one per game
    pub repos_path: PathBuf,

    /// Filesystem root for the content-addressed blob pool
    pub pool_path: PathBuf,

    /// Max recent revisions to inspect per game per poll
    pub back_log: u32,

    /// Administrative session signing key (admin surface only)
    pub cookiesecret: String,

    /// HTTP bind address
    #[serde(default = "default_http_bind")]
    pub http_bind: SocketAddr,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate field sanity. Fatal at startup on failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.back_log == 0 {
            return Err(ConfigError::Invalid(
                "back_log must be at least 1".to_string(),
            ));
        }
        if self.cookiesecret.is_empty() {
            return Err(ConfigError::Invalid(
                "cookiesecret must not be empty".to_string(),
            ));
        }
        if self.database_url.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
