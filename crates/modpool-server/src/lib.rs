//! # Modpool server
//!
//! The distribution server proper: a poller thread that snapshots
//! upstream git repositories into the content-addressed pool and
//! catalog, and an HTTP service that lets anonymous clients
//! synchronize installations against those snapshots.
//!
//! The sync protocol has four surfaces:
//!
//! - `GET /repos.gz` — gzip text catalog of games
//! - `GET /{shortname}/versions.gz` — gzip text catalog of a game's versions
//! - `GET /{shortname}/packages/{manifest_key}.sdp` — gzip SDP manifest
//! - `POST /{shortname}/streamer.cgi?{manifest_key}` — bitmap-driven
//!   blob stream: the client uploads a gzip bitmap of the manifest
//!   records it is missing and receives exactly those blobs, each
//!   prefixed with its compressed size.

pub mod config;
mod error;
pub mod git;
pub mod http;
pub mod poller;
mod server;

pub use config::{Cli, Config};
pub use error::{ConfigError, GitError, PollerError, ServerError};
pub use server::{AppState, Server};
