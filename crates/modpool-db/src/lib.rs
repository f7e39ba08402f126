//! # Modpool metadata catalog
//!
//! SQLite-backed catalog of games, their ingested versions, the
//! distinct file contents those versions reference, and the
//! per-version path bindings. The catalog is the source of truth for
//! what the sync service may hand out; the blob pool holds the bytes.
//!
//! Two access patterns share one database file under WAL: the poller
//! thread writes whole versions inside single transactions, and HTTP
//! handlers read snapshot-consistent catalog state concurrently.
//!
//! Query helpers live in [`queries`] as free functions over
//! [`rusqlite::Connection`] so the same code runs against a plain
//! connection or inside a [`rusqlite::Transaction`].

mod database;
mod error;
mod models;
pub mod queries;

pub use database::Database;
pub use error::DbError;
pub use models::{Game, ManifestEntry, Version};

pub type Result<T> = std::result::Result<T, DbError>;
