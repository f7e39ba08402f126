//! Catalog connection management and schema migration.

use std::path::Path;

use rusqlite::{Connection, Transaction};
use tracing::debug;

use crate::models::{Game, ManifestEntry, Version};
use crate::{DbError, Result, queries};

/// Idempotent schema. Applied on every open; `IF NOT EXISTS` makes
/// repeated startups and multiple connections safe.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS games (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    short_name  TEXT NOT NULL UNIQUE,
    git_url     TEXT NOT NULL,
    repo_url    TEXT NOT NULL,
    created_at  INTEGER NOT NULL DEFAULT (CAST(strftime('%s','now') AS INTEGER))
);

CREATE TABLE IF NOT EXISTS versions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id      INTEGER NOT NULL REFERENCES games(id),
    source_key   TEXT NOT NULL UNIQUE,
    manifest_key TEXT NOT NULL,
    full_name    TEXT NOT NULL,
    published    INTEGER NOT NULL DEFAULT 0,
    created_at   INTEGER NOT NULL DEFAULT (CAST(strftime('%s','now') AS INTEGER))
);
CREATE INDEX IF NOT EXISTS idx_versions_game ON versions(game_id);
CREATE INDEX IF NOT EXISTS idx_versions_manifest_key ON versions(manifest_key);

CREATE TABLE IF NOT EXISTS files (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    md5    TEXT NOT NULL UNIQUE,
    crc32  INTEGER NOT NULL,
    len    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS version_files (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL REFERENCES versions(id),
    file_id    INTEGER NOT NULL REFERENCES files(id),
    path       TEXT NOT NULL,
    UNIQUE (version_id, path)
);
CREATE INDEX IF NOT EXISTS idx_version_files_version ON version_files(version_id);
";

/// Owned catalog connection.
///
/// The poller and the HTTP service each open their own `Database`
/// against the same file; WAL mode lets readers proceed while the
/// poller's ingestion transaction is open.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if necessary) the catalog at `path` and apply
    /// pragmas and migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DbError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Opened catalog at {}", path.display());
        Self::init(conn)
    }

    /// In-memory catalog, for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Begin a transaction. All ingestion writes for one version go
    /// through a single transaction so partial versions are never
    /// visible.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    pub fn insert_game(&self, short_name: &str, git_url: &str, repo_url: &str) -> Result<Game> {
        queries::insert_game(&self.conn, short_name, git_url, repo_url)
    }

    pub fn game_by_short_name(&self, short_name: &str) -> Result<Option<Game>> {
        queries::game_by_short_name(&self.conn, short_name)
    }

    pub fn list_games(&self) -> Result<Vec<Game>> {
        queries::list_games(&self.conn)
    }

    pub fn versions_for_game(&self, game_id: i64) -> Result<Vec<Version>> {
        queries::versions_for_game(&self.conn, game_id)
    }

    pub fn version_by_source_key(&self, source_key: &str) -> Result<Option<Version>> {
        queries::version_by_source_key(&self.conn, source_key)
    }

    pub fn version_by_manifest_key(&self, manifest_key: &str) -> Result<Option<Version>> {
        queries::version_by_manifest_key(&self.conn, manifest_key)
    }

    pub fn manifest_entries(&self, version_id: i64) -> Result<Vec<ManifestEntry>> {
        queries::manifest_entries(&self.conn, version_id)
    }

    pub fn count_games(&self) -> Result<u64> {
        queries::count_games(&self.conn)
    }

    pub fn count_versions(&self) -> Result<u64> {
        queries::count_versions(&self.conn)
    }

    pub fn count_published_versions(&self) -> Result<u64> {
        queries::count_published_versions(&self.conn)
    }
}
