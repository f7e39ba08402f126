//! Catalog queries
//!
//! Free functions over [`Connection`] so the ingestion pipeline can
//! run them inside a transaction and the HTTP handlers against a
//! plain connection. `rusqlite::Transaction` derefs to `Connection`,
//! so both call sites look identical.

use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{Game, ManifestEntry, Version};
use crate::{DbError, Result};

pub fn insert_game(
    conn: &Connection,
    short_name: &str,
    git_url: &str,
    repo_url: &str,
) -> Result<Game> {
    conn.execute(
        "INSERT INTO games (short_name, git_url, repo_url) VALUES (?1, ?2, ?3)",
        params![short_name, git_url, repo_url],
    )?;
    let id = conn.last_insert_rowid();
    game_by_id(conn, id)
}

pub fn game_by_id(conn: &Connection, id: i64) -> Result<Game> {
    conn.query_row(
        "SELECT id, short_name, git_url, repo_url, created_at FROM games WHERE id = ?1",
        params![id],
        game_from_row,
    )
    .map_err(DbError::Sqlite)
}

pub fn game_by_short_name(conn: &Connection, short_name: &str) -> Result<Option<Game>> {
    conn.query_row(
        "SELECT id, short_name, git_url, repo_url, created_at FROM games WHERE short_name = ?1",
        params![short_name],
        game_from_row,
    )
    .optional()
    .map_err(DbError::Sqlite)
}

pub fn list_games(conn: &Connection) -> Result<Vec<Game>> {
    let mut stmt = conn
        .prepare("SELECT id, short_name, git_url, repo_url, created_at FROM games ORDER BY id")?;
    let games = stmt
        .query_map([], game_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(games)
}

pub fn insert_version(
    conn: &Connection,
    game_id: i64,
    source_key: &str,
    manifest_key: &str,
    full_name: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO versions (game_id, source_key, manifest_key, full_name) \
         VALUES (?1, ?2, ?3, ?4)",
        params![game_id, source_key, manifest_key, full_name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_manifest_key(conn: &Connection, version_id: i64, manifest_key: &str) -> Result<()> {
    conn.execute(
        "UPDATE versions SET manifest_key = ?1 WHERE id = ?2",
        params![manifest_key, version_id],
    )?;
    Ok(())
}

pub fn version_by_source_key(conn: &Connection, source_key: &str) -> Result<Option<Version>> {
    version_where(conn, "source_key = ?1", source_key)
}

pub fn version_by_manifest_key(conn: &Connection, manifest_key: &str) -> Result<Option<Version>> {
    version_where(conn, "manifest_key = ?1", manifest_key)
}

pub fn versions_for_game(conn: &Connection, game_id: i64) -> Result<Vec<Version>> {
    let mut stmt = conn.prepare(
        "SELECT id, game_id, source_key, manifest_key, full_name, published, created_at \
         FROM versions WHERE game_id = ?1 ORDER BY id",
    )?;
    let versions = stmt
        .query_map(params![game_id], version_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(versions)
}

/// Lookup a file row's id by content digest.
pub fn file_id_by_digest(conn: &Connection, md5: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM files WHERE md5 = ?1",
        params![md5],
        |row| row.get(0),
    )
    .optional()
    .map_err(DbError::Sqlite)
}

pub fn insert_file(conn: &Connection, md5: &str, crc32: u32, len: u64) -> Result<i64> {
    conn.execute(
        "INSERT INTO files (md5, crc32, len) VALUES (?1, ?2, ?3)",
        params![md5, i64::from(crc32), len as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_version_file(
    conn: &Connection,
    version_id: i64,
    file_id: i64,
    path: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO version_files (version_id, file_id, path) VALUES (?1, ?2, ?3)",
        params![version_id, file_id, path],
    )?;
    Ok(())
}

/// A version's manifest rows in wire order: CRC32 ascending, row id
/// (insertion order) breaking ties. Both the SDP stream and the
/// manifest digest depend on exactly this ordering.
pub fn manifest_entries(conn: &Connection, version_id: i64) -> Result<Vec<ManifestEntry>> {
    let mut stmt = conn.prepare(
        "SELECT vf.path, f.md5, f.crc32, f.len \
         FROM version_files vf \
         INNER JOIN files f ON f.id = vf.file_id \
         WHERE vf.version_id = ?1 \
         ORDER BY f.crc32 ASC, vf.id ASC",
    )?;
    let entries = stmt
        .query_map(params![version_id], |row| {
            Ok(ManifestEntry {
                path: row.get(0)?,
                md5: row.get(1)?,
                crc32: row.get::<_, i64>(2)? as u32,
                len: row.get::<_, i64>(3)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn count_versions(conn: &Connection) -> Result<u64> {
    count(conn, "SELECT COUNT(*) FROM versions")
}

pub fn count_published_versions(conn: &Connection) -> Result<u64> {
    count(conn, "SELECT COUNT(*) FROM versions WHERE published = 1")
}

pub fn count_games(conn: &Connection) -> Result<u64> {
    count(conn, "SELECT COUNT(*) FROM games")
}

fn count(conn: &Connection, sql: &str) -> Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as u64)
}

fn version_where(conn: &Connection, predicate: &str, key: &str) -> Result<Option<Version>> {
    let sql = format!(
        "SELECT id, game_id, source_key, manifest_key, full_name, published, created_at \
         FROM versions WHERE {predicate}"
    );
    conn.query_row(&sql, params![key], version_from_row)
        .optional()
        .map_err(DbError::Sqlite)
}

fn game_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        short_name: row.get(1)?,
        git_url: row.get(2)?,
        repo_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn version_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Version> {
    Ok(Version {
        id: row.get(0)?,
        game_id: row.get(1)?,
        source_key: row.get(2)?,
        manifest_key: row.get(3)?,
        full_name: row.get(4)?,
        published: row.get(5)?,
        created_at: row.get(6)?,
    })
}
