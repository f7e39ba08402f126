//! Request handlers for the sync protocol endpoints.
//!
//! All endpoints are anonymous. Error responses carry empty bodies:
//! unknown names and manifest keys are 404, everything else is 500.

use std::fmt::Write as _;
use std::io::{Read, Write};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use byteorder::{BigEndian, WriteBytesExt};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use modpool_db::Version;

use crate::poller;
use crate::server::AppState;

/// Handle `GET /repos.gz`.
///
/// One `<short_name>,<repo_url>,,` line per game, gzip-compressed.
pub async fn handle_repos(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let games = state.db().list_games()?;

    let mut text = String::new();
    for game in &games {
        let _ = writeln!(text, "{},{},,", game.short_name, game.repo_url);
    }

    gzip_text_response(text.as_bytes())
}

/// Handle `GET /{shortname}/versions.gz`.
///
/// One `<short_name>:<source_key>,<manifest_key>,,<full_name>` line
/// per version of the game, gzip-compressed. 404 for unknown names.
pub async fn handle_versions(
    Path(shortname): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let db = state.db();
    let game = db.game_by_short_name(&shortname)?.ok_or(AppError::NotFound)?;
    let versions = db.versions_for_game(game.id)?;
    drop(db);

    let mut text = String::new();
    for version in &versions {
        let _ = writeln!(
            text,
            "{}:{},{},,{}",
            shortname, version.source_key, version.manifest_key, version.full_name
        );
    }

    gzip_text_response(text.as_bytes())
}

/// Handle `GET /{shortname}/packages/{filename}`.
///
/// `filename` is `<manifest_key>.sdp`; everything after the first
/// `.` is ignored. The body is the gzip-compressed SDP record stream
/// in manifest order.
pub async fn handle_package(
    Path((_shortname, filename)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let manifest_key = filename.split('.').next().unwrap_or(&filename);

    let (_, entries) = lookup_manifest(&state, manifest_key)?;
    let stream = poller::encode_manifest(&entries)?;
    let body = gzip(&stream)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        body,
    )
        .into_response())
}

/// Handle `POST /{shortname}/streamer.cgi?<manifest_key>`.
///
/// The request body is a gzip-compressed bitmap over the manifest
/// records, bit *i* LSB-first within each byte; a set bit requests
/// record *i*'s blob. The response concatenates, for each set bit in
/// ascending order, a big-endian u32 with the blob's compressed size
/// followed by the compressed blob bytes verbatim from the pool.
pub async fn handle_streamer(
    Path(_shortname): Path<String>,
    RawQuery(query): RawQuery,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let manifest_key = query.unwrap_or_default();
    let (_, entries) = lookup_manifest(&state, &manifest_key)?;

    let bitmap = gunzip(&body)
        .map_err(|e| AppError::Internal(format!("unreadable streamer bitmap: {e}")))?;

    // Resolve compressed sizes first so Content-Length is exact
    // before any blob bytes move.
    let mut requested = Vec::new();
    let mut total_len: u64 = 0;
    for (index, entry) in entries.iter().enumerate() {
        if bit_set(&bitmap, index) {
            let size = state.pool().compressed_size(&entry.md5)?;
            total_len += size + 4;
            requested.push((entry.md5.clone(), size));
        }
    }

    let mut payload = Vec::with_capacity(total_len as usize);
    for (digest, size) in requested {
        payload.write_u32::<BigEndian>(size as u32)?;
        let (mut blob, _) = state.pool().open(&digest)?;
        blob.read_to_end(&mut payload)?;
    }

    let mut response = (StatusCode::OK, payload).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/octet-stream"),
    );
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, header::HeaderValue::from(total_len));
    Ok(response)
}

/// Test bit `index` of an LSB-first bitmap. Bits beyond the bitmap
/// are unset.
fn bit_set(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .get(index / 8)
        .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
}

fn lookup_manifest(
    state: &AppState,
    manifest_key: &str,
) -> Result<(Version, Vec<modpool_db::ManifestEntry>), AppError> {
    let db = state.db();
    let version = db
        .version_by_manifest_key(manifest_key)?
        .ok_or(AppError::NotFound)?;
    let entries = db.manifest_entries(version.id)?;
    Ok((version, entries))
}

fn gzip_text_response(text: &[u8]) -> Result<Response, AppError> {
    let body = gzip(text)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/gzip")],
        body,
    )
        .into_response())
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Application-level error for the sync handlers.
#[derive(Debug)]
pub enum AppError {
    /// Unknown game or manifest key (404, empty body)
    NotFound,
    /// Anything else (500, empty body; detail goes to the log)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Internal(detail) => {
                tracing::error!("Request failed: {detail}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<modpool_db::DbError> for AppError {
    fn from(err: modpool_db::DbError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<modpool_store::StoreError> for AppError {
    fn from(err: modpool_store::StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<crate::PollerError> for AppError {
    fn from(err: crate::PollerError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
