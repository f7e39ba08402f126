//! Ingestion pipeline
//!
//! A single poller thread owns all working clones. Every poll it
//! walks the game list, fetches upstream, and turns each new
//! revision into a catalog version: the working tree is hard-reset,
//! the optional modinfo descriptor is resolved and written back,
//! then one transaction inserts the version row, deduplicates every
//! file into the blob pool, binds the version's paths, and stamps
//! the manifest key. A version either lands whole or not at all.
//!
//! Failures are contained: a bad revision is logged and skipped, a
//! bad upstream skips the game, and nothing escapes the poll loop.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use modpool_db::{Database, ManifestEntry, queries};
use modpool_formats::modinfo::{self, Modinfo};
use modpool_formats::sdp::SdpRecord;
use modpool_formats::{manifest, sdp};
use modpool_store::{BlobPool, digest_file};

use crate::config::Config;
use crate::git::GitRepo;
use crate::{PollerError, ServerError};

/// Gap between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Relative path of the version descriptor inside a mod tree.
const MODINFO_FILE: &str = "modinfo.lua";

/// The repository poller and snapshotter.
pub struct Poller {
    repos_path: PathBuf,
    back_log: u32,
    db: Database,
    pool: BlobPool,
}

impl Poller {
    pub fn new(config: &Config, db: Database, pool: BlobPool) -> Self {
        Self {
            repos_path: config.repos_path.clone(),
            back_log: config.back_log,
            db,
            pool,
        }
    }

    /// Spawn the poller on its own OS thread. Ingestion is strictly
    /// sequential across games and revisions; the thread never
    /// terminates on its own.
    pub fn spawn(self) -> Result<thread::JoinHandle<()>, ServerError> {
        thread::Builder::new()
            .name("poller".to_string())
            .spawn(move || self.run())
            .map_err(ServerError::SpawnPoller)
    }

    fn run(mut self) {
        loop {
            self.poll_once();
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// One pass over all games.
    pub fn poll_once(&mut self) {
        let games = match self.db.list_games() {
            Ok(games) => games,
            Err(e) => {
                warn!("Could not list games: {e}");
                return;
            }
        };

        for game in games {
            if let Err(e) = self.process_game(&game) {
                warn!("Skipping game {}: {e}", game.short_name);
            }
        }
    }

    fn process_game(&mut self, game: &modpool_db::Game) -> Result<(), PollerError> {
        let clone_dir = self.repos_path.join(&game.short_name);
        let repo = if clone_dir.is_dir() {
            GitRepo::open(clone_dir)
        } else {
            info!("Cloning {} into {}", game.git_url, clone_dir.display());
            GitRepo::clone_from(&game.git_url, clone_dir)?
        };

        repo.fetch_tags()?;

        for rev in repo.recent_revisions(self.back_log)? {
            if let Err(e) = self.ingest_revision(game, &repo, &rev) {
                warn!("Skipping revision {rev} of {}: {e}", game.short_name);
            }
        }
        Ok(())
    }

    fn ingest_revision(
        &mut self,
        game: &modpool_db::Game,
        repo: &GitRepo,
        rev: &str,
    ) -> Result<(), PollerError> {
        let tag = repo.tag_at(rev)?;
        let identifier = tag.clone().unwrap_or_else(|| rev.to_string());
        let source_key = format!("git:{identifier}");

        if self.db.version_by_source_key(&source_key)?.is_some() {
            debug!("{source_key} already ingested");
            return Ok(());
        }

        repo.reset_hard(tag.as_deref().unwrap_or(rev))?;
        let depth = repo.commit_depth()?;

        let version_token = match &tag {
            Some(tag) => tag.clone(),
            None => format!("test-{depth}-{}", short_rev(rev, 7)),
        };
        let info = resolve_modinfo(repo.dir(), &version_token)?;
        let full_name = full_name_for(&game.short_name, rev, info.as_ref());

        let placeholder_key = format!("{:x}", md5::compute(identifier.as_bytes()));
        let manifest_key = snapshot(
            &mut self.db,
            &self.pool,
            game.id,
            repo.dir(),
            &source_key,
            &placeholder_key,
            &full_name,
        )?;

        info!("Ingested {source_key} as \"{full_name}\" ({manifest_key})");
        Ok(())
    }
}

/// Resolve the modinfo descriptor in `tree`, if present: substitute
/// the `$VERSION` token, parse strictly, and write the resolved file
/// back so the snapshot carries it. A descriptor that fails to parse
/// aborts the revision (the file is left untouched).
fn resolve_modinfo(tree: &Path, version_token: &str) -> Result<Option<Modinfo>, PollerError> {
    let path = tree.join(MODINFO_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)?;
    let resolved = modinfo::substitute_version(&content, version_token);
    let info = Modinfo::parse(&resolved)?;
    std::fs::write(&path, resolved)?;
    debug!("Resolved $VERSION to {version_token} in {MODINFO_FILE}");
    Ok(Some(info))
}

/// Human-readable version name: `<name> <version>` when the
/// descriptor declares both, else `<short_name>-<first 8 of rev>`.
fn full_name_for(short_name: &str, rev: &str, info: Option<&Modinfo>) -> String {
    if let Some(info) = info
        && let (Some(name), Some(version)) = (info.name(), info.version())
    {
        return format!("{name} {version}");
    }
    format!("{short_name}-{}", short_rev(rev, 8))
}

fn short_rev(rev: &str, len: usize) -> &str {
    &rev[..rev.len().min(len)]
}

/// Snapshot the working tree at `tree` as one new version, inside a
/// single transaction.
///
/// Walks the tree, digests every file, writes unknown content to the
/// pool, binds (version, file, path) rows, and replaces the
/// placeholder manifest key with the digest of the ordered manifest.
/// On error the transaction rolls back and no version is visible;
/// already-pooled blobs stay behind, which is harmless.
///
/// Returns the final manifest key.
pub fn snapshot(
    db: &mut Database,
    pool: &BlobPool,
    game_id: i64,
    tree: &Path,
    source_key: &str,
    placeholder_key: &str,
    full_name: &str,
) -> Result<String, PollerError> {
    let tx = db.transaction()?;

    let version_id =
        queries::insert_version(&tx, game_id, source_key, placeholder_key, full_name)?;

    for entry in WalkDir::new(tree).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry.path().strip_prefix(tree).unwrap_or(entry.path());
        let Some(path) = normalize_path(rel) else {
            warn!("Skipping non-UTF-8 path {:?}", rel);
            continue;
        };
        if path.starts_with(".git") {
            continue;
        }

        let sums = digest_file(entry.path())?;
        let digest = sums.md5_hex();

        let file_id = match queries::file_id_by_digest(&tx, &digest)? {
            Some(id) => id,
            None => {
                let id = queries::insert_file(&tx, &digest, sums.crc32, sums.len)?;
                pool.store(&digest, entry.path())?;
                id
            }
        };
        queries::insert_version_file(&tx, version_id, file_id, &path)?;
    }

    let entries = queries::manifest_entries(&tx, version_id)?;
    let manifest_key = manifest::manifest_digest(&wire_records(&entries)?);
    queries::update_manifest_key(&tx, version_id, &manifest_key)?;

    tx.commit()?;
    debug!(
        "Snapshot {source_key}: {} files, manifest {manifest_key}",
        entries.len()
    );
    Ok(manifest_key)
}

/// Lowercased, forward-slash, no leading slash. `None` for paths
/// that are not UTF-8.
fn normalize_path(rel: &Path) -> Option<String> {
    let path = rel.to_str()?;
    let path = path.replace('\\', "/");
    let path = path.trim_start_matches('/');
    Some(path.to_lowercase())
}

/// Convert catalog manifest rows (already in wire order) into SDP
/// records.
pub fn wire_records(entries: &[ManifestEntry]) -> Result<Vec<SdpRecord>, PollerError> {
    entries
        .iter()
        .map(|entry| {
            let mut md5 = [0u8; 16];
            hex::decode_to_slice(&entry.md5, &mut md5)
                .map_err(|_| PollerError::CorruptDigest(entry.md5.clone()))?;
            Ok(SdpRecord {
                filename: entry.path.clone(),
                md5,
                crc32: entry.crc32,
                size: entry.len as u32,
            })
        })
        .collect()
}

/// Encode a version's manifest as a raw SDP stream.
pub fn encode_manifest(entries: &[ManifestEntry]) -> Result<Vec<u8>, PollerError> {
    let records = wire_records(entries)?;
    let mut buf = Vec::new();
    sdp::write_all(&mut buf, &records)?;
    Ok(buf)
}
