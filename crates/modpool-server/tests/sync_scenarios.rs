//! End-to-end scenarios: ingest trees into a real catalog + pool,
//! then drive the sync handlers against them. Git plumbing is
//! bypassed; trees are snapshotted directly the way the poller does.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as AxumPath, RawQuery, State};
use axum::response::Response;
use byteorder::{BigEndian, ByteOrder};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use pretty_assertions::assert_eq;

use modpool_db::Database;
use modpool_server::http::handlers;
use modpool_server::poller::snapshot;
use modpool_server::{AppState, Config};
use modpool_store::BlobPool;

struct Fixture {
    root: tempfile::TempDir,
    db_path: PathBuf,
    pool: BlobPool,
    game_id: i64,
    state: Arc<AppState>,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let db_path = root.path().join("catalog.db");
        let pool_path = root.path().join("pool");

        let db = Database::open(&db_path).unwrap();
        let game = db
            .insert_game("g", "https://git.example/g.git", "https://repos.example/g")
            .unwrap();
        drop(db);

        let config = Config {
            database_url: db_path.clone(),
            repos_path: root.path().join("repos"),
            pool_path: pool_path.clone(),
            back_log: 10,
            cookiesecret: "secret".to_string(),
            http_bind: "127.0.0.1:0".parse().unwrap(),
        };
        let state = Arc::new(AppState::new(&config).unwrap());

        Self {
            root,
            db_path,
            pool: BlobPool::new(pool_path),
            game_id: game.id,
            state,
        }
    }

    /// Write a tree of (path, content) files and snapshot it as a
    /// new version, the way the poller does after checkout.
    fn ingest(&self, rev: &str, files: &[(&str, &[u8])]) -> String {
        let tree = self.root.path().join(format!("tree-{rev}"));
        for (path, content) in files {
            let full = tree.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        self.snapshot_tree(&tree, rev).unwrap()
    }

    fn snapshot_tree(
        &self,
        tree: &Path,
        rev: &str,
    ) -> Result<String, modpool_server::PollerError> {
        let mut db = Database::open(&self.db_path).unwrap();
        let placeholder = format!("{:x}", md5::compute(rev.as_bytes()));
        snapshot(
            &mut db,
            &self.pool,
            self.game_id,
            tree,
            &format!("git:{rev}"),
            &placeholder,
            &format!("g-{rev}"),
        )
    }

    fn pool_blob_count(&self) -> usize {
        let mut count = 0;
        for prefix in fs::read_dir(self.pool.root()).unwrap() {
            for blob in fs::read_dir(prefix.unwrap().path()).unwrap() {
                assert!(blob.unwrap().path().extension().is_some());
                count += 1;
            }
        }
        count
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    out
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";
const WORLD_MD5: &str = "7d793037a0760186574b0282f2f435e7";

#[test]
fn test_ingest_dedup_and_pool_layout() {
    let fx = Fixture::new();

    // Revision 1: A.txt + B.txt. Paths are stored normalized.
    fx.ingest("rev1", &[("A.txt", b"hello"), ("B.txt", b"world")]);

    let db = Database::open(&fx.db_path).unwrap();
    let v1 = db.version_by_source_key("git:rev1").unwrap().unwrap();
    let entries = db.manifest_entries(v1.id).unwrap();

    // Manifest order: a.txt (crc32 0x3610A686) before b.txt (0x3A771143).
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].path, "a.txt");
    assert_eq!(entries[0].md5, HELLO_MD5);
    assert_eq!(entries[0].crc32, 0x3610A686);
    assert_eq!(entries[1].path, "b.txt");
    assert_eq!(entries[1].crc32, 0x3A771143);

    assert!(fx.pool.contains(HELLO_MD5).unwrap());
    assert!(fx.pool.contains(WORLD_MD5).unwrap());
    assert_eq!(fx.pool_blob_count(), 2);

    // Revision 2: A.txt unchanged, B.txt changed. Shared content is
    // represented by one file row and one blob.
    fx.ingest("rev2", &[("A.txt", b"hello"), ("B.txt", b"worlds")]);

    let v2 = db.version_by_source_key("git:rev2").unwrap().unwrap();
    let entries2 = db.manifest_entries(v2.id).unwrap();
    assert_eq!(entries2.len(), 2);
    assert_eq!(fx.pool_blob_count(), 3);
    assert_ne!(v1.manifest_key, v2.manifest_key);

    // The shared file resolves to the same digest in both manifests.
    let a1 = entries.iter().find(|e| e.path == "a.txt").unwrap();
    let a2 = entries2.iter().find(|e| e.path == "a.txt").unwrap();
    assert_eq!(a1.md5, a2.md5);
}

#[test]
fn test_manifest_key_is_deterministic() {
    let fx = Fixture::new();
    let files: &[(&str, &[u8])] = &[("A.txt", b"hello"), ("sub/B.txt", b"world")];

    let key1 = fx.ingest("rev1", files);
    let key2 = fx.ingest("rev2", files);

    // Same tree content, same manifest identity, regardless of the
    // source revision.
    assert_eq!(key1, key2);
}

#[test]
fn test_snapshot_skips_git_dir() {
    let fx = Fixture::new();
    fx.ingest(
        "rev1",
        &[("a.txt", b"hello"), (".git/HEAD", b"ref: refs/heads/main")],
    );

    let db = Database::open(&fx.db_path).unwrap();
    let version = db.version_by_source_key("git:rev1").unwrap().unwrap();
    let entries = db.manifest_entries(version.id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "a.txt");
}

#[test]
fn test_failed_snapshot_leaves_no_version() {
    let fx = Fixture::new();

    // Two paths that collide after normalization make the
    // transaction fail partway through the walk.
    let tree = fx.root.path().join("tree-bad");
    fs::create_dir_all(&tree).unwrap();
    fs::write(tree.join("README"), b"hello").unwrap();
    fs::write(tree.join("readme"), b"world").unwrap();

    assert!(fx.snapshot_tree(&tree, "bad").is_err());

    let db = Database::open(&fx.db_path).unwrap();
    assert!(db.version_by_source_key("git:bad").unwrap().is_none());
    assert_eq!(db.count_versions().unwrap(), 0);
}

#[tokio::test]
async fn test_repos_catalog() {
    let fx = Fixture::new();

    let response = handlers::handle_repos(State(fx.state.clone())).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/gzip"
    );

    let text = String::from_utf8(gunzip(&body_bytes(response).await)).unwrap();
    assert_eq!(text, "g,https://repos.example/g,,\n");
}

#[tokio::test]
async fn test_versions_catalog_lists_each_version() {
    let fx = Fixture::new();
    let key1 = fx.ingest("rev1", &[("a.txt", b"hello"), ("b.txt", b"world")]);
    let key2 = fx.ingest("rev2", &[("a.txt", b"hello"), ("b.txt", b"worlds")]);
    assert_ne!(key1, key2);

    let response =
        handlers::handle_versions(AxumPath("g".to_string()), State(fx.state.clone()))
            .await
            .unwrap();
    let text = String::from_utf8(gunzip(&body_bytes(response).await)).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], format!("g:git:rev1,{key1},,g-rev1"));
    assert_eq!(lines[1], format!("g:git:rev2,{key2},,g-rev2"));
}

#[tokio::test]
async fn test_versions_catalog_unknown_game_is_404() {
    let fx = Fixture::new();
    let err = handlers::handle_versions(AxumPath("nope".to_string()), State(fx.state.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, handlers::AppError::NotFound));
}

#[tokio::test]
async fn test_package_manifest_records() {
    let fx = Fixture::new();
    let key = fx.ingest("rev1", &[("A.txt", b"hello"), ("B.txt", b"world")]);

    let response = handlers::handle_package(
        AxumPath(("g".to_string(), format!("{key}.sdp"))),
        State(fx.state.clone()),
    )
    .await
    .unwrap();

    let stream = gunzip(&body_bytes(response).await);
    let records = modpool_formats::sdp::read_all(&mut stream.as_slice()).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].filename, "a.txt");
    assert_eq!(records[0].size, 5);
    assert_eq!(records[0].crc32, 0x3610A686);
    assert_eq!(hex::encode(records[0].md5), HELLO_MD5);
    // Wire order is non-decreasing in CRC32.
    assert!(records[0].crc32 <= records[1].crc32);
}

#[tokio::test]
async fn test_package_unknown_manifest_is_404() {
    let fx = Fixture::new();
    let err = handlers::handle_package(
        AxumPath(("g".to_string(), "00000000000000000000000000000000.sdp".to_string())),
        State(fx.state.clone()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, handlers::AppError::NotFound));
}

#[tokio::test]
async fn test_streamer_sends_requested_blobs_with_size_prefix() {
    let fx = Fixture::new();
    let key = fx.ingest("rev1", &[("A.txt", b"hello"), ("B.txt", b"world")]);

    // Bit 1 set: request only record 1 (b.txt).
    let bitmap = gzip(&[0b0000_0010]);
    let response = handlers::handle_streamer(
        AxumPath("g".to_string()),
        RawQuery(Some(key)),
        State(fx.state.clone()),
        bitmap.into(),
    )
    .await
    .unwrap();

    let expected_size = fx.pool.compressed_size(WORLD_MD5).unwrap();
    let content_length: u64 = response.headers()["content-length"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(content_length, expected_size + 4);

    let body = body_bytes(response).await;
    assert_eq!(body.len() as u64, expected_size + 4);
    assert_eq!(u64::from(BigEndian::read_u32(&body[..4])), expected_size);

    // The payload is the pooled blob verbatim: gzip bytes that
    // decompress to the original content.
    assert_eq!(gunzip(&body[4..]), b"world");

    let (mut blob, _) = fx.pool.open(WORLD_MD5).unwrap();
    let mut on_disk = Vec::new();
    blob.read_to_end(&mut on_disk).unwrap();
    assert_eq!(&body[4..], on_disk.as_slice());
}

#[tokio::test]
async fn test_streamer_full_bitmap_streams_in_manifest_order() {
    let fx = Fixture::new();
    let key = fx.ingest("rev1", &[("A.txt", b"hello"), ("B.txt", b"world")]);

    let bitmap = gzip(&[0b0000_0011]);
    let response = handlers::handle_streamer(
        AxumPath("g".to_string()),
        RawQuery(Some(key)),
        State(fx.state.clone()),
        bitmap.into(),
    )
    .await
    .unwrap();

    let body = body_bytes(response).await;

    // First record is a.txt (lower CRC32).
    let first_len = BigEndian::read_u32(&body[..4]) as usize;
    assert_eq!(gunzip(&body[4..4 + first_len]), b"hello");

    let rest = &body[4 + first_len..];
    let second_len = BigEndian::read_u32(&rest[..4]) as usize;
    assert_eq!(rest.len(), 4 + second_len);
    assert_eq!(gunzip(&rest[4..]), b"world");
}

#[tokio::test]
async fn test_streamer_empty_bitmap_sends_nothing() {
    let fx = Fixture::new();
    let key = fx.ingest("rev1", &[("a.txt", b"hello")]);

    let response = handlers::handle_streamer(
        AxumPath("g".to_string()),
        RawQuery(Some(key)),
        State(fx.state.clone()),
        gzip(&[0u8]).into(),
    )
    .await
    .unwrap();

    assert_eq!(response.headers()["content-length"], "0");
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_streamer_unreadable_bitmap_is_internal_error() {
    let fx = Fixture::new();
    let key = fx.ingest("rev1", &[("a.txt", b"hello")]);

    let err = handlers::handle_streamer(
        AxumPath("g".to_string()),
        RawQuery(Some(key)),
        State(fx.state.clone()),
        axum::body::Bytes::from_static(b"definitely not gzip"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, handlers::AppError::Internal(_)));
}

#[tokio::test]
async fn test_streamer_unknown_manifest_is_404() {
    let fx = Fixture::new();
    let err = handlers::handle_streamer(
        AxumPath("g".to_string()),
        RawQuery(Some("ffffffffffffffffffffffffffffffff".to_string())),
        State(fx.state.clone()),
        gzip(&[0xFF]).into(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, handlers::AppError::NotFound));
}
