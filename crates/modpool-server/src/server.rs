//! Server state management and orchestration.

use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use modpool_db::Database;
use modpool_store::BlobPool;

use crate::config::Config;
use crate::poller::Poller;
use crate::{ServerError, http};

/// Shared state of the HTTP handlers.
///
/// The handlers' database connection is distinct from the poller's;
/// both point at the same file and WAL keeps readers consistent
/// while an ingestion transaction is open.
pub struct AppState {
    db: Mutex<Database>,
    pool: BlobPool,
}

impl AppState {
    /// Open handler-side state from configuration.
    pub fn new(config: &Config) -> Result<Self, ServerError> {
        let db = Database::open(&config.database_url)?;
        Ok(Self {
            db: Mutex::new(db),
            pool: BlobPool::new(config.pool_path.clone()),
        })
    }

    /// Lock the catalog connection.
    pub fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The blob pool.
    pub fn pool(&self) -> &BlobPool {
        &self.pool
    }
}

/// The distribution server: poller thread plus sync service.
pub struct Server {
    config: Config,
    state: Arc<AppState>,
}

impl Server {
    /// Validate configuration, create the on-disk roots, open the
    /// catalog and report what it holds.
    pub fn new(config: Config) -> Result<Self, ServerError> {
        config.validate()?;

        for (what, path) in [("pool", &config.pool_path), ("repos", &config.repos_path)] {
            fs::create_dir_all(path).map_err(|source| ServerError::CreateDirFailed {
                what,
                path: path.clone(),
                source,
            })?;
        }

        let state = AppState::new(&config)?;
        {
            let db = state.db();
            info!(
                "Catalog holds {} games, {} versions ({} published)",
                db.count_games()?,
                db.count_versions()?,
                db.count_published_versions()?
            );
        }

        Ok(Self {
            config,
            state: Arc::new(state),
        })
    }

    /// Shared handler state, mainly for tests.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Spawn the poller thread and serve HTTP until terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        let poller_db = Database::open(&self.config.database_url)?;
        let poller = Poller::new(
            &self.config,
            poller_db,
            BlobPool::new(self.config.pool_path.clone()),
        );
        poller.spawn()?;
        info!(
            "Poller started: {} revisions backlog per game",
            self.config.back_log
        );

        http::start_server(self.config.http_bind, self.state).await
    }
}
