//! Modpool server binary entry point.
//!
//! A thin wrapper around the modpool-server library: initialize
//! logging, load the YAML configuration named on the command line,
//! and run the server (poller thread + sync service).

use anyhow::Result;
use modpool_server::{Cli, Config, Server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::from_args();
    let config = Config::load(&cli.config)?;
    config.validate()?;

    tracing::info!(
        "Configuration loaded: catalog={:?}, pool={:?}, repos={:?}, bind={}",
        config.database_url,
        config.pool_path,
        config.repos_path,
        config.http_bind
    );

    let server = Server::new(config)?;
    server.run().await?;

    Ok(())
}
