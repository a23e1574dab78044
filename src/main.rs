//! Trigrid server entrypoint.
//!
//! Binds both transports, initializes the results database, and serves
//! until interrupted. Live games are not persisted across restarts.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trigrid::{Cli, GameRegistry, ServerConfig, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config: ServerConfig = Cli::parse().into();
    info!(?config, "starting trigrid server");

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let registry = Arc::new(GameRegistry::new(config, store));

    tokio::select! {
        result = trigrid::serve(Arc::clone(&registry)) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received; live games are discarded");
        }
    }
    Ok(())
}
