//! `lockkeeper`: operator tool for project locks and lock revoker rights.

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use lockkeeper_service::{DbConfig, LockConfig, LockManager, PgLockStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // --- Tracing ---
    init_tracing(cli.json_logs);

    // --- Configuration ---
    let db_config = DbConfig::from_env();
    let lock_config = LockConfig::from_env();
    tracing::debug!(
        max_connections = db_config.max_connections,
        poll_interval_ms = lock_config.poll_interval.as_millis() as u64,
        default_revoke_timeout_secs = lock_config.default_revoke_timeout_secs,
        "Loaded configuration"
    );

    // --- Database ---
    let database_url = db_config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    let pool = lockkeeper_db::create_pool(database_url, db_config.max_connections)
        .await
        .context("Failed to connect to database")?;
    lockkeeper_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::debug!("Database connection pool created");

    let store = PgLockStore::new(pool);
    let manager = LockManager::new(lock_config);

    commands::run(cli.command, &store, &manager, cli.user.as_deref(), cli.format).await
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lockkeeper=info,lockkeeper_service=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
