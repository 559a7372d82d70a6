use std::time::Duration;

use anyhow::{Context, Result};
use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};

use crate::{
    aliases::{DbConnectionManager, DbPool},
    config::DatabaseConfig,
};

pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let manager = DbConnectionManager::new(&config.url);
    DbPool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(10))
        .build(manager)
        .await
        .context("Failed to build the DB connection pool")
}

/// Runs pending migrations on a dedicated blocking thread, returning how many
/// were applied.
pub async fn run_migrations_blocking(
    migrations: EmbeddedMigrations,
    database_url: &str,
) -> Result<usize> {
    let database_url = database_url.to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&database_url)
            .context("Failed to connect for migrations")?;
        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
        Ok::<usize, anyhow::Error>(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
