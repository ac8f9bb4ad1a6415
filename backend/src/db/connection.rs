use anyhow::Context;
use sqlx::{
    migrate::Migrator,
    postgres::{PgConnectOptions, PgPool, PgPoolOptions},
};
use std::str::FromStr;

use crate::config::Config;

static EMBEDDED_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens the process-wide connection pool described by `config`.
pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let options = PgConnectOptions::from_str(&config.database_url)
        .context("parse DATABASE_URL")?
        .ssl_mode(config.database_ssl_mode);

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.database_acquire_timeout)
        .connect_with(options)
        .await
        .context("connect to database")?;
    Ok(pool)
}

/// Applies pending migrations, from `MIGRATIONS_DIR` when configured and from
/// the migrations embedded at build time otherwise.
pub async fn run_migrations(pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    match &config.migrations_dir {
        Some(dir) => {
            tracing::info!(directory = %dir.display(), "running migrations from directory");
            let migrator = Migrator::new(dir.clone())
                .await
                .with_context(|| format!("load migrations from {}", dir.display()))?;
            migrator.run(pool).await.context("run migrations")?;
        }
        None => {
            tracing::info!("running embedded migrations");
            EMBEDDED_MIGRATOR
                .run(pool)
                .await
                .context("run embedded migrations")?;
        }
    }
    Ok(())
}
