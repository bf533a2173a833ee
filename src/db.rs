use crate::config::AppConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes the connection pool described by the application config.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    debug!("connecting to database at {}", cfg.database_url);

    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    Database::connect(opt).await
}

/// Runs all pending migrations.
pub async fn run_migrations(db: &DbPool) -> Result<(), DbErr> {
    info!("running database migrations");
    crate::migrator::Migrator::up(db, None).await
}
