use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::StorageResult;

pub async fn create_pool(db_path: &str) -> StorageResult<SqlitePool> {
    let url = format!("sqlite:{db_path}?mode=rwc");

    let pool = SqlitePoolOptions::new().max_connections(5).connect(&url).await?;

    info!(path = %db_path, "database connected");
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> StorageResult<()> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;

    let migrations = [
        include_str!("../migrations/001_initial_schema.sql"),
        include_str!("../migrations/002_results.sql"),
        include_str!("../migrations/003_qualifying.sql"),
    ];

    for migration_sql in &migrations {
        for statement in migration_sql.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(pool).await?;
            }
        }
    }

    info!("database migrations applied");
    Ok(())
}
