use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the schema in the configured database.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation on an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per product name; the serialized record lives in result_json.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id TEXT PRIMARY KEY,
            product_name TEXT NOT NULL UNIQUE,
            ingredient_image_url TEXT NOT NULL,
            nutrition_image_url TEXT NOT NULL,
            result_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analyses_updated_at ON analyses(updated_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
