//! Reading stored analyses back out: `nutrilens get` and `nutrilens list`.

use anyhow::{bail, Result};

use nutrilens_core::models::StoredAnalysis;
use nutrilens_core::store::AnalysisStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    Ok(SqliteStore::new(pool))
}

/// CLI entry point: print the stored record for `product_name` as JSON.
pub async fn run_get(config: &Config, product_name: &str) -> Result<()> {
    let store = open_store(config).await?;
    let stored = store.get(product_name).await;
    store.pool().close().await;

    match stored? {
        Some(stored) => {
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
        None => bail!("no analysis stored for product '{}'", product_name),
    }
}

/// CLI entry point: one line per stored record, newest first.
pub async fn run_list(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config).await?;
    let records = store.list(limit).await;
    store.pool().close().await;
    let records = records?;

    if records.is_empty() {
        println!("No analyses stored.");
        return Ok(());
    }

    println!(
        "{:<20}  {:<36}  {:<6}  PRODUCT",
        "UPDATED", "ID", "FLAGS"
    );
    for stored in &records {
        println!(
            "{:<20}  {:<36}  {:<6}  {}",
            stored.updated_at.format("%Y-%m-%dT%H:%M:%SZ"),
            stored.id,
            flags(stored),
            stored.record.product_name
        );
    }
    Ok(())
}

/// `I`/`N` mark an ingredient/nutrition analysis that degraded to the
/// sentinel.
fn flags(stored: &StoredAnalysis) -> String {
    let mut flags = String::new();
    if stored.record.ingredient_analysis.is_invalid() {
        flags.push('I');
    }
    if stored.record.nutrition_analysis.is_invalid() {
        flags.push('N');
    }
    if flags.is_empty() {
        flags.push('-');
    }
    flags
}
