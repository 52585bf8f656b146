//! SQLite-backed [`AnalysisStore`] implementation.
//!
//! One row per product name in the `analyses` table (see
//! [`crate::migrate`]). The two analyses are stored together as JSON in
//! `result_json`; the image URLs and timestamps get their own columns.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use nutrilens_core::models::{
    Analysis, AnalysisRecord, IngredientAnalysis, NutritionAnalysis, RecordId, StoredAnalysis,
};
use nutrilens_core::store::AnalysisStore;

/// SQLite implementation of the [`AnalysisStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Shape of the `result_json` column.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredResult {
    ingredient_analysis: Analysis<IngredientAnalysis>,
    nutrition_analysis: Analysis<NutritionAnalysis>,
}

// Fixed-width UTC timestamps so TEXT ordering matches time ordering.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in store: {}", raw))?
        .with_timezone(&Utc))
}

fn row_to_stored(row: &sqlx::sqlite::SqliteRow) -> Result<StoredAnalysis> {
    let product_name: String = row.get("product_name");
    let result_json: String = row.get("result_json");
    let result: StoredResult = serde_json::from_str(&result_json)
        .with_context(|| format!("Corrupt result_json for product '{}'", product_name))?;
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(StoredAnalysis {
        id: row.get("id"),
        record: AnalysisRecord {
            product_name,
            ingredient_image_url: row.get("ingredient_image_url"),
            nutrition_image_url: row.get("nutrition_image_url"),
            ingredient_analysis: result.ingredient_analysis,
            nutrition_analysis: result.nutrition_analysis,
        },
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

#[async_trait]
impl AnalysisStore for SqliteStore {
    async fn upsert(&self, record: &AnalysisRecord) -> Result<RecordId> {
        let now = format_ts(Utc::now());
        let result_json = serde_json::to_string(&StoredResult {
            ingredient_analysis: record.ingredient_analysis.clone(),
            nutrition_analysis: record.nutrition_analysis.clone(),
        })?;

        // On conflict the existing id and created_at are kept.
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO analyses (id, product_name, ingredient_image_url, nutrition_image_url,
                                  result_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(product_name) DO UPDATE SET
                ingredient_image_url = excluded.ingredient_image_url,
                nutrition_image_url = excluded.nutrition_image_url,
                result_json = excluded.result_json,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.product_name)
        .bind(&record.ingredient_image_url)
        .bind(&record.nutrition_image_url)
        .bind(&result_json)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get(&self, product_name: &str) -> Result<Option<StoredAnalysis>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_name, ingredient_image_url, nutrition_image_url,
                   result_json, created_at, updated_at
            FROM analyses
            WHERE product_name = ?
            "#,
        )
        .bind(product_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_stored).transpose()
    }

    async fn list(&self, limit: usize) -> Result<Vec<StoredAnalysis>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_name, ingredient_image_url, nutrition_image_url,
                   result_json, created_at, updated_at
            FROM analyses
            ORDER BY updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_stored).collect()
    }
}
