//! `nutrilens analyze`: one pipeline run from the command line.

use std::sync::Arc;

use anyhow::Result;

use nutrilens_core::merge::merge;
use nutrilens_core::models::LabelImages;
use nutrilens_core::store::memory::InMemoryStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::pipeline::Pipeline;
use crate::sqlite_store::SqliteStore;

/// Run the pipeline on two image URLs and print the result as JSON.
///
/// With `no_store`, both streams run and the merged record is printed
/// without opening or creating the database.
pub async fn run_analyze(
    config: &Config,
    ingredient_image_url: &str,
    nutrition_image_url: &str,
    no_store: bool,
) -> Result<()> {
    let images = LabelImages::new(ingredient_image_url, nutrition_image_url);

    if no_store {
        let pipeline = Pipeline::from_config(config, Arc::new(InMemoryStore::new()))?;
        let results = pipeline.run_streams(&images).await?;
        let record = merge(&images, results.ingredient, results.nutrition);
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let pipeline = Pipeline::from_config(config, Arc::new(SqliteStore::new(pool.clone())))?;

    let rendered = render(&pipeline, &images).await;
    pool.close().await;

    println!("{}", rendered?);
    Ok(())
}

async fn render(pipeline: &Pipeline, images: &LabelImages) -> Result<String> {
    let outcome = pipeline.run(images).await?;
    Ok(serde_json::to_string_pretty(&outcome)?)
}
