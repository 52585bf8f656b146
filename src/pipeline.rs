//! The label pipeline: two concurrent streams, merge, upsert.
//!
//! ```text
//! ingredient URL ─▶ extract ─▶ clean_ingredient_text ─▶ analyze_ingredient ─┐
//!                                                                           ├─▶ merge ─▶ upsert
//! nutrition URL  ─▶ extract ─▶ clean_nutrition_text  ─▶ analyze_nutrition  ─┘
//! ```
//!
//! Each stream runs as its own task in a [`JoinSet`]. The first fatal
//! failure aborts the other stream and is returned; nothing is merged or
//! stored in that case. Output that fails schema validation arrives as the
//! sentinel analysis and never aborts a run.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info};

use nutrilens_core::clean::{clean_ingredient_text, clean_nutrition_text};
use nutrilens_core::merge::merge;
use nutrilens_core::models::{
    Analysis, DocumentKind, IngredientAnalysis, LabelImages, NutritionAnalysis, RecordId,
};
use nutrilens_core::store::AnalysisStore;

use crate::config::Config;
use crate::error::{PersistenceError, PipelineError};
use crate::llm::{ChatCompletionClient, StructuredAnalyzer};
use crate::ocr::{ClovaOcrClient, TextExtractor};

/// Both stream results of one run.
#[derive(Debug, Clone)]
pub struct StreamResults {
    pub ingredient: Analysis<IngredientAnalysis>,
    pub nutrition: Analysis<NutritionAnalysis>,
}

/// What a successful run returns to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub product_id: RecordId,
    pub product_name: String,
    pub ingredient_analysis: Analysis<IngredientAnalysis>,
    pub nutrition_analysis: Analysis<NutritionAnalysis>,
}

enum StreamOutput {
    Ingredient(Analysis<IngredientAnalysis>),
    Nutrition(Analysis<NutritionAnalysis>),
}

/// Shared, immutable collaborators of every run.
#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<dyn TextExtractor>,
    analyzer: Arc<dyn StructuredAnalyzer>,
    store: Arc<dyn AnalysisStore>,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        analyzer: Arc<dyn StructuredAnalyzer>,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            store,
        }
    }

    /// Build the HTTP provider clients from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn AnalysisStore>) -> anyhow::Result<Self> {
        let extractor = ClovaOcrClient::new(&config.ocr)?;
        let analyzer = ChatCompletionClient::new(&config.llm, config.analysis.vocabulary())?;
        Ok(Self::new(Arc::new(extractor), Arc::new(analyzer), store))
    }

    pub fn store(&self) -> &Arc<dyn AnalysisStore> {
        &self.store
    }

    /// Run both streams concurrently and wait for both results.
    pub async fn run_streams(&self, images: &LabelImages) -> Result<StreamResults, PipelineError> {
        let mut join_set = JoinSet::new();

        let extractor = self.extractor.clone();
        let analyzer = self.analyzer.clone();
        let url = images.ingredient_image_url.clone();
        let ingredient_task = join_set
            .spawn(async move {
                ingredient_stream(extractor.as_ref(), analyzer.as_ref(), &url)
                    .await
                    .map(StreamOutput::Ingredient)
            })
            .id();

        let extractor = self.extractor.clone();
        let analyzer = self.analyzer.clone();
        let url = images.nutrition_image_url.clone();
        join_set.spawn(async move {
            nutrition_stream(extractor.as_ref(), analyzer.as_ref(), &url)
                .await
                .map(StreamOutput::Nutrition)
        });

        let mut ingredient = None;
        let mut nutrition = None;

        while let Some(joined) = join_set.join_next().await {
            let failure = match joined {
                Ok(Ok(StreamOutput::Ingredient(analysis))) => {
                    ingredient = Some(analysis);
                    continue;
                }
                Ok(Ok(StreamOutput::Nutrition(analysis))) => {
                    nutrition = Some(analysis);
                    continue;
                }
                Ok(Err(err)) => err,
                Err(join_err) => {
                    let kind = if join_err.id() == ingredient_task {
                        DocumentKind::Ingredient
                    } else {
                        DocumentKind::Nutrition
                    };
                    PipelineError::Task {
                        kind,
                        message: join_err.to_string(),
                    }
                }
            };
            join_set.abort_all();
            error!(error = %failure, "Stream failed; run aborted");
            return Err(failure);
        }

        match (ingredient, nutrition) {
            (Some(ingredient), Some(nutrition)) => Ok(StreamResults {
                ingredient,
                nutrition,
            }),
            (None, _) => Err(PipelineError::Task {
                kind: DocumentKind::Ingredient,
                message: "stream produced no result".to_string(),
            }),
            (_, None) => Err(PipelineError::Task {
                kind: DocumentKind::Nutrition,
                message: "stream produced no result".to_string(),
            }),
        }
    }

    /// Full run: both streams, merge, upsert.
    pub async fn run(&self, images: &LabelImages) -> Result<PipelineOutcome, PipelineError> {
        info!(
            ingredient_image_url = %images.ingredient_image_url,
            nutrition_image_url = %images.nutrition_image_url,
            "Pipeline run started"
        );

        let results = self.run_streams(images).await?;
        let record = merge(images, results.ingredient, results.nutrition);

        let product_id = self.store.upsert(&record).await.map_err(|err| {
            let err = PersistenceError::from(err);
            error!(error = %err, product_name = %record.product_name, "Upsert failed");
            err
        })?;

        info!(product_id = %product_id, product_name = %record.product_name, "Analysis stored");

        Ok(PipelineOutcome {
            product_id,
            product_name: record.product_name,
            ingredient_analysis: record.ingredient_analysis,
            nutrition_analysis: record.nutrition_analysis,
        })
    }
}

async fn extract_and_clean(
    extractor: &dyn TextExtractor,
    kind: DocumentKind,
    url: &str,
    clean: fn(&str) -> String,
) -> Result<String, PipelineError> {
    let raw = extractor
        .extract(url)
        .await
        .map_err(|source| PipelineError::Extraction { kind, source })?;
    let cleaned = clean(&raw);
    info!(
        %kind,
        raw_chars = raw.chars().count(),
        cleaned_chars = cleaned.chars().count(),
        "Label text extracted"
    );
    Ok(cleaned)
}

async fn ingredient_stream(
    extractor: &dyn TextExtractor,
    analyzer: &dyn StructuredAnalyzer,
    url: &str,
) -> Result<Analysis<IngredientAnalysis>, PipelineError> {
    let kind = DocumentKind::Ingredient;
    let text = extract_and_clean(extractor, kind, url, clean_ingredient_text).await?;
    let analysis = analyzer
        .analyze_ingredient(&text)
        .await
        .map_err(|source| PipelineError::Analysis { kind, source })?;
    info!(%kind, degraded = analysis.is_invalid(), "Label analyzed");
    Ok(analysis)
}

async fn nutrition_stream(
    extractor: &dyn TextExtractor,
    analyzer: &dyn StructuredAnalyzer,
    url: &str,
) -> Result<Analysis<NutritionAnalysis>, PipelineError> {
    let kind = DocumentKind::Nutrition;
    let text = extract_and_clean(extractor, kind, url, clean_nutrition_text).await?;
    let analysis = analyzer
        .analyze_nutrition(&text)
        .await
        .map_err(|source| PipelineError::Analysis { kind, source })?;
    info!(%kind, degraded = analysis.is_invalid(), "Label analyzed");
    Ok(analysis)
}
