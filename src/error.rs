//! Error types for the label pipeline.
//!
//! Extraction, analysis and persistence faults are fatal for a pipeline
//! run and are reported as [`PipelineError`]. Malformed model output is
//! not an error here: it is converted into the sentinel analysis by
//! [`crate::llm`].

use thiserror::Error;

use nutrilens_core::models::DocumentKind;

/// OCR provider failures.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("OCR request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OCR provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("OCR response is missing images[0].fields")]
    MissingFields,

    #[error("OCR inference did not succeed: {0}")]
    Inference(String),
}

/// Chat-completion provider failures.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("LLM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM response has no choices[0].message.content")]
    MissingContent,
}

/// Store failure during the final upsert.
#[derive(Error, Debug)]
#[error("Persistence failed: {0}")]
pub struct PersistenceError(pub String);

impl From<anyhow::Error> for PersistenceError {
    fn from(err: anyhow::Error) -> Self {
        PersistenceError(format!("{:#}", err))
    }
}

/// Fatal failure of a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{kind} extraction: {source}")]
    Extraction {
        kind: DocumentKind,
        #[source]
        source: ExtractionError,
    },

    #[error("{kind} analysis: {source}")]
    Analysis {
        kind: DocumentKind,
        #[source]
        source: AnalysisError,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("{kind} stream task failed: {message}")]
    Task { kind: DocumentKind, message: String },
}

impl PipelineError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Extraction { .. } => "extraction_failed",
            PipelineError::Analysis { .. } => "analysis_failed",
            PipelineError::Persistence(_) => "persistence_failed",
            PipelineError::Task { .. } => "task_failed",
        }
    }
}
