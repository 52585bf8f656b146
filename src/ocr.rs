//! Text extraction from label images.
//!
//! [`TextExtractor`] is the seam the pipeline depends on; [`ClovaOcrClient`]
//! implements it against a CLOVA-style general OCR endpoint: one JSON POST
//! per image URL, secret in the `X-OCR-SECRET` header, recognized fragments
//! returned in `images[0].fields[].inferText`.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::OcrConfig;
use crate::error::ExtractionError;

/// Turns an image reference into the raw text printed on it.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image_url: &str) -> Result<String, ExtractionError>;
}

/// Image formats accepted by the provider, matched on the URL extension.
const IMAGE_FORMATS: &[&str] = &["jpg", "jpeg", "png", "pdf", "tif", "tiff"];

pub struct ClovaOcrClient {
    client: reqwest::Client,
    url: String,
    secret: String,
    preserve_line_breaks: bool,
}

impl ClovaOcrClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Fails if `ocr.url` is empty or the secret cannot be resolved.
    pub fn new(config: &OcrConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            bail!("ocr.url must be set to the OCR invoke URL");
        }
        let secret = config.resolve_secret()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            secret,
            preserve_line_breaks: config.preserve_line_breaks,
        })
    }
}

#[async_trait]
impl TextExtractor for ClovaOcrClient {
    async fn extract(&self, image_url: &str) -> Result<String, ExtractionError> {
        let body = json!({
            "version": "V1",
            "requestId": Uuid::new_v4().to_string(),
            "timestamp": chrono::Utc::now().timestamp_millis(),
            "lang": "ko",
            "images": [{
                "format": image_format(image_url),
                "name": image_name(image_url),
                "url": image_url,
            }],
        });

        let response = self
            .client
            .post(&self.url)
            .header("X-OCR-SECRET", &self.secret)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response.json().await?;
        let text = parse_ocr_response(&json, self.preserve_line_breaks)?;
        debug!(image_url, chars = text.chars().count(), "OCR text extracted");
        Ok(text)
    }
}

/// Join the recognized fragments of the first image.
///
/// Fragments are space-separated in provider order. With
/// `preserve_line_breaks`, a fragment flagged `lineBreak` is followed by a
/// newline instead.
pub fn parse_ocr_response(
    json: &Value,
    preserve_line_breaks: bool,
) -> Result<String, ExtractionError> {
    let image = json
        .get("images")
        .and_then(|images| images.get(0))
        .ok_or(ExtractionError::MissingFields)?;

    if let Some(result) = image.get("inferResult").and_then(|r| r.as_str()) {
        if result != "SUCCESS" {
            let message = image
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or(result);
            return Err(ExtractionError::Inference(message.to_string()));
        }
    }

    let fields = image
        .get("fields")
        .and_then(|f| f.as_array())
        .ok_or(ExtractionError::MissingFields)?;

    let mut text = String::new();
    let mut separator = "";
    for field in fields {
        let Some(fragment) = field.get("inferText").and_then(|t| t.as_str()) else {
            continue;
        };
        text.push_str(separator);
        text.push_str(fragment);
        let line_break = field
            .get("lineBreak")
            .and_then(|b| b.as_bool())
            .unwrap_or(false);
        separator = if preserve_line_breaks && line_break {
            "\n"
        } else {
            " "
        };
    }

    Ok(text)
}

/// Last path segment of the URL, without query or fragment.
fn last_segment(image_url: &str) -> &str {
    let path = image_url
        .split(['?', '#'])
        .next()
        .unwrap_or(image_url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Provider image format from the URL extension, `jpg` when unknown.
pub fn image_format(image_url: &str) -> String {
    last_segment(image_url)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_FORMATS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string())
}

fn image_name(image_url: &str) -> String {
    let segment = last_segment(image_url);
    let stem = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
    if stem.is_empty() {
        "label".to_string()
    } else {
        stem.to_string()
    }
}
