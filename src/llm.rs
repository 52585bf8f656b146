//! Structured analysis of cleaned label text by a chat-completion model.
//!
//! [`StructuredAnalyzer`] is the seam the pipeline depends on;
//! [`ChatCompletionClient`] implements it against an OpenAI-compatible
//! `chat/completions` endpoint.
//!
//! Transport faults and malformed provider envelopes are
//! [`AnalysisError`]s. A well-formed envelope whose `content` does not
//! satisfy the label schema is not an error: it is logged and replaced by
//! the sentinel [`Analysis::invalid`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use nutrilens_core::models::{Analysis, DocumentKind, IngredientAnalysis, NutritionAnalysis};
use nutrilens_core::prompt;
use nutrilens_core::schema::{self, CategoryVocabulary, SchemaError};

use crate::config::LlmConfig;
use crate::error::AnalysisError;

/// Turns cleaned label text into a structured analysis.
#[async_trait]
pub trait StructuredAnalyzer: Send + Sync {
    async fn analyze_ingredient(
        &self,
        text: &str,
    ) -> Result<Analysis<IngredientAnalysis>, AnalysisError>;

    async fn analyze_nutrition(&self, text: &str)
        -> Result<Analysis<NutritionAnalysis>, AnalysisError>;
}

pub struct ChatCompletionClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    vocabulary: CategoryVocabulary,
}

impl ChatCompletionClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the API key cannot be resolved.
    pub fn new(config: &LlmConfig, vocabulary: CategoryVocabulary) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            vocabulary,
        })
    }

    /// Send one system + user exchange and return the raw message content.
    async fn complete(&self, kind: DocumentKind, text: &str) -> Result<String, AnalysisError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt::system_instruction(kind, &self.vocabulary)},
                {"role": "user", "content": prompt::user_message(kind, text)},
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response.json().await?;
        let content = parse_completion(&json)?;
        debug!(%kind, chars = content.chars().count(), "LLM content received");
        Ok(content)
    }
}

/// Pull `choices[0].message.content` out of a completion response.
pub fn parse_completion(json: &Value) -> Result<String, AnalysisError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or(AnalysisError::MissingContent)
}

fn or_sentinel<T>(kind: DocumentKind, parsed: Result<T, SchemaError>) -> Analysis<T> {
    match parsed {
        Ok(value) => Analysis::Parsed(value),
        Err(err) => {
            warn!(%kind, error = %err, "Model output failed validation; storing sentinel");
            Analysis::invalid()
        }
    }
}

#[async_trait]
impl StructuredAnalyzer for ChatCompletionClient {
    async fn analyze_ingredient(
        &self,
        text: &str,
    ) -> Result<Analysis<IngredientAnalysis>, AnalysisError> {
        let content = self.complete(DocumentKind::Ingredient, text).await?;
        Ok(or_sentinel(
            DocumentKind::Ingredient,
            schema::parse_ingredient(&content, &self.vocabulary),
        ))
    }

    async fn analyze_nutrition(
        &self,
        text: &str,
    ) -> Result<Analysis<NutritionAnalysis>, AnalysisError> {
        let content = self.complete(DocumentKind::Nutrition, text).await?;
        Ok(or_sentinel(
            DocumentKind::Nutrition,
            schema::parse_nutrition(&content),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    /// Mock provider answering every request with `content`.
    fn replying(content: &'static str) -> Router {
        Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers.get("authorization").unwrap(), "Bearer k");
                assert_eq!(body["model"], "gpt-4.1-mini");
                assert_eq!(body["max_tokens"], 4096);
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["role"], "user");
                Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
            }),
        )
    }

    fn client_for(url: String) -> ChatCompletionClient {
        ChatCompletionClient::new(
            &LlmConfig {
                url,
                api_key: Some("k".to_string()),
                ..LlmConfig::default()
            },
            CategoryVocabulary::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_completion() {
        let ok = json!({"choices": [{"message": {"content": "{}"}}]});
        assert_eq!(parse_completion(&ok).unwrap(), "{}");

        for bad in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{"message": {"content": null}}]}),
        ] {
            assert!(matches!(
                parse_completion(&bad),
                Err(AnalysisError::MissingContent)
            ));
        }
    }

    #[tokio::test]
    async fn test_nutrition_parsed_from_fenced_content() {
        let url = serve(replying(
            "```json\n{\"nutrition\": {\"Kcal\": \"250kcal\", \"sodium\": {\"mg\": 110, \"ratio\": \"6%\"}}, \"summary\": \"저열량\"}\n```",
        ))
        .await;
        let analysis = client_for(url).analyze_nutrition("열량 250kcal").await.unwrap();
        let parsed = analysis.parsed().unwrap();
        assert_eq!(parsed.nutrition.kcal, Some(250.0));
        assert_eq!(parsed.nutrition.sodium.mg, Some(110.0));
        assert_eq!(parsed.nutrition.sodium.ratio, Some(6.0));
    }

    #[tokio::test]
    async fn test_malformed_content_becomes_sentinel() {
        let url = serve(replying("죄송합니다, 분석할 수 없습니다.")).await;
        let analysis = client_for(url).analyze_nutrition("?").await.unwrap();
        assert_eq!(analysis, Analysis::invalid());
        assert_eq!(
            serde_json::to_value(&analysis).unwrap(),
            json!({"error": "Invalid JSON response from GPT"})
        );
    }

    #[tokio::test]
    async fn test_ingredient_missing_keys_becomes_sentinel() {
        let url = serve(replying("{\"basicInfo\": {\"name\": \"비타민B\"}}")).await;
        let analysis = client_for(url).analyze_ingredient("제품명: 비타민B").await.unwrap();
        assert!(analysis.is_invalid());
    }

    #[tokio::test]
    async fn test_ingredient_parsed_and_normalized() {
        let url = serve(replying(
            r#"{"basicInfo": {"name": "비타민B", "totalWeightGram": "30g"},
                "ingredientTree": [{"name": "설탕", "children": [{"name": "감미료"}]}],
                "categorizedIngredients": {},
                "summary": "단맛"}"#,
        ))
        .await;
        let analysis = client_for(url).analyze_ingredient("설탕(감미료)").await.unwrap();
        let parsed = analysis.parsed().unwrap();
        assert_eq!(parsed.basic_info.name.as_deref(), Some("비타민B"));
        assert_eq!(parsed.basic_info.total_weight_gram, Some(30.0));
        assert!(parsed.ingredient_tree[0].children.is_empty());
        assert_eq!(parsed.categorized_ingredients["감미료"], vec!["설탕"]);
    }

    #[tokio::test]
    async fn test_provider_error_is_fatal() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let url = serve(app).await;
        match client_for(url).analyze_ingredient("x").await {
            Err(AnalysisError::Status { status, .. }) => assert_eq!(status, 429),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
