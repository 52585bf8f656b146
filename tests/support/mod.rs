//! Mock OCR and chat-completion providers served by axum on an ephemeral
//! port, plus config files pointing at them.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

pub const INGREDIENT_URL: &str = "https://img.test/vitamin-ingredient.jpg";
pub const NUTRITION_URL: &str = "https://img.test/vitamin-nutrition.png";
pub const BROKEN_URL: &str = "https://img.test/broken.jpg";
pub const GARBLED_URL: &str = "https://img.test/garbled.jpg";

const INGREDIENT_TEXT: &[&str] = &[
    "제품명:",
    "비타민B",
    "원재료명:",
    "설탕(감미료),",
    "비타민B1",
    "소비자상담실",
    "080-123-4567",
];
const NUTRITION_TEXT: &[&str] = &["열량", "250", "kcal", "나트륨", "110", "mg"];

fn ocr_fields(words: &[&str]) -> Value {
    json!({"images": [{
        "inferResult": "SUCCESS",
        "fields": words.iter().map(|w| json!({"inferText": w})).collect::<Vec<_>>(),
    }]})
}

async fn mock_ocr(Json(body): Json<Value>) -> Response {
    let url = body["images"][0]["url"].as_str().unwrap_or_default();
    match url {
        INGREDIENT_URL => Json(ocr_fields(INGREDIENT_TEXT)).into_response(),
        NUTRITION_URL => Json(ocr_fields(NUTRITION_TEXT)).into_response(),
        GARBLED_URL => Json(ocr_fields(&["###"])).into_response(),
        _ => (StatusCode::BAD_GATEWAY, "image download failed").into_response(),
    }
}

fn completion(content: &str) -> Json<Value> {
    Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
}

/// Answers ingredient prompts with the product named after `제품명:`, and
/// nutrition prompts with a fixed table, or prose when the text has no
/// nutrient rows.
async fn mock_llm(Json(body): Json<Value>) -> Json<Value> {
    let user = body["messages"][1]["content"].as_str().unwrap_or_default();

    if let Some(text) = user.strip_prefix("분석 대상 텍스트:\n") {
        let name = text
            .split_once("제품명:")
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map(|n| n.to_string());
        let content = json!({
            "basicInfo": {"name": name, "totalWeightGram": "60g", "pakageGram": 2, "pakages": 30},
            "ingredientTree": [
                {"name": "설탕", "order": 1, "children": [{"name": "감미료"}]},
                {"name": "비타민B1", "order": 2}
            ],
            "categorizedIngredients": {"영양강화제": ["비타민B1"]},
            "giIndex": {"value": 65, "grade": "주의"},
            "summary": "당류가 주성분입니다."
        });
        return completion(&format!("```json\n{}\n```", content));
    }

    if user.contains("열량") {
        let content = json!({
            "nutrition": {
                "Kcal": 250,
                "sodium": {"mg": "110mg", "ratio": "6%"},
                "protein": null
            },
            "summary": "저열량 제품입니다."
        });
        completion(&content.to_string())
    } else {
        completion("영양정보를 찾을 수 없습니다.")
    }
}

/// Serve both mock providers; returns the base URL.
pub async fn spawn_providers() -> String {
    let app = Router::new()
        .route("/ocr", post(mock_ocr))
        .route("/v1/chat/completions", post(mock_llm));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Write a config under `root` pointing at the mock providers.
pub fn write_config(root: &Path, provider_base: &str) -> PathBuf {
    let config_dir = root.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    let content = format!(
        r#"[db]
path = "{root}/data/nutrilens.sqlite"

[ocr]
url = "{base}/ocr"
secret = "test-secret"
timeout_secs = 5

[llm]
url = "{base}/v1/chat/completions"
api_key = "test-key"
timeout_secs = 5

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display(),
        base = provider_base,
    );
    let path = config_dir.join("nutrilens.toml");
    std::fs::write(&path, content).unwrap();
    path
}
