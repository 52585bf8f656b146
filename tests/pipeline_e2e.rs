//! End-to-end tests: HTTP API → pipeline → mock providers → SQLite.

mod support;

use std::sync::Arc;

use nutrilens::config::load_config;
use nutrilens::pipeline::Pipeline;
use nutrilens::server::router;
use nutrilens::sqlite_store::SqliteStore;
use nutrilens::{db, migrate};
use serde_json::{json, Value};
use tempfile::TempDir;

use support::{BROKEN_URL, GARBLED_URL, INGREDIENT_URL, NUTRITION_URL};

struct TestApp {
    _tmp: TempDir,
    base: String,
    client: reqwest::Client,
}

async fn start_app() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let providers = support::spawn_providers().await;
    let config_path = support::write_config(tmp.path(), &providers);
    let config = load_config(&config_path).unwrap();

    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    let pipeline = Pipeline::from_config(&config, Arc::new(SqliteStore::new(pool))).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(Arc::new(pipeline))).await.unwrap();
    });

    TestApp {
        _tmp: tmp,
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn upload(&self, ingredient: &str, nutrition: &str) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}/ocr/upload", self.base))
            .json(&json!({
                "ingredient_image_url": ingredient,
                "nutrition_image_url": nutrition,
            }))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_upload_stores_under_extracted_name() {
    let app = start_app().await;

    let (status, body) = app.upload(INGREDIENT_URL, NUTRITION_URL).await;
    assert_eq!(status, 200, "body: {}", body);
    assert_eq!(body["product_name"], "비타민B");
    assert_eq!(body["nutrition_analysis"]["nutrition"]["Kcal"], 250.0);
    assert_eq!(body["nutrition_analysis"]["nutrition"]["sodium"]["mg"], 110.0);

    let ingredient = &body["ingredient_analysis"];
    assert_eq!(ingredient["basicInfo"]["packageGram"], 2.0);
    assert_eq!(ingredient["giIndex"]["grade"], "주의");
    // 설탕(감미료): the purpose is not an ingredient
    assert!(ingredient["ingredientTree"][0].get("children").is_none());
    assert_eq!(ingredient["categorizedIngredients"]["감미료"], json!(["설탕"]));
    assert_eq!(ingredient["categorizedIngredients"]["기타"], json!(["비타민B1"]));

    let (status, stored) = app.get("/products/비타민B").await;
    assert_eq!(status, 200);
    assert_eq!(stored["id"], body["product_id"]);
    assert_eq!(stored["productName"], "비타민B");
    assert_eq!(stored["ingredientImageUrl"], INGREDIENT_URL);
    assert_eq!(stored["nutritionImageUrl"], NUTRITION_URL);
}

#[tokio::test]
async fn test_repeat_upload_keeps_one_record() {
    let app = start_app().await;

    let (_, first) = app.upload(INGREDIENT_URL, NUTRITION_URL).await;
    let (_, second) = app.upload(INGREDIENT_URL, NUTRITION_URL).await;
    assert_eq!(first["product_id"], second["product_id"]);

    let (status, list) = app.get("/products?limit=10").await;
    assert_eq!(status, 200);
    assert_eq!(list["products"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreadable_nutrition_label_is_stored_as_sentinel() {
    let app = start_app().await;

    let (status, body) = app.upload(INGREDIENT_URL, GARBLED_URL).await;
    assert_eq!(status, 200);
    assert_eq!(
        body["nutrition_analysis"],
        json!({"error": "Invalid JSON response from GPT"})
    );
    assert_eq!(body["product_name"], "비타민B");

    let (_, stored) = app.get("/products/비타민B").await;
    assert_eq!(stored["nutritionAnalysis"]["error"], "Invalid JSON response from GPT");
}

#[tokio::test]
async fn test_unnamed_product_falls_back() {
    let app = start_app().await;

    let (status, body) = app.upload(GARBLED_URL, NUTRITION_URL).await;
    assert_eq!(status, 200);
    assert_eq!(body["product_name"], "Unknown Product");
}

#[tokio::test]
async fn test_ocr_failure_is_500_and_stores_nothing() {
    let app = start_app().await;

    let (status, body) = app.upload(INGREDIENT_URL, BROKEN_URL).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "extraction_failed");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("502"));

    let (_, list) = app.get("/products").await;
    assert!(list["products"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_url_is_400() {
    let app = start_app().await;

    let (status, body) = app.upload("", NUTRITION_URL).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_missing_field_is_400() {
    let app = start_app().await;

    let resp = app
        .client
        .post(format!("{}/ocr/upload", app.base))
        .json(&json!({"ingredient_image_url": INGREDIENT_URL}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn test_unknown_product_is_404() {
    let app = start_app().await;

    let (status, body) = app.get("/products/없는제품").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_health() {
    let app = start_app().await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}
