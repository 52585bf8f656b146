mod support;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn nutrilens_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_nutrilens"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    // providers are never contacted by these tests
    let config_path = support::write_config(tmp.path(), "http://127.0.0.1:9");
    (tmp, config_path)
}

fn run_nutrilens(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = nutrilens_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run nutrilens binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_nutrilens(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/nutrilens.sqlite").exists());

    // idempotent
    let (_, stderr, success) = run_nutrilens(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_nutrilens(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_clean_nutrition_needs_no_config() {
    let tmp = TempDir::new().unwrap();
    let raw = tmp.path().join("raw.txt");
    fs::write(&raw, "영양정보 총 내용량 100g\n열량 250 kcal\n나트륨 110 mg 6 %\n비고").unwrap();

    let (stdout, stderr, success) = run_nutrilens(
        &tmp.path().join("absent.toml"),
        &["clean", "--kind", "nutrition", raw.to_str().unwrap()],
    );
    assert!(success, "clean failed: {}", stderr);
    assert_eq!(stdout.trim_end(), "열량 250 kcal 나트륨 110mg 6%");
}

#[test]
fn test_clean_ingredient_strips_boilerplate() {
    let tmp = TempDir::new().unwrap();
    let raw = tmp.path().join("raw.txt");
    fs::write(
        &raw,
        "원재료명: 설탕, 밀가루\n부정불량식품신고는 국번없이 1399\nwww.example.co.kr",
    )
    .unwrap();

    let (stdout, stderr, success) = run_nutrilens(
        &tmp.path().join("absent.toml"),
        &["clean", "--kind", "ingredient", raw.to_str().unwrap()],
    );
    assert!(success, "clean failed: {}", stderr);
    assert_eq!(stdout.trim_end(), "원재료명: 설탕, 밀가루");
}

#[test]
fn test_get_unknown_product_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_nutrilens(&config_path, &["init"]);

    let (_, stderr, success) = run_nutrilens(&config_path, &["get", "없는제품"]);
    assert!(!success);
    assert!(stderr.contains("no analysis stored for product '없는제품'"));
}

#[test]
fn test_list_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_nutrilens(&config_path, &["init"]);

    let (stdout, stderr, success) = run_nutrilens(&config_path, &["list"]);
    assert!(success, "list failed: {}", stderr);
    assert!(stdout.contains("No analyses stored."));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_analyze_then_get_and_list() {
    let tmp = TempDir::new().unwrap();
    let providers = support::spawn_providers().await;
    let config_path = support::write_config(tmp.path(), &providers);

    let (stdout, stderr, success) = tokio::task::spawn_blocking({
        let config_path = config_path.clone();
        move || {
            run_nutrilens(
                &config_path,
                &["analyze", support::INGREDIENT_URL, support::NUTRITION_URL],
            )
        }
    })
    .await
    .unwrap();
    assert!(success, "analyze failed: {}", stderr);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["product_name"], "비타민B");

    let (stdout, _, success) = run_nutrilens(&config_path, &["get", "비타민B"]);
    assert!(success);
    let stored: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stored["id"], outcome["product_id"]);

    let (stdout, _, success) = run_nutrilens(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("비타민B"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_analyze_no_store_creates_no_database() {
    let tmp = TempDir::new().unwrap();
    let providers = support::spawn_providers().await;
    let config_path = support::write_config(tmp.path(), &providers);

    let (stdout, stderr, success) = tokio::task::spawn_blocking({
        let config_path = config_path.clone();
        move || {
            run_nutrilens(
                &config_path,
                &["analyze", support::INGREDIENT_URL, support::GARBLED_URL, "--no-store"],
            )
        }
    })
    .await
    .unwrap();
    assert!(success, "analyze failed: {}", stderr);
    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["productName"], "비타민B");
    assert!(record["nutritionAnalysis"]["error"].is_string());

    assert!(!tmp.path().join("data/nutrilens.sqlite").exists());
    assert!(!tmp.path().join("data").exists());
}
