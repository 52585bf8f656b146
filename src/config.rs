//! TOML configuration.
//!
//! The configuration is read once at startup and passed by reference to
//! every client and gateway constructor. Secrets are not expected in the
//! file: `ocr.secret_env` and `llm.api_key_env` name the environment
//! variables that hold them (a `.env` file is loaded by the binary). An
//! inline `ocr.secret` / `llm.api_key` takes precedence, which is handy
//! for local testing.
//!
//! ```toml
//! [db]
//! path = "./data/nutrilens.sqlite"
//!
//! [ocr]
//! url = "https://example.apigw.ntruss.com/custom/v1/123/abc/general"
//!
//! [llm]
//! model = "gpt-4.1-mini"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use nutrilens_core::schema::{CategoryVocabulary, DEFAULT_CATEGORIES};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Extraction (OCR) provider settings.
#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    /// Invoke URL of the OCR endpoint.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_ocr_secret_env")]
    pub secret_env: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_ocr_timeout_secs")]
    pub timeout_secs: u64,
    /// Join fragments flagged `lineBreak` with a newline instead of a space.
    #[serde(default)]
    pub preserve_line_breaks: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            secret_env: default_ocr_secret_env(),
            secret: None,
            timeout_secs: default_ocr_timeout_secs(),
            preserve_line_breaks: false,
        }
    }
}

impl OcrConfig {
    /// Resolve the OCR secret from the file or the environment.
    pub fn resolve_secret(&self) -> Result<String> {
        resolve_secret(self.secret.as_deref(), &self.secret_env, "ocr.secret")
    }
}

fn default_ocr_secret_env() -> String {
    "CLOVA_OCR_SECRET_KEY".to_string()
}
fn default_ocr_timeout_secs() -> u64 {
    30
}

/// Structured-analysis (chat completion) provider settings.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_llm_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the file or the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_secret(self.api_key.as_deref(), &self.api_key_env, "llm.api_key")
    }
}

fn default_llm_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f64 {
    0.3
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Ingredient purpose categories. The last one is the catch-all.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
        }
    }
}

impl AnalysisConfig {
    pub fn vocabulary(&self) -> CategoryVocabulary {
        CategoryVocabulary::new(self.categories.iter().cloned())
    }
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn resolve_secret(inline: Option<&str>, env_var: &str, key: &str) -> Result<String> {
    if let Some(value) = inline.filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }
    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => bail!(
            "{} is not set: define it in the config or export {}",
            key,
            env_var
        ),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.ocr.timeout_secs == 0 {
        bail!("ocr.timeout_secs must be > 0");
    }

    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }
    if config.llm.max_tokens == 0 {
        bail!("llm.max_tokens must be > 0");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }

    if config.analysis.vocabulary().is_empty() {
        bail!("analysis.categories must name at least one category");
    }

    Ok(config)
}
