use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Document store database (fingerprint-deduplicated persistence).
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// Search index database. Deliberately a separate file from the store:
/// the two retrieval substrates are decoupled by design.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub path: PathBuf,
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_pdf_pages")]
    pub max_pdf_pages: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_pdf_pages: default_max_pdf_pages(),
            ocr: OcrConfig::default(),
        }
    }
}

fn default_max_pdf_pages() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    /// `"tesseract"` or `"disabled"`.
    #[serde(default = "default_ocr_backend")]
    pub backend: String,
    #[serde(default = "default_ocr_binary")]
    pub binary: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: default_ocr_backend(),
            binary: default_ocr_binary(),
        }
    }
}

fn default_ocr_backend() -> String {
    "tesseract".to_string()
}
fn default_ocr_binary() -> String {
    "tesseract".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"hashed"` (deterministic, offline), `"openai"`, or `"local"`
    /// (requires the `local-embeddings` feature).
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hashed".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// Optional replacement compliance rule table.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RulesConfig {
    pub path: Option<PathBuf>,
}

impl Config {
    /// Defaults for tests and scaffolding; all state under `./data`.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                path: PathBuf::from("./data/docsense.db"),
            },
            search: SearchConfig {
                path: PathBuf::from("./data/search.db"),
                default_limit: default_search_limit(),
            },
            extraction: ExtractionConfig::default(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:8080".to_string(),
            },
            rules: RulesConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.extraction.max_pdf_pages == 0 {
        anyhow::bail!("extraction.max_pdf_pages must be > 0");
    }

    if config.search.default_limit == 0 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.embedding.provider.as_str() {
        "hashed" | "openai" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hashed, openai, or local.",
            other
        ),
    }

    match config.extraction.ocr.backend.as_str() {
        "tesseract" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown OCR backend: '{}'. Must be tesseract or disabled.",
            other
        ),
    }

    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified when provider is 'openai'");
    }

    Ok(config)
}
