//! Configuration parsing and validation.
//!
//! Configuration is read from a TOML file (default `./config/biblio.toml`).
//! Every section has defaults, so a missing file yields a usable config for
//! local runs. Endpoints and credentials are overlaid from the environment
//! by [`Config::apply_env`], which takes an explicit lookup function so core
//! code never reads the process environment directly.
//!
//! # Environment Variables
//!
//! | Variable | Purpose |
//! |----------|---------|
//! | `BIBLIO_STORE_URL` | Hosted store endpoint (REST backend) |
//! | `BIBLIO_STORE_KEY` | Privileged store credential (REST backend) |
//! | `BIBLIO_CLASSIFIER_URL` | Remote classifier endpoint |
//! | `BIBLIO_CLASSIFIER_MODEL` | Remote classifier model identifier |
//! | `BIBLIO_CLASSIFIER_KEY` | Remote classifier credential |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::curator::MatchWeights;
use crate::error::IngestError;
use crate::models::{ClassificationCode, Source};

pub const ENV_STORE_URL: &str = "BIBLIO_STORE_URL";
pub const ENV_STORE_KEY: &str = "BIBLIO_STORE_KEY";
pub const ENV_CLASSIFIER_URL: &str = "BIBLIO_CLASSIFIER_URL";
pub const ENV_CLASSIFIER_MODEL: &str = "BIBLIO_CLASSIFIER_MODEL";
pub const ENV_CLASSIFIER_KEY: &str = "BIBLIO_CLASSIFIER_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub curator_match: MatchWeights,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Never read from the file; only populated from `BIBLIO_STORE_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_books_table")]
    pub books_table: String,
    #[serde(default = "default_curators_table")]
    pub curators_table: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            api_key: None,
            path: default_db_path(),
            books_table: default_books_table(),
            curators_table: default_curators_table(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "rest".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/biblio.sqlite")
}
fn default_books_table() -> String {
    "books".to_string()
}
fn default_curators_table() -> String {
    "curators".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between consecutive network calls and between items.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Pause between batches.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "Bibliotech/{} (catalog ingestion; https://bibliotech.online)",
        env!("CARGO_PKG_VERSION")
    )
}
fn default_request_delay_ms() -> u64 {
    300
}
fn default_batch_delay_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_description_max_chars")]
    pub description_max_chars: usize,
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_ingest_batch_size(),
            description_max_chars: default_description_max_chars(),
            progress_every: default_progress_every(),
        }
    }
}

fn default_ingest_batch_size() -> usize {
    10
}
fn default_description_max_chars() -> usize {
    500
}
fn default_progress_every() -> u64 {
    100
}

/// Smallest and largest batch the orchestrator will use.
pub const MIN_BATCH_SIZE: usize = 5;
pub const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub gutenberg: GutenbergConfig,
    #[serde(default)]
    pub wikibooks: WikibooksConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GutenbergConfig {
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    #[serde(default = "default_gutenberg_code")]
    pub default_classification: String,
    #[serde(default = "default_gutenberg_batch")]
    pub batch_size: Option<usize>,
}

impl Default for GutenbergConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            default_classification: default_gutenberg_code(),
            batch_size: default_gutenberg_batch(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://www.gutenberg.org/cache/epub/feeds/pg_catalog.csv".to_string()
}
fn default_gutenberg_code() -> String {
    "800".to_string()
}
fn default_gutenberg_batch() -> Option<usize> {
    Some(50)
}

#[derive(Debug, Deserialize, Clone)]
pub struct WikibooksConfig {
    #[serde(default = "default_wikibooks_api")]
    pub api_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_wikibooks_code")]
    pub default_classification: String,
    #[serde(default = "default_wikibooks_batch")]
    pub batch_size: Option<usize>,
}

impl Default for WikibooksConfig {
    fn default() -> Self {
        Self {
            api_url: default_wikibooks_api(),
            page_size: default_page_size(),
            default_classification: default_wikibooks_code(),
            batch_size: default_wikibooks_batch(),
        }
    }
}

fn default_wikibooks_api() -> String {
    "https://en.wikibooks.org/w/api.php".to_string()
}
fn default_page_size() -> usize {
    50
}
fn default_wikibooks_code() -> String {
    "000".to_string()
}
fn default_wikibooks_batch() -> Option<usize> {
    Some(5)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Never read from the file; only populated from `BIBLIO_CLASSIFIER_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_classifier_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_classifier_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            model: None,
            api_key: None,
            batch_size: default_classifier_batch_size(),
            request_delay_ms: default_classifier_delay_ms(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "keyword".to_string()
}
fn default_classifier_batch_size() -> usize {
    20
}
fn default_classifier_delay_ms() -> u64 {
    500
}
fn default_max_retries() -> u32 {
    1
}

impl ClassifierConfig {
    pub fn is_remote(&self) -> bool {
        self.provider == "llm"
    }
}

impl Config {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay endpoints and credentials from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_STORE_URL) {
            self.store.url = Some(url);
        }
        if let Some(key) = non_empty(ENV_STORE_KEY) {
            self.store.api_key = Some(key);
        }
        if let Some(url) = non_empty(ENV_CLASSIFIER_URL) {
            self.classifier.endpoint = Some(url);
        }
        if let Some(model) = non_empty(ENV_CLASSIFIER_MODEL) {
            self.classifier.model = Some(model);
        }
        if let Some(key) = non_empty(ENV_CLASSIFIER_KEY) {
            self.classifier.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.store.backend.as_str() {
            "rest" | "sqlite" | "memory" => {}
            other => bail!(
                "Unknown store backend: '{}'. Must be rest, sqlite, or memory.",
                other
            ),
        }

        match self.classifier.provider.as_str() {
            "keyword" | "llm" => {}
            other => bail!(
                "Unknown classifier provider: '{}'. Must be keyword or llm.",
                other
            ),
        }

        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be > 0");
        }
        if self.classifier.batch_size == 0 {
            bail!("classifier.batch_size must be > 0");
        }
        if self.sources.wikibooks.page_size == 0 {
            bail!("sources.wikibooks.page_size must be > 0");
        }
        if self.curator_match.threshold == 0 {
            bail!("curator_match.threshold must be > 0");
        }
        if self.ingest.description_max_chars < crate::normalize::ELLIPSIS.len() {
            bail!(
                "ingest.description_max_chars must be >= {}",
                crate::normalize::ELLIPSIS.len()
            );
        }

        for (name, code) in [
            ("gutenberg", &self.sources.gutenberg.default_classification),
            ("wikibooks", &self.sources.wikibooks.default_classification),
        ] {
            if ClassificationCode::parse(code).is_none() {
                bail!(
                    "sources.{}.default_classification must be a 3-digit code, got '{}'",
                    name,
                    code
                );
            }
        }

        Ok(())
    }

    /// Fail unless the hosted store endpoint and credential are present.
    ///
    /// Only the REST backend needs them; local backends always pass.
    pub fn require_store_credentials(&self) -> Result<(), IngestError> {
        if self.store.backend != "rest" {
            return Ok(());
        }
        if self.store.url.is_none() {
            return Err(IngestError::Configuration(format!(
                "store endpoint missing: set {} (or [store].url in the config file)",
                ENV_STORE_URL
            )));
        }
        if self.store.api_key.is_none() {
            return Err(IngestError::Configuration(format!(
                "store credential missing: set {}",
                ENV_STORE_KEY
            )));
        }
        Ok(())
    }

    /// Fail unless the remote classifier is fully configured.
    pub fn require_classifier_credentials(&self) -> Result<(), IngestError> {
        if !self.classifier.is_remote() {
            return Ok(());
        }
        if self.classifier.endpoint.is_none() {
            return Err(IngestError::Configuration(format!(
                "classifier endpoint missing: set {} or [classifier].endpoint",
                ENV_CLASSIFIER_URL
            )));
        }
        if self.classifier.model.is_none() {
            return Err(IngestError::Configuration(format!(
                "classifier model missing: set {} or [classifier].model",
                ENV_CLASSIFIER_MODEL
            )));
        }
        if self.classifier.api_key.is_none() {
            return Err(IngestError::Configuration(format!(
                "classifier credential missing: set {}",
                ENV_CLASSIFIER_KEY
            )));
        }
        Ok(())
    }

    /// Default classification code for records from `source`.
    pub fn default_classification(&self, source: Source) -> ClassificationCode {
        let code = match source {
            Source::Gutenberg => &self.sources.gutenberg.default_classification,
            Source::Wikibooks | Source::Custom => {
                &self.sources.wikibooks.default_classification
            }
        };
        ClassificationCode::parse(code).unwrap_or_else(ClassificationCode::general_works)
    }

    /// Batch size for `source`, clamped to the supported range.
    pub fn batch_size_for(&self, source: Source) -> usize {
        let configured = match source {
            Source::Gutenberg => self.sources.gutenberg.batch_size,
            Source::Wikibooks => self.sources.wikibooks.batch_size,
            Source::Custom => None,
        };
        configured
            .unwrap_or(self.ingest.batch_size)
            .clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist, then overlay the process environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Config::from_toml_str(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
