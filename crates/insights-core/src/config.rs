use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::summary_cache_index;

/// Ranking, paging and summarization knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Hits scoring below this are dropped from the listing.
    pub score_cutoff: f64,
    pub knn_candidates: usize,
    pub lexical_boost: f64,
    pub hashtag_boost: f64,
    pub max_result_window: usize,
    pub min_page_size: usize,
    pub max_page_size: usize,
    pub max_page_no: usize,
    /// How many top hits feed the summarizer.
    pub summary_doc_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            score_cutoff: 14.0,
            knn_candidates: 5,
            lexical_boost: 10.0,
            hashtag_boost: 15.0,
            max_result_window: 10_000,
            min_page_size: 24,
            max_page_size: 30,
            max_page_no: 10_000,
            summary_doc_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub bulk_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ElasticSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            api_key: None,
            bulk_timeout_secs: 300,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic token-hash vectors; no network.
    Hashed,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingBackend,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Hashed,
            url: None,
            api_key: None,
            model: "text-embedding-004".to_string(),
            dimension: 256,
        }
    }
}

/// OAuth client-credentials grant used to mint bearer tokens for the LLM API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub url: String,
    /// Static bearer token. Ignored when `oauth` is set.
    pub api_key: Option<String>,
    pub oauth: Option<OAuthSettings>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/v1/chat/completions".to_string(),
            api_key: None,
            oauth: None,
            model: "gpt-4".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub capacity: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self { capacity: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment; scopes the summary-cache index name.
    pub env: String,
    pub search: SearchSettings,
    pub elastic: ElasticSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub jobs: JobSettings,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            search: SearchSettings::default(),
            elastic: ElasticSettings::default(),
            embedding: EmbeddingSettings::default(),
            llm: LlmSettings::default(),
            jobs: JobSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    /// Load from the working directory, using `RUST_ENV` (default `dev`).
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Merge `config.toml`, `config.<env>.toml` and `APP_*` env vars found
    /// relative to `base`. Nested keys use `__`, e.g. `APP_SEARCH__SCORE_CUTOFF`.
    pub fn load_from(base: &Path, env_name: &str) -> Result<Self> {
        let env_name = canonical_env(env_name);
        let figment = Figment::new()
            .merge(Serialized::default("env", env_name))
            .merge(Toml::file(resolve_with_base(base, "config.toml")))
            .merge(Toml::file(resolve_with_base(base, format!("config.{env_name}.toml"))))
            .merge(Env::prefixed("APP_").split("__"));

        let settings: Self = figment.extract()?;
        settings.validate()?;
        tracing::debug!(env = %settings.env, elastic = %settings.elastic.url, "settings loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if self.env.trim().is_empty() {
            return Err(Error::InvalidConfig("env must not be empty".into()));
        }
        if !s.score_cutoff.is_finite() || s.score_cutoff < 0.0 {
            return Err(Error::InvalidConfig(format!("search.score_cutoff {} is invalid", s.score_cutoff)));
        }
        if s.knn_candidates == 0 || s.summary_doc_limit == 0 || s.max_page_no == 0 {
            return Err(Error::InvalidConfig(
                "search.knn_candidates, summary_doc_limit and max_page_no must be positive".into(),
            ));
        }
        if s.min_page_size == 0 || s.min_page_size > s.max_page_size {
            return Err(Error::InvalidConfig(format!(
                "search page size range {}..={} is empty",
                s.min_page_size, s.max_page_size
            )));
        }
        if s.max_result_window < s.max_page_size {
            return Err(Error::InvalidConfig(format!(
                "search.max_result_window {} is smaller than max_page_size {}",
                s.max_result_window, s.max_page_size
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".into()));
        }
        if self.embedding.provider == EmbeddingBackend::Http && self.embedding.url.is_none() {
            return Err(Error::InvalidConfig("embedding.url is required for the http provider".into()));
        }
        if self.jobs.capacity == 0 {
            return Err(Error::InvalidConfig("jobs.capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn summary_cache_index(&self) -> String {
        summary_cache_index(&self.env)
    }
}

fn canonical_env(name: &str) -> &str {
    match name {
        "development" => "dev",
        "production" => "prod",
        "testing" => "test",
        other => other,
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against `base` after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
