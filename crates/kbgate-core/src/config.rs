//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__TOP_K`). `settings()`
//! layers the result over `Settings::default()`, so every key is optional.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Number of passages retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;
/// Absolute cutoff on the best similarity score of the top-K set.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.58;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding hosts).
    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration, defaults filled in.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        if settings.retrieval.top_k == 0 {
            return Err(crate::error::Error::InvalidConfig("retrieval.top_k must be at least 1".into()).into());
        }
        if !settings.retrieval.confidence_threshold.is_finite() {
            return Err(crate::error::Error::InvalidConfig("retrieval.confidence_threshold must be finite".into()).into());
        }
        if settings.knowledge.extensions.is_empty() || settings.index.extensions.is_empty() {
            return Err(crate::error::Error::InvalidConfig("file extension filters must not be empty".into()).into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub knowledge: KnowledgeSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub synthesis: SynthesisSettings,
    pub embedding: EmbeddingSettings,
}

/// Directory scanned by the prompt-injection aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    pub dir: String,
    pub extensions: Vec<String>,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self { dir: "data".to_string(), extensions: vec!["md".to_string()] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub source_dir: String,
    pub persist_dir: String,
    pub table: String,
    pub extensions: Vec<String>,
    pub max_tokens: usize,
    pub overlap_percent: f32,
    pub ann_min_rows: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            source_dir: "data".to_string(),
            persist_dir: "query-engine-storage".to_string(),
            table: "chunks".to_string(),
            extensions: vec!["md".to_string(), "txt".to_string()],
            max_tokens: 500,
            overlap_percent: 0.2,
            ann_min_rows: 100_000,
        }
    }
}

/// How the engine calls into the index. Chosen once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    #[default]
    Async,
    Blocking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub confidence_threshold: f32,
    pub mode: RetrievalMode,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K, confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD, mode: RetrievalMode::Async }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisBackend {
    #[default]
    Chat,
    Extractive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub backend: SynthesisBackend,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_passages: usize,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            backend: SynthesisBackend::Chat,
            base_url: "http://localhost:1234/v1".to_string(),
            model: "qwen/qwen3-8b".to_string(),
            api_key: None,
            timeout_secs: 120,
            temperature: 0.1,
            max_tokens: 512,
            max_passages: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub fake: bool,
    pub model_dir: Option<String>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
