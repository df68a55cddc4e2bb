//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys). Paths in settings expand
//! `~` and `${VAR}`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::debug;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        debug!(env = %env_name, "configuration loaded");
        Ok(config)
    }

    /// Build from an explicit figment; defaults are layered underneath.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub query: QuerySettings,
    pub answer: AnswerSettings,
    pub generation: GenerationSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.store.persist_dir.trim().is_empty() {
            return invalid("store.persist_dir must not be empty");
        }
        if self.chunking.chunk_size == 0 {
            return invalid("chunking.chunk_size must be at least 1");
        }
        if self.query.default_n_results == 0 {
            return invalid("query.default_n_results must be at least 1");
        }
        if self.embedding.fake_dim == 0 || self.embedding.max_len == 0 {
            return invalid("embedding.fake_dim and embedding.max_len must be at least 1");
        }
        if !(1..=MAX_SOURCES).contains(&self.answer.max_sources) {
            return invalid("answer.max_sources must be between 1 and 3");
        }
        if self.answer.preview_chars == 0 || self.answer.max_context_chars == 0 {
            return invalid("answer.preview_chars and answer.max_context_chars must be at least 1");
        }
        if self.generation.timeout_secs == 0 {
            return invalid("generation.timeout_secs must be at least 1");
        }
        if self.generation.api_url.trim().is_empty() || self.generation.model.trim().is_empty() {
            return invalid("generation.api_url and generation.model are required");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub persist_dir: String,
}

impl StoreSettings {
    pub fn persist_path(&self) -> PathBuf {
        expand_path(&self.persist_dir)
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { persist_dir: "./vector_db".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub max_len: usize,
    pub fake_dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, use_fake: false, max_len: 256, fake_dim: 1024 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub default_n_results: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self { default_n_results: 5 }
    }
}

/// Answers cite at most this many source passages.
pub const MAX_SOURCES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    pub max_sources: usize,
    pub preview_chars: usize,
    pub max_context_chars: usize,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self { max_sources: MAX_SOURCES, preview_chars: 200, max_context_chars: 12_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// OpenAI-compatible chat completions endpoint.
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable holding the bearer key.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 800,
            top_p: 0.9,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "info".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.chunking.chunk_size, 500);
        assert_eq!(s.chunking.overlap_words, 50);
        assert_eq!(s.answer.max_sources, 3);
        assert_eq!(s.answer.preview_chars, 200);
        assert_eq!(s.query.default_n_results, 5);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn toml_overrides_nested_keys() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [store]
            persist_dir = "/tmp/ragdb"

            [chunking]
            chunk_size = 120
            "#,
        ));
        let settings = Config::from_figment(figment).settings().expect("settings");
        assert_eq!(settings.store.persist_dir, "/tmp/ragdb");
        assert_eq!(settings.chunking.chunk_size, 120);
        assert_eq!(settings.chunking.overlap_words, 50, "unset keys keep defaults");
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let figment = Figment::new().merge(Toml::string("[chunking]\nchunk_size = 0\n"));
        let err = Config::from_figment(figment).settings().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn get_extracts_single_key() {
        let config = Config::from_figment(Figment::new());
        let timeout: u64 = config.get("generation.timeout_secs").expect("key");
        assert_eq!(timeout, 60);
    }

    #[test]
    fn zero_fake_dim_and_too_many_sources_are_rejected() {
        for toml in ["[embedding]\nfake_dim = 0\n", "[answer]\nmax_sources = 4\n", "[answer]\nmax_sources = 0\n"] {
            let err = Config::from_figment(Figment::new().merge(Toml::string(toml))).settings().unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)), "{toml:?} accepted");
        }
        let ok = Figment::new().merge(Toml::string("[answer]\nmax_sources = 1\n"));
        assert!(Config::from_figment(ok).settings().is_ok());
    }
}
