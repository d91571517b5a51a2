//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_GENERATOR__TIMEOUT_SECS=60`).
//! Every setting has a default, so a missing config file is not an error.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load `config.toml` and `config.<env>.toml` from `dir`, then `APP_*` env vars.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            other => tracing::debug!(env = other, "no environment-specific config file"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub generator: GeneratorConfig,
    pub embedding: EmbeddingConfig,
    pub scoring: ScoringConfig,
    pub compare: CompareConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.scoring.validate()?;
        if self.prompt.context_chunks == 0 {
            return Err(Error::InvalidConfig("prompt.context_chunks must be at least 1".into()));
        }
        if self.generator.timeout_secs == 0 {
            return Err(Error::InvalidConfig("generator.timeout_secs must be at least 1".into()));
        }
        if self.compare.workers == 0 {
            return Err(Error::InvalidConfig("compare.workers must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub docs_dir: String,
    pub lancedb_dir: String,
    pub table: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            docs_dir: "data/docs".to_string(),
            lancedb_dir: "data/lancedb".to_string(),
            table: "medical_docs".to_string(),
        }
    }
}

/// Word-window chunking: `window_words` per chunk, advancing `stride_words`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub window_words: usize,
    pub stride_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { window_words: 500, stride_words: 400 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.window_words == 0 {
            return Err(Error::InvalidConfig("chunking.window_words must be at least 1".into()));
        }
        if self.stride_words == 0 || self.stride_words > self.window_words {
            return Err(Error::InvalidConfig(format!(
                "chunking.stride_words must be in 1..={}, got {}",
                self.window_words, self.stride_words
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_similarity: f32,
    /// Average similarity below which an answer is flagged as insufficiently grounded.
    pub insufficient_floor: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 7, min_similarity: 0.2, insufficient_floor: 0.25 }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(Error::InvalidConfig(format!(
                "retrieval.min_similarity must be in [0, 1], got {}",
                self.min_similarity
            )));
        }
        if !(0.0..=1.0).contains(&self.insufficient_floor) {
            return Err(Error::InvalidConfig("retrieval.insufficient_floor must be in [0, 1]".into()));
        }
        Ok(())
    }
}

/// Prompt-size control: only the first `context_chunks` retrieved chunks,
/// each cut to `context_chars` characters, are placed in the grounded prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub context_chunks: usize,
    pub context_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { context_chunks: 2, context_chars: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub default_model: String,
    pub models: Vec<String>,
    pub timeout_secs: u64,
    pub num_predict: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "phi".to_string(),
            models: vec!["phi".to_string(), "tinyllama".to_string(), "gemma:2b".to_string()],
            timeout_secs: 30,
            num_predict: 384,
            temperature: 0.2,
            top_p: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_dir: Option<String>,
    pub dim: usize,
    pub max_len: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model_dir: None, dim: 384, max_len: 256, use_fake: false }
    }
}

/// Cut-offs for the coverage metric and the High / Moderate / Low badges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Minimum answer-to-chunk similarity for a chunk to count as used.
    pub coverage_threshold: f32,
    /// Trimmed answers shorter than this many characters score 0.0.
    pub min_answer_chars: usize,
    pub quality_high: f32,
    pub quality_moderate: f32,
    pub coverage_high: f32,
    pub coverage_moderate: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.65,
            min_answer_chars: 10,
            quality_high: 0.7,
            quality_moderate: 0.4,
            coverage_high: 0.75,
            coverage_moderate: 0.5,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let all = [
            ("coverage_threshold", self.coverage_threshold),
            ("quality_high", self.quality_high),
            ("quality_moderate", self.quality_moderate),
            ("coverage_high", self.coverage_high),
            ("coverage_moderate", self.coverage_moderate),
        ];
        if let Some((name, value)) = all.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(Error::InvalidConfig(format!("scoring.{name} must be in [0, 1], got {value}")));
        }
        if self.quality_moderate > self.quality_high || self.coverage_moderate > self.coverage_high {
            return Err(Error::InvalidConfig("scoring moderate thresholds must not exceed high thresholds".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    pub workers: usize,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self { workers: 3 }
    }
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
