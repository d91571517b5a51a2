//! Wiring shared by the `medrag` and `medrag-indexer` binaries.
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use medrag_core::config::{expand_path, Config, Settings};
use medrag_core::traits::{ChunkStore, Embedder};
use medrag_embed::get_default_embedder;
use medrag_llm::OllamaGenerator;
use medrag_rag::evaluate::{pairwise_comparisons, DEFAULT_EVALUATION_QUESTIONS};
use medrag_rag::{model_statistics, AnswerPipeline, EvaluationRecord, PipelineConfig, QualityScorer};
use medrag_vector::LanceChunkStore;

/// `RUST_LOG` wins; otherwise `info` with `--verbose`, `warn` without.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

pub fn load_settings() -> Result<Settings> {
    Config::load().context("loading configuration")?.settings()
}

pub fn open_store(settings: &Settings) -> Result<Arc<LanceChunkStore>> {
    let path = expand_path(&settings.data.lancedb_dir);
    std::fs::create_dir_all(&path).with_context(|| format!("creating {}", path.display()))?;
    Ok(Arc::new(LanceChunkStore::open(&path, &settings.data.table, settings.embedding.dim)?))
}

pub fn load_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    get_default_embedder(&settings.embedding)
}

/// Everything a query-side command needs, built once per process.
pub struct Services {
    pub settings: Settings,
    pub store: Arc<LanceChunkStore>,
    pub pipeline: AnswerPipeline,
    pub scorer: QualityScorer,
}

impl Services {
    pub fn build(settings: Settings) -> Result<Self> {
        let embedder = load_embedder(&settings)?;
        let store = open_store(&settings)?;
        let generator = Arc::new(OllamaGenerator::from_config(&settings.generator)?);
        let pipeline = AnswerPipeline::new(
            embedder.clone(),
            store.clone() as Arc<dyn ChunkStore>,
            generator,
            PipelineConfig::from(&settings),
        )?;
        let scorer = QualityScorer::new(embedder, settings.scoring);
        Ok(Self { settings, store, pipeline, scorer })
    }
}

/// Comma-separated `--models` value, or the configured model list.
pub fn parse_models(arg: Option<&str>, settings: &Settings) -> Vec<String> {
    match arg {
        Some(list) => list.split(',').map(str::trim).filter(|m| !m.is_empty()).map(String::from).collect(),
        None => settings.generator.models.clone(),
    }
}

/// Questions from a JSON array of strings, or the built-in malaria set.
pub fn load_questions(path: Option<&Path>) -> Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(DEFAULT_EVALUATION_QUESTIONS.iter().map(|q| (*q).to_string()).collect());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let questions: Vec<String> =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of strings", path.display()))?;
    if questions.is_empty() {
        anyhow::bail!("{} contains no questions", path.display());
    }
    Ok(questions)
}

/// The `evaluate --json` document: every record, per-model statistics and
/// pairwise t-tests.
pub fn evaluation_report(records: &[EvaluationRecord]) -> serde_json::Value {
    serde_json::json!({
        "records": records,
        "statistics": model_statistics(records),
        "comparisons": pairwise_comparisons(records),
    })
}
