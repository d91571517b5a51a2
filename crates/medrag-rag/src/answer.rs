//! Query answering: retrieve, build a prompt, generate, estimate confidence.
//!
//! Two branches:
//! - nothing cleared the similarity floor: a general-knowledge fallback answer
//!   with a fixed confidence of 10
//! - otherwise: a prompt grounded in the top chunks, confidence derived from
//!   the mean similarity of *all* retrieved chunks
//!
//! Generator failures never escape [`AnswerPipeline::answer`]; they become a
//! [`AnswerOutcome::Failed`] result whose answer is the failure's sentinel text.
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use medrag_core::config::{PromptConfig, Settings};
use medrag_core::traits::{ChunkStore, Embedder, GenerateRequest, Generator};
use medrag_core::types::{average_similarity, AnswerOutcome, FailureKind, QueryResult, RetrievedChunk};
use medrag_core::{Error, GenerateError};

use crate::prompt::{build_context, fallback_prompt, grounded_prompt};
use crate::retrieve::Retriever;

pub const FALLBACK_CONFIDENCE: u8 = 10;

pub const EMPTY_GENERATION_ANSWER: &str =
    "Relevant WHO guideline sections were retrieved, but the local model could not generate a reliable answer.";

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOptions {
    pub top_k: usize,
    pub min_similarity: f32,
    pub model: String,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self { top_k: 7, min_similarity: 0.2, model: "phi".to_string() }
    }
}

impl AnswerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            top_k: settings.retrieval.top_k,
            min_similarity: settings.retrieval.min_similarity,
            model: settings.generator.default_model.clone(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Knobs of the pipeline that are fixed per process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub prompt: PromptConfig,
    pub insufficient_floor: f64,
    pub timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { prompt: PromptConfig::default(), insufficient_floor: 0.25, timeout: Duration::from_secs(30) }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            prompt: settings.prompt,
            insufficient_floor: settings.retrieval.insufficient_floor,
            timeout: Duration::from_secs(settings.generator.timeout_secs),
        }
    }
}

pub struct AnswerPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    config: PipelineConfig,
}

impl AnswerPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn ChunkStore>,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> medrag_core::Result<Self> {
        if let Some(expected) = store.dim() {
            if expected != embedder.dim() {
                return Err(Error::DimensionMismatch { expected, actual: embedder.dim() });
            }
        }
        Ok(Self { embedder, retriever: Retriever::new(store), generator, config })
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    pub fn retriever(&self) -> &Retriever { &self.retriever }

    /// Answer `query`. `Err` only for embedding or store failures and invalid
    /// options; generation problems are reported inside the result.
    ///
    /// A failed generation always yields confidence 0, including on the
    /// no-context path whose successful answers carry confidence 10.
    pub fn answer(&self, query: &str, options: &AnswerOptions) -> Result<QueryResult> {
        let query_vector = self.embedder.embed(query)?;
        let retrieved = self.retriever.retrieve(&query_vector, options.top_k, options.min_similarity)?;
        if retrieved.is_empty() {
            tracing::info!(model = %options.model, "no chunk above similarity floor, answering without context");
            return Ok(self.answer_without_context(query, &options.model));
        }
        Ok(self.answer_with_context(query, retrieved, &options.model))
    }

    fn answer_without_context(&self, query: &str, model: &str) -> QueryResult {
        match self.generate(&fallback_prompt(query), model) {
            Ok(text) => QueryResult {
                answer: text,
                confidence: FALLBACK_CONFIDENCE,
                retrieved_chunks: Vec::new(),
                insufficient_context: true,
                outcome: AnswerOutcome::Fallback,
            },
            Err(failure) => failed_result(failure, Vec::new()),
        }
    }

    fn answer_with_context(&self, query: &str, retrieved: Vec<RetrievedChunk>, model: &str) -> QueryResult {
        let context = build_context(&retrieved, &self.config.prompt);
        let avg = average_similarity(&retrieved);
        tracing::debug!(chunks = retrieved.len(), avg_similarity = avg, context_chars = context.len(), "grounded prompt");

        match self.generate(&grounded_prompt(&context, query), model) {
            Err(failure) => failed_result(failure, retrieved),
            Ok(text) if text.is_empty() => {
                tracing::warn!(model, "generator returned empty text for grounded prompt");
                QueryResult {
                    answer: EMPTY_GENERATION_ANSWER.to_string(),
                    confidence: empty_generation_confidence(avg),
                    retrieved_chunks: retrieved,
                    insufficient_context: true,
                    outcome: AnswerOutcome::EmptyGeneration,
                }
            }
            Ok(text) => QueryResult {
                answer: text,
                confidence: grounded_confidence(avg),
                retrieved_chunks: retrieved,
                insufficient_context: avg < self.config.insufficient_floor,
                outcome: AnswerOutcome::Grounded,
            },
        }
    }

    /// Trimmed generation, with sentinel strings from string-returning
    /// backends treated like the errors they stand for.
    fn generate(&self, prompt: &str, model: &str) -> std::result::Result<String, GenerateError> {
        let request = GenerateRequest { prompt, model, timeout: self.config.timeout };
        let text = self.generator.generate(&request)?.trim().to_string();
        match sentinel_failure(&text) {
            Some(FailureKind::Timeout) => Err(GenerateError::Timeout(self.config.timeout)),
            Some(FailureKind::Unreachable) => Err(GenerateError::Unreachable(text)),
            Some(FailureKind::Backend) => Err(GenerateError::Backend(text)),
            None => Ok(text),
        }
    }
}

fn failed_result(failure: GenerateError, retrieved: Vec<RetrievedChunk>) -> QueryResult {
    tracing::warn!(error = %failure, "generation failed");
    let answer = match &failure {
        // already sentinel text
        GenerateError::Unreachable(text) | GenerateError::Backend(text) if sentinel_failure(text).is_some() => text.clone(),
        other => other.sentinel(),
    };
    QueryResult {
        answer,
        confidence: 0,
        retrieved_chunks: retrieved,
        insufficient_context: true,
        outcome: AnswerOutcome::Failed { failure: failure.kind() },
    }
}

/// `min(100, round(avg × 100))`.
pub fn grounded_confidence(avg_similarity: f64) -> u8 {
    scaled_confidence(avg_similarity, 100.0, 100)
}

/// `min(40, round(avg × 60))`.
pub fn empty_generation_confidence(avg_similarity: f64) -> u8 {
    scaled_confidence(avg_similarity, 60.0, 40)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_confidence(avg_similarity: f64, scale: f64, cap: u8) -> u8 {
    let value = (avg_similarity * scale).round().clamp(0.0, f64::from(cap));
    value as u8
}

const TIMEOUT_SENTINEL: &str = "the model took too long to respond.";

/// Recognises the exact texts a string-returning generator emits on failure.
/// The timeout text must match whole; the error texts match by prefix.
pub fn sentinel_failure(text: &str) -> Option<FailureKind> {
    let lower = text.trim().to_lowercase();
    if lower == TIMEOUT_SENTINEL {
        Some(FailureKind::Timeout)
    } else if lower.starts_with("error connecting to ollama") {
        Some(FailureKind::Unreachable)
    } else if lower.starts_with("error calling ollama") {
        Some(FailureKind::Backend)
    } else {
        None
    }
}

/// How a caller holding only answer text should treat it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerHealth {
    Usable,
    Empty,
    TimedOut,
    /// Short text mentioning an error; almost certainly not a real answer.
    Errored,
}

impl AnswerHealth {
    pub fn is_usable(self) -> bool { self == Self::Usable }
}

pub fn classify_answer(text: &str) -> AnswerHealth {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    if trimmed.is_empty() {
        AnswerHealth::Empty
    } else if lower.contains("took too long to respond") {
        AnswerHealth::TimedOut
    } else if lower.contains("error") && trimmed.chars().count() < 100 {
        AnswerHealth::Errored
    } else {
        AnswerHealth::Usable
    }
}
