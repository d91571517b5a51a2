//! Embedding-similarity quality metrics for a generated answer.
//!
//! Every metric is in `[0, 1]` and falls back to `0.0` on degenerate input
//! or when the embedder fails.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use medrag_core::config::ScoringConfig;
use medrag_core::similarity::cosine_similarity;
use medrag_core::traits::Embedder;
use medrag_core::types::RetrievedChunk;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub relevance: f32,
    pub faithfulness: f32,
    pub coverage: f32,
}

impl QualityScores {
    /// Unweighted mean of the three metrics.
    pub fn combined(&self) -> f32 {
        (self.relevance + self.faithfulness + self.coverage) / 3.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Badge {
    High,
    Moderate,
    Low,
}

impl Badge {
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn badge(score: f32, high: f32, moderate: f32) -> Badge {
    if score >= high {
        Badge::High
    } else if score >= moderate {
        Badge::Moderate
    } else {
        Badge::Low
    }
}

/// Badge for a relevance or faithfulness score.
pub fn quality_badge(score: f32, config: &ScoringConfig) -> Badge {
    badge(score, config.quality_high, config.quality_moderate)
}

pub fn coverage_badge(score: f32, config: &ScoringConfig) -> Badge {
    badge(score, config.coverage_high, config.coverage_moderate)
}

pub struct QualityScorer {
    embedder: Arc<dyn Embedder>,
    config: ScoringConfig,
}

impl QualityScorer {
    pub fn new(embedder: Arc<dyn Embedder>, config: ScoringConfig) -> Self { Self { embedder, config } }

    pub fn config(&self) -> &ScoringConfig { &self.config }

    /// Cosine similarity between question and answer embeddings.
    pub fn score_relevance(&self, question: &str, answer: &str) -> f32 {
        if self.is_degenerate(answer) {
            return 0.0;
        }
        self.embed_one("relevance", answer).map_or(0.0, |a| self.relevance_with(question, &a))
    }

    /// Cosine similarity between the answer and all chunk texts joined together.
    pub fn score_faithfulness(&self, answer: &str, chunks: &[RetrievedChunk]) -> f32 {
        if self.is_degenerate(answer) || chunks.is_empty() {
            return 0.0;
        }
        self.embed_one("faithfulness", answer).map_or(0.0, |a| self.faithfulness_with(&a, chunks))
    }

    /// Fraction of chunks whose own embedding is close enough to the answer's.
    pub fn score_coverage(&self, answer: &str, chunks: &[RetrievedChunk]) -> f32 {
        if self.is_degenerate(answer) || chunks.is_empty() {
            return 0.0;
        }
        self.embed_one("coverage", answer).map_or(0.0, |a| self.coverage_with(&a, chunks))
    }

    /// All three metrics, embedding the answer once.
    pub fn score_all(&self, question: &str, answer: &str, chunks: &[RetrievedChunk]) -> QualityScores {
        if self.is_degenerate(answer) {
            return QualityScores::default();
        }
        let Some(answer_vec) = self.embed_one("answer", answer) else {
            return QualityScores::default();
        };
        let (faithfulness, coverage) = if chunks.is_empty() {
            (0.0, 0.0)
        } else {
            (self.faithfulness_with(&answer_vec, chunks), self.coverage_with(&answer_vec, chunks))
        };
        QualityScores { relevance: self.relevance_with(question, &answer_vec), faithfulness, coverage }
    }

    fn is_degenerate(&self, answer: &str) -> bool {
        answer.trim().chars().count() < self.config.min_answer_chars
    }

    fn relevance_with(&self, question: &str, answer_vec: &[f32]) -> f32 {
        self.embed_one("relevance", question).map_or(0.0, |q| clamp_unit(cosine_similarity(&q, answer_vec)))
    }

    fn faithfulness_with(&self, answer_vec: &[f32], chunks: &[RetrievedChunk]) -> f32 {
        let joined = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
        self.embed_one("faithfulness", &joined).map_or(0.0, |ctx| clamp_unit(cosine_similarity(answer_vec, &ctx)))
    }

    fn coverage_with(&self, answer_vec: &[f32], chunks: &[RetrievedChunk]) -> f32 {
        // empty chunks stay in the denominator
        let texts: Vec<String> = chunks.iter().filter(|c| !c.text.trim().is_empty()).map(|c| c.text.clone()).collect();
        if texts.is_empty() {
            return 0.0;
        }
        let embeddings = match self.embedder.embed_batch(&texts) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(metric = "coverage", error = %format!("{e:#}"), "embedding failed, scoring 0");
                return 0.0;
            }
        };
        let used = embeddings
            .iter()
            .filter(|e| cosine_similarity(answer_vec, e) >= self.config.coverage_threshold)
            .count();
        clamp_unit(used as f32 / chunks.len() as f32)
    }

    fn embed_one(&self, metric: &str, text: &str) -> Option<Vec<f32>> {
        match self.embedder.embed(text) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(metric, error = %format!("{e:#}"), "embedding failed, scoring 0");
                None
            }
        }
    }
}

fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}
