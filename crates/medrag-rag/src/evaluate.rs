//! Batch evaluation of models over a question set, with per-model statistics
//! and paired comparisons.
use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use medrag_core::types::RetrievedChunk;

use crate::answer::{AnswerOptions, AnswerPipeline};
use crate::compare::run_model;
use crate::scorer::QualityScorer;

const PREVIEW_CHARS: usize = 200;

pub const DEFAULT_EVALUATION_QUESTIONS: [&str; 10] = [
    "What are the diagnostic criteria for severe malaria according to WHO?",
    "What is the recommended first-line treatment for uncomplicated malaria?",
    "What are the symptoms of severe malaria in children?",
    "How is malaria diagnosed in endemic areas?",
    "What are the prevention strategies for malaria recommended by WHO?",
    "What is the dosage of artemisinin-based combination therapy for adults?",
    "What are the complications of untreated severe malaria?",
    "When should parenteral artesunate be administered?",
    "What are the contraindications for antimalarial drugs?",
    "How should malaria in pregnancy be managed according to WHO guidelines?",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPreview {
    pub document: String,
    pub chunk_index: usize,
    pub similarity: f32,
    pub text_preview: String,
}

impl From<&RetrievedChunk> for ChunkPreview {
    fn from(c: &RetrievedChunk) -> Self {
        Self {
            document: c.document_name.clone(),
            chunk_index: c.chunk_index,
            similarity: c.similarity,
            text_preview: c.text.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

/// One (model, question) evaluation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub model: String,
    pub answer: String,
    pub num_retrieved_chunks: usize,
    pub retrieved_chunks: Vec<ChunkPreview>,
    pub confidence: u8,
    pub relevance_score: f32,
    pub faithfulness_score: f32,
    pub coverage_score: f32,
    pub failed: bool,
    /// Left empty for manual grading.
    pub human_score: Option<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Evaluate one model on every question, in order. Pipeline errors become
/// zero-scored records whose answer starts with `ERROR:`.
pub fn evaluate_model(
    pipeline: &AnswerPipeline,
    scorer: &QualityScorer,
    model: &str,
    questions: &[String],
    base: &AnswerOptions,
) -> Vec<EvaluationRecord> {
    let options = base.clone().with_model(model);
    questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            tracing::info!(model, question = i + 1, total = questions.len(), "evaluating");
            let run = run_model(pipeline, scorer, question, &options);
            let (answer, chunks, confidence, failed) = match &run.result {
                Some(r) => (r.answer.clone(), r.retrieved_chunks.as_slice(), r.confidence, r.is_failed()),
                None => (format!("ERROR: {}", run.error.as_deref().unwrap_or("unknown")), &[][..], 0, true),
            };
            EvaluationRecord {
                question: question.clone(),
                model: model.to_string(),
                answer,
                num_retrieved_chunks: chunks.len(),
                retrieved_chunks: chunks.iter().map(ChunkPreview::from).collect(),
                confidence,
                relevance_score: run.scores.relevance,
                faithfulness_score: run.scores.faithfulness,
                coverage_score: run.scores.coverage,
                failed,
                human_score: None,
                timestamp: Utc::now(),
            }
        })
        .collect()
}

/// Evaluate every model, up to `workers` models concurrently. Records come
/// back grouped by model in the order of `models`.
pub fn evaluate(
    pipeline: &AnswerPipeline,
    scorer: &QualityScorer,
    models: &[String],
    questions: &[String],
    base: &AnswerOptions,
    workers: usize,
) -> Result<Vec<EvaluationRecord>> {
    let pool = ThreadPoolBuilder::new().num_threads(workers.max(1)).build()?;
    let per_model = pool.install(|| {
        models
            .par_iter()
            .map(|model| evaluate_model(pipeline, scorer, model, questions, base))
            .collect::<Vec<_>>()
    });
    Ok(per_model.into_iter().flatten().collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    pub mean: f64,
    /// Sample standard deviation; 0 with fewer than two values.
    pub std: f64,
}

impl MeanStd {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        if values.len() < 2 {
            return Self { mean, std: 0.0 };
        }
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Self { mean, std: var.sqrt() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatistics {
    pub model: String,
    pub num_questions: usize,
    pub relevance: MeanStd,
    pub faithfulness: MeanStd,
    pub coverage: MeanStd,
    pub confidence: MeanStd,
    /// `0.33 relevance + 0.33 faithfulness + 0.34 coverage`, over the means.
    pub combined_score: f64,
}

fn records_for<'a>(records: &'a [EvaluationRecord], model: &'a str) -> impl Iterator<Item = &'a EvaluationRecord> {
    records.iter().filter(move |r| r.model == model)
}

/// Models in order of first appearance.
fn models_in(records: &[EvaluationRecord]) -> Vec<&str> {
    let mut models: Vec<&str> = Vec::new();
    for r in records {
        if !models.contains(&r.model.as_str()) {
            models.push(&r.model);
        }
    }
    models
}

pub fn model_statistics(records: &[EvaluationRecord]) -> Vec<ModelStatistics> {
    models_in(records)
        .into_iter()
        .map(|model| {
            let rows: Vec<&EvaluationRecord> = records_for(records, model).collect();
            let relevance = MeanStd::of(&column_of(&rows, |r| r.relevance_score));
            let faithfulness = MeanStd::of(&column_of(&rows, |r| r.faithfulness_score));
            let coverage = MeanStd::of(&column_of(&rows, |r| r.coverage_score));
            let confidence: Vec<f64> = rows.iter().map(|r| f64::from(r.confidence)).collect();
            ModelStatistics {
                model: model.to_string(),
                num_questions: rows.len(),
                relevance,
                faithfulness,
                coverage,
                confidence: MeanStd::of(&confidence),
                combined_score: relevance.mean * 0.33 + faithfulness.mean * 0.33 + coverage.mean * 0.34,
            }
        })
        .collect()
}

/// Paired t statistic of `a - b`. `None` when the samples differ in length,
/// have fewer than two pairs, or the differences have zero variance.
pub fn paired_t_statistic(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let diffs: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    let stats = MeanStd::of(&diffs);
    if stats.std == 0.0 {
        return None;
    }
    Some(stats.mean / (stats.std / (diffs.len() as f64).sqrt()))
}

/// Significance level below which a paired difference is flagged.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Paired t-test result: the statistic and its two-sided p-value under a
/// Student's t distribution with `n - 1` degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairedTTest {
    pub t: f64,
    pub p_value: f64,
}

impl PairedTTest {
    pub fn is_significant(&self) -> bool { self.p_value < SIGNIFICANCE_LEVEL }
}

/// [`paired_t_statistic`] plus its two-sided p-value.
pub fn paired_t_test(a: &[f64], b: &[f64]) -> Option<PairedTTest> {
    let t = paired_t_statistic(a, b)?;
    let freedom = (a.len() - 1) as f64;
    let dist = StudentsT::new(0.0, 1.0, freedom).ok()?;
    let p_value = (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0);
    Some(PairedTTest { t, p_value })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedComparison {
    pub model_a: String,
    pub model_b: String,
    pub relevance: Option<PairedTTest>,
    pub faithfulness: Option<PairedTTest>,
}

fn sorted_by_question<'a>(records: &'a [EvaluationRecord], model: &'a str) -> Vec<&'a EvaluationRecord> {
    let mut rows: Vec<&EvaluationRecord> = records_for(records, model).collect();
    rows.sort_by(|x, y| x.question.cmp(&y.question));
    rows
}

fn column_of(rows: &[&EvaluationRecord], f: fn(&EvaluationRecord) -> f32) -> Vec<f64> {
    rows.iter().map(|&r| f64::from(f(r))).collect()
}

/// Paired t-tests for every pair of models, matching answers by question.
pub fn pairwise_comparisons(records: &[EvaluationRecord]) -> Vec<PairedComparison> {
    let models = models_in(records);
    let mut out = Vec::new();
    for (i, &a) in models.iter().enumerate() {
        for &b in &models[i + 1..] {
            let ra = sorted_by_question(records, a);
            let rb = sorted_by_question(records, b);
            out.push(PairedComparison {
                model_a: a.to_string(),
                model_b: b.to_string(),
                relevance: paired_t_test(
                    &column_of(&ra, |r| r.relevance_score),
                    &column_of(&rb, |r| r.relevance_score),
                ),
                faithfulness: paired_t_test(
                    &column_of(&ra, |r| r.faithfulness_score),
                    &column_of(&rb, |r| r.faithfulness_score),
                ),
            });
        }
    }
    out
}
