//! Run one question against several models on a bounded thread pool.
use anyhow::Result;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use medrag_core::types::QueryResult;

use crate::answer::{AnswerOptions, AnswerPipeline};
use crate::scorer::{QualityScorer, QualityScores};

/// One model's answer and scores. A run whose pipeline call errored or whose
/// generation failed carries zero scores.
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub model: String,
    pub result: Option<QueryResult>,
    pub error: Option<String>,
    pub scores: QualityScores,
}

impl ModelRun {
    pub fn succeeded(&self) -> bool {
        self.result.as_ref().is_some_and(|r| !r.is_failed())
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub question: String,
    /// Same order as the requested models.
    pub runs: Vec<ModelRun>,
}

impl Comparison {
    /// Highest combined score among successful runs; earlier models win ties.
    pub fn best(&self) -> Option<&ModelRun> {
        self.runs.iter().filter(|r| r.succeeded()).fold(None, |best: Option<&ModelRun>, run| match best {
            Some(b) if b.scores.combined() >= run.scores.combined() => Some(b),
            _ => Some(run),
        })
    }
}

/// Answer and score `question` with every model in `models`, at most
/// `workers` at a time.
pub fn compare_models(
    pipeline: &AnswerPipeline,
    scorer: &QualityScorer,
    question: &str,
    models: &[String],
    base: &AnswerOptions,
    workers: usize,
) -> Result<Comparison> {
    let pool = ThreadPoolBuilder::new().num_threads(workers.max(1)).build()?;
    tracing::info!(models = models.len(), workers, "comparing models");
    let runs = pool.install(|| {
        models
            .par_iter()
            .map(|model| run_model(pipeline, scorer, question, &base.clone().with_model(model.as_str())))
            .collect::<Vec<_>>()
    });
    Ok(Comparison { question: question.to_string(), runs })
}

pub(crate) fn run_model(pipeline: &AnswerPipeline, scorer: &QualityScorer, question: &str, options: &AnswerOptions) -> ModelRun {
    match pipeline.answer(question, options) {
        Ok(result) => {
            let scores = if result.is_failed() {
                QualityScores::default()
            } else {
                scorer.score_all(question, &result.answer, &result.retrieved_chunks)
            };
            tracing::info!(model = %options.model, combined = scores.combined(), outcome = ?result.outcome, "model run finished");
            ModelRun { model: options.model.clone(), result: Some(result), error: None, scores }
        }
        Err(e) => {
            tracing::warn!(model = %options.model, error = %format!("{e:#}"), "model run failed");
            ModelRun { model: options.model.clone(), result: None, error: Some(format!("{e:#}")), scores: QualityScores::default() }
        }
    }
}
