//! Retrieval-augmented answering over an indexed guideline corpus: ingestion,
//! retrieval, grounded generation, quality scoring and model evaluation.
#![deny(unused_imports, unused_variables)]

pub mod answer;
pub mod compare;
pub mod conversation;
pub mod evaluate;
pub mod ingest;
pub mod prompt;
pub mod retrieve;
pub mod scorer;

pub use answer::{classify_answer, AnswerHealth, AnswerOptions, AnswerPipeline, PipelineConfig};
pub use compare::{compare_models, Comparison, ModelRun};
pub use conversation::Conversation;
pub use evaluate::{evaluate, model_statistics, paired_t_statistic, paired_t_test, EvaluationRecord, ModelStatistics, PairedTTest};
pub use ingest::{IngestReport, IngestionPipeline};
pub use retrieve::Retriever;
pub use scorer::{Badge, QualityScorer, QualityScores};
