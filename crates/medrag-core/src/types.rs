//! Domain types shared by the ingestion, retrieval and answer pipelines.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Builds the store identity for a chunk: `"{document_name}_chunk_{chunk_index}"`.
pub fn chunk_id(document_name: &str, chunk_index: usize) -> ChunkId {
    format!("{document_name}_chunk_{chunk_index}")
}

/// A source document after text extraction, ready for chunking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// A window of a source document that is independently embedded and stored.
///
/// - `document_name`: parent document's file name, or its path below the
///   corpus root when loaded from a directory (e.g. `malaria/who_guide.pdf`)
/// - `chunk_index`: position of the window within the parent document
/// - `text`: the window's words joined by single spaces, never empty
/// - `embedding`: fixed-length vector produced by the embedder
///
/// `(document_name, chunk_index)` is unique within a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn id(&self) -> ChunkId {
        chunk_id(&self.document_name, self.chunk_index)
    }
}

/// One nearest-neighbour row returned by a [`crate::traits::ChunkStore`].
///
/// `distance` is the store's native cosine distance, so `1 - distance` is the
/// cosine similarity to the query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHit {
    pub id: ChunkId,
    pub distance: f32,
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
}

/// A chunk returned for a single query, with its derived similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub similarity: f32,
}

impl From<StoreHit> for RetrievedChunk {
    fn from(hit: StoreHit) -> Self {
        Self {
            document_name: hit.document_name,
            chunk_index: hit.chunk_index,
            text: hit.text,
            similarity: 1.0 - hit.distance,
        }
    }
}

/// Why a generation attempt produced no usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Timeout,
    Unreachable,
    Backend,
}

/// Which branch of the answer pipeline produced a [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Answer generated from retrieved guideline context.
    Grounded,
    /// Nothing cleared the similarity threshold; general-knowledge answer.
    Fallback,
    /// Context was retrieved but the model returned empty text.
    EmptyGeneration,
    /// The generator timed out or could not be reached.
    Failed { failure: FailureKind },
}

/// The answer pipeline's result for one query. Never persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub confidence: u8,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub insufficient_context: bool,
    pub outcome: AnswerOutcome,
}

impl QueryResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AnswerOutcome::Failed { .. })
    }

    /// Mean similarity over every retrieved chunk, `0.0` when none were retrieved.
    pub fn average_similarity(&self) -> f64 {
        average_similarity(&self.retrieved_chunks)
    }
}

pub fn average_similarity(chunks: &[RetrievedChunk]) -> f64 {
    if chunks.is_empty() {
        return 0.0;
    }
    let total: f64 = chunks.iter().map(|c| f64::from(c.similarity)).sum();
    total / chunks.len() as f64
}
