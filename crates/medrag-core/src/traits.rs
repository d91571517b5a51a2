use std::time::Duration;

use crate::error::GenerateError;
use crate::types::{Chunk, StoreHit};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Persistent collection of embedded chunks, queried by cosine distance.
pub trait ChunkStore: Send + Sync {
    /// Embedding dimensionality the store was created with, if fixed.
    fn dim(&self) -> Option<usize>;
    /// Insert or overwrite chunks keyed by `(document_name, chunk_index)`.
    fn upsert(&self, chunks: &[Chunk]) -> anyhow::Result<usize>;
    /// Up to `k` nearest chunks, ordered by ascending distance.
    fn query(&self, embedding: &[f32], k: usize) -> anyhow::Result<Vec<StoreHit>>;
    fn count(&self) -> anyhow::Result<usize>;
    /// Sorted, de-duplicated names of every indexed document.
    fn document_names(&self) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub timeout: Duration,
}

pub trait Generator: Send + Sync {
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, GenerateError>;
}
