use anyhow::Result;
use std::sync::Arc;

use medrag_core::traits::ChunkStore;
use medrag_core::types::RetrievedChunk;
use medrag_core::Error;

/// Nearest-neighbour lookup with a similarity floor.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn ChunkStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self { Self { store } }

    pub fn store(&self) -> &Arc<dyn ChunkStore> { &self.store }

    /// At most `k` chunks with `similarity >= min_similarity`, most similar first.
    ///
    /// An empty vector means no stored chunk is relevant enough; it is not an error.
    /// Chunks with equal similarity keep the store's order.
    pub fn retrieve(&self, query_vector: &[f32], k: usize, min_similarity: f32) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".into()).into());
        }
        if let Some(expected) = self.store.dim() {
            if query_vector.len() != expected {
                return Err(Error::DimensionMismatch { expected, actual: query_vector.len() }.into());
            }
        }

        let hits = self.store.query(query_vector, k)?;
        let fetched = hits.len();
        let mut chunks: Vec<RetrievedChunk> =
            hits.into_iter().map(RetrievedChunk::from).filter(|c| c.similarity >= min_similarity).collect();
        chunks.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        chunks.truncate(k);
        tracing::debug!(fetched, kept = chunks.len(), min_similarity, "retrieved chunks");
        Ok(chunks)
    }
}
