//! In-process [`ChunkStore`] used for tests and ephemeral corpora.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::Error;
use crate::similarity::cosine_distance;
use crate::traits::ChunkStore;
use crate::types::{Chunk, ChunkId, StoreHit};

/// Exact nearest-neighbour search over chunks held in memory.
///
/// Rows are kept ordered by chunk id, which is also the tie order for equal
/// distances.
pub struct MemoryChunkStore {
    dim: usize,
    rows: RwLock<BTreeMap<ChunkId, Chunk>>,
}

impl MemoryChunkStore {
    pub fn new(dim: usize) -> Self {
        Self { dim, rows: RwLock::new(BTreeMap::new()) }
    }

    fn check_dim(&self, actual: usize) -> crate::error::Result<()> {
        if actual == self.dim { Ok(()) } else { Err(Error::DimensionMismatch { expected: self.dim, actual }) }
    }
}

impl ChunkStore for MemoryChunkStore {
    fn dim(&self) -> Option<usize> { Some(self.dim) }

    fn upsert(&self, chunks: &[Chunk]) -> anyhow::Result<usize> {
        for chunk in chunks { self.check_dim(chunk.embedding.len())?; }
        let mut rows = self.rows.write();
        for chunk in chunks { rows.insert(chunk.id(), chunk.clone()); }
        Ok(chunks.len())
    }

    fn query(&self, embedding: &[f32], k: usize) -> anyhow::Result<Vec<StoreHit>> {
        self.check_dim(embedding.len())?;
        let rows = self.rows.read();
        let mut hits: Vec<StoreHit> = rows
            .iter()
            .map(|(id, chunk)| StoreHit {
                id: id.clone(),
                distance: cosine_distance(embedding, &chunk.embedding),
                document_name: chunk.document_name.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    fn count(&self) -> anyhow::Result<usize> { Ok(self.rows.read().len()) }

    fn document_names(&self) -> anyhow::Result<Vec<String>> {
        let mut names: Vec<String> = self.rows.read().values().map(|c| c.document_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
