//! LanceDB-backed [`ChunkStore`].
//!
//! The store owns a tokio runtime and blocks on it inside the synchronous trait
//! methods, so callers stay synchronous. Distances are cosine distances, which
//! the retriever turns into similarities as `1 - distance`.
use anyhow::Result;
use lancedb::Connection;
use std::path::Path;
use tokio::runtime::Runtime;

use medrag_core::traits::ChunkStore;
use medrag_core::types::{Chunk, StoreHit};
use medrag_core::Error;

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

use crate::schema::build_arrow_schema;

pub struct LanceChunkStore { rt: Runtime, db: Connection, table_name: String, dim: usize }

impl LanceChunkStore {
	/// Open (creating if needed) `table_name` under `db_path` for `dim`-wide vectors.
	pub fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		let rt = Runtime::new()?;
		let db = rt.block_on(table::open_db(db_path.to_string_lossy().as_ref()))?;
		rt.block_on(table::ensure_table(&db, table_name, build_arrow_schema(dim)))?;
		tracing::info!(path = %db_path.display(), table = table_name, dim, "opened chunk store");
		Ok(Self { rt, db, table_name: table_name.to_string(), dim })
	}

	/// Delete every stored chunk; used before a full re-ingestion.
	pub fn reset(&self) -> Result<()> {
		tracing::info!(table = %self.table_name, "resetting chunk store");
		self.rt.block_on(table::reset_table(&self.db, &self.table_name, build_arrow_schema(self.dim)))
	}

	pub fn table_name(&self) -> &str { &self.table_name }
}

impl ChunkStore for LanceChunkStore {
	fn dim(&self) -> Option<usize> { Some(self.dim) }

	fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
		self.rt.block_on(writer::upsert_chunks(&self.db, &self.table_name, chunks, self.dim))
	}

	fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<StoreHit>> {
		if embedding.len() != self.dim {
			return Err(Error::DimensionMismatch { expected: self.dim, actual: embedding.len() }.into());
		}
		if k == 0 { return Ok(Vec::new()); }
		self.rt.block_on(search::search_nearest(&self.db, &self.table_name, embedding, k))
	}

	fn count(&self) -> Result<usize> {
		self.rt.block_on(async { Ok::<usize, anyhow::Error>(self.db.open_table(&self.table_name).execute().await?.count_rows(None).await?) })
	}

	fn document_names(&self) -> Result<Vec<String>> {
		self.rt.block_on(search::document_names(&self.db, &self.table_name))
	}
}
