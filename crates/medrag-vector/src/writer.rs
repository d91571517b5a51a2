use anyhow::Result;
use lancedb::Connection;
use arrow_array::{RecordBatch, RecordBatchIterator, Int32Array, FixedSizeListArray, StringArray};
use std::sync::Arc;

use medrag_core::types::Chunk;
use medrag_core::Error;
use crate::schema::build_arrow_schema;

const BATCH_SIZE: usize = 1000;

/// Merge chunks into `table_name` keyed by `id`: matching rows are overwritten,
/// new rows inserted. Returns the number of chunks written.
pub async fn upsert_chunks(db: &Connection, table_name: &str, chunks: &[Chunk], dim: usize) -> Result<usize> {
	if chunks.is_empty() { return Ok(0); }
	if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
		return Err(Error::DimensionMismatch { expected: dim, actual: bad.embedding.len() }.into());
	}
	let table = db.open_table(table_name).execute().await?;
	let mut written = 0usize;
	for batch in chunks.chunks(BATCH_SIZE) {
		let record_batch = chunks_to_record_batch(batch, dim)?; let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		let mut mi = table.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		let _ = mi.execute(reader).await?;
		written += batch.len();
		tracing::debug!(table = table_name, written, total = chunks.len(), "upserted chunk batch");
	}
	Ok(written)
}

pub fn chunks_to_record_batch(chunks: &[Chunk], dim: usize) -> Result<RecordBatch> {
	let schema = build_arrow_schema(dim);
	let mut ids = Vec::new(); let mut names = Vec::new(); let mut indices = Vec::new(); let mut texts = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
	for c in chunks {
		ids.push(c.id()); names.push(c.document_name.clone()); texts.push(c.text.clone());
		indices.push(i32::try_from(c.chunk_index)?);
		vectors.push(Some(c.embedding.iter().map(|&x| Some(x)).collect()));
	}
	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(names)),
		Arc::new(Int32Array::from(indices)),
		Arc::new(StringArray::from(texts)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), i32::try_from(dim)?)),
	])?;
	Ok(record_batch)
}
