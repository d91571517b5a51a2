use anyhow::{Result, anyhow};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::{Connection, DistanceType};
use lancedb::query::{ExecutableQuery, QueryBase};
use std::collections::BTreeSet;

use medrag_core::types::StoreHit;

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<T>()).ok_or_else(|| anyhow!("missing or mistyped column '{}'", name))
}

/// Exhaustive cosine-distance search; rows come back nearest first.
pub async fn search_nearest(db: &Connection, table_name: &str, query: &[f32], k: usize) -> Result<Vec<StoreHit>> {
	let table = db.open_table(table_name).execute().await?;
	if table.count_rows(None).await? == 0 { return Ok(Vec::new()); }
	let mut stream = table.vector_search(query.to_vec())?.distance_type(DistanceType::Cosine).limit(k).execute().await?;
	let mut hits = Vec::new();
	while let Some(batch) = stream.try_next().await? {
		let ids = column::<StringArray>(&batch, "id")?;
		let names = column::<StringArray>(&batch, "document_name")?;
		let indices = column::<Int32Array>(&batch, "chunk_index")?;
		let texts = column::<StringArray>(&batch, "text")?;
		let distances = column::<Float32Array>(&batch, "_distance")?;
		for i in 0..batch.num_rows() {
			hits.push(StoreHit {
				id: ids.value(i).to_string(),
				distance: distances.value(i),
				document_name: names.value(i).to_string(),
				chunk_index: usize::try_from(indices.value(i))?,
				text: texts.value(i).to_string(),
			});
		}
	}
	hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
	hits.truncate(k);
	Ok(hits)
}

pub async fn document_names(db: &Connection, table_name: &str) -> Result<Vec<String>> {
	let table = db.open_table(table_name).execute().await?;
	let mut names = BTreeSet::new();
	let mut stream = table.query().execute().await?;
	while let Some(batch) = stream.try_next().await? {
		let col = column::<StringArray>(&batch, "document_name")?;
		for i in 0..batch.num_rows() { names.insert(col.value(i).to_string()); }
	}
	Ok(names.into_iter().collect())
}
