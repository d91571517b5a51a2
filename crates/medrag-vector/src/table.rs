//! LanceDB connection and housekeeping helpers.
//!
//! Provides the database open function and ensure/reset helpers for the chunk
//! table. Opening an existing table checks its vector width.
use anyhow::Result;
use lancedb::{connect, Connection};
use arrow_array::RecordBatchIterator;
use arrow_schema::SchemaRef;

use medrag_core::Error;
use crate::schema::vector_dim;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: SchemaRef) -> Result<()> {
    if table_exists(conn, name).await? {
        let existing = conn.open_table(name).execute().await?.schema().await?;
        if let (Some(expected), Some(actual)) = (vector_dim(&schema), vector_dim(&existing)) {
            if expected != actual {
                return Err(Error::DimensionMismatch { expected, actual }.into());
            }
        }
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

/// Remove every row of `name`, creating the table if it does not exist yet.
pub async fn reset_table(conn: &Connection, name: &str, schema: SchemaRef) -> Result<()> {
    ensure_table(conn, name, schema).await?;
    let _ = conn.open_table(name).execute().await?.delete("true").await?;
    Ok(())
}
