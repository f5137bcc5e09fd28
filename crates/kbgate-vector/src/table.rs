//! LanceDB connection and housekeeping helpers.
use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use lancedb::{connect, Connection};

use kbgate_core::types::DocumentChunk;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow!("column '{}' missing or of unexpected type", name))
}

/// Decode the chunk columns of a result batch, plus the `_distance` column
/// when the batch came from a vector query.
pub fn chunks_from_batch(batch: &RecordBatch) -> Result<Vec<(DocumentChunk, Option<f32>)>> {
    let ids = column::<StringArray>(batch, "id")?;
    let doc_ids = column::<StringArray>(batch, "doc_id")?;
    let doc_paths = column::<StringArray>(batch, "doc_path")?;
    let file_names = column::<StringArray>(batch, "file_name")?;
    let contents = column::<StringArray>(batch, "content")?;
    let chunk_indices = column::<Int32Array>(batch, "chunk_index")?;
    let totals = column::<Int32Array>(batch, "total_chunks")?;
    let distances = column::<Float32Array>(batch, "_distance").ok();

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let chunk = DocumentChunk {
            id: ids.value(i).to_string(),
            doc_id: doc_ids.value(i).to_string(),
            doc_path: doc_paths.value(i).to_string(),
            file_name: file_names.value(i).to_string(),
            content: contents.value(i).to_string(),
            chunk_index: usize::try_from(chunk_indices.value(i)).unwrap_or_default(),
            total_chunks: usize::try_from(totals.value(i)).unwrap_or_default(),
        };
        let distance = distances.filter(|d| d.is_valid(i)).map(|d| d.value(i));
        out.push((chunk, distance));
    }
    Ok(out)
}
