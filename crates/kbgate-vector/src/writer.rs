use anyhow::{ensure, Result};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;
use tracing::info;

use kbgate_core::types::DocumentChunk;
use crate::schema::build_arrow_schema;

const INSERT_BATCH: usize = 1000;

/// Appends embedded chunks to one LanceDB table, creating it on first write.
pub struct ChunkWriter<'a> { db: &'a Connection, table_name: &'a str, dim: usize }

impl<'a> ChunkWriter<'a> {
	pub fn new(db: &'a Connection, table_name: &'a str, dim: usize) -> Self { Self { db, table_name, dim } }

	pub async fn write(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
		ensure!(chunks.len() == embeddings.len(), "chunks ({}) and embeddings ({}) length must match", chunks.len(), embeddings.len());
		if chunks.is_empty() {
			self.db.create_empty_table(self.table_name, build_arrow_schema(self.dim_i32()?)).execute().await?;
			info!(table = self.table_name, "created empty chunk table");
			return Ok(0);
		}
		let pb = ProgressBar::new(chunks.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks written ({percent}%)")?.progress_chars("#>-"));
		let mut created = false;
		for (chunk_batch, emb_batch) in chunks.chunks(INSERT_BATCH).zip(embeddings.chunks(INSERT_BATCH)) {
			let record_batch = self.to_record_batch(chunk_batch, emb_batch)?;
			let schema = record_batch.schema();
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
			if created {
				self.db.open_table(self.table_name).execute().await?.add(reader).execute().await?;
			} else {
				self.db.create_table(self.table_name, reader).execute().await?;
				created = true;
			}
			pb.inc(chunk_batch.len() as u64);
		}
		pb.finish_and_clear();
		info!(table = self.table_name, rows = chunks.len(), "wrote chunk table");
		Ok(chunks.len())
	}

	fn dim_i32(&self) -> Result<i32> { Ok(i32::try_from(self.dim)?) }

	fn to_record_batch(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let dim = self.dim_i32()?;
		for e in embeddings { ensure!(e.len() == self.dim, "embedding dim {} does not match index dim {}", e.len(), self.dim); }
		let mut ids = Vec::new(); let mut doc_ids = Vec::new(); let mut doc_paths = Vec::new(); let mut file_names = Vec::new(); let mut contents = Vec::new(); let mut chunk_indices = Vec::new(); let mut total_chunks = Vec::new();
		for c in chunks {
			ids.push(c.id.clone()); doc_ids.push(c.doc_id.clone()); doc_paths.push(c.doc_path.clone()); file_names.push(c.file_name.clone()); contents.push(c.content.clone());
			chunk_indices.push(i32::try_from(c.chunk_index)?); total_chunks.push(i32::try_from(c.total_chunks)?);
		}
		let vectors = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
		let record_batch = RecordBatch::try_new(build_arrow_schema(dim), vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(doc_ids)),
			Arc::new(StringArray::from(doc_paths)),
			Arc::new(StringArray::from(file_names)),
			Arc::new(StringArray::from(contents)),
			Arc::new(Int32Array::from(chunk_indices)),
			Arc::new(Int32Array::from(total_chunks)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
		])?;
		Ok(record_batch)
	}
}
