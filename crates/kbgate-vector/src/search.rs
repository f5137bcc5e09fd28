use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use kbgate_core::config::{resolve_with_base, IndexSettings};
use kbgate_core::error::Error;
use kbgate_core::data_processor::{ChunkingConfig, DataProcessor};
use kbgate_core::traits::{BlockingRetriever, Embedder, Retriever};
use kbgate_core::types::{sort_by_score_desc, DocumentChunk, ScoredChunk};

use crate::index_build::{build_ivfpq_index, compute_ivfpq_params};
use crate::schema::vector_dim;
use crate::table::{chunks_from_batch, open_db, table_exists};
use crate::writer::ChunkWriter;

const EMBED_BATCH: usize = 64;

/// Where the index lives and what it is built from.
#[derive(Debug, Clone)]
pub struct IndexOptions {
	pub source_dir: PathBuf,
	pub persist_dir: PathBuf,
	pub table: String,
	pub extensions: Vec<String>,
	pub chunking: ChunkingConfig,
	pub ann_min_rows: usize,
}

impl IndexOptions {
	pub fn from_settings(settings: &IndexSettings, base: &Path) -> Self {
		Self {
			source_dir: resolve_with_base(base, &settings.source_dir),
			persist_dir: resolve_with_base(base, &settings.persist_dir),
			table: settings.table.clone(),
			extensions: settings.extensions.clone(),
			chunking: ChunkingConfig { max_tokens: settings.max_tokens, overlap_percent: settings.overlap_percent },
			ann_min_rows: settings.ann_min_rows,
		}
	}
}

/// Whether `open_or_build` found a persisted index or wrote a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
	Loaded,
	Built,
}

/// Persisted nearest-neighbour index over document chunks, read-only once
/// opened. Cheap to share behind an `Arc` across concurrent queries.
pub struct SemanticIndex {
	table: Table,
	embedder: Arc<dyn Embedder>,
	origin: IndexOrigin,
}

impl SemanticIndex {
	/// Load the index at `persist_dir` if that path exists, otherwise build it
	/// from `source_dir` and persist it there. Presence of the path is the only
	/// signal; a stale index is loaded as-is.
	pub async fn open_or_build(options: &IndexOptions, embedder: Arc<dyn Embedder>) -> Result<Self> {
		if options.persist_dir.exists() {
			Self::open(&options.persist_dir, &options.table, embedder).await
		} else {
			Self::build(options, embedder).await
		}
	}

	pub async fn open(persist_dir: &Path, table_name: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
		let conn = connect_dir(persist_dir).await?;
		if !table_exists(&conn, table_name).await? {
			return Err(Error::NotFound(format!("table '{}' in {}", table_name, persist_dir.display())).into());
		}
		let table = conn.open_table(table_name).execute().await?;
		let rows = table.count_rows(None).await?;
		info!(dir = %persist_dir.display(), table = table_name, rows, "loaded persisted index");
		Ok(Self { table, embedder, origin: IndexOrigin::Loaded })
	}

	pub async fn build(options: &IndexOptions, embedder: Arc<dyn Embedder>) -> Result<Self> {
		info!(source = %options.source_dir.display(), dir = %options.persist_dir.display(), "building index");
		let existed = options.persist_dir.exists();
		match Self::build_inner(options, embedder).await {
			Ok(index) => Ok(index),
			Err(e) => {
				// A half-written directory would be loaded on the next start.
				// One that predates this call is left alone.
				if !existed && options.persist_dir.exists() {
					if let Err(rm) = std::fs::remove_dir_all(&options.persist_dir) {
						warn!(error = %rm, dir = %options.persist_dir.display(), "could not remove partial index");
					}
				}
				Err(e)
			}
		}
	}

	async fn build_inner(options: &IndexOptions, embedder: Arc<dyn Embedder>) -> Result<Self> {
		let processor = DataProcessor::with_config(options.chunking.clone(), options.extensions.clone());
		let source_dir = options.source_dir.clone();
		let chunks = tokio::task::spawn_blocking(move || processor.process_directory(&source_dir))
			.await
			.map_err(|e| Error::Operation(format!("chunking task failed: {e}")))??;
		let embeddings = embed_chunks(embedder.clone(), &chunks).await?;

		std::fs::create_dir_all(&options.persist_dir)?;
		let conn = connect_dir(&options.persist_dir).await?;
		let rows = ChunkWriter::new(&conn, &options.table, embedder.dim()).write(&chunks, &embeddings).await?;
		let table = conn.open_table(&options.table).execute().await?;
		if rows >= options.ann_min_rows && rows > 1 {
			build_ivfpq_index(&table, &compute_ivfpq_params(rows, embedder.dim())).await?;
		}
		info!(rows, "index built and persisted");
		Ok(Self { table, embedder, origin: IndexOrigin::Built })
	}

	pub fn origin(&self) -> IndexOrigin { self.origin }

	pub async fn row_count(&self) -> Result<usize> { Ok(self.table.count_rows(None).await?) }

	/// Vector width stored in the persisted table.
	pub async fn dim(&self) -> Result<usize> {
		let schema = self.table.schema().await?;
		vector_dim(&schema).ok_or_else(|| anyhow!("table has no vector column"))
	}

	/// Top-`k` chunks for a precomputed query vector, best first.
	pub async fn search_vec(&self, query_vec: Vec<f32>, k: usize) -> Result<Vec<ScoredChunk>> {
		let mut stream = self.table.vector_search(query_vec)?.distance_type(DistanceType::Cosine).limit(k).execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			for (chunk, distance) in chunks_from_batch(&batch)? {
				hits.push(ScoredChunk::new(chunk, distance.map(similarity_from_cosine_distance)));
			}
		}
		sort_by_score_desc(&mut hits);
		hits.truncate(k);
		Ok(hits)
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let embedder = self.embedder.clone();
		let text = vec![query.to_string()];
		let mut vecs = tokio::task::spawn_blocking(move || embedder.embed_batch(&text))
			.await
			.map_err(|e| Error::Operation(format!("embedding task failed: {e}")))??;
		Ok(vecs.pop().ok_or_else(|| Error::Embedding("embedder returned no vector for the query".to_string()))?)
	}
}

/// Cosine distance is in [0, 2]; 1.0 similarity means identical direction.
/// A degenerate (zero) vector yields NaN, scored as no similarity.
fn similarity_from_cosine_distance(distance: f32) -> f32 {
	let sim = 1.0 - distance;
	if sim.is_finite() { sim } else { 0.0 }
}

async fn connect_dir(dir: &Path) -> Result<Connection> {
	let uri = dir.to_str().ok_or_else(|| anyhow!("index path {} is not valid UTF-8", dir.display()))?;
	open_db(uri).await
}

async fn embed_chunks(embedder: Arc<dyn Embedder>, chunks: &[DocumentChunk]) -> Result<Vec<Vec<f32>>> {
	let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
	tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
		let mut out = Vec::with_capacity(texts.len());
		for batch in texts.chunks(EMBED_BATCH) {
			let embs = embedder.embed_batch(batch)?;
			if embs.len() != batch.len() { return Err(Error::Embedding(format!("embedder returned {} vectors for {} texts", embs.len(), batch.len())).into()); }
			out.extend(embs);
		}
		Ok(out)
	})
	.await
	.map_err(|e| Error::Operation(format!("embedding task failed: {e}")))?
}

#[async_trait]
impl Retriever for SemanticIndex {
	async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
		let query_vec = self.embed_query(query).await?;
		let hits = self.search_vec(query_vec, k).await?;
		debug!(k, hits = hits.len(), top = ?hits.first().and_then(|h| h.score), "retrieved");
		Ok(hits)
	}
}

/// Drives the async search to completion on the current thread. Call from
/// a plain thread or tokio's blocking pool, never from inside an async task.
impl BlockingRetriever for SemanticIndex {
	fn retrieve_blocking(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => handle.block_on(self.retrieve(query, k)),
			Err(_) => {
				let rt = tokio::runtime::Builder::new_current_thread()
					.enable_all()
					.build()
					.map_err(|e| Error::Retrieval(format!("could not start a runtime for blocking retrieval: {e}")))?;
				rt.block_on(self.retrieve(query, k))
			}
		}
	}
}
