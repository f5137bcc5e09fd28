use async_trait::async_trait;

use crate::types::ScoredChunk;

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Top-K similarity search, awaited on the caller's runtime.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> anyhow::Result<Vec<ScoredChunk>>;
}

/// Same contract as [`Retriever`] for hosts that cannot await.
pub trait BlockingRetriever: Send + Sync {
    fn retrieve_blocking(&self, query: &str, k: usize) -> anyhow::Result<Vec<ScoredChunk>>;
}

/// Composes an answer to `query` from `context` alone.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, query: &str, context: &[ScoredChunk]) -> anyhow::Result<String>;
}
