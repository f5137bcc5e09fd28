//! Domain types shared by the index, the query engine and the host.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// A chunk of a source document that is independently embedded and indexed.
///
/// - `id`: `<doc_id>:<chunk_index>`, unique within one index
/// - `doc_id`: file stem of the source document
/// - `doc_path`: original path to the source file
/// - `file_name`: source file name, kept as retrieval metadata
/// - `content`: the text payload of the chunk
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub file_name: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// One retrieval result. `score` is a similarity where higher is better;
/// backends that cannot score leave it `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: Option<f32>,
}

impl ScoredChunk {
    pub fn new(chunk: DocumentChunk, score: Option<f32>) -> Self { Self { chunk, score } }
}

/// Best score present in a result set, if any result carries one.
pub fn max_score(hits: &[ScoredChunk]) -> Option<f32> {
    hits.iter().filter_map(|h| h.score).fold(None, |best, s| match best {
        Some(b) if b >= s => Some(b),
        _ => Some(s),
    })
}

/// Sort hits by descending score. Stable, so equal scores keep backend order;
/// unscored hits sink below scored ones.
pub fn sort_by_score_desc(hits: &mut [ScoredChunk]) {
    hits.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
