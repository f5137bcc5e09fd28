//! kbgate-vector
//!
//! LanceDB-backed semantic index. `SemanticIndex::open_or_build` loads the
//! persisted table or builds it from the source directory; the index then
//! serves cosine top-K queries through the async and blocking retriever traits.
pub mod index_build;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::{IndexOptions, IndexOrigin, SemanticIndex};
pub use writer::ChunkWriter;
