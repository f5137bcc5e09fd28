//! kbgate-knowledge
//!
//! Document Aggregator: reads knowledge files straight from disk on every
//! call and renders them as one block for a system prompt.

pub mod corpus;
pub mod title;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use kbgate_core::config::{resolve_with_base, KnowledgeSettings};

pub use corpus::{load_corpus, CorpusSnapshot, Document};
pub use title::derive_title;

pub const PROMPT_HEADER: &str = "## KNOWLEDGE BASE";
pub const PROMPT_DESCRIPTION: &str = "
### Usage Guidelines
- Reference this knowledge when answering user questions
- Incorporate relevant details into your responses
- Prioritize this information over general knowledge when applicable
- Be specific and accurate when citing information from these documents
";

pub struct KnowledgeBase {
    dir: PathBuf,
    extensions: Vec<String>,
    last: RwLock<Arc<CorpusSnapshot>>,
}

impl KnowledgeBase {
    /// Scans `dir` for `*.md` files. The first snapshot is taken here.
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self::with_extensions(dir, vec!["md".to_string()]) }

    pub fn with_extensions(dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        let dir = dir.into();
        let initial = load_corpus(&dir, &extensions);
        Self { dir, extensions, last: RwLock::new(Arc::new(initial)) }
    }

    pub fn from_settings(settings: &KnowledgeSettings, base: &Path) -> Self {
        Self::with_extensions(resolve_with_base(base, &settings.dir), settings.extensions.clone())
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Fresh read of the directory; does not touch the cached snapshot.
    pub fn load_corpus(&self) -> CorpusSnapshot { load_corpus(&self.dir, &self.extensions) }

    /// Re-read the directory and make the result the cached snapshot.
    pub fn refresh(&self) -> Arc<CorpusSnapshot> {
        let fresh = Arc::new(self.load_corpus());
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        fresh
    }

    /// Snapshot taken by the most recent refresh or format call.
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> { self.last.read().unwrap_or_else(PoisonError::into_inner).clone() }

    /// Header, usage guidelines, then one `### <title>` section per document
    /// with non-blank content, blank-line separated. Re-reads disk every call.
    pub fn format_for_prompt(&self) -> String { format_snapshot(&self.refresh()) }

    /// `instructions` followed by the current knowledge block.
    pub fn system_prompt(&self, instructions: &str) -> String { format!("{}\n\n{}", instructions, self.format_for_prompt()) }
}

pub fn format_snapshot(snapshot: &CorpusSnapshot) -> String {
    let mut parts = vec![PROMPT_HEADER.to_string(), PROMPT_DESCRIPTION.to_string()];
    parts.extend(snapshot.iter().filter(|d| d.has_content()).map(|d| format!("### {}\n\n{}", d.title, d.raw_text)));
    parts.join("\n\n")
}
