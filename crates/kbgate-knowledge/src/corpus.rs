use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::title::derive_title;

/// One knowledge file as read at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub identifier: String,
    pub path: PathBuf,
    /// Empty when the file could not be read or decoded.
    pub raw_text: String,
    pub title: String,
}

impl Document {
    pub fn new(identifier: String, path: PathBuf, raw_text: String) -> Self {
        let title = derive_title(&raw_text, &identifier);
        Self { identifier, path, raw_text, title }
    }

    pub fn has_content(&self) -> bool { !self.raw_text.trim().is_empty() }
}

/// Documents keyed by identifier, in file-name order. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusSnapshot {
    documents: Vec<Document>,
}

impl CorpusSnapshot {
    /// Insert or replace by identifier; a replaced entry keeps its position.
    pub fn insert(&mut self, doc: Document) {
        match self.documents.iter_mut().find(|d| d.identifier == doc.identifier) {
            Some(existing) => *existing = doc,
            None => self.documents.push(doc),
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&Document> { self.documents.iter().find(|d| d.identifier == identifier) }

    pub fn contains_key(&self, identifier: &str) -> bool { self.get(identifier).is_some() }

    pub fn keys(&self) -> impl Iterator<Item = &str> { self.documents.iter().map(|d| d.identifier.as_str()) }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> { self.documents.iter() }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
}

impl<'a> IntoIterator for &'a CorpusSnapshot {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;
    fn into_iter(self) -> Self::IntoIter { self.documents.iter() }
}

/// Read every top-level file in `dir` whose extension is in `extensions`.
///
/// Never fails: a missing directory gives an empty snapshot, an unreadable
/// or non-UTF-8 file keeps its key with empty text, and an enumeration error
/// stops the scan with what was collected so far. Hidden files are skipped.
pub fn load_corpus(dir: &Path, extensions: &[String]) -> CorpusSnapshot {
    let mut snapshot = CorpusSnapshot::default();
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "knowledge directory missing");
        return snapshot;
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "stopped scanning knowledge directory");
                break;
            }
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || !path.is_file() { continue; }
        let recognised = path.extension().and_then(|e| e.to_str()).is_some_and(|ext| extensions.iter().any(|x| x == ext));
        if !recognised { continue; }
        let Some(identifier) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else { continue; };
        let raw_text = fs::read_to_string(path).unwrap_or_else(|err| {
            warn!(file = %path.display(), error = %err, "unreadable knowledge file kept as empty");
            String::new()
        });
        snapshot.insert(Document::new(identifier, path.to_path_buf(), raw_text));
    }
    snapshot
}
