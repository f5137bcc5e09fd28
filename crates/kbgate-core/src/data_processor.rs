use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Error;
use crate::types::DocumentChunk;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

/// Turns the index source directory into embeddable chunks.
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
    extensions: Vec<String>,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self { chunking_config: ChunkingConfig::default(), extensions: vec!["md".to_string(), "txt".to_string()] }
    }
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig, extensions: Vec<String>) -> Self {
        Self { chunking_config, extensions }
    }

    /// Chunk every recognised file under `data_dir`, in path order.
    /// A missing directory is an error here: an index built from nothing
    /// would be persisted and silently reused.
    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<DocumentChunk>> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("index source directory {}", data_dir.display())).into());
        }
        let files = self.list_source_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no source documents found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), n = file_index + 1, of = files.len(), "chunking");
            let content = self.read_file_content(file_path)?;
            let doc_id = self.extract_doc_id(file_path, data_dir);
            let chunks = self.chunk_content(&content, &doc_id, file_path);
            all_chunks.extend(chunks);
        }
        info!(files = files.len(), chunks = all_chunks.len(), "processed source documents");
        Ok(all_chunks)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => {
                let bytes = fs::read(file_path).with_context(|| format!("reading {}", file_path.display()))?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
        }
    }

    /// Relative path without extension, `/`-separated, so nested files with
    /// the same stem stay distinct.
    fn extract_doc_id(&self, file_path: &Path, data_dir: &Path) -> String {
        let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        let stem = relative.with_extension("");
        stem.components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn chunk_content(&self, content: &str, doc_id: &str, file_path: &Path) -> Vec<DocumentChunk> {
        let doc_path = file_path.to_string_lossy().to_string();
        let file_name = file_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let mut pieces = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() { continue; }
            if self.count_tokens(paragraph) <= self.chunking_config.max_tokens {
                pieces.push(paragraph.to_string());
            } else {
                pieces.extend(self.split_paragraph_with_overlap(paragraph));
            }
        }
        let total_chunks = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| DocumentChunk {
                id: format!("{}:{}", doc_id, chunk_index),
                doc_id: doc_id.to_string(),
                doc_path: doc_path.clone(),
                file_name: file_name.clone(),
                content,
                chunk_index,
                total_chunks,
            })
            .collect()
    }

    fn count_tokens(&self, text: &str) -> usize { let word_count = text.split_whitespace().count(); (word_count as f32 / 0.75) as usize }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let words_per_chunk = ((self.chunking_config.max_tokens as f32 * 0.75) as usize).max(1);
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_source_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|e| e == ext));
            if matches { files.push(path.to_path_buf()); }
        }
        files.sort();
        files
    }
}
