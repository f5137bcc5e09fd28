use anyhow::Result;
use async_trait::async_trait;

use kbgate_core::traits::Synthesizer;
use kbgate_core::types::ScoredChunk;

/// Answers with the leading retrieved passages verbatim. Grounded by
/// construction and needs no model.
pub struct ExtractiveSynthesizer { max_passages: usize }

impl ExtractiveSynthesizer {
    pub fn new(max_passages: usize) -> Self { Self { max_passages: max_passages.max(1) } }
}

#[async_trait]
impl Synthesizer for ExtractiveSynthesizer {
    async fn synthesize(&self, _query: &str, context: &[ScoredChunk]) -> Result<String> {
        Ok(context
            .iter()
            .map(|h| h.chunk.content.trim())
            .filter(|c| !c.is_empty())
            .take(self.max_passages)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
