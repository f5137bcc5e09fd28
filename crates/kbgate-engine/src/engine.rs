use anyhow::{Context, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use kbgate_core::config::{RetrievalMode, RetrievalSettings, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TOP_K};
use kbgate_core::error::Error;
use kbgate_core::traits::{BlockingRetriever, Retriever, Synthesizer};
use kbgate_core::types::{max_score, sort_by_score_desc, ScoredChunk};

use crate::outcome::{QueryOutcome, KB_ERROR, KB_NO_MATCH};

/// Retrieval depth and the confidence cutoff applied to its best score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatePolicy {
    pub top_k: usize,
    pub confidence_threshold: f32,
}

impl Default for GatePolicy {
    fn default() -> Self { Self { top_k: DEFAULT_TOP_K, confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD } }
}

impl From<&RetrievalSettings> for GatePolicy {
    fn from(s: &RetrievalSettings) -> Self { Self { top_k: s.top_k, confidence_threshold: s.confidence_threshold } }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Proceed,
    Empty,
    LowConfidence(f32),
}

/// Empty results and a best score below the threshold reject; results that
/// carry no scores at all go through.
pub fn gate(hits: &[ScoredChunk], confidence_threshold: f32) -> GateDecision {
    if hits.is_empty() {
        return GateDecision::Empty;
    }
    match max_score(hits) {
        Some(best) if best < confidence_threshold => GateDecision::LowConfidence(best),
        _ => GateDecision::Proceed,
    }
}

/// Which retriever contract the engine drives. Fixed at construction.
#[derive(Clone)]
pub enum RetrievalPath {
    Async(Arc<dyn Retriever>),
    /// Run on tokio's blocking pool.
    Blocking(Arc<dyn BlockingRetriever>),
}

/// Retrieve, gate, then synthesize from the retrieved passages only.
/// Stateless across queries; share one instance behind an `Arc`.
pub struct QueryEngine {
    retrieval: RetrievalPath,
    synthesizer: Arc<dyn Synthesizer>,
    policy: GatePolicy,
}

impl QueryEngine {
    pub fn new(retrieval: RetrievalPath, synthesizer: Arc<dyn Synthesizer>, policy: GatePolicy) -> Self {
        Self { retrieval, synthesizer, policy }
    }

    /// Select the retrieval path from `settings.mode` for an index that
    /// implements both contracts.
    pub fn for_index<R>(index: Arc<R>, synthesizer: Arc<dyn Synthesizer>, settings: &RetrievalSettings) -> Self
    where
        R: Retriever + BlockingRetriever + 'static,
    {
        let retrieval = match settings.mode {
            RetrievalMode::Async => RetrievalPath::Async(index),
            RetrievalMode::Blocking => RetrievalPath::Blocking(index),
        };
        Self::new(retrieval, synthesizer, GatePolicy::from(settings))
    }

    pub fn policy(&self) -> GatePolicy { self.policy }

    /// Never fails: every error or panic inside the pipeline becomes
    /// `QueryOutcome::Error`. Dropping the future cancels the whole query.
    pub async fn query(&self, query: &str) -> QueryOutcome {
        match AssertUnwindSafe(self.run(query)).catch_unwind().await {
            Ok(Ok(outcome)) => {
                debug!(outcome = outcome_label(&outcome), "query finished");
                outcome
            }
            Ok(Err(e)) => {
                warn!(error = %format!("{:#}", e), "query failed");
                QueryOutcome::Error
            }
            Err(_) => {
                warn!("query pipeline panicked");
                QueryOutcome::Error
            }
        }
    }

    /// `query` in string form: the answer, `KB_NO_MATCH` or `KB_ERROR`.
    pub async fn answer(&self, query: &str) -> String { self.query(query).await.into() }

    async fn run(&self, query: &str) -> Result<QueryOutcome> {
        let hits = self.retrieve(query).await?;
        match gate(&hits, self.policy.confidence_threshold) {
            GateDecision::Empty => {
                debug!("no passages retrieved");
                return Ok(QueryOutcome::NoMatch);
            }
            GateDecision::LowConfidence(best) => {
                debug!(best, threshold = self.policy.confidence_threshold, "below confidence threshold");
                return Ok(QueryOutcome::NoMatch);
            }
            GateDecision::Proceed => {}
        }
        let text = self.synthesizer.synthesize(query, &hits).await.context("synthesis failed")?;
        Ok(reply_outcome(&text))
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let k = self.policy.top_k;
        let mut hits = match &self.retrieval {
            RetrievalPath::Async(r) => r.retrieve(query, k).await.context("retrieval failed")?,
            RetrievalPath::Blocking(r) => {
                let r = r.clone();
                let q = query.to_string();
                tokio::task::spawn_blocking(move || r.retrieve_blocking(&q, k))
                    .await
                    .map_err(|e| Error::Retrieval(format!("blocking retrieval task failed: {e}")))?
                    .context("retrieval failed")?
            }
        };
        sort_by_score_desc(&mut hits);
        hits.truncate(k);
        debug!(hits = hits.len(), top = ?max_score(&hits), "retrieved");
        Ok(hits)
    }
}

/// Maps a synthesized reply onto an outcome. Blank text and the no-match
/// token (quotes, backticks or trailing punctuation allowed) are `NoMatch`;
/// the error token is `Error`.
pub fn reply_outcome(text: &str) -> QueryOutcome {
    let text = text.trim();
    let bare = text.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'));
    if text.is_empty() || bare == KB_NO_MATCH {
        QueryOutcome::NoMatch
    } else if bare == KB_ERROR {
        QueryOutcome::Error
    } else {
        QueryOutcome::Answer(text.to_string())
    }
}

fn outcome_label(outcome: &QueryOutcome) -> &'static str {
    match outcome {
        QueryOutcome::Answer(_) => "answer",
        QueryOutcome::NoMatch => "no_match",
        QueryOutcome::Error => "error",
    }
}
