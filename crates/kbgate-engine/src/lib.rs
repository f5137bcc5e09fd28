//! kbgate-engine
//!
//! The confidence-gated query pipeline: retrieve the top passages, refuse
//! when the best score is under the threshold, otherwise synthesize an
//! answer from those passages only. Also holds the outcome sentinels and the
//! conversational rules that interpret them.

pub mod engine;
pub mod outcome;
pub mod policy;
pub mod synth;

pub use engine::{gate, reply_outcome, GateDecision, GatePolicy, QueryEngine, RetrievalPath};
pub use outcome::{QueryOutcome, KB_ERROR, KB_NO_MATCH, REFUSAL_REPLY};
pub use policy::{AGENT_INSTRUCTIONS, QUERY_TOOL_DESCRIPTION, QUERY_TOOL_NAME};
