use std::fmt;

/// Returned in place of an answer when the knowledge base has nothing relevant.
pub const KB_NO_MATCH: &str = "KB_NO_MATCH";
/// Returned in place of an answer when retrieval or synthesis failed.
pub const KB_ERROR: &str = "KB_ERROR";

/// What a host says for both `NoMatch` and `Error`.
pub const REFUSAL_REPLY: &str = "I'm only able to answer based on my knowledge base, and I couldn't find that information.";

/// Result of one query. Exactly one variant per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Answer(String),
    NoMatch,
    Error,
}

impl QueryOutcome {
    /// Answer text, or the sentinel the conversational layer matches on.
    pub fn as_sentinel_or_text(&self) -> &str {
        match self {
            QueryOutcome::Answer(text) => text,
            QueryOutcome::NoMatch => KB_NO_MATCH,
            QueryOutcome::Error => KB_ERROR,
        }
    }

    /// Inverse of `as_sentinel_or_text` for hosts receiving the string form.
    pub fn from_sentinel_or_text(s: &str) -> Self {
        match s {
            KB_NO_MATCH => QueryOutcome::NoMatch,
            KB_ERROR => QueryOutcome::Error,
            text => QueryOutcome::Answer(text.to_string()),
        }
    }

    pub fn is_answer(&self) -> bool { matches!(self, QueryOutcome::Answer(_)) }

    /// The answer, or `REFUSAL_REPLY` for either non-answer.
    pub fn into_reply(self) -> String {
        match self {
            QueryOutcome::Answer(text) => text,
            QueryOutcome::NoMatch | QueryOutcome::Error => REFUSAL_REPLY.to_string(),
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_sentinel_or_text()) }
}

impl From<QueryOutcome> for String {
    fn from(outcome: QueryOutcome) -> Self {
        match outcome {
            QueryOutcome::Answer(text) => text,
            other => other.as_sentinel_or_text().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_round_trip() {
        for o in [QueryOutcome::NoMatch, QueryOutcome::Error, QueryOutcome::Answer("30 days".into())] {
            assert_eq!(QueryOutcome::from_sentinel_or_text(o.as_sentinel_or_text()), o);
        }
        assert_eq!(String::from(QueryOutcome::Error), "KB_ERROR");
        assert_eq!(QueryOutcome::NoMatch.to_string(), "KB_NO_MATCH");
    }

    #[test]
    fn both_non_answers_refuse_identically() {
        assert_eq!(QueryOutcome::NoMatch.into_reply(), QueryOutcome::Error.into_reply());
        assert_eq!(QueryOutcome::Answer("yes".into()).into_reply(), "yes");
    }
}
