use kbgate_core::types::ScoredChunk;

use crate::outcome::KB_NO_MATCH;

pub const SYSTEM_PROMPT: &str = "You answer questions using only the context passages you are given. \
Never use prior or general knowledge. Keep answers short and factual.";

/// Numbered passages, each tagged with its source file.
pub fn render_context(context: &[ScoredChunk]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] ({})\n{}", i + 1, hit.chunk.file_name, hit.chunk.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn grounded_question(query: &str, context: &[ScoredChunk]) -> String {
    format!(
        "Context information is below.\n---------------------\n{}\n---------------------\n\
         Given the context information and not prior knowledge, answer the query. \
         If the context does not contain the answer, reply with exactly {}.\n\
         Query: {}\nAnswer: ",
        render_context(context),
        KB_NO_MATCH,
        query.trim()
    )
}

/// Drop `<think>...</think>` spans some local models emit before the answer.
pub fn strip_reasoning(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => { rest = ""; break; }
        }
    }
    out.push_str(rest);
    out
}
