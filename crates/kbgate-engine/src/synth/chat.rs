use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use kbgate_core::config::SynthesisSettings;
use kbgate_core::error::Error;
use kbgate_core::traits::Synthesizer;
use kbgate_core::types::ScoredChunk;

use super::prompt::{grounded_question, strip_reasoning, SYSTEM_PROMPT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Grounded answer generation through an OpenAI-compatible
/// `/v1/chat/completions` endpoint (LM Studio, llama.cpp server, OpenAI).
pub struct ChatSynthesizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatSynthesizer {
    pub fn from_settings(settings: &SynthesisSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    pub fn messages(query: &str, context: &[ScoredChunk]) -> Vec<Message> {
        vec![
            Message { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
            Message { role: "user".to_string(), content: grounded_question(query, context) },
        ]
    }

    /// Non-streaming chat completion.
    pub async fn chat(&self, messages: &[Message]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let resp = resp.error_for_status().context("LLM returned an error status")?;
        let text = resp.text().await.context("Failed to read LLM response")?;
        parse_completion(&text)
    }
}

/// Content of `choices[0].message.content`. A body without that message is
/// a backend failure; a message whose content is null is an empty answer.
pub fn parse_completion(body: &str) -> Result<String> {
    let json: serde_json::Value = serde_json::from_str(body).context("Failed to parse LLM JSON")?;
    if let Some(err) = json.get("error") {
        return Err(Error::Synthesis(err.to_string()).into());
    }
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| Error::Synthesis(format!("completion has no choices[0].message: {}", preview(body))))?;
    let content = message.get("content").and_then(|c| c.as_str()).unwrap_or("");
    Ok(strip_reasoning(content))
}

fn preview(body: &str) -> String { body.chars().take(200).collect() }

#[async_trait]
impl Synthesizer for ChatSynthesizer {
    async fn synthesize(&self, query: &str, context: &[ScoredChunk]) -> Result<String> {
        let messages = Self::messages(query, context);
        let answer = self.chat(&messages).await?;
        debug!(model = %self.model, chars = answer.len(), "synthesized");
        Ok(answer)
    }
}
