//! Answer synthesizers: an OpenAI-compatible chat backend and an offline
//! extractive one.
pub mod chat;
pub mod extractive;
pub mod prompt;

use anyhow::Result;
use std::sync::Arc;

use kbgate_core::config::{SynthesisBackend, SynthesisSettings};
use kbgate_core::traits::Synthesizer;

pub use chat::ChatSynthesizer;
pub use extractive::ExtractiveSynthesizer;

pub fn from_settings(settings: &SynthesisSettings) -> Result<Arc<dyn Synthesizer>> {
    Ok(match settings.backend {
        SynthesisBackend::Chat => Arc::new(ChatSynthesizer::from_settings(settings)?),
        SynthesisBackend::Extractive => Arc::new(ExtractiveSynthesizer::new(settings.max_passages)),
    })
}
