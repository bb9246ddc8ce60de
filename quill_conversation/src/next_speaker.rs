//! The "who speaks next?" oracle.
//!
//! After a turn finishes with no pending tool calls, the loop asks an
//! oracle whether the model should continue unprompted. The default
//! implementation asks the model itself and decodes a JSON verdict out
//! of its free-form reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quill_config::RuntimeConfig;
use quill_core::json::extract_json;
use quill_core::{Content, GenerateRequest, ModelProvider, Result, Role};

const NEXT_SPEAKER_PROMPT: &str = "Analyze *only* the last message of the conversation above \
and decide who should speak next. Rules, in order: if the last message states an immediate \
next action the assistant itself will take (e.g. \"Next, I will...\", \"Now I'm going to...\"), \
the model speaks next. If the last message asks the user a direct question or requests input, \
the user speaks next. If the last message is a complete thought or finished answer, the user \
speaks next. Respond with JSON only, matching this schema: \
{\"reasoning\": \"<one short sentence>\", \"next_speaker\": \"user\" | \"model\"}";

/// Who should produce the next message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Model,
}

/// The oracle's decision. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextSpeakerVerdict {
    pub next_speaker: Speaker,
    pub reasoning: String,
}

/// Decision function consulted between turns.
///
/// Injected into the conversation loop so tests substitute it
/// structurally rather than patching shared state.
#[async_trait]
pub trait NextSpeakerCheck: Send + Sync {
    /// `Ok(None)` means no verdict could be reached; the loop treats
    /// that the same as "user speaks next".
    async fn check(&self, history: &[Content]) -> Result<Option<NextSpeakerVerdict>>;
}

/// Default oracle: ask the model and extract a JSON verdict.
pub struct LlmNextSpeakerCheck {
    provider: Arc<dyn ModelProvider>,
    config: Arc<RuntimeConfig>,
}

impl LlmNextSpeakerCheck {
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, config: Arc<RuntimeConfig>) -> Self {
        Self { provider, config }
    }
}

#[async_trait]
impl NextSpeakerCheck for LlmNextSpeakerCheck {
    async fn check(&self, history: &[Content]) -> Result<Option<NextSpeakerVerdict>> {
        let Some(last) = history.last() else {
            return Ok(None);
        };
        if last.role != Role::Model {
            return Ok(None);
        }

        let mut contents = history.to_vec();
        contents.push(Content::user_text(NEXT_SPEAKER_PROMPT));

        let request = GenerateRequest {
            model: self.config.get_model(),
            contents,
            system_instruction: None,
            generation_config: None,
        };

        let response = match self.provider.generate_content(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Next-speaker check failed, defaulting to user: {e}");
                return Ok(None);
            }
        };

        let Some(text) = response.text() else {
            return Ok(None);
        };

        match extract_json(&text)
            .map_err(|e| e.to_string())
            .and_then(|value| {
                serde_json::from_value::<NextSpeakerVerdict>(value).map_err(|e| e.to_string())
            }) {
            Ok(verdict) => {
                debug!(
                    "Next speaker: {:?} ({})",
                    verdict.next_speaker, verdict.reasoning
                );
                Ok(Some(verdict))
            }
            Err(e) => {
                warn!("Could not decode next-speaker verdict, defaulting to user: {e}");
                Ok(None)
            }
        }
    }
}
