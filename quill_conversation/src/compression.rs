#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]

//! Token-budget-aware history compaction.
//!
//! When a conversation approaches the model's context window, the older
//! portion of the history is replaced by a provider-generated summary
//! and only a recent tail is retained verbatim.

use std::sync::Arc;

use tracing::{debug, info};

use quill_config::RuntimeConfig;
use quill_core::limits::token_limit;
use quill_core::{
    Content, CountTokensRequest, GenerateRequest, ModelProvider, Part, Result, Role,
};

use crate::history::find_split_index;
use crate::session::ChatSession;

/// Fraction of the model's token limit at which compaction triggers.
/// Tunable; the proxy weigher and the provider's tokenizer need not
/// agree exactly, so this leaves headroom.
pub const COMPRESSION_TOKEN_THRESHOLD: f64 = 0.7;

/// Fraction of history (by weight) retained verbatim after compaction.
pub const COMPRESSION_PRESERVE_FRACTION: f64 = 0.3;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a conversation summarizer. Condense the dialogue \
you are given into a compact briefing that lets an assistant seamlessly continue the \
conversation: user goals and constraints, decisions made, facts established, work completed, \
and anything still open. Write plain prose, no headings, no commentary about the summarization \
itself.";

const SUMMARY_REQUEST: &str =
    "Summarize our conversation so far so that a fresh session can pick up exactly where we \
left off.";

const SUMMARY_ACK: &str = "Got it. Thanks for the additional context!";

/// Token counts before and after a compaction pass. Only reported when
/// compaction actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionStats {
    pub original_token_count: u64,
    pub new_token_count: u64,
}

/// Decides when context is too large, summarizes the old portion, and
/// replaces the session's history.
pub struct ChatCompressor {
    provider: Arc<dyn ModelProvider>,
    config: Arc<RuntimeConfig>,
    token_threshold: f64,
    preserve_fraction: f64,
}

impl ChatCompressor {
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, config: Arc<RuntimeConfig>) -> Self {
        Self {
            provider,
            config,
            token_threshold: COMPRESSION_TOKEN_THRESHOLD,
            preserve_fraction: COMPRESSION_PRESERVE_FRACTION,
        }
    }

    #[must_use]
    pub const fn with_token_threshold(mut self, threshold: f64) -> Self {
        self.token_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_preserve_fraction(mut self, fraction: f64) -> Self {
        self.preserve_fraction = fraction;
        self
    }

    /// Compact the session's history if forced or over budget.
    ///
    /// `Ok(None)` means the history was left untouched with no state
    /// mutated, the common case. On compaction the session is
    /// replaced wholesale with a successor (fresh identity) whose
    /// history is the summary followed by the retained recent tail.
    ///
    /// Both token counts fetch the currently configured model at the
    /// moment of the query; they may legitimately observe different
    /// models if the configuration changed in between.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "token limits are far below 2^52"
    )]
    pub async fn try_compress(
        &self,
        chat: &mut ChatSession,
        force: bool,
    ) -> Result<Option<CompressionStats>> {
        if chat.is_empty() {
            return Ok(None);
        }

        let history = chat.history().to_vec();
        let model = self.config.get_model();
        let original_token_count = self
            .provider
            .count_tokens(CountTokensRequest {
                model: model.clone(),
                contents: history.clone(),
            })
            .await?
            .total_tokens;

        let limit = token_limit(&model);
        let threshold = (self.token_threshold * limit as f64) as u64;
        if !force && original_token_count < threshold {
            debug!(
                "History at {original_token_count}/{limit} tokens, below compaction threshold {threshold}"
            );
            return Ok(None);
        }

        let split = find_split_index(&history, 1.0 - self.preserve_fraction)?;
        let (old, recent) = history.split_at(split);

        info!(
            "Compacting history: {} of {} entries summarized (model {model})",
            old.len(),
            history.len()
        );

        let summary = self.summarize(old).await?;

        let mut new_history = vec![
            Content::user_text(summary),
            Content::model_text(SUMMARY_ACK),
        ];
        new_history.extend_from_slice(recent);

        *chat = chat.successor_with_history(new_history);

        let new_token_count = self
            .provider
            .count_tokens(CountTokensRequest {
                // Fetched fresh; the model may have changed since the
                // first count.
                model: self.config.get_model(),
                contents: chat.history().to_vec(),
            })
            .await?
            .total_tokens;

        info!("Compacted history: {original_token_count} -> {new_token_count} tokens");

        Ok(Some(CompressionStats {
            original_token_count,
            new_token_count,
        }))
    }

    async fn summarize(&self, old: &[Content]) -> Result<String> {
        let mut contents = old.to_vec();
        contents.push(Content::user_text(SUMMARY_REQUEST));

        let request = GenerateRequest {
            model: self.config.get_model(),
            contents,
            system_instruction: Some(Content::new(
                Role::User,
                vec![Part::from_text(SUMMARY_SYSTEM_PROMPT)],
            )),
            generation_config: None,
        };

        let response = self.provider.generate_content(request).await?;
        Ok(response.text().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    fn seeded_chat(provider: Arc<ScriptedProvider>, config: Arc<RuntimeConfig>) -> ChatSession {
        let mut chat = ChatSession::new(provider, config);
        for i in 0..6 {
            chat.add_history(Content::user_text(format!("question {i} {}", "q".repeat(40))));
            chat.add_history(Content::model_text(format!("answer {i} {}", "a".repeat(40))));
        }
        chat
    }

    fn compressor(
        provider: &Arc<ScriptedProvider>,
        config: &Arc<RuntimeConfig>,
    ) -> ChatCompressor {
        ChatCompressor::new(provider.clone() as Arc<dyn ModelProvider>, config.clone())
    }

    #[tokio::test]
    async fn below_threshold_leaves_everything_untouched() {
        let provider = Arc::new(ScriptedProvider::default().with_token_counts(vec![100]));
        let config = Arc::new(RuntimeConfig::new("gemini-2.5-pro"));
        let mut chat = seeded_chat(provider.clone(), config.clone());
        let id_before = chat.id();
        let len_before = chat.history_len();

        let result = compressor(&provider, &config)
            .try_compress(&mut chat, false)
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(chat.id(), id_before);
        assert_eq!(chat.history_len(), len_before);
        // Only the one counting call was made, no summary request.
        assert_eq!(
            provider.count_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
        assert_eq!(
            provider
                .generate_calls
                .load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn force_compacts_regardless_of_token_count() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_token_counts(vec![100, 20])
                .with_replies(vec!["the summary".to_string()]),
        );
        let config = Arc::new(RuntimeConfig::new("gemini-2.5-pro"));
        let mut chat = seeded_chat(provider.clone(), config.clone());
        let id_before = chat.id();

        let stats = compressor(&provider, &config)
            .try_compress(&mut chat, true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.original_token_count, 100);
        assert_eq!(stats.new_token_count, 20);
        assert_ne!(chat.id(), id_before, "compaction must yield a new session");

        // New history starts with the summary and the acknowledgement.
        assert_eq!(chat.history()[0].text(), "the summary");
        assert_eq!(chat.history()[0].role, Role::User);
        assert_eq!(chat.history()[1].role, Role::Model);
    }

    #[tokio::test]
    async fn threshold_exceeded_triggers_compaction() {
        // gemini-2.5-pro limit is 1_048_576; 0.7 of that is ~734k.
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_token_counts(vec![800_000, 10_000])
                .with_replies(vec!["squeezed".to_string()]),
        );
        let config = Arc::new(RuntimeConfig::new("gemini-2.5-pro"));
        let mut chat = seeded_chat(provider.clone(), config.clone());

        let stats = compressor(&provider, &config)
            .try_compress(&mut chat, false)
            .await
            .unwrap();

        assert!(stats.is_some());
    }

    #[tokio::test]
    async fn retained_tail_survives_verbatim() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_token_counts(vec![100, 20])
                .with_replies(vec!["summary".to_string()]),
        );
        let config = Arc::new(RuntimeConfig::new("gemini-2.5-pro"));
        let mut chat = seeded_chat(provider.clone(), config.clone());
        let original = chat.history().to_vec();
        let split = find_split_index(&original, 1.0 - COMPRESSION_PRESERVE_FRACTION).unwrap();

        compressor(&provider, &config)
            .try_compress(&mut chat, true)
            .await
            .unwrap();

        assert_eq!(&chat.history()[2..], &original[split..]);
    }

    #[tokio::test]
    async fn both_counts_fetch_the_model_current_at_call_time() {
        let config = Arc::new(RuntimeConfig::new("gemini-2.5-pro"));
        let flip = config.clone();
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_token_counts(vec![100, 20])
                .with_replies(vec!["summary".to_string()])
                // Simulate an out-of-band model change after the first
                // count (e.g. an approved fallback switch).
                .with_count_hook(move |index| {
                    if index == 0 {
                        flip.set_model("gemini-2.5-flash");
                    }
                }),
        );
        let mut chat = seeded_chat(provider.clone(), config.clone());

        compressor(&provider, &config)
            .try_compress(&mut chat, true)
            .await
            .unwrap();

        let seen = provider.seen_count_models.lock().unwrap().clone();
        assert_eq!(seen, vec!["gemini-2.5-pro", "gemini-2.5-flash"]);
    }
}
