//! The bounded autonomous-continuation loop.
//!
//! A caller submits input once; the loop then drives turns until the
//! model stops asking to continue, a tool call needs external
//! resolution, the turn ceiling is hit, or the caller aborts.

use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing::{debug, info};

use quill_config::RuntimeConfig;
use quill_core::{
    AbortSignal, Content, GenerateResponse, GenerationConfig, ModelProvider, Part, Result,
};

use crate::compression::ChatCompressor;
use crate::fallback::FallbackManager;
use crate::next_speaker::{LlmNextSpeakerCheck, NextSpeakerCheck, Speaker};
use crate::session::ChatSession;
use crate::turn::{Turn, TurnEvent};

/// Hard ceiling on cycles per `send_message_stream` invocation.
///
/// Non-bypassable: a larger caller-supplied bound is clamped down to
/// this. Reaching it is normal termination, not an error.
pub const MAX_TURNS: usize = 100;

const CONTINUE_PROMPT: &str = "Please continue.";

/// Drives a conversation: one session, one outstanding operation at a
/// time, an explicit iterative state machine per cycle
/// (dispatch → stream → check next speaker).
pub struct ConversationManager {
    provider: Arc<dyn ModelProvider>,
    config: Arc<RuntimeConfig>,
    next_speaker: Arc<dyn NextSpeakerCheck>,
    compressor: ChatCompressor,
    fallback: FallbackManager,
    baseline_history: Vec<Content>,
    system_instruction: Option<Content>,
    generation_config: Option<GenerationConfig>,
    chat: ChatSession,
    last_turn: Turn,
}

impl ConversationManager {
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, config: Arc<RuntimeConfig>) -> Self {
        let next_speaker = Arc::new(LlmNextSpeakerCheck::new(provider.clone(), config.clone()));
        let compressor = ChatCompressor::new(provider.clone(), config.clone());
        let fallback = FallbackManager::new(config.clone());
        let chat = ChatSession::new(provider.clone(), config.clone());
        Self {
            provider,
            config,
            next_speaker,
            compressor,
            fallback,
            baseline_history: Vec::new(),
            system_instruction: None,
            generation_config: None,
            chat,
            last_turn: Turn::new(),
        }
    }

    /// Seed every session (including reset successors) with this
    /// history.
    #[must_use]
    pub fn with_initial_history(mut self, history: Vec<Content>) -> Self {
        self.baseline_history = history;
        self.chat = self.build_session();
        self
    }

    #[must_use]
    pub fn with_system_instruction(mut self, instruction: Content) -> Self {
        self.system_instruction = Some(instruction);
        self.chat = self.build_session();
        self
    }

    #[must_use]
    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self.chat = self.build_session();
        self
    }

    /// Substitute the next-speaker oracle.
    #[must_use]
    pub fn with_next_speaker(mut self, next_speaker: Arc<dyn NextSpeakerCheck>) -> Self {
        self.next_speaker = next_speaker;
        self
    }

    /// Substitute the compressor (e.g. with adjusted thresholds).
    #[must_use]
    pub fn with_compressor(mut self, compressor: ChatCompressor) -> Self {
        self.compressor = compressor;
        self
    }

    fn build_session(&self) -> ChatSession {
        let mut chat = ChatSession::new(self.provider.clone(), self.config.clone())
            .with_initial_history(self.baseline_history.clone());
        if let Some(instruction) = &self.system_instruction {
            chat = chat.with_system_instruction(instruction.clone());
        }
        if let Some(generation) = &self.generation_config {
            chat = chat.with_generation_config(generation.clone());
        }
        chat
    }

    #[must_use]
    pub const fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub const fn chat_mut(&mut self) -> &mut ChatSession {
        &mut self.chat
    }

    #[must_use]
    pub fn history(&self) -> &[Content] {
        self.chat.history()
    }

    /// The last fully completed turn of the most recent
    /// [`send_message_stream`](Self::send_message_stream) invocation.
    #[must_use]
    pub const fn last_turn(&self) -> &Turn {
        &self.last_turn
    }

    /// Discard everything appended since construction and start a
    /// brand-new session. The new session's identity differs from the
    /// old one; its history length equals a freshly constructed
    /// session's baseline.
    pub fn reset_chat(&mut self) {
        info!("Resetting chat session {}", self.chat.id());
        self.chat = self.build_session();
        self.last_turn = Turn::new();
    }

    /// Compact the session history now (or only if over budget when
    /// `force` is false).
    pub async fn try_compress(
        &mut self,
        force: bool,
    ) -> Result<Option<crate::compression::CompressionStats>> {
        self.compressor.try_compress(&mut self.chat, force).await
    }

    /// One-shot dispatch without the autonomous loop.
    pub async fn send_message(&mut self, parts: Vec<Part>) -> Result<GenerateResponse> {
        self.chat.send_message(parts).await
    }

    /// Drive turns until the model yields the floor.
    ///
    /// State machine per cycle: dispatch → stream events → if the turn
    /// requested tool calls, stop (resolution is external) → otherwise
    /// ask the next-speaker oracle; "model" runs another cycle with a
    /// continuation prompt. A caller-supplied `max_turns` above
    /// [`MAX_TURNS`] is clamped; the ceiling always wins. After the
    /// stream is drained the final turn is available from
    /// [`last_turn`](Self::last_turn).
    pub fn send_message_stream(
        &mut self,
        parts: Vec<Part>,
        signal: AbortSignal,
        max_turns: Option<usize>,
    ) -> impl Stream<Item = Result<TurnEvent>> + '_ {
        stream! {
            let bounded = max_turns.unwrap_or(MAX_TURNS).clamp(1, MAX_TURNS);
            let mut next_parts = parts;
            let mut turns = 0usize;

            while turns < bounded {
                if signal.is_aborted() {
                    debug!("Conversation aborted before next cycle");
                    break;
                }
                turns += 1;

                // Stay under the context budget before dispatching.
                match self.compressor.try_compress(&mut self.chat, false).await {
                    Ok(Some(stats)) => yield Ok(TurnEvent::Compressed(stats)),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }

                let mut turn = Turn::new();
                let mut turn_error = None;
                {
                    let turn_stream = turn.run(&mut self.chat, next_parts.clone(), signal.clone());
                    futures::pin_mut!(turn_stream);
                    while let Some(event) = turn_stream.next().await {
                        match event {
                            Ok(event) => yield Ok(event),
                            Err(e) => {
                                turn_error = Some(e);
                                break;
                            }
                        }
                    }
                }
                self.last_turn = turn;

                if let Some(e) = turn_error {
                    if e.is_overloaded()
                        && !signal.is_aborted()
                        && self
                            .fallback
                            .handle_overload(self.config.auth_kind())
                            .is_some()
                    {
                        // Re-dispatch this cycle against the switched
                        // model; the next overload propagates.
                        continue;
                    }
                    yield Err(e);
                    break;
                }

                if self.last_turn.has_pending_tool_calls() {
                    debug!(
                        "Turn ended with {} pending tool calls; stopping autonomous loop",
                        self.last_turn.pending_tool_calls().len()
                    );
                    break;
                }
                if signal.is_aborted() {
                    debug!("Conversation aborted after turn {turns}");
                    break;
                }
                if turns >= bounded {
                    // Normal termination; the oracle is not consulted
                    // once the ceiling is reached.
                    debug!("Turn ceiling {bounded} reached");
                    break;
                }

                match self.next_speaker.check(self.chat.history()).await {
                    Ok(Some(verdict)) if verdict.next_speaker == Speaker::Model => {
                        debug!("Model continues unprompted: {}", verdict.reasoning);
                        next_parts = vec![Part::from_text(CONTINUE_PROMPT)];
                    }
                    Ok(_) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}
