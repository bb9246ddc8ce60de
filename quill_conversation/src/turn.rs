//! One request/response cycle with the provider.

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::debug;

use quill_core::{AbortSignal, Content, Part, Result, Role, ToolCallRequest};

use crate::compression::CompressionStats;
use crate::session::ChatSession;

/// Events produced while a turn (or the surrounding loop) streams.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A fragment of model text, in arrival order.
    Content(String),
    /// The model requested a tool call; resolution happens outside the
    /// core.
    ToolCallRequest(ToolCallRequest),
    /// History was compacted before dispatching this turn.
    Compressed(CompressionStats),
}

/// Controller for a single turn.
///
/// Tracks the tool calls the model requested that have not been
/// resolved. The event stream it produces is finite and
/// non-restartable; events are never replayed.
#[derive(Debug, Default)]
pub struct Turn {
    pending_tool_calls: Vec<ToolCallRequest>,
    finish_reason: Option<String>,
}

impl Turn {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending_tool_calls(&self) -> &[ToolCallRequest] {
        &self.pending_tool_calls
    }

    #[must_use]
    pub fn has_pending_tool_calls(&self) -> bool {
        !self.pending_tool_calls.is_empty()
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Drive one turn against the session, streaming events as the
    /// provider responds.
    ///
    /// Once the abort signal is observed no further events are emitted
    /// and no more fragments are read; text already received is still
    /// recorded to history so the transcript stays coherent.
    pub fn run<'a>(
        &'a mut self,
        chat: &'a mut ChatSession,
        parts: Vec<Part>,
        signal: AbortSignal,
    ) -> impl Stream<Item = Result<TurnEvent>> + 'a {
        try_stream! {
            let mut stream = chat.send_message_stream(parts).await?;
            let mut reply_parts: Vec<Part> = Vec::new();

            while let Some(fragment) = stream.next().await {
                if signal.is_aborted() {
                    debug!("Turn aborted mid-stream");
                    break;
                }
                let fragment = fragment?;

                if let Some(text) = fragment.text() {
                    reply_parts.push(Part::from_text(text.clone()));
                    yield TurnEvent::Content(text);
                }

                for call in fragment.function_calls() {
                    reply_parts.push(Part::from_function_call(call.clone()));
                    let request = ToolCallRequest::from(call);
                    self.pending_tool_calls.push(request.clone());
                    yield TurnEvent::ToolCallRequest(request);
                }

                if let Some(reason) = fragment
                    .candidates
                    .first()
                    .and_then(|c| c.finish_reason.clone())
                {
                    self.finish_reason = Some(reason);
                }
            }

            if !reply_parts.is_empty() {
                chat.record_model_reply(Content::new(Role::Model, reply_parts));
            }
        }
    }
}
