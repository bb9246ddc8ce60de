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
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Multi-turn conversation orchestration.
//!
//! This crate drives the dialogue with the generative-language service:
//! it owns the append-only history, keeps it inside the model's context
//! budget by summarizing the older portion, lets the model keep talking
//! for a bounded number of turns without new user input, and switches to
//! a lighter model when the provider signals overload.
//!
//! # Key pieces
//! - [`ChatSession`]: the history and request dispatch
//! - [`Turn`]: one request/response cycle, streamed as events
//! - [`ConversationManager`]: the bounded autonomous-continuation loop
//! - [`ChatCompressor`]: token-budget-aware history compaction
//! - [`NextSpeakerCheck`]: the "should the model continue?" oracle

mod compression;
mod fallback;
mod history;
mod manager;
mod next_speaker;
mod session;
mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use compression::{
    COMPRESSION_PRESERVE_FRACTION, COMPRESSION_TOKEN_THRESHOLD, ChatCompressor, CompressionStats,
};
pub use fallback::FallbackManager;
pub use history::{
    HistoryStats, find_split_index, find_split_index_with, history_stats, serialized_weight,
};
pub use manager::{ConversationManager, MAX_TURNS};
pub use next_speaker::{LlmNextSpeakerCheck, NextSpeakerCheck, NextSpeakerVerdict, Speaker};
pub use session::ChatSession;
pub use turn::{Turn, TurnEvent};
