#![deny(
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

//! Transport to the generative-language service.
//!
//! Retry/backoff policy lives here, next to the wire: the orchestration
//! core above never retries on its own.

mod embedding;
mod gemini;
mod retry;

pub use embedding::EmbeddingService;
pub use gemini::GeminiProvider;
pub use retry::retry_with_backoff;
