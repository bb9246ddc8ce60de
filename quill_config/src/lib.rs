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

//! Configuration for the quill CLI.
//!
//! Two layers: the serde-backed config file (`~/quill/config.json`) and
//! the [`RuntimeConfig`] consulted by every request, whose active model
//! can change mid-conversation (model fallback, `/model` commands).

mod runtime;
mod schema;

pub use runtime::{
    AuthKind, DEFAULT_EMBEDDING_MODEL, DEFAULT_FALLBACK_MODEL, DEFAULT_MODEL, FallbackHandler,
    RuntimeConfig,
};
pub use schema::{ChatDefaults, Config, ProviderConfig};
