//! Session state for one ongoing conversation.
//!
//! A session owns the ordered history of everything exchanged so far
//! and dispatches requests to the provider. History is append-only
//! except for whole-sequence replacement during compression or reset;
//! replacement always produces a session with a fresh identity.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use quill_config::RuntimeConfig;
use quill_core::{
    Content, GenerateRequest, GenerateResponse, GenerationConfig, ModelProvider, Part,
    ResponseStream, Result, Role,
};

/// A conversation session with full message history.
pub struct ChatSession {
    id: Uuid,
    provider: Arc<dyn ModelProvider>,
    config: Arc<RuntimeConfig>,
    system_instruction: Option<Content>,
    generation_config: Option<GenerationConfig>,
    history: Vec<Content>,
    created_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a new session with an empty history.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, config: Arc<RuntimeConfig>) -> Self {
        Self {
            id: Uuid::now_v7(),
            provider,
            config,
            system_instruction: None,
            generation_config: None,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Seed the session with existing history (e.g. environment context).
    #[must_use]
    pub fn with_initial_history(mut self, history: Vec<Content>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_system_instruction(mut self, instruction: Content) -> Self {
        self.system_instruction = Some(instruction);
        self
    }

    #[must_use]
    pub const fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    /// Session identity. Compression and reset produce a session with a
    /// different identity; holders of the old one must discard it.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    #[must_use]
    pub const fn history_len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Append one entry. No role-alternation validation is performed.
    pub fn add_history(&mut self, content: Content) {
        self.history.push(content);
    }

    /// Replace the history wholesale. Earlier snapshots are unaffected.
    pub fn set_history(&mut self, history: Vec<Content>) {
        self.history = history;
    }

    /// Build the successor session used when compression replaces the
    /// history: same collaborators, fresh identity.
    #[must_use]
    pub fn successor_with_history(&self, history: Vec<Content>) -> Self {
        Self {
            id: Uuid::now_v7(),
            provider: self.provider.clone(),
            config: self.config.clone(),
            system_instruction: self.system_instruction.clone(),
            generation_config: self.generation_config.clone(),
            history,
            created_at: Utc::now(),
        }
    }

    /// Record the consolidated model reply of a completed stream.
    pub fn record_model_reply(&mut self, content: Content) {
        self.history.push(content);
    }

    fn build_request(&self, parts: Vec<Part>) -> (GenerateRequest, Content) {
        let user = Content::new(Role::User, parts);
        let mut contents = self.history.clone();
        contents.push(user.clone());
        let request = GenerateRequest {
            // Fetched fresh for every dispatch; a fallback switch takes
            // effect on the next request.
            model: self.config.get_model(),
            contents,
            system_instruction: self.system_instruction.clone(),
            generation_config: self.generation_config.clone(),
        };
        (request, user)
    }

    /// Send one message and wait for the full response.
    ///
    /// The user message and the model reply are appended to history
    /// once the provider call succeeds.
    pub async fn send_message(&mut self, parts: Vec<Part>) -> Result<GenerateResponse> {
        let (request, user) = self.build_request(parts);
        debug!("Dispatching message: model={}", request.model);

        let response = self.provider.generate_content(request).await?;

        self.history.push(user);
        if let Some(reply) = response.candidates.first().and_then(|c| c.content.clone()) {
            self.history.push(reply);
        }
        Ok(response)
    }

    /// Send one message and return the raw provider stream.
    ///
    /// The user message is appended once the stream is open; the
    /// consolidated model reply is recorded by the turn controller via
    /// [`record_model_reply`](Self::record_model_reply) when the stream
    /// finishes.
    pub async fn send_message_stream(&mut self, parts: Vec<Part>) -> Result<ResponseStream> {
        let (request, user) = self.build_request(parts);
        debug!("Dispatching streaming message: model={}", request.model);

        let stream = self.provider.generate_content_stream(request).await?;
        self.history.push(user);
        Ok(stream)
    }
}
