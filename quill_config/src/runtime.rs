use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Primary model used when the config file does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Lighter-weight model offered when the provider signals overload.
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.5-flash";

/// Model used for embedding requests.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// How the transport authenticates to the provider.
///
/// Model fallback on overload is only offered for personal OAuth
/// accounts; paid API keys keep their configured model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthKind {
    OauthPersonal,
    #[default]
    ApiKey,
}

/// Approval callback invoked before switching the active model.
///
/// Receives `(current_model, fallback_model)`; returning `true`
/// authorizes the switch.
pub type FallbackHandler = dyn Fn(&str, &str) -> bool + Send + Sync;

/// Live configuration consulted by every request.
///
/// `get_model` returns whatever is current at the moment of the call;
/// callers must not memoize the result across await points. Two token
/// counts inside one compression pass may legitimately observe
/// different models if the configuration changed between them.
pub struct RuntimeConfig {
    model: RwLock<String>,
    embedding_model: String,
    auth: AuthKind,
    fallback_handler: Option<Arc<FallbackHandler>>,
}

impl RuntimeConfig {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: RwLock::new(model.into()),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            auth: AuthKind::default(),
            fallback_handler: None,
        }
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    #[must_use]
    pub const fn with_auth(mut self, auth: AuthKind) -> Self {
        self.auth = auth;
        self
    }

    /// Inject the approval callback for overload fallback.
    #[must_use]
    pub fn with_fallback_handler(mut self, handler: Arc<FallbackHandler>) -> Self {
        self.fallback_handler = Some(handler);
        self
    }

    /// The active model, fetched fresh. Never cache this across calls.
    #[must_use]
    pub fn get_model(&self) -> String {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Switch the active model. Takes effect on the very next request.
    pub fn set_model(&self, model: impl Into<String>) {
        let mut slot = self.model.write().unwrap_or_else(PoisonError::into_inner);
        *slot = model.into();
    }

    #[must_use]
    pub fn get_embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[must_use]
    pub const fn auth_kind(&self) -> AuthKind {
        self.auth
    }

    /// Ask the injected handler to approve a model switch.
    ///
    /// No handler configured means no approval.
    #[must_use]
    pub fn approve_fallback(&self, current: &str, fallback: &str) -> bool {
        self.fallback_handler
            .as_ref()
            .is_some_and(|handler| handler(current, fallback))
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("model", &self.get_model())
            .field("embedding_model", &self.embedding_model)
            .field("auth", &self.auth)
            .field("fallback_handler", &self.fallback_handler.is_some())
            .finish()
    }
}
