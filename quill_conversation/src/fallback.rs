//! Switching to a lighter model on provider overload.

use std::sync::Arc;

use tracing::{debug, info};

use quill_config::{AuthKind, DEFAULT_FALLBACK_MODEL, RuntimeConfig};

/// Reacts to provider overload signals by offering a fallback model.
///
/// The active model lives in [`RuntimeConfig`] and every call site
/// fetches it at the moment of use, so an approved switch takes effect
/// on the very next request without re-initialization.
pub struct FallbackManager {
    config: Arc<RuntimeConfig>,
    fallback_model: String,
}

impl FallbackManager {
    #[must_use]
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        Self {
            config,
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
        }
    }

    #[must_use]
    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    /// Offer the fallback model after an overload signal.
    ///
    /// Only personal OAuth accounts are eligible. The injected approval
    /// handler is consulted with `(current, fallback)`; on approval the
    /// active model is switched and returned. `None` means nothing
    /// changed.
    pub fn handle_overload(&self, auth: AuthKind) -> Option<String> {
        if auth != AuthKind::OauthPersonal {
            return None;
        }

        let current = self.config.get_model();
        if current == self.fallback_model {
            debug!("Already on fallback model {current}, nothing to switch");
            return None;
        }

        if self.config.approve_fallback(&current, &self.fallback_model) {
            info!("Provider overloaded; switching {current} -> {}", self.fallback_model);
            self.config.set_model(self.fallback_model.clone());
            Some(self.fallback_model.clone())
        } else {
            debug!("Fallback from {current} to {} declined", self.fallback_model);
            None
        }
    }
}
