//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy with its own input type, so
//! dispatch is monomorphized at compile time and commands stay
//! independently testable.

use std::sync::Arc;

use tracing::info;

use quill_config::{Config, FallbackHandler, RuntimeConfig};
use quill_providers::GeminiProvider;

mod chat;
mod embed;
mod info;
mod init;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use embed::{EmbedInput, EmbedStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
pub trait CommandStrategy {
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Collaborators shared by the network-facing commands.
pub struct CommonComponents {
    pub config: Config,
    pub runtime: Arc<RuntimeConfig>,
    pub provider: Arc<GeminiProvider>,
}

/// Load configuration and build the provider transport.
///
/// The fallback handler is wired here: on provider overload the switch
/// to the lighter model is announced on stderr and accepted, so a long
/// session survives a quota window without dropping the turn.
pub fn init_components(model_override: Option<String>) -> anyhow::Result<CommonComponents> {
    let config = Config::load()?;

    let handler: Arc<FallbackHandler> = Arc::new(|current: &str, fallback: &str| {
        eprintln!(
            "Provider overloaded on {current}; continuing this session on {fallback}."
        );
        true
    });

    let runtime = config.runtime(Some(handler));
    if let Some(model) = model_override {
        info!("Overriding model from command line: {model}");
        runtime.set_model(model);
    }

    let mut provider = GeminiProvider::new(config.provider.api_key.clone());
    if let Some(base_url) = &config.provider.base_url {
        provider = provider.with_base_url(base_url.clone());
    }

    Ok(CommonComponents {
        config,
        runtime: Arc::new(runtime),
        provider: Arc::new(provider),
    })
}
