use quill_config::Config;

use super::CommandStrategy;

/// Strategy for initializing the configuration.
///
/// Creates the default configuration file at `~/quill/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        Config::create_config()
    }
}
