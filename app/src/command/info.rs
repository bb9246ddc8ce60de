use quill_config::Config;
use quill_core::limits::token_limit;

use super::CommandStrategy;

/// Strategy for displaying configuration information.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== quill Configuration ===\n");

        println!("API Key:");
        let api_key = &config.provider.api_key;
        if api_key.len() > 8 {
            let masked = format!("{}...{}", &api_key[..4], &api_key[api_key.len() - 4..]);
            println!("  {masked}");
        } else {
            println!("  ***");
        }
        println!("  Auth: {:?}", config.provider.auth);
        if let Some(base_url) = &config.provider.base_url {
            println!("  Base URL: {base_url}");
        }
        println!();

        println!("Chat Defaults:");
        println!("  Model: {}", config.chat.model);
        println!("  Token Limit: {}", token_limit(&config.chat.model));
        println!("  Embedding Model: {}", config.chat.embedding_model);
        if let Some(temperature) = config.chat.temperature {
            println!("  Temperature: {temperature}");
        }
        if let Some(max_output_tokens) = config.chat.max_output_tokens {
            println!("  Max Output Tokens: {max_output_tokens}");
        }
        if let Some(system_prompt) = &config.chat.system_prompt {
            println!("  System Prompt: {system_prompt}");
        }

        Ok(())
    }
}
