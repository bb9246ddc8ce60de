use quill_providers::EmbeddingService;

use super::{CommandStrategy, init_components};

/// Input parameters for the Embed command strategy.
#[derive(Debug, Clone)]
pub struct EmbedInput {
    pub texts: Vec<String>,
}

/// Strategy for embedding texts from the command line.
///
/// Mainly a connectivity check: one batched request, one vector per
/// input, printed as dimensions rather than raw floats.
#[derive(Debug, Clone, Copy)]
pub struct EmbedStrategy;

impl CommandStrategy for EmbedStrategy {
    type Input = EmbedInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        if input.texts.is_empty() {
            println!("Nothing to embed.");
            return Ok(());
        }

        let common = init_components(None)?;
        let service = EmbeddingService::new(common.provider.clone(), common.runtime.clone());

        let vectors = service.embed(&input.texts).await?;
        for (text, vector) in input.texts.iter().zip(&vectors) {
            println!("{} -> {} dimensions", text, vector.len());
        }
        Ok(())
    }
}
