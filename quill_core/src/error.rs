use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no valid JSON found in model output: {0}")]
    Parse(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("{message}")]
    Provider {
        message: String,
        status: Option<u16>,
    },
}

impl Error {
    /// Wrap a provider failure, preserving its message verbatim.
    pub fn provider(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Provider {
            message: message.into(),
            status,
        }
    }

    /// Whether the provider signaled overload or quota exhaustion.
    ///
    /// This is the only provider error class the orchestration core
    /// reacts to (by offering a model fallback); everything else
    /// propagates unchanged.
    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        match self {
            Self::Provider { message, status } => {
                *status == Some(429) || message.contains("RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }
}

/// Failures of the batched embedding service.
///
/// Messages carry exact counts and indices so a mismatched provider
/// response can be diagnosed without replaying the request.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("no embeddings found in provider response")]
    Missing,

    #[error("provider returned a mismatched number of embeddings. Expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("provider returned an empty embedding for input text at index {index}: \"{text}\"")]
    Empty { index: usize, text: String },
}
