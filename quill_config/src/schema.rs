use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::runtime::{
    AuthKind, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL, FallbackHandler, RuntimeConfig,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub chat: ChatDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(default)]
    pub auth: AuthKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChatDefaults {
    #[serde(default = "ChatDefaults::default_model")]
    pub model: String,
    #[serde(default = "ChatDefaults::default_embedding_model")]
    pub embedding_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            embedding_model: Self::default_embedding_model(),
            system_prompt: None,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

impl ChatDefaults {
    fn default_model() -> String {
        DEFAULT_MODEL.to_string()
    }

    fn default_embedding_model() -> String {
        DEFAULT_EMBEDDING_MODEL.to_string()
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("quill");

        let config_path = config_dir.join("config.json");

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'quill init' to create config.",
                config_path.display()
            );
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_json::from_str(&content)?;

        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("quill");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        let config_template = r#"{
  "provider": {
    "api_key": "your-api-key-here",
    "auth": "api-key"
  },
  "chat": {
    "model": "gemini-2.5-pro",
    "embedding_model": "text-embedding-004",
    "system_prompt": "You are a helpful AI assistant.",
    "temperature": 0.7,
    "max_output_tokens": 8192
  }
}
"#;

        std::fs::write(&config_path, config_template)?;
        println!("Created config file at: {}", config_path.display());
        println!("Please edit it and fill in your API key.");

        Ok(())
    }

    /// Build the live runtime configuration from the file values.
    #[must_use]
    pub fn runtime(&self, fallback_handler: Option<Arc<FallbackHandler>>) -> RuntimeConfig {
        let runtime = RuntimeConfig::new(self.chat.model.clone())
            .with_embedding_model(self.chat.embedding_model.clone())
            .with_auth(self.provider.auth);
        match fallback_handler {
            Some(handler) => runtime.with_fallback_handler(handler),
            None => runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"provider": {"api_key": "k"}}"#).unwrap();
        assert_eq!(config.chat.model, DEFAULT_MODEL);
        assert_eq!(config.chat.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.provider.auth, AuthKind::ApiKey);
    }

    #[test]
    fn auth_kind_parses_kebab_case() {
        let config: Config = serde_json::from_str(
            r#"{"provider": {"api_key": "k", "auth": "oauth-personal"}}"#,
        )
        .unwrap();
        assert_eq!(config.provider.auth, AuthKind::OauthPersonal);
    }

    #[test]
    fn runtime_inherits_file_values() {
        let config: Config = serde_json::from_str(
            r#"{"provider": {"api_key": "k"}, "chat": {"model": "gemini-1.5-pro"}}"#,
        )
        .unwrap();
        let runtime = config.runtime(None);
        assert_eq!(runtime.get_model(), "gemini-1.5-pro");
    }
}
