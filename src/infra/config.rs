// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

/// Environment variable that overrides `[chat] system_message`.
/// Deployment-level persona configuration, never persisted or displayed.
pub const SYSTEM_MESSAGE_ENV: &str = "CHARLA_SYSTEM_MESSAGE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Persona instruction injected as the first message of every
    /// completion request. Overridden by CHARLA_SYSTEM_MESSAGE.
    pub system_message: String,
    /// Characters kept for a session's first-message preview.
    pub preview_len: usize,
    /// Messages rendered by default for a transcript.
    pub window: usize,
    /// Messages revealed per "load more".
    pub window_increment: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_message: String::new(),
            preview_len: 50,
            window: 10,
            window_increment: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path override; defaults to the platform data dir.
    pub db_path: Option<String>,
    /// TTL for the read cache in front of the transcript store.
    pub cache_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            cache_ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 8787 }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Effective system message: environment wins over config file.
    pub fn system_message(&self) -> String {
        std::env::var(SYSTEM_MESSAGE_ENV).unwrap_or_else(|_| self.chat.system_message.clone())
    }

    pub fn db_path(&self) -> std::path::PathBuf {
        match &self.storage.db_path {
            Some(p) => std::path::PathBuf::from(p),
            None => paths::db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.model.name, "gpt-4o-mini");
        assert_eq!(c.model.request_timeout_secs, 60);
        assert_eq!(c.chat.window, 10);
        assert_eq!(c.chat.window_increment, 10);
        assert_eq!(c.chat.preview_len, 50);
        assert_eq!(c.storage.cache_ttl_secs, 60);
        assert_eq!(c.api.port, 8787);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chat.window, 10);
        assert!(config.storage.db_path.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[model]
name = "gpt-4.1-mini"
base_url = "http://localhost:11434/v1"
request_timeout_secs = 120

[chat]
system_message = "You are a compliance assistant."
preview_len = 40
window = 5
window_increment = 5

[storage]
db_path = "/tmp/history.db"
cache_ttl_secs = 30

[api]
port = 9000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.name, "gpt-4.1-mini");
        assert_eq!(config.model.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model.request_timeout_secs, 120);
        assert_eq!(config.chat.system_message, "You are a compliance assistant.");
        assert_eq!(config.chat.window, 5);
        assert_eq!(config.storage.db_path.as_deref(), Some("/tmp/history.db"));
        assert_eq!(config.storage.cache_ttl_secs, 30);
        assert_eq!(config.api.port, 9000);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.chat.window, config.chat.window);
        assert_eq!(deserialized.model.name, config.model.name);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }
}
