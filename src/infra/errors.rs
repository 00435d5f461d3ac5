// src/infra/errors.rs — Error types for Charla

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CharlaError {
    // Completion boundary errors
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    // Storage errors (recoverable: callers fall back to in-memory state)
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("No API key configured. Set OPENAI_API_KEY.")]
    NoApiKey,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CharlaError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, CharlaError::Provider { retriable: true, .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, CharlaError::Storage(_))
    }
}
