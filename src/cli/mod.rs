// src/cli/mod.rs — CLI definition (clap derive)

pub mod chat;
pub mod cleanup;
pub mod serve;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use crate::chat::controller::{ChatOptions, Controller};
use crate::infra::config::Config;
use crate::infra::errors::CharlaError;
use crate::provider::openai::OpenAIClient;
use crate::store::{self, CachedStore, Store};

#[derive(Parser)]
#[command(name = "charla", about = "Session-keyed streaming chat with persistent history", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the browser chat API
    Serve {
        /// Port override (defaults to [api] port in config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Interactive terminal chat (default command)
    Chat,
    /// Delete every stored session and transcript
    Cleanup {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// Wire the controller: storage actor, TTL read cache, completion client.
/// Must run inside the tokio runtime. A missing database file degrades to
/// in-memory storage; a missing API key is a hard error.
pub fn build_controller(config: &Config) -> Result<Arc<Controller>, CharlaError> {
    let store = Store::open_or_memory(&config.db_path())?;
    let cached = CachedStore::new(
        store::spawn(store),
        Duration::from_secs(config.storage.cache_ttl_secs),
    );
    let client = OpenAIClient::from_env(
        config.model.base_url.clone(),
        Duration::from_secs(config.model.request_timeout_secs),
    )?;

    Ok(Arc::new(Controller::new(
        cached,
        Arc::new(client),
        ChatOptions::from_config(config),
    )))
}
