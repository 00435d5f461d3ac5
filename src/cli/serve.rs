// src/cli/serve.rs — Serve the chat API

use crate::api::{self, ApiState};
use crate::cli::build_controller;
use crate::infra::config::Config;

pub async fn run_serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let controller = build_controller(config)?;

    let mut api_config = config.api.clone();
    if let Some(port) = port {
        api_config.port = port;
    }

    api::start_server(&api_config, ApiState { controller }).await
}
