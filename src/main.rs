// src/main.rs — Charla entry point

use clap::Parser;

use charla::cli::{build_controller, chat, cleanup, serve, Cli, Commands};
use charla::infra::config::Config;
use charla::infra::{logger, paths};

#[tokio::main]
async fn main() {
    // Respects RUST_LOG
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    paths::ensure_dirs().await?;

    match cli.command {
        Some(Commands::Serve { port }) => serve::run_serve(&config, port).await,
        Some(Commands::Cleanup { yes }) => cleanup::run_cleanup(&config, yes).await,
        Some(Commands::Chat) | None => {
            let controller = build_controller(&config)?;
            chat::run_chat(controller).await
        }
    }
}
