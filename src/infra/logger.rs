// src/infra/logger.rs — Logging setup

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing. `RUST_LOG` wins over the built-in default
/// directives. Log output goes to stderr so it never interleaves with
/// streamed replies on stdout.
pub fn init_logging(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
