//! sqlgold - Main entry point.
//!
//! Creates, drops and inspects the databases described by a config.toml.

use clap::Parser;
use sqlgold::cli::{self, Cli};
use sqlgold::config::Config;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` wins, then `--log-level`/`SG_LOGLEVEL`, then `logging.level` from
/// the config file.
fn init_tracing(cli: &Cli) {
    let level = cli
        .log_level
        .clone()
        .or_else(|| {
            Config::read_config_dir(&cli.config)
                .ok()
                .and_then(|config| config.log_level())
        })
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = cli::run(cli).await {
        error!(error = %e, "Command failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
        return Err(e.into());
    }
    Ok(())
}
