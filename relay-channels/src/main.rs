//! vLLM Relay - Main entry point.

use anyhow::Result;
use relay_channels::run;
use relay_common::config::{config_path, Config};
use relay_common::logging::{init_logging, init_logging_with_exclusions};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let dotenv_path = dotenvy::dotenv().ok();

    let config = match Config::load_checked() {
        Ok(config) => config,
        Err(e) => {
            // The configured log settings are unusable, fall back to defaults.
            init_logging("info", "pretty");
            tracing::error!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    // Initialize logging
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("vLLM Relay v{}", env!("CARGO_PKG_VERSION"));
    let path = config_path();
    if path.exists() {
        tracing::info!(path = %path.display(), "Loaded config file");
    } else {
        tracing::info!("Config file not found, using defaults");
    }
    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    run(&config).await
}
