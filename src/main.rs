//! Tweet Sniper - sentiment-driven Binance spot trading bot

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use tweet_sniper::adapters::cli::{self, CliApp};
use tweet_sniper::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in the config file)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    // config errors are reported by the command itself
    let config_level = load_config(app.command.config_path())
        .ok()
        .map(|c| c.logging.level);
    init_logging(app.verbose, app.debug, config_level.as_deref())?;

    cli::execute(app).await
}

fn init_logging(verbose: bool, debug: bool, config_level: Option<&str>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else if let Ok(filter) = EnvFilter::try_from_default_env() {
        filter
    } else {
        EnvFilter::new(config_level.unwrap_or("warn"))
    };

    fmt().with_env_filter(filter).init();
    Ok(())
}
