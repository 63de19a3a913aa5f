//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the tweet sniper.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::binance::{BinanceClient, BinanceConfig};
use crate::adapters::notify::FanoutNotifier;
use crate::adapters::paper::PaperExchange;
use crate::adapters::replay::ReplaySource;
use crate::adapters::twitter::{TwitterStream, TwitterStreamConfig};
use crate::application::{CoordinatorSettings, TradeCoordinator, TradingPorts};
use crate::config::{load_config, Config};
use crate::domain::{CoinMatcher, NegativeLexicon, SentimentClassifier, SentimentScore};
use crate::ports::{BalancePort, ExecutionPort, TextEventSource};

/// Tweet Sniper - buys coins mentioned positively by followed accounts
#[derive(Parser, Debug)]
#[command(
    name = "tweet-sniper",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sentiment-driven Binance spot bot for followed Twitter accounts",
    long_about = "Watches posts from followed accounts, and when one mentions a tracked coin \
                  in a positive tone and the market is calm, places a limit buy followed by \
                  a take-profit limit sell."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen for posts and trade
    Run(RunCmd),

    /// Show how a piece of text would be matched and classified (offline)
    Check(CheckCmd),

    /// Show the free balance of an asset
    Balance(BalanceCmd),
}

impl Command {
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Command::Run(cmd) => &cmd.config,
            Command::Check(cmd) => &cmd.config,
            Command::Balance(cmd) => &cmd.config,
        }
    }
}

/// Start the event loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/sniper.toml")]
    pub config: PathBuf,

    /// Paper trading: orders fill instantly against a simulated balance
    #[arg(short, long)]
    pub paper: bool,

    /// Starting quote balance for paper trading
    #[arg(long, value_name = "AMOUNT", default_value = "1000")]
    pub paper_balance: f64,

    /// Replay recorded posts (author_id<TAB>text per line) instead of streaming
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Delay between replayed posts in milliseconds
    #[arg(long, value_name = "MS", default_value = "0")]
    pub replay_pace_ms: u64,
}

/// Offline text check
#[derive(Parser, Debug)]
pub struct CheckCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/sniper.toml")]
    pub config: PathBuf,

    /// Text to analyse
    #[arg(value_name = "TEXT")]
    pub text: String,
}

/// Balance lookup
#[derive(Parser, Debug)]
pub struct BalanceCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/sniper.toml")]
    pub config: PathBuf,

    /// Asset to query (defaults to the configured quote asset)
    #[arg(short, long, value_name = "ASSET")]
    pub asset: Option<String>,
}

/// Execute the parsed command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Check(cmd) => check_command(cmd),
        Command::Balance(cmd) => balance_command(cmd).await,
    }
}

async fn run_command(cmd: RunCmd) -> Result<()> {
    tracing::info!("Starting tweet sniper...");

    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let settings = CoordinatorSettings::from(&config);

    let binance = Arc::new(
        BinanceClient::with_config(BinanceConfig::from(&config.binance))
            .context("Failed to create Binance client")?,
    );

    let paper = if cmd.paper {
        tracing::warn!(
            "PAPER TRADING MODE - simulated {} {} balance, no real orders",
            cmd.paper_balance,
            settings.quote_asset
        );
        Some(Arc::new(PaperExchange::new(&settings.quote_asset, cmd.paper_balance)))
    } else if binance.is_test_mode() {
        tracing::warn!("Binance test_orders enabled - orders are validated, not executed");
        None
    } else {
        tracing::warn!("LIVE TRADING - real orders will be placed on Binance");
        None
    };
    let execution: Arc<dyn ExecutionPort> = match &paper {
        Some(paper) => paper.clone(),
        None => binance.clone(),
    };
    let balance: Arc<dyn BalancePort> = match &paper {
        Some(paper) => paper.clone(),
        None => binance.clone(),
    };

    let source: Box<dyn TextEventSource> = match &cmd.replay {
        Some(path) => {
            let mut replay = ReplaySource::new(path).with_followed(config.followed_user_ids());
            if cmd.replay_pace_ms > 0 {
                replay = replay.with_pace(Duration::from_millis(cmd.replay_pace_ms));
            }
            Box::new(replay)
        }
        None => {
            let stream_config =
                TwitterStreamConfig::from_section(&config.twitter, config.followed_user_ids())
                    .context("Twitter stream not configured")?;
            Box::new(TwitterStream::new(stream_config).context("Failed to create Twitter stream")?)
        }
    };

    let coordinator = TradeCoordinator::new(
        CoinMatcher::new(config.tracked_pairs()),
        SentimentClassifier::new(Arc::new(config.negative_lexicon())),
        TradingPorts {
            market: binance,
            execution,
            balance,
            notifier: Arc::new(FanoutNotifier::from_alerts(&config.alerts)),
        },
        settings,
    );

    // Setup Ctrl+C handler
    let handle = coordinator.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.stop();
    });

    coordinator
        .run(source.as_ref())
        .await
        .context("Event loop failed")?;

    // a second Ctrl+C abandons whatever is still waiting on a fill
    tracing::info!("Waiting for in-flight lifecycles (Ctrl+C again to abandon them)");
    let force = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::warn!("Second shutdown signal received"),
            Err(_) => std::future::pending::<()>().await,
        }
    };
    coordinator.shutdown_until(config.shutdown_grace(), force).await;

    tracing::info!("Tweet sniper stopped");
    Ok(())
}

fn check_command(cmd: CheckCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    println!("{}", CheckReport::build(&config, &cmd.text));
    Ok(())
}

async fn balance_command(cmd: BalanceCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let asset = cmd
        .asset
        .unwrap_or_else(|| config.trading.quote_asset.clone())
        .to_uppercase();

    let binance = BinanceClient::with_config(BinanceConfig::from(&config.binance))
        .context("Failed to create Binance client")?;
    let free = binance
        .balance(&asset)
        .await
        .with_context(|| format!("Failed to get {} balance", asset))?;

    println!("{}: {} free", asset, free);
    Ok(())
}

/// Offline matching and sentiment breakdown for a piece of text
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub pair: Option<String>,
    pub score: SentimentScore,
    pub penalised_words: Vec<(String, i64)>,
}

impl CheckReport {
    pub fn build(config: &Config, text: &str) -> Self {
        let matcher = CoinMatcher::new(config.tracked_pairs());
        let lexicon: NegativeLexicon = config.negative_lexicon();
        let penalised_words = text
            .split_whitespace()
            .filter_map(|w| lexicon.weight(w).map(|weight| (w.to_lowercase(), weight)))
            .collect();
        let classifier = SentimentClassifier::new(Arc::new(lexicon));

        Self {
            pair: matcher.find_pair(text).map(str::to_string),
            score: classifier.score(text),
            penalised_words,
        }
    }

    /// Would a followed account posting this text trigger a trade attempt
    pub fn would_trade(&self) -> bool {
        self.pair.is_some() && self.score.sentiment().is_positive()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pair:      {}", self.pair.as_deref().unwrap_or("(none)"))?;
        writeln!(f, "Polarity:  {:+.4}", self.score.base)?;
        writeln!(f, "Penalty:   {}", self.score.penalty)?;
        for (word, weight) in &self.penalised_words {
            writeln!(f, "  - {} ({})", word, weight)?;
        }
        writeln!(f, "Net:       {:+.4}", self.score.net)?;
        writeln!(f, "Sentiment: {:?}", self.score.sentiment())?;
        write!(
            f,
            "Decision:  {}",
            if self.would_trade() {
                "candidate (market gate still applies)"
            } else {
                "ignored"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
[coins]
DOGEUSDT = "doge, dogecoin"

[negative_words]
rip = 2
scam = 3

[followed_users]
elon = "44196397"
"#;

    #[test]
    fn test_cli_parses_run() {
        let app = CliApp::parse_from([
            "tweet-sniper",
            "run",
            "--config",
            "my.toml",
            "--paper",
            "--replay",
            "posts.tsv",
        ]);
        match app.command {
            Command::Run(cmd) => {
                assert!(cmd.paper);
                assert_eq!(cmd.config, PathBuf::from("my.toml"));
                assert_eq!(cmd.replay, Some(PathBuf::from("posts.tsv")));
                assert_eq!(cmd.paper_balance, 1000.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_check_with_global_flag() {
        let app = CliApp::parse_from(["tweet-sniper", "check", "doge is great", "--debug"]);
        assert!(app.debug);
        assert_eq!(app.command.config_path(), &PathBuf::from("config/sniper.toml"));
        match app.command {
            Command::Check(cmd) => assert_eq!(cmd.text, "doge is great"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_check_report_positive() {
        let config = parse_config(CONFIG).unwrap();
        let report = CheckReport::build(&config, "Dogecoin is great");
        assert_eq!(report.pair.as_deref(), Some("DOGEUSDT"));
        assert!(report.would_trade());
        assert!(report.to_string().contains("candidate"));
    }

    #[test]
    fn test_check_report_penalised() {
        let config = parse_config(CONFIG).unwrap();
        let report = CheckReport::build(&config, "doge RIP");
        assert_eq!(report.penalised_words, vec![("rip".to_string(), 2)]);
        assert_eq!(report.score.penalty, 2);
        assert!(!report.would_trade());
    }

    #[test]
    fn test_check_report_no_pair() {
        let config = parse_config(CONFIG).unwrap();
        let report = CheckReport::build(&config, "what a great day");
        assert!(report.pair.is_none());
        assert!(!report.would_trade());
        assert!(report.to_string().contains("(none)"));
    }
}
