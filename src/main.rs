//! CLI entry point for the Wiener Linien monitor.
//!
//! Provides subcommands for polling continuously, running a single cycle, and
//! normalizing one monitor payload from a file or URL.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use wienerlinien_monitor::{
    config::PollConfig,
    error::Endpoint,
    fetch::{BasicClient, WienerLinienApi, auth::UrlParam, fetch_bytes},
    normalize::departures::normalize_monitor_response,
    parser::parse_monitor,
    publish::{LogPublisher, Publisher, Update},
    scheduler::{PollScheduler, run_cycle},
};

#[derive(Parser)]
#[command(name = "wienerlinien_monitor")]
#[command(about = "Polls Wiener Linien realtime data and republishes it normalized", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously until Ctrl+C
    Run {
        /// Path to the JSON config file
        #[arg(short, long, default_value = "config.json")]
        config: String,

        /// Pretty-print published JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Run a single fetch-normalize-publish cycle and exit
    Once {
        /// Path to the JSON config file
        #[arg(short, long, default_value = "config.json")]
        config: String,
    },
    /// Normalize one monitor payload from a file or URL
    Monitor {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/wienerlinien_monitor.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("wienerlinien_monitor.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, pretty } => {
            let config = PollConfig::load(&config)?;
            let client = BasicClient::with_timeout(config.request_timeout())?;
            let mut scheduler =
                PollScheduler::new(Arc::new(client), Arc::new(LogPublisher { pretty }));
            scheduler.configure(config)?;

            info!("Polling. Press Ctrl+C to stop.");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl+C")?;
            scheduler.shutdown();
        }
        Commands::Once { config } => {
            let config = PollConfig::load(&config)?;
            let client = UrlParam::sender(
                BasicClient::with_timeout(config.request_timeout())?,
                config.api_key.clone(),
            );
            let api = WienerLinienApi::new(client, &config.base_url)?;
            let report = run_cycle(&api, &config, &LogPublisher { pretty: true }).await;
            info!(?report, "Single cycle complete");
        }
        Commands::Monitor { source } => {
            let bytes = fetcher(&source).await?;
            let response = parse_monitor(&bytes)?;
            let stations = normalize_monitor_response(&response)?;
            LogPublisher { pretty: true }
                .publish(Update::Stations(stations))
                .await;
        }
    }

    Ok(())
}

/// Loads a monitor payload from a local file path or fetches it over HTTP.
#[tracing::instrument]
async fn fetcher(source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        let client = BasicClient::new()?;
        fetch_bytes(&client, Endpoint::Monitor, source.parse()?).await?
    } else {
        std::fs::read(source).with_context(|| format!("failed to read {source:?}"))?
    };
    Ok(bytes)
}
