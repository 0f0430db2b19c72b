//! Historical market data downloader - main entry point
//!
//! This binary provides three subcommands:
//! - download: Resolve scrip names and download historical bars
//! - resolve: Look up a single scrip name against the local master
//! - refresh: Force a scrip master update

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "scrip-downloader")]
#[command(about = "Historical market data downloader with scrip-master resolution and CSV caching", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve scrip names and download historical bars
    Download {
        /// Scrip names to download (comma-separated). E.g., "RELIANCE,TCS"
        #[arg(short, long)]
        names: String,

        /// Exchange code: N (NSE), B (BSE), M (MCX), n (NCDEX)
        #[arg(short, long, default_value = "N")]
        exchange: String,

        /// Exchange segment: c (Cash), d (Derivatives), u (Currency
        /// Derivatives), x (NCDEX Commodity), y (NSE & BSE Commodity)
        #[arg(short, long, default_value = "c")]
        segment: String,

        /// Bar interval: 1m, 5m, 10m, 15m, 30m, 60m, 1d
        #[arg(short, long, default_value = "1d")]
        interval: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Keep going after a per-instrument fetch failure
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Look up a single scrip name against the local master
    Resolve {
        /// Scrip name to resolve
        name: String,
    },

    /// Force a scrip master update regardless of staleness
    Refresh,
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    // Credentials come from the environment; a .env file is honored
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Download { .. } => "download",
        Commands::Resolve { .. } => "resolve",
        Commands::Refresh => "refresh",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Download {
            names,
            exchange,
            segment,
            interval,
            from,
            to,
            continue_on_error,
        } => commands::download::run(
            cli.config,
            names,
            exchange,
            segment,
            interval,
            from,
            to,
            continue_on_error,
        ),

        Commands::Resolve { name } => commands::resolve::run(cli.config, name),

        Commands::Refresh => commands::refresh::run(cli.config),
    }
}
