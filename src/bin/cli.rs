//! jobwatch CLI
//!
//! Entry point for the hourly scheduled run and for inspecting the store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jobwatch::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, Dispatcher},
    services::{self, JobBoard, TelegramClient},
    storage,
    utils::http,
};

/// jobwatch - job board watcher with Telegram notifications
#[derive(Parser, Debug)]
#[command(
    name = "jobwatch",
    version,
    about = "Scrapes job boards and pushes new postings to Telegram"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "jobwatch.toml")]
    config: PathBuf,

    /// Override the store path from the configuration
    #[arg(long)]
    store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape all boards, record new postings and notify
    Run {
        /// Only run the board with this name
        #[arg(long)]
        board: Option<String>,
    },

    /// Validate the configuration file
    Validate,

    /// Show store and routing info
    Info,

    /// List the most recently recorded postings
    List {
        /// Number of postings to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolves when the process receives Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in a local .env during development
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    if let Some(store) = cli.store {
        config.store.path = store;
    }
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run { board } => {
            config.validate()?;

            let selected: Vec<_> = config
                .boards
                .iter()
                .filter(|b| board.as_deref().is_none_or(|name| b.label() == name))
                .collect();
            if selected.is_empty() {
                return Err(AppError::config(format!(
                    "No board named '{}'",
                    board.unwrap_or_default()
                )));
            }

            let client = http::create_async_client(&config.crawler)?;
            let boards: Vec<Box<dyn JobBoard>> = selected
                .into_iter()
                .map(|b| services::build_board(b, client.clone(), &config.crawler))
                .collect();

            let store = storage::open_store(&config.store).await?;
            log::info!("Using store {}", store.describe());

            let telegram = TelegramClient::new(&config.telegram)?;
            let dispatcher = Dispatcher::from_config(&config, &telegram);

            tokio::select! {
                result = pipeline::run_pipeline(&boards, store.as_ref(), &dispatcher, &config.crawler) => {
                    let summary = result?;
                    if summary.failed > 0 {
                        log::warn!("{} notifications failed and will not be resent", summary.failed);
                    }
                }
                () = shutdown_signal() => {
                    log::warn!("Shutdown requested; store left at its last commit");
                    return Err(AppError::Interrupted);
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} boards)", config.boards.len());

            for (name, destination) in &config.destinations {
                if destination.resolve(name).is_none() {
                    log::warn!(
                        "Destination '{}': {} / {} not set",
                        name,
                        destination.token_env,
                        destination.chat_id_env
                    );
                }
            }
        }

        Command::Info => {
            let store = storage::open_store(&config.store).await?;
            log::info!("Store: {}", store.describe());
            log::info!("Known postings: {}", store.count().await?);

            for board in &config.boards {
                let route = config
                    .destination_for(&board.category)
                    .map(|(name, _)| name)
                    .unwrap_or("none");
                log::info!("Board {} → destination '{}'", board.label(), route);
            }
        }

        Command::List { limit } => {
            let store = storage::open_store(&config.store).await?;
            for record in store.recent(limit).await? {
                println!(
                    "{}  {:<12} {:<16} {}  {}",
                    record.first_seen.format("%Y-%m-%d %H:%M"),
                    record.source,
                    record.category,
                    record.title,
                    record.url
                );
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
