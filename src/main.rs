use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use reaper::{
    archive::{Archive, TweetsJsArchive, select_unengaged},
    config::{ReaperConfig, default_config_toml},
    ledger::FileLedger,
    observability::init_tracing,
    pipeline::BatchCoordinator,
    ratelimit::RateLimiter,
    remote::{DisabledDeleter, HttpDeleter, RemoteDeleter},
};
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG_PATH: &str = "reaper.toml";

#[derive(Parser, Debug)]
#[command(version, about = "Delete tweets nobody engaged with, within the API quota", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./reaper.toml if it exists, otherwise
    /// built-in defaults are used)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Delete selected records (default)
    Run {
        /// Log what would be deleted without calling the API or writing the ledger
        #[arg(long)]
        dry_run: bool,
    },
    /// Write a commented default configuration file
    Init {
        /// Output path (defaults to ./reaper.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show what the ledger holds
    Ledger,
    /// Count the records a run would select
    Select,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Init { output, force }) => run_init(output, force),
        Some(Command::Ledger) => run_ledger(args.config.as_deref()).await,
        Some(Command::Select) => run_select(args.config.as_deref()).await,
        Some(Command::Run { dry_run }) => run_deletion(args.config.as_deref(), dry_run).await,
        None => run_deletion(args.config.as_deref(), false).await,
    }
}

/// Load config from an explicit path, `./reaper.toml`, or defaults.
fn load_config(explicit_path: Option<&str>) -> ReaperConfig {
    let path = match explicit_path {
        Some(path) => PathBuf::from(path),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if !path.exists() {
                return ReaperConfig::default();
            }
            path
        }
    };

    match ReaperConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &ReaperConfig) {
    if let Err(e) = init_tracing(&config.observability.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_init(output: Option<String>, force: bool) {
    let output_path = PathBuf::from(output.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    // Create parent directories if needed
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!(
        "Set TWITTER_API_KEY, TWITTER_API_SECRET_KEY, TWITTER_ACCESS_TOKEN and \
         TWITTER_ACCESS_TOKEN_SECRET, then preview with:"
    );
    println!("  reaper --config {} run --dry-run", output_path.display());
}

async fn run_ledger(config_path: Option<&str>) {
    let config = load_config(config_path);
    init_logging(&config);

    let (entries, stats) = match FileLedger::inspect(&config.ledger.path).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("ledger:     {}", config.ledger.path.display());
    println!("entries:    {}", stats.entries);
    if let (Some(first), Some(last)) = (entries.first(), entries.last()) {
        println!("first:      {}", first.processed_at.to_rfc3339());
        println!("last:       {}", last.processed_at.to_rfc3339());
    }
    println!("malformed:  {}", stats.malformed);
    println!("duplicates: {}", stats.duplicates);
}

async fn run_select(config_path: Option<&str>) {
    let config = load_config(config_path);
    init_logging(&config);

    let archive = TweetsJsArchive::from_config(&config.archive, &config.selection);
    let records = match archive.records().await {
        Ok(records) => records,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let total = records.len();
    let selected = select_unengaged(records);

    println!("total:    {}", total);
    println!("selected: {}", selected.len());
}

async fn run_deletion(config_path: Option<&str>, dry_run: bool) {
    let mut config = load_config(config_path);
    config.run.dry_run |= dry_run;
    init_logging(&config);

    let remote: Arc<dyn RemoteDeleter> = if config.run.dry_run {
        Arc::new(DisabledDeleter)
    } else {
        match HttpDeleter::from_config(&config.remote) {
            Ok(deleter) => Arc::new(deleter),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create remote client");
                std::process::exit(1);
            }
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let mut coordinator = BatchCoordinator::new(
        Arc::new(TweetsJsArchive::from_config(
            &config.archive,
            &config.selection,
        )),
        config.ledger.path.clone(),
        remote,
        Arc::new(RateLimiter::new(&config.rate_limit)),
    )
    .with_options(config.run.clone())
    .with_cancellation(cancel.clone());

    let result = coordinator.run().await;
    // Stop the signal listener
    cancel.cancel();

    match result {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            std::process::exit(1);
        }
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM. Returns early if it is cancelled
/// elsewhere first.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing in-flight deletions");
    cancel.cancel();
}
