//! cardcache - batch tool for a local trading-card image cache.
//!
//! Fills one directory per national pokedex number with a set-diverse
//! selection of card images, and offers inspection and cleanup passes over
//! the resulting cache.

mod cli;
mod report;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cardcache_core::cache::{clean_empty, clean_incomplete};
use cardcache_core::source::ensure_dataset_ready;
use cardcache_core::{
    analyzer, ApiClient, BulkSource, CacheKey, CacheManager, CacheStore, CardSource, Config,
    KeyRange, RangeScheduler, RemoteSource, RunOptions, SourceMode,
};
use cli::{Cli, Mode};

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    // RUST_LOG wins unless a verbosity flag was given explicitly
    let explicit = quiet || verbose > 0;
    let default_filter = || EnvFilter::new(format!("warn,cardcache={0},cardcache_core={0}", level));
    let filter = if explicit {
        default_filter()
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(ref dir) = cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(ref dir) = cli.dataset_dir {
        config.dataset_dir = Some(dir.clone());
    }
    if cli.api_key.is_some() {
        config.api_key = cli.api_key.clone();
    }

    // Usage errors exit with clap's status code before any work starts
    let range = cli.key_range(config.max_key()).unwrap_or_else(|e| e.exit());
    let store = CacheStore::new(config.cache_dir()?)?;
    info!(cache = %store.root().display(), mode = ?cli.mode(), "cardcache starting");

    match cli.mode() {
        Mode::Download => {
            let options = cli.run_options().unwrap_or_else(|e| e.exit());
            let scheduler = build_scheduler(&config, store, options).await?;
            let stats = scheduler.run(range).await?;
            report::print_run(range, &stats);
        }
        Mode::DownloadMissing => {
            let options = cli.run_options().unwrap_or_else(|e| e.exit());
            let scheduler = build_scheduler(&config, store, options).await?;
            let (analysis, stats) = scheduler.download_missing(range).await?;
            report::print_analysis(range, &analysis);
            report::print_run(range, &stats);
        }
        Mode::Analyze => {
            let analysis = analyzer::analyze(&store, range)?;
            report::print_analysis(range, &analysis);
        }
        Mode::Verify => {
            let verify = analyzer::verify(&store, range)?;
            report::print_verify(&verify);
        }
        Mode::Stats => {
            let stats = analyzer::stats(&store, range)?;
            report::print_stats(range, &stats);
        }
        Mode::Clean => {
            let removed = clean_incomplete(&store, present_keys(&store, range)?)?;
            report::print_removed("incomplete", &removed);
        }
        Mode::CleanEmpty => {
            let removed = clean_empty(&store, present_keys(&store, range)?)?;
            report::print_removed("empty", &removed);
        }
    }

    Ok(())
}

fn present_keys(store: &CacheStore, range: KeyRange) -> Result<Vec<CacheKey>> {
    Ok(store
        .list_keys()?
        .into_iter()
        .filter(|key| range.contains(*key))
        .collect())
}

/// Wire the configured source, the image client and Ctrl-C cancellation
/// into a scheduler.
async fn build_scheduler(
    config: &Config,
    store: CacheStore,
    options: RunOptions,
) -> Result<RangeScheduler> {
    let mut client = ApiClient::with_timeout(config.api_base_url(), config.request_timeout())
        .context("Failed to build HTTP client")?;
    client.set_api_key(config.api_key.clone());

    let source: Arc<dyn CardSource> = match options.source {
        SourceMode::Remote => {
            info!(api = client.base_url(), "Using remote query source");
            Arc::new(RemoteSource::new(client.clone()))
        }
        SourceMode::Bulk => {
            let dir = config.dataset_dir()?;
            let dataset = ensure_dataset_ready(&dir, config.dataset_repo())
                .await
                .with_context(|| format!("Bulk dataset unavailable at {}", dir.display()))?;
            Arc::new(BulkSource::new(Arc::new(dataset)))
        }
    };

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping; in-flight keys are abandoned");
            token.cancel();
        }
    });

    let manager =
        CacheManager::new(store, source, Arc::new(client), options).with_cancellation(cancel);
    Ok(RangeScheduler::new(manager))
}
