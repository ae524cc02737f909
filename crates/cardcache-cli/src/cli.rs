use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, CommandFactory, Parser};

use cardcache_core::config::{RunOptions, DEFAULT_DELAY_MS, DEFAULT_LIMIT};
use cardcache_core::{KeyRange, SourceMode};

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "cardcache",
    version,
    author,
    about = "Build and maintain a local cache of trading-card images"
)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["download", "download_missing", "analyze", "verify", "stats", "clean", "clean_empty"])
))]
pub struct Cli {
    /// Download cards for every key in the range.
    #[arg(long)]
    pub download: bool,
    /// Download only keys that are missing or incomplete.
    #[arg(long)]
    pub download_missing: bool,
    /// Classify keys as complete, incomplete, empty or missing.
    #[arg(long)]
    pub analyze: bool,
    /// Check cached images against their metadata.
    #[arg(long)]
    pub verify: bool,
    /// Print cache totals.
    #[arg(long)]
    pub stats: bool,
    /// Remove incomplete key directories.
    #[arg(long)]
    pub clean: bool,
    /// Remove key directories that hold nothing or only an empty marker.
    #[arg(long)]
    pub clean_empty: bool,

    /// Keys to process, `N-M` or a single `N`.
    #[arg(long, value_name = "N-M", value_parser = parse_range, conflicts_with = "all")]
    pub range: Option<KeyRange>,
    /// Process every key up to the configured maximum.
    #[arg(long)]
    pub all: bool,

    /// Maximum images cached per key.
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,
    /// Reprocess keys that are already complete.
    #[arg(long)]
    pub force: bool,
    /// Pause between keys, chunks and image downloads, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_DELAY_MS)]
    pub delay: u64,
    /// Number of keys processed at once.
    #[arg(long = "concurrent", value_name = "N", default_value_t = 1)]
    pub concurrency: usize,
    /// With --download-missing, also retry keys marked empty.
    #[arg(long)]
    pub retry_failed: bool,
    /// Candidate source: `remote` (query API) or `bulk` (local dataset clone).
    #[arg(long, value_parser = parse_source, default_value = "remote")]
    pub source: SourceMode,

    /// Override the cache root directory.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
    /// Override the bulk dataset directory.
    #[arg(long, value_name = "DIR")]
    pub dataset_dir: Option<PathBuf>,
    /// API key for the card query endpoint.
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
    /// Only log warnings and errors.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Download,
    DownloadMissing,
    Analyze,
    Verify,
    Stats,
    Clean,
    CleanEmpty,
}

impl Mode {
    /// Modes that refuse to default to the whole key space.
    fn requires_range(self) -> bool {
        matches!(self, Mode::Download | Mode::DownloadMissing | Mode::Analyze)
    }
}

fn parse_range(s: &str) -> Result<KeyRange, String> {
    s.parse::<KeyRange>().map_err(|e| format!("{:#}", e))
}

fn parse_source(s: &str) -> Result<SourceMode, String> {
    s.parse::<SourceMode>().map_err(|e| format!("{:#}", e))
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn mode(&self) -> Mode {
        // The `mode` group guarantees exactly one flag is set.
        [
            (self.download, Mode::Download),
            (self.download_missing, Mode::DownloadMissing),
            (self.analyze, Mode::Analyze),
            (self.verify, Mode::Verify),
            (self.stats, Mode::Stats),
            (self.clean, Mode::Clean),
        ]
        .into_iter()
        .find_map(|(set, mode)| set.then_some(mode))
        .unwrap_or(Mode::CleanEmpty)
    }

    /// Resolve `--range`/`--all` against the highest addressable key.
    pub fn key_range(&self, max_key: u32) -> Result<KeyRange, clap::Error> {
        let range = match self.range {
            Some(range) => range,
            None if self.all || !self.mode().requires_range() => {
                KeyRange::all(max_key).map_err(|e| usage_error(ErrorKind::InvalidValue, e))?
            }
            None => {
                return Err(usage_error(
                    ErrorKind::MissingRequiredArgument,
                    "this mode needs --range N-M or --all",
                ))
            }
        };
        range
            .check_bounds(max_key)
            .map_err(|e| usage_error(ErrorKind::ValueValidation, e))?;
        Ok(range)
    }

    pub fn run_options(&self) -> Result<RunOptions, clap::Error> {
        RunOptions {
            limit: self.limit,
            force: self.force,
            delay: Duration::from_millis(self.delay),
            concurrency: self.concurrency,
            retry_failed: self.retry_failed,
            source: self.source,
            ..RunOptions::default()
        }
        .validate()
        .map_err(|e| usage_error(ErrorKind::ValueValidation, e))
    }
}

fn usage_error(kind: ErrorKind, message: impl std::fmt::Display) -> clap::Error {
    Cli::command().error(kind, message)
}
