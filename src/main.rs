//! paper-feeder: posts new papers from arXiv-style feeds to webhooks.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ FeedPolicy ┌──────────┐  Entry   ┌───────────┐
//! │ config.rs │ ─────────► │  run.rs  │ ◄─────── │  source/  │
//! └───────────┘            │  (loop)  │          └───────────┘
//!                          └──────────┘
//!              format.rs ◄──┘  │  │  └──► store.rs (acquired ids)
//!           translate.rs ◄─────┘  └─────► deliver.rs (webhooks)
//! ```
//!
//! * **`config`**: the JSON configuration and per-feed policy resolution.
//! * **`source/`**: the `FeedSource` trait, the `Entry` type, and the Atom
//!   and RSS dialects.
//! * **`format`**: abstract reflow, one sentence per line.
//! * **`translate`** / **`deliver`**: translation service and webhook
//!   clients.
//! * **`store`**: the persisted set of already-delivered ids.
//! * **`run`**: one pass over every feed, applying the abort policy.
//! * **`main`**: parses arguments, sets up logging, and wires the real
//!   collaborators into a run.
//!
//! The binary does a single pass and exits; schedule it with cron or a
//! systemd timer.  Runs must not overlap.

mod config;
mod deliver;
mod error;
mod format;
mod run;
mod source;
mod store;
#[cfg(test)]
mod test_http;
mod translate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{AbortPolicy, GlobalConfig};
use deliver::SlackWebhook;
use run::{Collaborators, RunOptions};
use source::HttpFeedSource;
use store::FileIdStore;
use translate::{HttpTranslator, Translator, Untranslated};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(version, about = "Post new papers from arXiv-style feeds to webhooks")]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, default_value = "feeds.json")]
    config: PathBuf,

    /// Acquired-id store (tab-separated, created on first use).
    #[arg(short, long, default_value = "acquired.tsv")]
    store: PathBuf,

    /// Override the configured abort policy: no, yes, or immediately.
    #[arg(long, value_parser = parse_abort_policy)]
    abort: Option<AbortPolicy>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Fetch, translate, and post new entries.
    Run,
    /// Fetch and log new entries without translating or posting.
    ///
    /// Entries are still recorded as acquired, so a dry run can seed the
    /// store without flooding the destinations.
    DryRun,
}

fn parse_abort_policy(s: &str) -> Result<AbortPolicy, String> {
    s.parse().map_err(|e: error::ConfigError| e.to_string())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = GlobalConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let options = RunOptions {
        dry_run: cli.command == Command::DryRun,
        abort_policy: cli.abort.unwrap_or(config.abort_policy),
    };

    // -- collaborators -------------------------------------------------------
    let feeds = HttpFeedSource::new().context("building HTTP client")?;
    let notifier = SlackWebhook::new().context("building HTTP client")?;
    let translator: Box<dyn Translator> = match &config.translator {
        Some(settings) => Box::new(HttpTranslator::new(settings).context("building HTTP client")?),
        None => {
            if config.wants_translation() {
                warn!("target_lang is set but no translator is configured; entries will be posted untranslated");
            }
            Box::new(Untranslated)
        }
    };
    let mut store = FileIdStore::new(&cli.store);
    info!("Acquired ids: {}", store.path().display());

    // -- run -----------------------------------------------------------------
    let report = run::run(
        &config,
        options,
        Collaborators {
            source: &feeds,
            translator: translator.as_ref(),
            notifier: &notifier,
            store: &mut store,
        },
    )?;

    info!(
        "Done: {} new, {} already acquired, {} updated skipped, {} errors",
        report.acquired.len(),
        report.skipped_acquired,
        report.skipped_updated,
        report.errors.len(),
    );
    Ok(())
}
