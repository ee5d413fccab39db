//! Ripple-Crawl main entry point
//!
//! A small depth-first crawler driving the scheduler from the command line.

use anyhow::Context;
use clap::Parser;
use reqwest::Method;
use ripple_crawl::config::{load_config_with_hash, Config};
use ripple_crawl::crawler::{
    Callback, Fetched, JobOptions, Params, ReqwestTransport, Scheduler, Submitter,
};
use ripple_crawl::document;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Ripple-Crawl: a bounded-concurrency crawl scheduler
///
/// Fetches each URL, logs the page title, and follows links one depth deeper
/// until the maximum depth is reached. Deeper pages are fetched first.
#[derive(Parser, Debug)]
#[command(name = "ripple-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A bounded-concurrency crawl scheduler", long_about = None)]
struct Cli {
    /// Seed URLs, submitted at depth 0
    #[arg(value_name = "URL", required = true)]
    urls: Vec<Url>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Deepest link level to follow
    #[arg(long, default_value_t = 1)]
    max_depth: usize,

    /// Override the configured concurrency limit
    #[arg(long)]
    concurrency: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(concurrency) = cli.concurrency {
        config.scheduler.concurrency = concurrency;
        ripple_crawl::config::validate(&config)
            .context("invalid --concurrency")?;
    }

    let transport = ReqwestTransport::new(config.transport.clone())
        .context("failed to build HTTP client")?;
    let mut scheduler = Scheduler::new(&config, transport);

    let seen = Rc::new(RefCell::new(HashSet::new()));
    for url in cli.urls {
        seen.borrow_mut().insert(url.clone());
        scheduler.submit(
            0,
            Method::GET,
            url,
            Params::None,
            follow_links(cli.max_depth, Rc::clone(&seen)),
            JobOptions::default(),
        );
    }

    let stats = scheduler.run().await;
    tracing::info!("Crawl finished");
    println!("{}", stats);

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_crawl=info,warn"),
            1 => EnvFilter::new("ripple_crawl=debug,info"),
            2 => EnvFilter::new("ripple_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Callback that logs the title and submits unseen links one level deeper
fn follow_links(max_depth: usize, seen: Rc<RefCell<HashSet<Url>>>) -> Callback {
    Callback::result_only(move |submitter: &mut Submitter, fetched: Fetched| {
        let Some(doc) = fetched.document() else {
            return;
        };
        let Some(base) = doc.url() else {
            return;
        };

        let title = doc.first_content("title").unwrap_or_default();
        tracing::info!("[depth {}] {} {:?}", submitter.depth(), base, title);

        if submitter.depth() >= max_depth {
            return;
        }

        let links = match doc.find("a@href") {
            Ok(links) => links,
            Err(e) => {
                tracing::debug!("Link lookup failed on {}: {}", base, e);
                return;
            }
        };

        for link in links {
            let Some(href) = document::value(&link) else {
                continue;
            };
            let Ok(mut target) = base.join(href) else {
                tracing::trace!("Skipping unparseable link {:?}", href);
                continue;
            };
            if !matches!(target.scheme(), "http" | "https") {
                continue;
            }
            target.set_fragment(None);

            if !seen.borrow_mut().insert(target.clone()) {
                continue;
            }

            let depth = submitter.depth() + 1;
            submitter.submit(
                depth,
                Method::GET,
                target,
                Params::None,
                follow_links(max_depth, Rc::clone(&seen)),
                JobOptions::default(),
            );
        }
    })
}
