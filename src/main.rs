//! Souk-Harvest main entry point
//!
//! This is the command-line interface for the Souk-Harvest marketplace harvester.

use anyhow::Context;
use chrono::{DateTime, Local, NaiveTime};
use clap::{Parser, Subcommand};
use souk_harvest::config::{load_config_with_hash, Config, StorageBackend};
use souk_harvest::output::{load_statistics, print_run_summary, print_statistics};
use souk_harvest::storage::open_storage;
use souk_harvest::Orchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Souk-Harvest: a marketplace listing harvester
///
/// Souk-Harvest walks the categories of online marketplaces, fetches the
/// listings it has not seen before and appends them to one dataset.
#[derive(Parser, Debug)]
#[command(name = "souk-harvest")]
#[command(version)]
#[command(about = "A marketplace listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest once and print the run summary
    Run {
        /// Site id or base URL to harvest (repeatable; default: all sites)
        #[arg(long = "site", value_name = "ID")]
        sites: Vec<String>,
    },

    /// Harvest every day at a fixed local time until interrupted
    Schedule {
        /// Local time of day, HH:MM
        #[arg(long, value_name = "HH:MM")]
        at: String,

        /// Site id or base URL to harvest (repeatable; default: all sites)
        #[arg(long = "site", value_name = "ID")]
        sites: Vec<String>,

        /// Also harvest immediately instead of waiting for the first slot
        #[arg(long)]
        now: bool,
    },

    /// Clear the dataset, the seen-URL ledger and the run log
    Reset,

    /// Show dataset statistics and the last run
    Stats,

    /// Validate the config and show the adapter resolved for each site
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Run { sites } => handle_run(config, config_hash, sites).await?,
        Command::Schedule { at, sites, now } => {
            handle_schedule(config, config_hash, &at, sites, now).await?
        }
        Command::Reset => handle_reset(config)?,
        Command::Stats => handle_stats(&config)?,
        Command::Check => handle_check(config)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("souk_harvest=info,warn"),
            1 => EnvFilter::new("souk_harvest=debug,info"),
            2 => EnvFilter::new("souk_harvest=trace,debug"),
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

/// Cancels the orchestrator's runs on Ctrl-C
fn cancel_on_ctrl_c(orchestrator: &Orchestrator) {
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current page and stopping");
            cancel.cancel();
        }
    });
}

/// Handles the `run` command: one harvest, then the summary
async fn handle_run(
    config: Config,
    config_hash: String,
    sites: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Orchestrator::from_config(config)?.with_config_hash(config_hash);
    cancel_on_ctrl_c(&orchestrator);

    let run = orchestrator.run_once(&sites).await?;
    print_run_summary(&run);
    Ok(())
}

/// Handles the `schedule` command: daily harvests at a fixed local time
async fn handle_schedule(
    config: Config,
    config_hash: String,
    at: &str,
    sites: Vec<String>,
    now: bool,
) -> anyhow::Result<()> {
    let time = NaiveTime::parse_from_str(at, "%H:%M")
        .with_context(|| format!("invalid --at time '{}', expected HH:MM", at))?;

    let orchestrator = Arc::new(
        Orchestrator::from_config(config)
            .context("failed to set up the harvester")?
            .with_config_hash(config_hash),
    );
    cancel_on_ctrl_c(&orchestrator);
    let cancel = orchestrator.cancellation_token();

    if now {
        scheduled_run(&orchestrator, &sites).await;
    }

    while !cancel.is_cancelled() {
        let wait = until_next(time, Local::now());
        tracing::info!(
            "Next harvest at {} (in {}m)",
            time.format("%H:%M"),
            wait.as_secs() / 60
        );

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        scheduled_run(&orchestrator, &sites).await;
    }

    tracing::info!("Scheduler stopped");
    Ok(())
}

/// One scheduled harvest; failures are logged and the schedule continues
async fn scheduled_run(orchestrator: &Orchestrator, sites: &[String]) {
    match orchestrator.run_once(sites).await {
        Ok(run) => print_run_summary(&run),
        Err(e) => tracing::error!("Scheduled harvest failed: {}", e),
    }
}

/// Time left until the next occurrence of `at`, strictly in the future
fn until_next(at: NaiveTime, now: DateTime<Local>) -> Duration {
    let now = now.naive_local();
    let mut next = now.date().and_time(at);
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Handles the `reset` command
fn handle_reset(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Orchestrator::from_config(config)?;
    orchestrator.reset()?;
    println!("✓ Dataset, seen-URL ledger and run log cleared");
    Ok(())
}

/// Handles the `stats` command: shows statistics from storage
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match config.output.backend {
        StorageBackend::Files => println!("Storage: {} (files)\n", config.output.directory),
        StorageBackend::Sqlite => println!("Storage: {} (sqlite)\n", config.output.database_path),
    }

    let storage = open_storage(&config.output)?;
    let stats = load_statistics(&*storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the `check` command: validates config and resolves adapters
fn handle_check(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Souk-Harvest Check ===\n");

    println!("Crawler Configuration:");
    println!("  Max concurrent fetches: {}", config.crawler.max_concurrent_fetches);
    println!("  Default page cap: {}", config.crawler.max_pages);
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
    println!("  Item timeout: {}s", config.crawler.item_timeout_secs);
    println!("  Fetch retries: {}", config.crawler.fetch_retries);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    match config.output.backend {
        StorageBackend::Files => println!("  Files in {}", config.output.directory),
        StorageBackend::Sqlite => println!("  SQLite at {}", config.output.database_path),
    }

    let orchestrator = Orchestrator::from_config(config)?;
    let resolved = orchestrator.resolve_sites();

    println!("\nSites ({}):", resolved.len());
    let mut failures = 0;
    for (id, site) in &resolved {
        match site {
            Ok(site) => println!(
                "  ✓ {} ({}) -> {}, {} on duplicate pages, max {} pages",
                id,
                site.base_url,
                site.adapter.name(),
                if site.policy.stop_on_duplicates { "stop" } else { "continue" },
                site.policy.max_pages
            ),
            Err(e) => {
                failures += 1;
                println!("  ✗ {}: {}", id, e);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} site(s) cannot be harvested", failures).into());
    }
    println!("\n✓ Configuration is valid");
    Ok(())
}
