//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::enrich::{default_registry, ChangeType, TaskOrchestrator};
use crate::models::{EnricherRunState, TaskStatus};
use crate::scrapers;
use crate::server;
use crate::store::TeamStore;

#[derive(Parser)]
#[command(name = "teamscout")]
#[command(about = "Sports team data acquisition and enrichment system")]
#[command(version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// List available scrapers and their last run state
    Scrapers,

    /// Run a scraper and store its dataset
    Scrape {
        /// Scraper ID (e.g. "nfl", "mlb_milb")
        scraper_id: String,
    },

    /// List registered enrichers with availability
    Enrichers,

    /// Run enrichers over a scraper's stored dataset
    Enrich {
        /// Scraper ID whose dataset to enrich
        scraper_id: String,

        /// Comma-separated enricher IDs (default: all available)
        #[arg(short, long)]
        enrichers: Option<String>,
    },

    /// Start the web server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Parse arguments and dispatch.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }

    match cli.command {
        Commands::Scrapers => list_scrapers(&settings),
        Commands::Scrape { scraper_id } => scrape(&settings, &scraper_id).await,
        Commands::Enrichers => list_enrichers(&settings),
        Commands::Enrich {
            scraper_id,
            enrichers,
        } => enrich(&settings, &scraper_id, enrichers.as_deref()).await,
        Commands::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            server::serve(&settings).await
        }
    }
}

fn list_scrapers(settings: &Settings) -> Result<()> {
    let store = TeamStore::new(&settings.data_dir);
    let states = store.load_scraper_state();

    for scraper in scrapers::all_scrapers() {
        let state = states.get(scraper.id()).cloned().unwrap_or_default();
        println!(
            "{}  {} ({})",
            style(scraper.id()).cyan().bold(),
            scraper.name(),
            state.status.as_str(),
        );
        println!("    {}", scraper.description());
        if let Some(last) = state.last_success {
            println!(
                "    last success: {} ({} teams)",
                last.format("%Y-%m-%d %H:%M UTC"),
                state.last_teams_count
            );
        }
    }
    Ok(())
}

async fn scrape(settings: &Settings, scraper_id: &str) -> Result<()> {
    let Some(scraper) = scrapers::find_scraper(scraper_id) else {
        bail!("unknown scraper: {scraper_id}");
    };

    println!("Running {}...", style(scraper.name()).cyan().bold());
    let store = TeamStore::new(&settings.data_dir);
    let outcome = scrapers::run_scraper(&store, scraper.as_ref()).await;

    if outcome.success {
        println!(
            "{} {} teams in {}ms",
            style("✓").green().bold(),
            outcome.teams_count,
            outcome.duration_ms
        );
        Ok(())
    } else {
        bail!(
            "scrape failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
}

fn list_enrichers(settings: &Settings) -> Result<()> {
    // Instantiate with real settings so availability reflects configured keys
    let registry = default_registry();
    let config = settings.enricher_config();

    for info in registry.list_all() {
        let available = registry
            .create(&info.id, config.clone())
            .map(|enricher| enricher.is_available())
            .unwrap_or(info.available);
        let marker = if available {
            style("available").green()
        } else {
            style("unavailable").red()
        };
        println!("{}  {} [{}]", style(&info.id).cyan().bold(), info.name, marker);
        println!("    {}", info.description);
        println!("    fields: {}", info.fields_added.join(", "));
    }
    Ok(())
}

async fn enrich(settings: &Settings, scraper_id: &str, enrichers: Option<&str>) -> Result<()> {
    let Some(scraper) = scrapers::find_scraper(scraper_id) else {
        bail!("unknown scraper: {scraper_id}");
    };

    let store = Arc::new(TeamStore::new(&settings.data_dir));
    let registry = Arc::new(default_registry());
    let config = settings.enricher_config();

    let enricher_ids: Vec<String> = match enrichers {
        Some(list) => list
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect(),
        None => registry
            .ids()
            .into_iter()
            .filter(|id| {
                registry
                    .create(id, config.clone())
                    .map(|enricher| enricher.is_available())
                    .unwrap_or(false)
            })
            .collect(),
    };
    if enricher_ids.is_empty() {
        bail!("no enrichers selected");
    }

    let orchestrator = Arc::new(
        TaskOrchestrator::new(Arc::clone(&registry), Arc::clone(&store), config)
            .with_history_limit(settings.enrichment.history_limit),
    );

    let task = orchestrator.create_task(scraper_id, scraper.name(), enricher_ids.clone())?;
    let mut updates = orchestrator.subscribe(&task.id)?;
    Arc::clone(&orchestrator).start_task(&task.id)?;

    println!(
        "Enriching {} ({} teams) with [{}]",
        style(scraper.name()).cyan().bold(),
        task.total_teams,
        enricher_ids.join(", ")
    );

    let bar = ProgressBar::new((task.total_teams * enricher_ids.len()) as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut final_task = None;
    while let Some(snapshot) = updates.recv().await {
        let processed: usize = snapshot.progress.values().map(|slot| slot.processed).sum();
        bar.set_position(processed as u64);
        if let Some(running) = snapshot
            .progress
            .iter()
            .find(|(_, slot)| slot.status == EnricherRunState::Running)
        {
            bar.set_message(running.0.clone());
        }
        let done = snapshot.is_terminal();
        final_task = Some(snapshot);
        if done {
            break;
        }
    }
    bar.finish_and_clear();

    let Some(task) = final_task else {
        bail!("enrichment task ended without a terminal snapshot");
    };

    for enricher_id in &enricher_ids {
        let Some(slot) = task.progress.get(enricher_id) else {
            continue;
        };
        let status = match slot.status {
            EnricherRunState::Completed => style("✓").green().bold(),
            EnricherRunState::Failed => style("✗").red().bold(),
            _ => style("·").dim(),
        };
        print!(
            "{status} {}  processed {} / enriched {}",
            style(enricher_id).cyan(),
            slot.processed,
            slot.enriched
        );
        if let Some(error) = &slot.error {
            print!("  ({})", style(error).red());
        }
        println!();
    }

    match task.status {
        TaskStatus::Completed => {
            if let Some(diff) = &task.diff {
                println!(
                    "\n{} teams changed, {} fields added, {} fields modified",
                    style(diff.teams_changed).bold(),
                    diff.fields_added,
                    diff.fields_modified
                );
                for team in diff.team_diffs.iter().take(5) {
                    println!("  {} ({} changes)", style(&team.team_name).bold(), team.changes.len());
                    for change in team.changes.iter().take(4) {
                        let tag = match change.change_type {
                            ChangeType::Added => style("+").green(),
                            ChangeType::Modified => style("~").yellow(),
                            ChangeType::Removed => style("-").red(),
                        };
                        println!("    {tag} {}", change.field);
                    }
                }
            }
            Ok(())
        }
        TaskStatus::Failed => bail!(
            "enrichment failed: {}",
            task.error.unwrap_or_else(|| "unknown error".to_string())
        ),
        status => bail!("enrichment ended as {}", status.as_str()),
    }
}
