// ============================================================================
// leadsync — CLI for the conversion lead sync cache
// ============================================================================
// Usage:
//   leadsync stats                               Show cache entry ages
//   leadsync leads [--fresh] [--json]            Load and list conversion leads
//   leadsync team [--fresh] [--json]             Load and rank marketing agents
//   leadsync watch [--for-secs N]                Keep the cache warm until Ctrl-C
//   leadsync assign --leads L1,L2 --to EMAIL     Bulk assign (or --unassign)
//   leadsync clear-cache                         Drop the cached generation
// ============================================================================

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use leadsync_core::sync::{LEADS_KEY, TEAM_KEY, TIMESTAMP_KEY};
use leadsync_core::{AssignMeta, AssignTarget, Presence, SyncCache, SyncConfig, SyncPhase};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Conversion lead sync tool
#[derive(Parser)]
#[command(name = "leadsync", version, about = "Inspect and drive the conversion lead sync cache")]
struct Cli {
    /// Path to the cache file (default: ~/.leadsync/cache.redb)
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Base URL of the lead API (overrides LEADSYNC_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cache entries, their age, and whether they are still valid
    Stats,

    /// Load conversion leads (from cache when valid) and list them
    Leads {
        /// Bypass the cache and fetch from the API
        #[arg(long)]
        fresh: bool,

        /// Print the leads as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the marketing team ranked by availability
    Team {
        #[arg(long)]
        fresh: bool,

        #[arg(long)]
        json: bool,
    },

    /// Load once, then auto-refresh until Ctrl-C (or the given duration)
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Assign leads to an agent, optimistically, then reconcile with the server
    Assign {
        /// Comma-separated lead ids
        #[arg(long, value_delimiter = ',', required = true)]
        leads: Vec<String>,

        /// Agent email to assign to
        #[arg(long, required_unless_present = "unassign")]
        to: Option<String>,

        /// Agent display name (defaults to the email)
        #[arg(long)]
        name: Option<String>,

        /// Assignment note
        #[arg(long)]
        note: Option<String>,

        /// Who is performing the assignment
        #[arg(long)]
        by: Option<String>,

        /// Clear the assignee instead
        #[arg(long, conflicts_with = "to")]
        unassign: bool,
    },

    /// Remove the cached leads, team, and timestamp
    ClearCache,
}

fn format_epoch_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ms))
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env: {}", e);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("leadsync=info".parse()?)
                .add_directive("leadsync_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SyncConfig::default();
    if let Some(path) = cli.cache_path {
        config.cache_path = Some(path);
    }
    if let Some(url) = cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }

    let cache = SyncCache::from_config(&config)?;

    match cli.command {
        Commands::Stats => cmd_stats(&cache),
        Commands::Leads { fresh, json } => cmd_leads(&cache, fresh, json).await,
        Commands::Team { fresh, json } => cmd_team(&cache, fresh, json).await,
        Commands::Watch { for_secs } => cmd_watch(&cache, for_secs).await,
        Commands::Assign {
            leads,
            to,
            name,
            note,
            by,
            unassign,
        } => {
            let target = if unassign {
                None
            } else {
                to.map(|email| AssignTarget {
                    name: name.unwrap_or_else(|| email.clone()),
                    email,
                })
            };
            let meta = AssignMeta {
                assigned_by_name: by.clone(),
                assigned_by: by,
                notes: note,
            };
            cmd_assign(&cache, leads, target, meta).await
        }
        Commands::ClearCache => cmd_clear(&cache),
    }
}

fn cmd_stats(cache: &SyncCache) -> Result<()> {
    let stats = cache.store().stats()?;

    println!("=== LeadSync Cache Stats ===");
    println!("Cache: {}", cache.store().path().display());
    println!("TTL:   {}s", cache.store().ttl().as_secs());
    println!();
    println!("Entries: {} total, {} valid", stats.total_entries, stats.valid_entries);
    for key in &stats.keys {
        let age = key
            .age_ms
            .map(|ms| format!("{}s", ms / 1000))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:30} age {:>8}  {}",
            key.key,
            age,
            if key.valid { "valid" } else { "stale" }
        );
    }

    Ok(())
}

/// Load and report failures; data already installed stays usable
async fn load(cache: &SyncCache, fresh: bool) {
    cache.load(!fresh).await;
    if cache.phase() == SyncPhase::Error {
        if let Some(err) = cache.last_error() {
            warn!("Load failed: {}", err);
        }
    }
}

async fn cmd_leads(cache: &SyncCache, fresh: bool, json: bool) -> Result<()> {
    load(cache, fresh).await;
    let leads = cache.leads();

    if json {
        println!("{}", serde_json::to_string_pretty(&leads)?);
        return Ok(());
    }
    if leads.is_empty() {
        println!("No conversion leads.");
        return Ok(());
    }

    println!(
        "{:<26}  {:<24}  {:<11}  {:<7}  {:<22}  {}",
        "LEAD ID", "NAME", "STATUS", "COUNTRY", "CREATED", "ASSIGNED TO"
    );
    println!("{}", "-".repeat(120));

    for lead in &leads {
        let name = lead.name.chars().take(24).collect::<String>();
        println!(
            "{:<26}  {:<24}  {:<11}  {:<7}  {:<22}  {}",
            lead.id,
            name,
            lead.status.as_str(),
            lead.country_code.as_deref().unwrap_or("-"),
            lead.created_at
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "-".into()),
            lead.assignment.assigned_to.as_deref().unwrap_or("-")
        );
    }

    if let Some(ms) = cache.last_fetch_epoch_ms() {
        println!("\nTotal: {} leads (fetched {})", leads.len(), format_epoch_ms(ms));
    }
    Ok(())
}

async fn cmd_team(cache: &SyncCache, fresh: bool, json: bool) -> Result<()> {
    load(cache, fresh).await;
    let team = cache.team_members();

    if json {
        println!("{}", serde_json::to_string_pretty(&team)?);
        return Ok(());
    }
    if team.is_empty() {
        println!("No marketing agents.");
        return Ok(());
    }

    println!(
        "{:<28}  {:<24}  {:<8}  {:>8}  {:>6}",
        "EMAIL", "NAME", "PRESENCE", "ASSIGNED", "AVAIL"
    );
    println!("{}", "-".repeat(84));

    for member in &team {
        println!(
            "{:<28}  {:<24}  {:<8}  {:>8}  {:>5.0}%",
            member.email,
            member.name.chars().take(24).collect::<String>(),
            match member.presence {
                Presence::Online => "online",
                Presence::Offline => "offline",
            },
            format!("{}/{}", member.assigned_count, member.capacity),
            member.availability() * 100.0
        );
    }
    Ok(())
}

async fn cmd_watch(cache: &Arc<SyncCache>, for_secs: Option<u64>) -> Result<()> {
    let auto_refresh = cache.start().await;
    info!(
        "Watching {} leads and {} agents",
        cache.leads().len(),
        cache.team_members().len()
    );

    match for_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await?,
    }

    auto_refresh.stop();
    Ok(())
}

async fn cmd_assign(
    cache: &SyncCache,
    lead_ids: Vec<String>,
    target: Option<AssignTarget>,
    meta: AssignMeta,
) -> Result<()> {
    load(cache, false).await;

    let results = cache.bulk_assign(lead_ids, target, meta).await?;
    println!("Assigned: {}", results.assigned);
    println!("Failed:   {}", results.failed);
    for err in &results.errors {
        println!("  - {}", err);
    }
    Ok(())
}

fn cmd_clear(cache: &SyncCache) -> Result<()> {
    let removed = cache.store().clear(&[LEADS_KEY, TEAM_KEY, TIMESTAMP_KEY])?;
    println!("Removed {} cache entries", removed);
    Ok(())
}
