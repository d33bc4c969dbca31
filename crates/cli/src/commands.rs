// FILE: crates/cli/src/commands.rs

use crate::setup;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use console::style;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use timershare_config::{Config, ConfigManager};
use timershare_core::{ClockSkewEstimator, SyncDocument, TimerRecord};
use timershare_network::{MemoryStats, MemoryStore};
use timershare_sync_engine::{
    Collaborators, RevalidateOutcome, StaticName, SyncCoordinator, UpsertOutcome,
};

/// One line of the timer table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerRow {
    pub key: String,
    pub remaining_secs: u64,
    pub progress: u8,
    pub phase: String,
    pub created_by: String,
    pub expires_at: DateTime<Utc>,
}

impl TimerRow {
    pub fn from_record(record: &TimerRecord, now: DateTime<Utc>) -> Self {
        Self {
            key: record.key.clone(),
            remaining_secs: record.remaining(now).as_secs(),
            progress: record.progress_percentage(now).round() as u8,
            phase: record.predicted_phase_display.clone(),
            created_by: record.created_by.clone(),
            expires_at: record.expires_at,
        }
    }
}

/// Writes a default config file
pub fn init(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default config")?;
    if created {
        println!(
            "{} Config written to {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!(
            "Config already exists at {}",
            manager.config_path().display()
        );
    }
    Ok(())
}

/// Pulls once and prints the shared timers
pub async fn status(config: &Config, matches: &ArgMatches) -> Result<()> {
    let json = matches.get_flag("json");
    let coordinator = setup::http_coordinator(config)?;

    let outcome = coordinator.sync_now().await;
    let rows = rows(&coordinator);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to render timers")?
        );
    } else {
        match &outcome {
            Ok(RevalidateOutcome::Failed) => println!(
                "{} Remote unreachable, nothing cached yet",
                style("!").yellow().bold()
            ),
            Ok(_) => {}
            Err(e) => println!("{} {}", style("!").yellow().bold(), e),
        }
        print_table(&rows);
        println!("{}", style(coordinator.debug_metrics()).dim());
    }

    coordinator.shutdown();
    Ok(())
}

/// Starts a timer and pushes it right away
pub async fn set(config: &Config, matches: &ArgMatches) -> Result<()> {
    let key = matches
        .get_one::<String>("key")
        .ok_or_else(|| anyhow::anyhow!("Timer key is required"))?;
    let duration = matches
        .get_one::<String>("duration")
        .ok_or_else(|| anyhow::anyhow!("Duration is required"))
        .and_then(|d| parse_duration(d))?;
    let phase = matches.get_one::<String>("phase").cloned().unwrap_or_default();
    let display = matches
        .get_one::<String>("display")
        .cloned()
        .unwrap_or_else(|| phase.clone());

    let coordinator = setup::http_coordinator(config)?;
    let result = set_with(&coordinator, key, duration, &phase, &display).await;
    coordinator.shutdown();
    result
}

async fn set_with(
    coordinator: &SyncCoordinator,
    key: &str,
    duration: Duration,
    phase: &str,
    display: &str,
) -> Result<()> {
    // start from the remote copy so the push does not clobber other timers
    coordinator.sync_now().await.context("Sync is not available")?;

    let outcome = coordinator.start_timer(key, duration, phase, display).await?;
    match outcome {
        UpsertOutcome::Scheduled => {}
        UpsertOutcome::AlreadySynced => {
            println!("'{}' is already up to date", key);
            return Ok(());
        }
        UpsertOutcome::Rejected(reason) => bail!("Timer rejected: {}", reason),
        other => bail!("Timer not applied: {:?}", other),
    }

    match coordinator.flush_now().await? {
        Some(report) if report.is_pushed() => println!(
            "{} '{}' set for {} [{}]",
            style("✓").green().bold(),
            key,
            format_remaining(duration),
            report.op_id
        ),
        Some(report) => bail!(
            "[{}] Push did not complete: {:?}",
            report.op_id,
            report.final_state()
        ),
        None => println!("'{}' saved locally", key),
    }
    Ok(())
}

/// Keeps syncing and reprints the table until Ctrl-C
pub async fn watch(config: &Config, matches: &ArgMatches) -> Result<()> {
    let every = matches
        .get_one::<String>("interval")
        .map(|s| parse_duration(s))
        .transpose()?
        .unwrap_or(Duration::from_secs(5));

    let coordinator = setup::http_coordinator(config)?;
    coordinator.start();
    let mut updates = coordinator.subscribe();
    let mut ticker = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        println!("{}", style(coordinator.now().format("%H:%M:%S").to_string()).bold());
        print_table(&rows(&coordinator));
        println!("{}", style(coordinator.debug_metrics()).dim());
    }

    coordinator.shutdown();
    println!("Stopped");
    Ok(())
}

/// Outcome of an in-process two-device run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub store: MemoryStats,
    pub conflicts: u64,
    pub alpha: Vec<TimerRow>,
    pub beta: Vec<TimerRow>,
}

impl SimulationReport {
    /// Returns true if both devices ended with the same timer keys
    pub fn converged(&self) -> bool {
        let keys = |rows: &[TimerRow]| rows.iter().map(|r| r.key.clone()).collect::<Vec<_>>();
        keys(&self.alpha) == keys(&self.beta)
    }
}

/// Runs two devices against an in-memory store to show conflict handling
pub async fn simulate(config: &Config, matches: &ArgMatches) -> Result<()> {
    let latency = matches
        .get_one::<String>("latency")
        .map(|s| parse_duration(s))
        .transpose()?
        .unwrap_or(Duration::from_millis(50));
    let debounce = matches
        .get_one::<String>("debounce")
        .map(|s| parse_duration(s))
        .transpose()?
        .unwrap_or(Duration::from_secs(1));

    println!(
        "Simulating two devices (latency {:?}, debounce {:?})",
        latency, debounce
    );
    let report = run_simulation(config, latency, debounce).await?;

    println!("\n{}", style("alpha").bold().cyan());
    print_table(&report.alpha);
    println!("\n{}", style("beta").bold().cyan());
    print_table(&report.beta);
    println!(
        "\nstore: version {}, {} GET, {} POST, {} conflicts",
        report.store.version, report.store.gets, report.store.posts, report.conflicts
    );
    if report.converged() {
        println!("{} Devices converged", style("✓").green().bold());
    } else {
        println!("{} Devices diverged", style("✗").red().bold());
    }
    Ok(())
}

pub async fn run_simulation(
    config: &Config,
    latency: Duration,
    debounce: Duration,
) -> Result<SimulationReport> {
    let now = ClockSkewEstimator::system().now();
    let store = Arc::new(MemoryStore::new(&SyncDocument::new(now)).with_latency(latency));

    let mut sync = setup::sync_config(&config.sync);
    sync.enabled = true;
    sync.debounce = debounce;
    let device = |name: &str| {
        SyncCoordinator::new(
            sync.clone(),
            store.clone(),
            Arc::new(ClockSkewEstimator::system()),
            Collaborators::default().with_names(StaticName(name.to_string())),
        )
    };
    let alpha = device("alpha");
    let beta = device("beta");

    alpha
        .start_timer("overworld", Duration::from_secs(600), "day", "Day")
        .await?;
    beta.start_timer("nether", Duration::from_secs(300), "night", "Night")
        .await?;

    // both pushes race on the same version; one of them has to retry
    tokio::time::sleep(debounce + latency * 8 + Duration::from_millis(100)).await;
    alpha.sync_now().await?;
    beta.sync_now().await?;

    let report = SimulationReport {
        store: store.stats(),
        conflicts: alpha.metrics().conflicts + beta.metrics().conflicts,
        alpha: rows(&alpha),
        beta: rows(&beta),
    };
    alpha.shutdown();
    beta.shutdown();
    Ok(report)
}

fn rows(coordinator: &SyncCoordinator) -> Vec<TimerRow> {
    let now = coordinator.now();
    coordinator
        .get_all()
        .iter()
        .map(|r| TimerRow::from_record(r, now))
        .collect()
}

fn print_table(rows: &[TimerRow]) {
    if rows.is_empty() {
        println!("No active timers.");
        return;
    }
    println!(
        "{:<16} {:>10} {:>5}  {:<12} {}",
        "KEY", "REMAINING", "DONE", "PHASE", "BY"
    );
    println!("{}", "=".repeat(60));
    for row in rows {
        println!(
            "{:<16} {:>10} {:>4}%  {:<12} {}",
            style(&row.key).bold(),
            format_remaining(Duration::from_secs(row.remaining_secs)),
            row.progress,
            row.phase,
            row.created_by
        );
    }
}

/// Parses `90`, `90s`, `5m`, `1h30m` or `250ms`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        bail!("Empty duration");
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    if let Some(ms) = input.strip_suffix("ms") {
        let ms = ms.parse::<u64>().with_context(|| format!("Bad duration '{}'", input))?;
        return Ok(Duration::from_millis(ms));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits
            .parse()
            .with_context(|| format!("Bad duration '{}'", input))?;
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => bail!("Unknown unit '{}' in '{}'", c, input),
        };
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .with_context(|| format!("Duration '{}' is too large", input))?;
        digits.clear();
    }
    if !digits.is_empty() {
        bail!("Missing unit after '{}' in '{}'", digits, input);
    }
    Ok(Duration::from_secs(total))
}

/// Renders `5400s` as `1h 30m 00s`, `90s` as `1m 30s`
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
