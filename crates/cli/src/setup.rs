// FILE: crates/cli/src/setup.rs

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use timershare_config::{Config, ConfigManager, SyncSection};
use timershare_core::ClockSkewEstimator;
use timershare_network::{ClientConfig, HttpSyncClient, RemoteStore};
use timershare_resilience::CircuitBreakerConfig;
use timershare_sync_engine::{Collaborators, StaticName, SyncConfig, SyncCoordinator};

/// Opens the config directory given on the command line, or the platform default
pub fn config_manager(config_dir: Option<&String>) -> Result<ConfigManager> {
    let manager = match config_dir {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    };
    manager.context("Failed to locate config directory")
}

/// Loads the config with env overrides and an optional endpoint override from the CLI
pub fn load_config(manager: &ConfigManager, endpoint: Option<&String>) -> Result<Config> {
    let mut config = manager
        .load_with_env_overrides()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;
    if let Some(endpoint) = endpoint {
        config.remote.endpoint = endpoint.clone();
    }
    Ok(config)
}

pub fn sync_config(section: &SyncSection) -> SyncConfig {
    SyncConfig {
        enabled: section.enabled,
        debounce: Duration::from_secs(section.debounce_secs),
        pull_interval: Duration::from_secs(section.pull_interval_secs),
        prune_interval: Duration::from_secs(section.prune_interval_secs),
        dedup_window: Duration::from_secs(section.dedup_window_secs),
        dedup_granularity: Duration::from_secs(section.dedup_granularity_secs),
        equivalence_tolerance: Duration::from_secs(section.equivalence_tolerance_secs),
        conflict_retries: section.conflict_retries,
        ..SyncConfig::default()
    }
}

pub fn client_config(config: &Config) -> ClientConfig {
    let remote = &config.remote;
    let breaker = CircuitBreakerConfig::new(
        config.sync.breaker_failure_threshold,
        Duration::from_secs(config.sync.breaker_open_secs),
    );
    let mut client = ClientConfig::new(remote.endpoint.clone())
        .with_timeouts(
            Duration::from_secs(remote.connect_timeout_secs),
            Duration::from_secs(remote.request_timeout_secs),
        )
        .with_write_token(remote.write_token())
        .with_circuit_breaker(breaker);
    if let Some(agent) = &remote.user_agent {
        client = client.with_user_agent(agent.clone());
    }
    client
}

/// Builds a coordinator talking to the configured HTTP endpoint
pub fn http_coordinator(config: &Config) -> Result<SyncCoordinator> {
    let clock = Arc::new(ClockSkewEstimator::system());
    let client = HttpSyncClient::new(client_config(config), clock.clone())
        .with_context(|| format!("Invalid endpoint {}", config.remote.endpoint))?;
    if config.remote.write_token().is_none() {
        log::info!(
            "No write token in ${}, pushes may be refused",
            config.remote.write_token_env
        );
    }
    Ok(coordinator(config, Arc::new(client), clock))
}

pub fn coordinator(
    config: &Config,
    store: Arc<dyn RemoteStore>,
    clock: Arc<ClockSkewEstimator>,
) -> SyncCoordinator {
    let collaborators =
        Collaborators::default().with_names(StaticName(config.app.display_name.clone()));
    SyncCoordinator::new(sync_config(&config.sync), store, clock, collaborators)
}
