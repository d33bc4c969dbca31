//! Integration tests for the configuration system

use timershare_config::{
    Config, ConfigManager, ConfigSection, LogLevel, SyncSection, CONFIG_VERSION,
    ENV_APP_LOG_LEVEL, ENV_REMOTE_ENDPOINT, ENV_SYNC_ENABLED,
};
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    assert!(manager.initialize()?);

    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let mut modified = config.clone();
    modified.app.display_name = "alice".to_string();
    modified.remote.endpoint = "https://sync.example.workers.dev/timer_sync.json".to_string();
    modified.sync.conflict_retries = 2;
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded, modified);

    manager.reset()?;
    assert_eq!(manager.load()?, Config::default());
    Ok(())
}

#[test]
fn test_partial_file_fills_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    std::fs::write(
        manager.config_path(),
        "[sync]\ndebounce_secs = 5\n\n[app]\nlog_level = \"debug\"\n",
    )?;

    let config = manager.load()?;
    assert_eq!(config.sync.debounce_secs, 5);
    assert_eq!(config.sync.pull_interval_secs, SyncSection::default().pull_interval_secs);
    assert_eq!(config.app.log_level, LogLevel::Debug);
    assert_eq!(config.remote.write_token_env, "TIMERSHARE_WRITE_TOKEN");
    Ok(())
}

#[test]
fn test_env_overrides_win_over_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.save(&Config::default())?;

    std::env::set_var(ENV_REMOTE_ENDPOINT, "https://override.example.dev/timer_sync.json");
    std::env::set_var(ENV_SYNC_ENABLED, "off");
    std::env::set_var(ENV_APP_LOG_LEVEL, "trace");
    let config = manager.load_with_env_overrides();
    std::env::set_var(ENV_SYNC_ENABLED, "sometimes");
    std::env::set_var(ENV_APP_LOG_LEVEL, "loud");
    let ignored = manager.load_with_env_overrides();
    std::env::remove_var(ENV_REMOTE_ENDPOINT);
    std::env::remove_var(ENV_SYNC_ENABLED);
    std::env::remove_var(ENV_APP_LOG_LEVEL);

    let config = config?;
    assert_eq!(config.remote.endpoint, "https://override.example.dev/timer_sync.json");
    assert!(!config.sync.enabled);
    assert_eq!(config.app.log_level, LogLevel::Trace);

    let ignored = ignored?;
    assert!(ignored.sync.enabled);
    assert_eq!(ignored.app.log_level, LogLevel::Info);

    // overrides are never written back
    assert_eq!(manager.load()?, Config::default());
    Ok(())
}

#[test]
fn test_section_merge_chain() {
    let mut base = SyncSection::default();
    let file = SyncSection {
        debounce_secs: 20,
        ..Default::default()
    };
    base.merge(file);
    assert_eq!(base.debounce_secs, 20);
    assert_eq!(base.section_name(), "sync");
}

#[test]
fn test_serialization_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let toml_string = toml::to_string(&config)?;
    let deserialized: Config = toml::from_str(&toml_string)?;
    assert_eq!(config, deserialized);
    Ok(())
}
