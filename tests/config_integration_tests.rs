//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Default configuration generation
//! - Human-edited YAML with partial settings
//! - Integration with StateManager

use camino::Utf8PathBuf;
use slx_relabel::{ConfigManager, RelabelConfig, StateChange, StateManager};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
}

#[test]
fn test_config_dir_is_created() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("Relabel Data");

    ConfigManager::new(&nested).unwrap();

    assert!(nested.is_dir());
}

#[test]
fn test_load_default_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    // Config file doesn't exist, should return defaults
    let config = manager.load_config().unwrap();

    assert_eq!(config.settings.resource_extension, "resx");
    assert_eq!(config.settings.marker_file, "project.info.xml");
    assert_eq!(config.settings.string_type, "String");
    assert!(!config.settings.allow_empty_replacement);
}

#[test]
fn test_hand_written_yaml() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.config_path(),
        "Relabel_Settings:\n  Allow Empty Replacement: true\n  Log Directory: relabel-logs\n",
    )
    .unwrap();

    let config = manager.load_config().unwrap();
    assert!(config.settings.allow_empty_replacement);
    assert_eq!(config.settings.log_directory, "relabel-logs");
    assert_eq!(config.settings.marker_file, "project.info.xml");
}

#[test]
fn test_save_and_reload_round_trip() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = RelabelConfig::default();
    config.settings.marker_file = "model.info.xml".to_string();
    manager.save_config(&config).unwrap();

    let saved = fs::read_to_string(manager.config_path()).unwrap();
    assert!(saved.contains("Marker File: model.info.xml"));

    let reloaded = manager.load_config().unwrap();
    assert_eq!(reloaded.settings, config.settings);
}

#[tokio::test]
async fn test_config_loaded_into_state() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = RelabelConfig::default();
    config.settings.string_type = "System.String".to_string();
    manager.save_config(&config).unwrap();

    let state = StateManager::new();
    let mut rx = state.subscribe();
    state.load_from_config(&manager.load_config().unwrap());

    assert_eq!(rx.recv().await.unwrap(), StateChange::SettingsChanged);
    assert_eq!(state.read(|s| s.settings.string_type.clone()), "System.String");
}
