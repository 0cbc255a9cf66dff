// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use photo_saver::SaverConfig;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("photo-saver-config-{}-{}", uuid::Uuid::new_v4(), name))
}

#[test]
fn test_config_default() {
    let config = SaverConfig::default();

    // One queued request plus the one being processed
    assert_eq!(config.queue_capacity, 1);
    assert_eq!(config.preview_max_side, 128);
    assert!(
        config.output_dir.ends_with("camera"),
        "Photos should go to a camera folder by default"
    );
}

#[test]
fn test_config_load_from_file() {
    let path = temp_path("saver.json");
    std::fs::write(
        &path,
        r#"{ "queue_capacity": 4, "output_dir": "/tmp/photos", "stamp_shadow_alpha": 128 }"#,
    )
    .unwrap();

    let config = SaverConfig::load(&path).unwrap();
    assert_eq!(config.queue_capacity, 4);
    assert_eq!(config.output_dir, PathBuf::from("/tmp/photos"));
    assert_eq!(config.stamp_shadow_alpha, 128);
    assert_eq!(config.preview_max_side, 128);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let config = SaverConfig::load_or_default(&temp_path("missing.json"));
    assert_eq!(config, SaverConfig::default());
}

#[test]
fn test_config_invalid_file_uses_defaults() {
    let path = temp_path("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(SaverConfig::load(&path).is_err());
    assert_eq!(SaverConfig::load_or_default(&path), SaverConfig::default());

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_config_round_trips_through_json() {
    let config = SaverConfig {
        queue_capacity: 2,
        font_path: Some(PathBuf::from("/usr/share/fonts/custom.ttf")),
        ..SaverConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: SaverConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}
