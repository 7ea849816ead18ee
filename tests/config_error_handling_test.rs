// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_pump_scada::config::{Config, TransportKind};
use std::fs;
use std::path::Path;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

fn assert_sample_is_valid(config_path: &Path) -> Result<()> {
    let sample_path = config_path.with_extension("sample.yaml");
    assert!(sample_path.exists(), "Sample config file was not created");

    let sample_config = Config::from_file(&sample_path)?;
    assert_eq!(sample_config.visualization.port, 8080);
    assert_eq!(sample_config.plc.db_number, 39);
    assert_eq!(sample_config.polling.interval_ms, 1000);
    Ok(())
}

#[test]
fn test_type_mismatch_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let invalid_yaml = r#"
plc:
  address: 12345          # String field with number value
  db_number: "thirty-nine"
visualization:
  port: "not-an-integer"
  enabled: "true"
"#;
    fs::write(&config_path, invalid_yaml)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");
    assert_sample_is_valid(&config_path)
}

#[test]
fn test_out_of_range_port_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let invalid_config = r#"
visualization:
  port: 99999  # valid range is 1-65534
  address: "127.0.0.1"
  enabled: true
"#;
    fs::write(&config_path, invalid_config)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");
    assert_sample_is_valid(&config_path)
}

#[test]
fn test_unknown_transport_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    fs::write(&config_path, "plc:\n  transport: profinet\n")?;
    assert!(Config::from_file(&config_path).is_err());
    assert_sample_is_valid(&config_path)
}

#[test]
fn test_unknown_key_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    fs::write(&config_path, "polling:\n  enabled: false\n")?;
    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}

#[test]
fn test_zero_interval_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    fs::write(&config_path, "polling:\n  interval_ms: 0\n")?;
    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}

#[test]
fn test_empty_file_means_defaults() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    fs::write(&config_path, "")?;
    let config = Config::from_file(&config_path)?;
    assert_eq!(config.plc.transport, TransportKind::S7);
    assert_eq!(config.plc.effective_port(), 102);
    assert!(!config_path.with_extension("sample.yaml").exists());
    Ok(())
}
