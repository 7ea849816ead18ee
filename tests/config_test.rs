// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_pump_scada::config::{
    utils::validate_specific_rules, Config, ConfigOverrides, PlcConfig, TransportKind,
    VisualizationConfig,
};
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let config = Config {
        plc: PlcConfig {
            transport: TransportKind::Modbus,
            address: "10.0.4.17".to_string(),
            db_number: 12,
            modbus_register_base: 400,
            ..PlcConfig::default()
        },
        visualization: VisualizationConfig {
            port: 8081,
            address: "192.168.1.1".to_string(),
            name: "TestServer".to_string(),
            ..VisualizationConfig::default()
        },
        ..Config::default()
    };
    config.save_to_file(&config_path)?;

    let loaded_config = Config::from_file(&config_path)?;
    assert_eq!(loaded_config.visualization.port, 8081);
    assert_eq!(loaded_config.visualization.address, "192.168.1.1");
    assert_eq!(loaded_config.visualization.name, "TestServer");
    assert_eq!(loaded_config.plc.transport, TransportKind::Modbus);
    assert_eq!(loaded_config.plc.address, "10.0.4.17");
    assert_eq!(loaded_config.plc.db_number, 12);
    assert_eq!(loaded_config.plc.modbus_register_base, 400);
    assert_eq!(loaded_config.plc.effective_port(), 502);

    // A missing file is created with the defaults
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;
    assert!(non_existent_path.exists());
    assert_eq!(default_config.visualization.port, 8080);
    assert_eq!(default_config.visualization.address, "127.0.0.1");
    assert_eq!(default_config.plc.address, "192.168.200.20");
    assert_eq!(default_config.plc.db_number, 39);

    Ok(())
}

#[test]
fn test_partial_file_keeps_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        "plc:\n  address: plc-station-2.local\npolling:\n  interval_ms: 500\n  simulation_seed: 42\n",
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.plc.address, "plc-station-2.local");
    assert_eq!(config.plc.rack, 0);
    assert_eq!(config.plc.slot, 1);
    assert_eq!(config.polling.interval_ms, 500);
    assert_eq!(config.polling.simulation_seed, Some(42));
    assert_eq!(config.polling.backoff_after_failures, 3);
    assert!(config.visualization.enabled);
    Ok(())
}

#[test]
fn test_apply_args() {
    let mut config = Config::default();

    // Nothing set, nothing changes
    config.apply_args(ConfigOverrides::default());
    assert_eq!(config.visualization.port, 8080);
    assert_eq!(config.plc.transport, TransportKind::S7);

    config.apply_args(ConfigOverrides {
        web_port: Some(9000),
        web_address: Some("192.168.0.1".to_string()),
        plc_address: Some("10.1.1.5".to_string()),
        plc_transport: Some(TransportKind::Modbus),
        db_number: Some(7),
        poll_interval_ms: Some(250),
        simulation_seed: Some(3),
    });

    assert_eq!(config.visualization.port, 9000);
    assert_eq!(config.visualization.address, "192.168.0.1");
    assert_eq!(config.plc.address, "10.1.1.5");
    assert_eq!(config.plc.transport, TransportKind::Modbus);
    assert_eq!(config.plc.db_number, 7);
    assert_eq!(config.polling.interval_ms, 250);
    assert_eq!(config.polling.simulation_seed, Some(3));
}

#[test]
fn test_overrides_are_validated() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    Config::default().save_to_file(&config_path)?;

    // The file itself is valid
    let mut config = Config::from_file(&config_path)?;
    config.apply_args(ConfigOverrides {
        poll_interval_ms: Some(0),
        ..Default::default()
    });

    let err = validate_specific_rules(&config).unwrap_err();
    assert!(err.to_string().contains("Poll interval"));

    config.apply_args(ConfigOverrides {
        poll_interval_ms: Some(100),
        ..Default::default()
    });
    assert!(validate_specific_rules(&config).is_ok());
    Ok(())
}

#[test]
fn test_config_validation() {
    assert!(validate_specific_rules(&Config::default()).is_ok());

    // Port 65535 is reserved
    let mut config = Config::default();
    config.visualization.port = 65535;
    assert!(validate_specific_rules(&config).is_err());

    // Certificate without key
    let mut config = Config::default();
    config.visualization.cert = Some("SGVsbG8gV29ybGQ=".to_string());
    let err = validate_specific_rules(&config).unwrap_err();
    assert!(err.to_string().contains("without a key"));

    // Both present but not base64
    config.visualization.key = Some("not base64 !".to_string());
    assert!(validate_specific_rules(&config).is_err());

    let mut config = Config::default();
    config.plc.address = "  ".to_string();
    assert!(validate_specific_rules(&config).is_err());

    let mut config = Config::default();
    config.plc.read_timeout_ms = 0;
    assert!(validate_specific_rules(&config).is_err());

    // The 113 byte block must fit below the end of the data block
    let mut config = Config::default();
    config.plc.start_offset = 65500;
    assert!(validate_specific_rules(&config).is_err());
}
