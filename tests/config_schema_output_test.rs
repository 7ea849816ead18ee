// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_pump_scada::config::{self, utils::CONFIG_SCHEMA};

#[test]
fn test_config_schema_output() -> Result<()> {
    // The schema goes to stdout, so only check that printing succeeds
    config::output_config_schema()?;
    Ok(())
}

#[test]
fn test_schema_covers_every_section() -> Result<()> {
    let schema: serde_json::Value = serde_json::from_str(CONFIG_SCHEMA)?;
    let properties = schema["properties"]
        .as_object()
        .expect("schema has top level properties");
    for section in ["plc", "polling", "visualization"] {
        assert!(properties.contains_key(section), "missing section {}", section);
    }
    assert_eq!(schema["additionalProperties"], false);
    Ok(())
}
