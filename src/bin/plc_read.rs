// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! One-shot read of the pump data block, for commissioning

use anyhow::{Context, Result};
use clap::Parser;
use rust_pump_scada::config::{
    utils::validate_specific_rules, Config, ConfigOverrides, TransportKind,
};
use rust_pump_scada::plc::{
    decode, transport_from_config, ConnectionManager, ConnectionSettings, RegisterMap,
};
use std::path::PathBuf;

/// Read and decode the pump data block once
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Configuration file; defaults are used when absent
    #[clap(long)]
    config: Option<PathBuf>,

    /// PLC host name or IP address
    #[clap(long)]
    address: Option<String>,

    /// Protocol used to reach the PLC
    #[clap(long, value_enum)]
    transport: Option<TransportKind>,

    /// Data block holding the pump values
    #[clap(long)]
    db_number: Option<u16>,

    /// Print the raw block as hex before the table
    #[clap(long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_args(ConfigOverrides {
        plc_address: args.address.clone(),
        plc_transport: args.transport,
        db_number: args.db_number,
        ..Default::default()
    });
    validate_specific_rules(&config)?;

    let map = RegisterMap::standard();
    map.validate()?;

    let mut manager = ConnectionManager::new(
        transport_from_config(&config.plc),
        ConnectionSettings::from_config(&config.plc, &config.polling),
    );
    println!(
        "Connecting to {} over {}",
        manager.status().endpoint,
        config.plc.transport
    );
    manager.ensure_connected().await?;

    let length = u16::try_from(map.required_len()).context("register map too large")?;
    let raw = manager
        .read_block(config.plc.db_number, config.plc.start_offset, length)
        .await?;
    manager.disconnect().await;

    if args.raw {
        for (row, chunk) in raw.chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
            println!("{:4}: {}", row * 16, hex.join(" "));
        }
        println!();
    }

    let snapshot = decode(&raw, &map)?;
    println!(
        "DB{} read at {}: system alarm {}",
        config.plc.db_number,
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
        if snapshot.system_alarm { "ACTIVE" } else { "clear" }
    );
    println!(
        "{:>4}  {:>5}  {:>7}  {:>4}  {:>10}  {:>9}  {:>10}",
        "pump", "ready", "running", "trip", "pressure", "speed", "setpoint"
    );
    for pump in &snapshot.pumps {
        println!(
            "{:>4}  {:>5}  {:>7}  {:>4}  {:>6.2} bar  {:>6.2} Hz  {:>6.2} {}",
            pump.pump_id,
            pump.ready,
            pump.running,
            pump.trip,
            pump.pressure,
            pump.speed,
            pump.pressure_setpoint,
            pump.setpoint_unit
        );
    }

    Ok(())
}
