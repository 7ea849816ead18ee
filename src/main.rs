// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the pump station monitor

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rust_pump_scada::config::{self, Config, ConfigOverrides, TransportKind};
use rust_pump_scada::daemon::launch_daemon::Daemon;
use std::path::PathBuf;
use tokio::signal;

/// Pump station monitor: PLC polling core and dashboard API
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Web server port (default: 8080)
    #[arg(short = 'p')]
    web_port: Option<u16>,

    /// Web server address (default: 127.0.0.1)
    #[arg(short)]
    web_address: Option<String>,

    /// PLC host name or IP address
    #[arg(long)]
    plc_address: Option<String>,

    /// Protocol used to reach the PLC
    #[arg(long, value_enum)]
    plc_transport: Option<TransportKind>,

    /// Data block holding the pump values
    #[arg(long)]
    db_number: Option<u16>,

    /// Poll period in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: Option<u64>,

    /// Seed for the simulated values used while the PLC is unreachable
    #[arg(long)]
    simulation_seed: Option<u64>,

    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[rocket::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    config.apply_args(ConfigOverrides {
        web_port: args.web_port,
        web_address: args.web_address.clone(),
        plc_address: args.plc_address.clone(),
        plc_transport: args.plc_transport,
        db_number: args.db_number,
        poll_interval_ms: args.poll_interval_ms,
        simulation_seed: args.simulation_seed,
    });
    config::utils::validate_specific_rules(&config).context("Invalid command line override")?;

    info!("Starting in daemon mode");
    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal, terminating daemon");
        }
        Err(err) => {
            eprintln!("Error waiting for shutdown signal: {}", err);
        }
    }
    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}
