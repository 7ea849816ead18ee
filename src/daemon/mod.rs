// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! Starts and stops the background services: the PLC polling task, the
//! dashboard web server and a heartbeat logger.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_pump_scada::{config::Config, daemon::launch_daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;
