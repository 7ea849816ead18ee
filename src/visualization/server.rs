// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket server builder and configuration

use anyhow::{Context, Result};
use base64::prelude::*;
use log::{debug, info};
use rocket::config::LogLevel;
use rocket::data::{Limits, ToByteUnit};
use rocket::figment::Figment;
use rocket::{catchers, routes, Build, Rocket};

use super::api::*;
use super::cors::{options, CORS};
use super::stream::stream_snapshots;
use super::DashboardState;
use crate::config::VisualizationConfig;

/// Rocket configuration for the dashboard server
///
/// TLS is enabled when both a certificate and a key are configured.
pub fn rocket_figment(config: &VisualizationConfig) -> Result<Figment> {
    let mut figment = rocket::Config::figment()
        .merge(("ident", config.name.clone()))
        .merge(("limits", Limits::new().limit("json", 2.mebibytes())))
        .merge(("address", config.address.clone()))
        .merge(("port", config.port))
        .merge(("log_level", LogLevel::Normal));

    if let (Some(cert), Some(key)) = (&config.cert, &config.key) {
        debug!("SSL certificates found in configuration, enabling TLS");

        let cert_data = BASE64_STANDARD
            .decode(cert)
            .context("SSL certificate is not valid base64")?;
        let key_data = BASE64_STANDARD
            .decode(key)
            .context("SSL key is not valid base64")?;

        figment = figment
            .merge(("tls.certs", cert_data))
            .merge(("tls.key", key_data));

        info!("TLS enabled for web server");
    }

    Ok(figment)
}

/// Build a configured Rocket server instance
///
/// ### Example
///
/// ```no_run
/// use std::sync::Arc;
/// use rust_pump_scada::acquisition::{EventHistory, PushDispatcher, SampleHistory, SnapshotStore};
/// use rust_pump_scada::plc::{ConnectionStatus, RegisterMap};
/// use rust_pump_scada::visualization::{server, DashboardState};
///
/// async fn example() {
///     let (_tx, connection) = tokio::sync::watch::channel(ConnectionStatus::disconnected("plc:102"));
///     let state = DashboardState {
///         store: SnapshotStore::default(),
///         dispatcher: Arc::new(PushDispatcher::new(16)),
///         map: Arc::new(RegisterMap::standard()),
///         history: Arc::new(EventHistory::new(100)),
///         samples: Arc::new(SampleHistory::new(1000)),
///         connection,
///     };
///     let figment = rocket::Config::figment();
///     let rocket = server::build_rocket(figment, state).await;
///     // rocket.launch().await.expect("Failed to launch");
/// }
/// ```
pub async fn build_rocket(figment: Figment, state: DashboardState) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(CORS)
        .mount("/", routes![options])
        .mount(
            "/api",
            routes![
                get_data,
                get_pump,
                get_status,
                get_reports,
                get_trip_events,
                get_status_events,
                get_historical,
                get_pump_historical,
                get_stats,
                get_pump_stats,
                export_csv,
                stream_snapshots,
            ],
        )
        .register("/", catchers![not_found])
        .manage(state)
}
