// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::acquisition::{
    BlockAddress, EventHistory, EventRecorder, FallbackGenerator, PlcPoller, PushDispatcher,
    SampleHistory, SampleRecorder, SnapshotStore,
};
use crate::config::{utils::validate_specific_rules, Config};
use crate::plc::{
    transport_from_config, ConnectionManager, ConnectionSettings, ConnectionStatus, RegisterMap,
};
use crate::visualization::server::{build_rocket, rocket_figment};
use crate::visualization::DashboardState;

/// Grace period granted to each task on shutdown
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);

/// Background services of the application
///
/// Owns the polling task, the web server and the heartbeat, together with
/// the components they share.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    rocket_shutdown: Option<rocket::Shutdown>,
    store: SnapshotStore,
    dispatcher: Arc<PushDispatcher>,
    history: Arc<EventHistory>,
    samples: Arc<SampleHistory>,
    map: Arc<RegisterMap>,
    connection: Option<watch::Receiver<ConnectionStatus>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            shutdown_tx,
            rocket_shutdown: None,
            store: SnapshotStore::default(),
            dispatcher: Arc::new(PushDispatcher::new(1)),
            history: Arc::new(EventHistory::new(1)),
            samples: Arc::new(SampleHistory::new(1)),
            map: Arc::new(RegisterMap::standard()),
            connection: None,
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// The configuration is checked again here since command line overrides
    /// are applied after the file was validated.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        validate_specific_rules(config)
            .context("Refusing to launch with an invalid configuration")?;

        let map = RegisterMap::standard();
        map.validate().context("Pump register map is inconsistent")?;
        self.map = Arc::new(map);

        let mut fallback = match config.polling.simulation_seed {
            Some(seed) => FallbackGenerator::with_seed(seed),
            None => FallbackGenerator::new(),
        };
        // Simulated until the first successful read
        self.store = SnapshotStore::new(fallback.generate());
        self.dispatcher = Arc::new(PushDispatcher::new(config.polling.stream_buffer));
        self.history = Arc::new(EventHistory::new(config.polling.event_history_capacity));
        self.dispatcher
            .register(Arc::new(EventRecorder::new(self.history.clone())));
        self.samples = Arc::new(SampleHistory::new(config.polling.sample_history_capacity));
        self.dispatcher
            .register(Arc::new(SampleRecorder::new(self.samples.clone())));

        let manager = ConnectionManager::new(
            transport_from_config(&config.plc),
            ConnectionSettings::from_config(&config.plc, &config.polling),
        );
        self.connection = Some(manager.subscribe());

        self.start_polling(config, manager, fallback)?;

        if config.visualization.enabled {
            self.start_web_server(config).await?;
        }

        self.start_heartbeat()?;

        Ok(())
    }

    /// Start the PLC polling task
    fn start_polling(
        &mut self,
        config: &Config,
        manager: ConnectionManager,
        fallback: FallbackGenerator,
    ) -> Result<()> {
        info!(
            "Starting PLC polling of {} ({}) every {} ms",
            config.plc.address, config.plc.transport, config.polling.interval_ms
        );

        let block = BlockAddress::for_map(config.plc.db_number, config.plc.start_offset, &self.map)?;
        let poller = PlcPoller::new(
            manager,
            self.map.clone(),
            block,
            self.store.clone(),
            self.dispatcher.clone(),
            fallback,
            Duration::from_millis(config.polling.interval_ms),
        );

        let task = tokio::spawn(poller.run(self.running.clone(), self.shutdown_tx.subscribe()));
        self.tasks.push(task);
        Ok(())
    }

    /// Start the Rocket web server
    async fn start_web_server(&mut self, config: &Config) -> Result<()> {
        info!(
            "Starting web server on {}:{}",
            config.visualization.address, config.visualization.port
        );

        let figment = rocket_figment(&config.visualization)?;
        let rocket = build_rocket(figment, self.dashboard_state()?).await;

        // Ignite here so the shutdown handle is known before the task starts
        let ignited = rocket.ignite().await?;
        self.rocket_shutdown = Some(ignited.shutdown());

        let task = tokio::spawn(async move {
            ignited.launch().await?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs system status periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let store = self.store.clone();
        let dispatcher = self.dispatcher.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                let snapshot = store.current();
                debug!(
                    "Daemon heartbeat: generation {}, simulated {}, {} stream client(s)",
                    snapshot.generation,
                    snapshot.simulated,
                    dispatcher.receiver_count()
                );
                tokio::select! {
                    _ = time::sleep(HEARTBEAT_PERIOD) => {}
                    _ = shutdown.changed() => break,
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// State handed to the web server
    pub fn dashboard_state(&self) -> Result<DashboardState> {
        let connection = self
            .connection
            .clone()
            .context("Daemon has not been launched")?;
        Ok(DashboardState {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            map: self.map.clone(),
            history: self.history.clone(),
            samples: self.samples.clone(),
            connection,
        })
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &Arc<PushDispatcher> {
        &self.dispatcher
    }

    pub fn history(&self) -> &Arc<EventHistory> {
        &self.history
    }

    pub fn samples(&self) -> &Arc<SampleHistory> {
        &self.samples
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);
        if let Some(shutdown) = &self.rocket_shutdown {
            shutdown.clone().notify();
        }
    }

    /// Wait for all tasks to complete
    ///
    /// A task still running after the grace period is abandoned.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match time::timeout(JOIN_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("Task failed: {:#}", e),
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => warn!("Task did not complete within timeout period, may be hung"),
            }
        }
        Ok(())
    }
}
