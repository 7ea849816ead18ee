// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Periodic acquisition of the pump data block
//!
//! One cycle connects if needed, reads and decodes the block, then publishes
//! the snapshot and hands it to the dispatcher. Any failure in the cycle
//! publishes a simulated snapshot instead, so the dashboard always has data.

use anyhow::Result;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use super::dispatcher::PushDispatcher;
use super::fallback::FallbackGenerator;
use super::snapshot::SystemSnapshot;
use super::store::SnapshotStore;
use crate::plc::{decode, ConnectionManager, PlcError, RegisterMap};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Location of the pump data block in the PLC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAddress {
    pub db_number: u16,
    pub start: u16,
    pub length: u16,
}

impl BlockAddress {
    /// Block covering `map`, starting at `start` in data block `db_number`
    pub fn for_map(db_number: u16, start: u16, map: &RegisterMap) -> Result<Self, PlcError> {
        let length = u16::try_from(map.required_len()).map_err(|_| {
            PlcError::InvalidMap(format!(
                "register map spans {} bytes, more than one read can address",
                map.required_len()
            ))
        })?;
        Ok(Self {
            db_number,
            start,
            length,
        })
    }
}

/// What a poll cycle published
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Live(Arc<SystemSnapshot>),
    Simulated {
        snapshot: Arc<SystemSnapshot>,
        cause: String,
    },
}

impl PollOutcome {
    pub fn snapshot(&self) -> &Arc<SystemSnapshot> {
        match self {
            PollOutcome::Live(snapshot) => snapshot,
            PollOutcome::Simulated { snapshot, .. } => snapshot,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, PollOutcome::Live(_))
    }
}

pub struct PlcPoller {
    manager: ConnectionManager,
    map: Arc<RegisterMap>,
    block: BlockAddress,
    store: SnapshotStore,
    dispatcher: Arc<PushDispatcher>,
    fallback: FallbackGenerator,
    period: Duration,
    live: bool,
}

impl PlcPoller {
    pub fn new(
        manager: ConnectionManager,
        map: Arc<RegisterMap>,
        block: BlockAddress,
        store: SnapshotStore,
        dispatcher: Arc<PushDispatcher>,
        fallback: FallbackGenerator,
        period: Duration,
    ) -> Self {
        Self {
            manager,
            map,
            block,
            store,
            dispatcher,
            fallback,
            // tokio intervals reject a zero period
            period: period.max(MIN_PERIOD),
            live: false,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Run one acquisition cycle
    pub async fn poll_once(&mut self) -> PollOutcome {
        match self.acquire().await {
            Ok(snapshot) => {
                if !self.live {
                    info!("Live PLC data available from {}", self.manager.status().endpoint);
                    self.live = true;
                }
                let snapshot = self.store.publish(snapshot);
                self.dispatcher.notify(&snapshot);
                PollOutcome::Live(snapshot)
            }
            Err(err) => {
                let cause = err.to_string();
                if self.live {
                    warn!("PLC data unavailable, switching to simulated values: {}", cause);
                    self.live = false;
                } else {
                    debug!("Publishing simulated values: {}", cause);
                }
                let snapshot = self.store.publish(self.fallback.generate());
                self.dispatcher.notify(&snapshot);
                PollOutcome::Simulated { snapshot, cause }
            }
        }
    }

    async fn acquire(&mut self) -> Result<SystemSnapshot, PlcError> {
        self.manager.ensure_connected().await?;
        let raw = self
            .manager
            .read_block(self.block.db_number, self.block.start, self.block.length)
            .await?;
        decode(&raw, &self.map)
    }

    /// Poll until `running` is cleared or `shutdown` fires
    ///
    /// A cycle in progress when shutdown is signalled is abandoned. The PLC
    /// session is released before returning.
    pub async fn run(
        mut self,
        running: Arc<AtomicBool>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        info!(
            "Polling DB{} bytes {}..{} every {:?}",
            self.block.db_number,
            self.block.start,
            self.block.start as usize + self.block.length as usize,
            self.period
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while running.load(Ordering::SeqCst) && !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                _ = self.poll_once() => {}
                _ = shutdown.changed() => break,
            }
        }

        self.manager.disconnect().await;
        info!("Polling stopped after generation {}", self.store.generation());
        Ok(())
    }
}
