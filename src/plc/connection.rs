// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC connection lifecycle
//!
//! The [`ConnectionManager`] owns the transport and moves it through
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//! Connected    -> Disconnected          (read failure)
//! Connecting   -> Failed -> Disconnected (connect failure or timeout)
//! ```
//!
//! `Failed` is kept until the next attempt so status observers can see it.
//! Every transition is published on a `tokio::sync::watch` channel so the web
//! API can report connectivity without touching the manager itself.
//!
//! ## Reconnect policy
//!
//! The first `backoff_after_failures` consecutive failures are retried on every
//! poll cycle. Past that, the next attempt waits
//! `retry_interval * 2^(failures - backoff_after_failures)`, capped at
//! `max_backoff`. A successful read resets the failure counter.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

use super::error::{ConnectError, PlcError, ReadError};
use super::PlcTransport;
use crate::config::{PlcConfig, PollingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Read-only view of the connection published after each transition
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub endpoint: String,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    pub fn disconnected(endpoint: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            endpoint: endpoint.into(),
            last_success: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Timeouts and reconnect policy
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Base delay of the backoff, normally the poll period
    pub retry_interval: Duration,
    pub backoff_after_failures: u32,
    pub max_backoff: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(2),
            retry_interval: Duration::from_secs(1),
            backoff_after_failures: 3,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ConnectionSettings {
    pub fn from_config(plc: &PlcConfig, polling: &PollingConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(plc.connect_timeout_ms),
            read_timeout: Duration::from_millis(plc.read_timeout_ms),
            retry_interval: Duration::from_millis(polling.interval_ms),
            backoff_after_failures: polling.backoff_after_failures,
            max_backoff: Duration::from_millis(polling.max_backoff_ms),
        }
    }

    /// Delay before the next connect attempt after `failures` consecutive failures
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        if failures <= self.backoff_after_failures {
            return Duration::ZERO;
        }
        let exponent = (failures - self.backoff_after_failures).min(16);
        self.retry_interval
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Owner of the PLC transport
pub struct ConnectionManager {
    transport: Box<dyn PlcTransport>,
    settings: ConnectionSettings,
    state: ConnectionState,
    last_success: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    last_error: Option<String>,
    next_attempt: Option<Instant>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ConnectionManager {
    pub fn new(transport: Box<dyn PlcTransport>, settings: ConnectionSettings) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::disconnected(transport.endpoint()));
        Self {
            transport,
            settings,
            state: ConnectionState::Disconnected,
            last_success: None,
            consecutive_failures: 0,
            last_error: None,
            next_attempt: None,
            status_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            endpoint: self.transport.endpoint(),
            last_success: self.last_success,
            consecutive_failures: self.consecutive_failures,
            last_error: self.last_error.clone(),
        }
    }

    /// Receiver that always holds the latest [`ConnectionStatus`]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Make sure a session is open, connecting if needed
    ///
    /// Returns immediately when already connected. Otherwise one connect attempt
    /// is made, bounded by the connect timeout, unless the reconnect policy
    /// defers it, in which case [`ConnectError::Backoff`] is returned.
    pub async fn ensure_connected(&mut self) -> Result<(), PlcError> {
        if self.state == ConnectionState::Connected && self.transport.is_open() {
            return Ok(());
        }

        if let Some(at) = self.next_attempt {
            let now = Instant::now();
            if now < at {
                return Err(ConnectError::Backoff {
                    remaining: at - now,
                    failures: self.consecutive_failures,
                }
                .into());
            }
        }

        if self.state != ConnectionState::Disconnected {
            self.transport.disconnect().await;
            self.set_state(ConnectionState::Disconnected);
        }

        self.set_state(ConnectionState::Connecting);
        let endpoint = self.transport.endpoint();
        debug!("Connecting to PLC at {}", endpoint);

        let result = match timeout(self.settings.connect_timeout, self.transport.connect()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout {
                address: endpoint.clone(),
                timeout: self.settings.connect_timeout,
            }
            .into()),
        };

        match result {
            Ok(()) => {
                info!("Connected to PLC at {}", endpoint);
                self.next_attempt = None;
                self.last_error = None;
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(err) => {
                self.transport.disconnect().await;
                self.register_failure(&err);
                debug!(
                    "Connect to {} failed ({} consecutive): {}",
                    endpoint, self.consecutive_failures, err
                );
                self.set_state(ConnectionState::Failed);
                Err(err)
            }
        }
    }

    /// Read `length` bytes of a data block on the open session
    ///
    /// On failure the transport is released and the state drops to
    /// `Disconnected`, so the next cycle reconnects first.
    pub async fn read_block(
        &mut self,
        db_number: u16,
        start: u16,
        length: u16,
    ) -> Result<Vec<u8>, PlcError> {
        if self.state != ConnectionState::Connected {
            return Err(ReadError::NotConnected.into());
        }

        let read = self.transport.read_area(db_number, start, length);
        let result = match timeout(self.settings.read_timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(ReadError::Timeout(self.settings.read_timeout).into()),
        };

        match result {
            Ok(bytes) => {
                self.last_success = Some(Utc::now());
                self.consecutive_failures = 0;
                self.publish();
                Ok(bytes)
            }
            Err(err) => {
                warn!(
                    "Read of DB{} from {} failed: {}",
                    db_number,
                    self.transport.endpoint(),
                    err
                );
                self.transport.disconnect().await;
                self.register_failure(&err);
                self.set_state(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    /// Release the transport; safe in any state
    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
        if self.state != ConnectionState::Disconnected {
            info!("Disconnected from PLC at {}", self.transport.endpoint());
            self.set_state(ConnectionState::Disconnected);
        }
    }

    fn register_failure(&mut self, err: &PlcError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(err.to_string());
        let delay = self.settings.backoff_delay(self.consecutive_failures);
        self.next_attempt = if delay.is_zero() {
            None
        } else {
            debug!("Next PLC connect attempt in {:?}", delay);
            Some(Instant::now() + delay)
        };
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}
