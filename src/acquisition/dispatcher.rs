// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fan-out of published snapshots
//!
//! Two kinds of consumers are served:
//!
//! - stream consumers (dashboard clients) read from a bounded broadcast
//!   channel; a slow client lags and skips snapshots but never holds up the
//!   polling loop
//! - in-process subscribers implement [`SnapshotSubscriber`] and are called
//!   synchronously after each publication; an error or a panic in one of them
//!   is logged and does not prevent delivery to the others

use log::{debug, error, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};

use super::snapshot::SystemSnapshot;

/// In-process consumer of published snapshots
pub trait SnapshotSubscriber: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Called once per published snapshot, from the polling task
    fn deliver(&self, snapshot: &Arc<SystemSnapshot>) -> anyhow::Result<()>;
}

/// Handle returned by [`PushDispatcher::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Outcome of one [`PushDispatcher::notify`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Stream consumers connected when the snapshot was sent
    pub stream_receivers: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct PushDispatcher {
    sender: broadcast::Sender<Arc<SystemSnapshot>>,
    subscribers: RwLock<Vec<(SubscriberId, Arc<dyn SnapshotSubscriber>)>>,
    next_id: AtomicU64,
}

impl PushDispatcher {
    /// `capacity` is the number of snapshots a stream consumer may fall
    /// behind before it starts skipping
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, subscriber: Arc<dyn SnapshotSubscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Registering snapshot subscriber '{}'", subscriber.name());
        match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.push((id, subscriber)),
            Err(poisoned) => poisoned.into_inner().push((id, subscriber)),
        }
        id
    }

    /// Returns false when `id` was not registered
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Open a new stream consumer, positioned after the latest snapshot
    pub fn subscribe(&self) -> SnapshotConsumer {
        SnapshotConsumer {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Deliver `snapshot` to every consumer
    pub fn notify(&self, snapshot: &Arc<SystemSnapshot>) -> DispatchReport {
        // send only fails when no stream consumer is connected
        let stream_receivers = self.sender.send(Arc::clone(snapshot)).unwrap_or(0);

        let subscribers: Vec<_> = match self.subscribers.read() {
            Ok(guard) => guard.iter().map(|(_, s)| Arc::clone(s)).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|(_, s)| Arc::clone(s))
                .collect(),
        };

        let mut report = DispatchReport {
            stream_receivers,
            ..Default::default()
        };
        for subscriber in subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber.deliver(snapshot))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(
                        "Subscriber '{}' rejected snapshot {}: {:#}",
                        subscriber.name(),
                        snapshot.generation,
                        e
                    );
                    report.failed += 1;
                }
                Err(_) => {
                    error!(
                        "Subscriber '{}' panicked on snapshot {}",
                        subscriber.name(),
                        snapshot.generation
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Receiving side of the snapshot stream
pub struct SnapshotConsumer {
    receiver: broadcast::Receiver<Arc<SystemSnapshot>>,
}

impl SnapshotConsumer {
    /// Wait for the next snapshot
    ///
    /// Snapshots overwritten while this consumer was lagging are skipped.
    /// Returns `None` once the dispatcher is gone.
    pub async fn next_snapshot(&mut self) -> Option<Arc<SystemSnapshot>> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Stream consumer lagged, skipped {} snapshots", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
