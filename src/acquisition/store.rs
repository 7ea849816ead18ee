// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Process-wide current snapshot
//!
//! Single writer (the polling task), any number of readers. Publication swaps
//! an `Arc` pointer, so a reader holds either the previous snapshot or the new
//! one in full, and `current()` never waits on the writer.

use arc_swap::ArcSwap;
use std::sync::Arc;

use super::snapshot::SystemSnapshot;

/// Shared handle on the latest published [`SystemSnapshot`]
#[derive(Clone)]
pub struct SnapshotStore {
    current: Arc<ArcSwap<SystemSnapshot>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(SystemSnapshot::empty())
    }
}

impl SnapshotStore {
    /// Create a store holding `initial` as generation 0
    pub fn new(mut initial: SystemSnapshot) -> Self {
        initial.generation = 0;
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Replace the current snapshot, stamping it with the next generation
    pub fn publish(&self, mut snapshot: SystemSnapshot) -> Arc<SystemSnapshot> {
        snapshot.generation = self.current.load().generation + 1;
        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Latest published snapshot
    pub fn current(&self) -> Arc<SystemSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn snapshot_with_pressure(value: f32) -> SystemSnapshot {
        let mut snapshot = SystemSnapshot::empty();
        for pump in snapshot.pumps.iter_mut() {
            pump.pressure = value;
            pump.speed = value;
        }
        snapshot
    }

    #[test]
    fn test_publish_replaces_current() {
        let store = SnapshotStore::default();
        assert_eq!(store.generation(), 0);

        let published = store.publish(snapshot_with_pressure(4.2));
        assert_eq!(published.generation, 1);
        assert_eq!(store.current().pumps[3].pressure, 4.2);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_readers_keep_their_copy() {
        let store = SnapshotStore::default();
        let before = store.current();
        store.publish(snapshot_with_pressure(9.0));
        assert_eq!(before.pumps[0].pressure, 0.0);
        assert_eq!(store.current().pumps[0].pressure, 9.0);
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_generations() {
        let store = SnapshotStore::default();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut observed = 0u64;
                    while !done.load(Ordering::Acquire) {
                        let snapshot = store.current();
                        let expected = snapshot.pumps[0].pressure;
                        assert!(snapshot
                            .pumps
                            .iter()
                            .all(|p| p.pressure == expected && p.speed == expected));
                        assert!(snapshot.generation >= observed);
                        observed = snapshot.generation;
                    }
                })
            })
            .collect();

        for i in 1..=2000 {
            store.publish(snapshot_with_pressure(i as f32));
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.generation(), 2000);
    }
}
