// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Data acquisition module
//!
//! This module turns PLC reads into published snapshots:
//!
//! - [`poller`]: the periodic acquisition task
//! - [`store`]: the current snapshot shared with the web server
//! - [`dispatcher`]: fan-out to stream clients and in-process subscribers
//! - [`fallback`]: simulated values used while the PLC is unreachable
//! - [`events`]: trip and status transitions derived from live snapshots
//! - [`samples`]: per-pump sample history, statistics and CSV export

pub mod dispatcher;
pub mod events;
pub mod fallback;
pub mod poller;
pub mod samples;
pub mod snapshot;
pub mod store;

pub use dispatcher::{DispatchReport, PushDispatcher, SnapshotConsumer, SnapshotSubscriber};
pub use events::{EventHistory, EventRecorder, StatusEvent, TripEvent};
pub use fallback::FallbackGenerator;
pub use poller::{BlockAddress, PlcPoller, PollOutcome};
pub use samples::{PumpSample, PumpStats, SampleHistory, SampleRecorder};
pub use snapshot::{PumpSnapshot, SystemSnapshot};
pub use store::SnapshotStore;
