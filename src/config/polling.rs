// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Polling loop configuration

use serde::{Deserialize, Serialize};

/// Timing of the acquisition loop and sizing of what it feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Period of the polling loop in milliseconds. Default is 1000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Consecutive failures retried on every cycle before backing off.
    #[serde(default = "default_backoff_after_failures")]
    pub backoff_after_failures: u32,

    /// Upper bound of the reconnect delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Seed of the fallback generator; random when absent.
    #[serde(default)]
    pub simulation_seed: Option<u64>,

    /// Number of trip and status events kept in memory.
    #[serde(default = "default_event_history_capacity")]
    pub event_history_capacity: usize,

    /// Number of per-pump samples kept for history, statistics and export.
    #[serde(default = "default_sample_history_capacity")]
    pub sample_history_capacity: usize,

    /// Snapshots a stream client may fall behind before skipping.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_backoff_after_failures() -> u32 {
    3
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_event_history_capacity() -> usize {
    10_000
}

fn default_sample_history_capacity() -> usize {
    200_000
}

fn default_stream_buffer() -> usize {
    16
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            backoff_after_failures: default_backoff_after_failures(),
            max_backoff_ms: default_max_backoff_ms(),
            simulation_seed: None,
            event_history_capacity: default_event_history_capacity(),
            sample_history_capacity: default_sample_history_capacity(),
            stream_buffer: default_stream_buffer(),
        }
    }
}
