//! Engine counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Cheap, cloneable counter set shared by the engine and its background
/// tasks.
#[derive(Clone)]
pub struct EngineObservability {
    started_at: Instant,
    commands_ok_total: Arc<AtomicU64>,
    commands_err_total: Arc<dashmap::DashMap<String, AtomicU64>>,
    yield_ticks_total: Arc<AtomicU64>,
    receipt_ticks_total: Arc<AtomicU64>,
}

impl EngineObservability {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            commands_ok_total: Arc::new(AtomicU64::new(0)),
            commands_err_total: Arc::new(dashmap::DashMap::new()),
            yield_ticks_total: Arc::new(AtomicU64::new(0)),
            receipt_ticks_total: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_command_ok(&self) {
        self.commands_ok_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_err(&self, code: &str) {
        let entry = self
            .commands_err_total
            .entry(code.to_string())
            .or_insert_with(|| AtomicU64::new(0));
        entry.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_yield_tick(&self) {
        self.yield_ticks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receipt_tick(&self) {
        self.receipt_ticks_total.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        let mut errors = BTreeMap::new();
        for item in self.commands_err_total.iter() {
            errors.insert(item.key().clone(), item.value().load(Ordering::Relaxed));
        }
        ObservabilitySnapshot {
            uptime: self.started_at.elapsed(),
            commands_ok_total: self.commands_ok_total.load(Ordering::Relaxed),
            commands_err_total: errors,
            yield_ticks_total: self.yield_ticks_total.load(Ordering::Relaxed),
            receipt_ticks_total: self.receipt_ticks_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineObservability {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the counters, serialisable for diagnostics output.
#[derive(Debug, Clone, Serialize)]
pub struct ObservabilitySnapshot {
    #[serde(with = "humantime_serde")]
    pub uptime: Duration,
    pub commands_ok_total: u64,
    pub commands_err_total: BTreeMap<String, u64>,
    pub yield_ticks_total: u64,
    pub receipt_ticks_total: u64,
}
