use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::ActivationCause;

#[derive(Default)]
struct Counters {
    armed: AtomicU64,
    activated: [AtomicU64; 10],
    torn_down: AtomicU64,
    duplicate_fires: AtomicU64,
    unmounted_pending: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_armed() {
    increment(&COUNTERS.armed);
}

pub fn record_activated(cause: ActivationCause) {
    increment(&COUNTERS.activated[cause.index()]);
}

/// `guards` is the number of trigger guards released by one teardown pass.
pub fn record_torn_down(guards: usize) {
    COUNTERS
        .torn_down
        .fetch_add(guards as u64, Ordering::Relaxed);
}

pub fn record_duplicate_fire() {
    increment(&COUNTERS.duplicate_fires);
}

pub fn record_unmounted_pending() {
    increment(&COUNTERS.unmounted_pending);
}

#[derive(Clone, Debug, Serialize)]
pub struct CauseCount {
    pub cause: ActivationCause,
    pub count: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ActivationMetricsSnapshot {
    pub armed: u64,
    pub activated: u64,
    pub activated_by_cause: Vec<CauseCount>,
    pub guards_torn_down: u64,
    pub duplicate_fires: u64,
    pub unmounted_pending: u64,
}

impl ActivationMetricsSnapshot {
    pub fn activated_by(&self, cause: ActivationCause) -> u64 {
        self.activated_by_cause
            .iter()
            .find(|entry| entry.cause == cause)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

/// Process-wide totals. Only causes seen at least once are listed.
pub fn snapshot() -> ActivationMetricsSnapshot {
    let activated_by_cause: Vec<CauseCount> = ActivationCause::ALL
        .iter()
        .map(|cause| CauseCount {
            cause: *cause,
            count: COUNTERS.activated[cause.index()].load(Ordering::Relaxed),
        })
        .filter(|entry| entry.count > 0)
        .collect();
    ActivationMetricsSnapshot {
        armed: COUNTERS.armed.load(Ordering::Relaxed),
        activated: activated_by_cause.iter().map(|entry| entry.count).sum(),
        activated_by_cause,
        guards_torn_down: COUNTERS.torn_down.load(Ordering::Relaxed),
        duplicate_fires: COUNTERS.duplicate_fires.load(Ordering::Relaxed),
        unmounted_pending: COUNTERS.unmounted_pending.load(Ordering::Relaxed),
    }
}
