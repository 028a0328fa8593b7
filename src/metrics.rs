//! In-process battle counters.
//! Logged on shutdown and by `battlebot status`; nothing is exported yet.
use std::sync::atomic::{AtomicU64, Ordering};

static BATTLES_STARTED: AtomicU64 = AtomicU64::new(0);
static BATTLES_FINISHED: AtomicU64 = AtomicU64::new(0);
static ACTIONS_RESOLVED: AtomicU64 = AtomicU64::new(0);
static ACTIONS_DROPPED_BUSY: AtomicU64 = AtomicU64::new(0);
static SENDS_FAILED: AtomicU64 = AtomicU64::new(0);

pub fn inc_battles_started() {
    BATTLES_STARTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_battles_finished() {
    BATTLES_FINISHED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_actions_resolved() {
    ACTIONS_RESOLVED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_actions_dropped_busy() {
    ACTIONS_DROPPED_BUSY.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_sends_failed() {
    SENDS_FAILED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub battles_started: u64,
    pub battles_finished: u64,
    pub actions_resolved: u64,
    pub actions_dropped_busy: u64,
    pub sends_failed: u64,
}

impl Snapshot {
    /// Battles started but not yet won.
    pub fn battles_in_progress(&self) -> u64 {
        self.battles_started.saturating_sub(self.battles_finished)
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        battles_started: BATTLES_STARTED.load(Ordering::Relaxed),
        battles_finished: BATTLES_FINISHED.load(Ordering::Relaxed),
        actions_resolved: ACTIONS_RESOLVED.load(Ordering::Relaxed),
        actions_dropped_busy: ACTIONS_DROPPED_BUSY.load(Ordering::Relaxed),
        sends_failed: SENDS_FAILED.load(Ordering::Relaxed),
    }
}
