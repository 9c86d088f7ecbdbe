use std::sync::atomic::{AtomicU64, Ordering};

/// Narrow counters exposed to observability without committing the core
/// to any particular metrics registry. Cheap to share: every field is an
/// independently-updated atomic, no lock.
#[derive(Default)]
pub struct Stats {
    pub votes_recorded: AtomicU64,
    pub xts_decided: AtomicU64,
    pub xts_timed_out: AtomicU64,
    pub superblocks_sealed: AtomicU64,
    pub rollbacks: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            votes_recorded: self.votes_recorded.load(Ordering::Relaxed),
            xts_decided: self.xts_decided.load(Ordering::Relaxed),
            xts_timed_out: self.xts_timed_out.load(Ordering::Relaxed),
            superblocks_sealed: self.superblocks_sealed.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub votes_recorded: u64,
    pub xts_decided: u64,
    pub xts_timed_out: u64,
    pub superblocks_sealed: u64,
    pub rollbacks: u64,
}
