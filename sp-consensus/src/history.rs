use crate::instance::Decision;
use sp_base::{ChainId, Slot, XtId};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// A terminal xT kept around after its instance is torn down, bounded by
/// count and age so `History()` stays cheap and memory stays flat (§3, §9
/// "bounded in-memory history of recently-decided xTs").
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub xt_id: XtId,
    pub slot: Slot,
    pub sequence_number: u64,
    pub participants: Vec<ChainId>,
    pub votes: BTreeMap<ChainId, bool>,
    pub decision: Decision,
    pub decided_at: Instant,
}

pub(crate) struct History {
    entries: VecDeque<HistoryEntry>,
    max_instances: usize,
    retention: Duration,
}

impl History {
    pub fn new(max_instances: usize, retention: Duration) -> Self {
        History { entries: VecDeque::new(), max_instances, retention }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.evict_expired(Instant::now());
        self.entries.push_back(entry);
        while self.entries.len() > self.max_instances {
            self.entries.pop_front();
        }
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.duration_since(front.decided_at) > self.retention {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn contains(&self, xt_id: XtId) -> bool {
        self.entries.iter().any(|e| e.xt_id == xt_id)
    }

    pub fn get(&self, xt_id: XtId) -> Option<HistoryEntry> {
        self.entries.iter().rev().find(|e| e.xt_id == xt_id).cloned()
    }

    /// Most-recently-decided first, capped at `limit`.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }
}
