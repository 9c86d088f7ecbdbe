use sp_base::{ChainId, Hash32, Slot, XtId};
use sp_wire::{L2Block, L2BlockRequest};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

/// `SlotState ∈ {Starting, Free, Locked, Sealing, Rolling}` (§3, §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Starting,
    Free,
    Locked,
    Sealing,
    Rolling,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The next block a chain owes the SP: `(blockNumber, parentHash)` carried
/// forward from the last accepted (or genesis) L2 block (§4.4 `StartSlot`
/// needs this to build each chain's `L2BlockRequest`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainTip {
    pub next_block_number: u64,
    pub last_hash: Hash32,
}

impl ChainTip {
    pub fn genesis() -> Self {
        ChainTip { next_block_number: 0, last_hash: Hash32::ZERO }
    }
}

/// The per-slot record (§3 SlotRecord): created at `Starting`, destroyed
/// (moved to history by the caller) after superblock emission or rollback.
#[derive(Clone, Debug)]
pub struct SlotRecord {
    pub slot: Slot,
    pub state: SlotState,
    pub participants: BTreeSet<ChainId>,
    pub expected_blocks: BTreeMap<ChainId, L2BlockRequest>,
    pub decided_xts: Vec<XtId>,
    pub included_xts: BTreeSet<XtId>,
    pub received_blocks: BTreeMap<ChainId, L2Block>,
    pub started_at: Instant,
    pub seal_at: Instant,
    pub end_at: Instant,
    pub(crate) in_flight: Option<(XtId, u64)>,
    pub(crate) next_sequence_number: u64,
    /// Set when the clock crosses `seal_at` while still `Locked`; defers
    /// entering `Sealing` until the in-flight decision resolves (§4.4
    /// "wait for the in-flight decision before sealing").
    pub(crate) seal_pending: bool,
}

impl SlotRecord {
    pub fn all_expected_blocks_received(&self) -> bool {
        self.expected_blocks.keys().all(|c| self.received_blocks.contains_key(c))
    }
}
