use crate::queue::RequestQueue;
use crate::record::{ChainTip, SlotRecord, SlotState};
use sp_base::{ChainId, Hash32, Slot};
use sp_consensus::{DecidedEvent, Decision, Engine};
use sp_wire::{Decided, L2Block, L2BlockRequest, Payload, RequestSeal, RollBackAndStartSlot, StartSc, StartSlot, XtRequest};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct SlotMachineConfig {
    pub slot_duration: Duration,
    pub seal_fraction: f64,
    pub request_expiration: Option<Duration>,
}

impl Default for SlotMachineConfig {
    fn default() -> Self {
        SlotMachineConfig {
            slot_duration: Duration::from_secs(12),
            seal_fraction: 0.667,
            request_expiration: None,
        }
    }
}

/// Effects `SlotMachine` hands back to the coordinator instead of acting on
/// them directly (§9 "dispatch layer matches on payload and routes" and §5
/// "callbacks never hold coordinator locks" — the same discipline applied
/// to slot transitions, not just C3's `OnDecided`).
#[derive(Debug)]
pub enum SlotAction {
    Broadcast(Payload),
    /// The slot has everything it is going to get (either every expected
    /// block arrived, or `endAt` elapsed); hand the record to
    /// `sp_superblock::assemble` and report back via
    /// `SlotMachine::complete_seal`/`force_rollback`.
    SealReady(SlotRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    UnknownParticipant(ChainId),
    EmptyParticipants,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::UnknownParticipant(id) => write!(f, "xT references unknown chain {id}"),
            EnqueueError::EmptyParticipants => write!(f, "xT request names no participating chains"),
        }
    }
}

impl std::error::Error for EnqueueError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordBlockError {
    NotSealing,
    UnexpectedChain,
    Duplicate,
    ContentMismatch,
}

impl fmt::Display for RecordBlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordBlockError::NotSealing => write!(f, "L2Block received outside the Sealing state"),
            RecordBlockError::UnexpectedChain => write!(f, "L2Block.chainId not in this slot's expectedBlocks"),
            RecordBlockError::Duplicate => write!(f, "duplicate L2Block for this chain this slot"),
            RecordBlockError::ContentMismatch => {
                write!(f, "L2Block.blockNumber/parentHash does not match expectedBlocks")
            }
        }
    }
}

impl std::error::Error for RecordBlockError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDispatchError {
    UnknownParticipant,
}

impl fmt::Display for VoteDispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDispatchError::UnknownParticipant => write!(f, "voting chain is not in this slot's allowlist"),
        }
    }
}

impl std::error::Error for VoteDispatchError {}

struct Inner {
    config: SlotMachineConfig,
    record: SlotRecord,
    queue: RequestQueue,
    chain_tips: BTreeMap<ChainId, ChainTip>,
}

/// C4: the per-slot state machine (§3, §4.4). A cheap-to-clone handle onto
/// one mutex-guarded `SlotRecord` + xT queue — the "single-writer
/// coordinator task" of §5, implemented as a coarse mutex rather than an
/// actor, since every mutation here is already short and non-blocking.
#[derive(Clone)]
pub struct SlotMachine {
    inner: Arc<Mutex<Inner>>,
}

impl SlotMachine {
    pub fn new(config: SlotMachineConfig) -> Self {
        let now = Instant::now();
        let record = SlotRecord {
            slot: Slot::genesis(),
            state: SlotState::Starting,
            participants: BTreeSet::new(),
            expected_blocks: BTreeMap::new(),
            decided_xts: Vec::new(),
            included_xts: BTreeSet::new(),
            received_blocks: BTreeMap::new(),
            started_at: now,
            seal_at: now,
            end_at: now,
            in_flight: None,
            next_sequence_number: 1,
            seal_pending: false,
        };
        SlotMachine {
            inner: Arc::new(Mutex::new(Inner {
                config,
                record,
                queue: RequestQueue::default(),
                chain_tips: BTreeMap::new(),
            })),
        }
    }

    pub fn state(&self) -> SlotState {
        self.inner.lock().unwrap().record.state
    }

    pub fn record_snapshot(&self) -> SlotRecord {
        self.inner.lock().unwrap().record.clone()
    }

    pub fn active_chains(&self) -> BTreeSet<ChainId> {
        self.inner.lock().unwrap().record.participants.clone()
    }

    /// Enters `Starting` (§4.4): snapshots `active_chains` as this slot's
    /// allowlist, builds per-chain `L2BlockRequest`s from the last known
    /// tip, and emits the `StartSlot` broadcast before moving straight to
    /// `Free`.
    pub fn start_slot(
        &self,
        slot: Slot,
        next_superblock_number: u64,
        last_superblock_hash: Hash32,
        active_chains: BTreeSet<ChainId>,
    ) -> Vec<SlotAction> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let seal_at = now + inner.config.slot_duration.mul_f64(inner.config.seal_fraction);
        let end_at = now + inner.config.slot_duration;

        let mut expected_blocks = BTreeMap::new();
        let mut requests = Vec::new();
        for chain_id in &active_chains {
            let tip = inner.chain_tips.get(chain_id).copied().unwrap_or_else(ChainTip::genesis);
            let req = L2BlockRequest {
                chain_id: chain_id.clone(),
                block_number: tip.next_block_number,
                parent_hash: tip.last_hash,
            };
            expected_blocks.insert(chain_id.clone(), req.clone());
            requests.push(req);
        }

        inner.record = SlotRecord {
            slot,
            state: SlotState::Free,
            participants: active_chains,
            expected_blocks,
            decided_xts: Vec::new(),
            included_xts: BTreeSet::new(),
            received_blocks: BTreeMap::new(),
            started_at: now,
            seal_at,
            end_at,
            in_flight: None,
            next_sequence_number: 1,
            seal_pending: false,
        };

        tracing::info!(slot = slot.0, chains = requests.len(), "slot started");
        vec![SlotAction::Broadcast(Payload::StartSlot(StartSlot {
            slot,
            next_superblock_number,
            last_superblock_hash,
            requests,
        }))]
    }

    /// Validates and enqueues an incoming `XTRequest` (§4.4 queue
    /// discipline + chain-id allowlist). Valid at any slot state: requests
    /// arriving during `Sealing` simply sit in the FIFO for a later slot.
    pub fn enqueue_request(&self, request: XtRequest) -> Result<(), EnqueueError> {
        let mut inner = self.inner.lock().unwrap();
        let chains = request.participating_chains();
        if chains.is_empty() {
            return Err(EnqueueError::EmptyParticipants);
        }
        for chain in &chains {
            if !inner.record.participants.contains(chain) {
                return Err(EnqueueError::UnknownParticipant(chain.clone()));
            }
        }
        let expires_at = inner.config.request_expiration.map(|d| Instant::now() + d);
        inner.queue.push(request, expires_at);
        Ok(())
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// `Free`'s dequeue step (§4.4): pops the next ready request, starts
    /// its 2PC instance, and locks. A no-op if not `Free`, past the seal
    /// cutover, or the queue is empty.
    pub fn try_dequeue(&self, engine: &Engine) -> Vec<SlotAction> {
        let mut inner = self.inner.lock().unwrap();
        if inner.record.state != SlotState::Free {
            return Vec::new();
        }
        let now = Instant::now();
        if now >= inner.record.seal_at {
            return Vec::new();
        }
        let Some(request) = inner.queue.pop_ready(now) else { return Vec::new() };

        let seq = inner.record.next_sequence_number;
        let slot = inner.record.slot;
        match engine.start_instance(slot, seq, &request) {
            Ok(xt_id) => {
                inner.record.in_flight = Some((xt_id, seq));
                inner.record.next_sequence_number += 1;
                inner.record.state = SlotState::Locked;
                tracing::info!(slot = slot.0, seq, %xt_id, "xT locked");
                vec![SlotAction::Broadcast(Payload::StartSc(StartSc {
                    slot,
                    xt_sequence_number: seq,
                    xt_id,
                    xt_request: request,
                }))]
            }
            Err(e) => {
                tracing::warn!(slot = slot.0, error = %e, "dropping xT request that failed to start");
                Vec::new()
            }
        }
    }

    /// Forwards a `Vote` to the engine after confirming the voting chain
    /// is in this slot's allowlist (§4.4 chain-id allowlist).
    pub fn check_vote_chain(&self, sender_chain_id: &ChainId) -> Result<(), VoteDispatchError> {
        let inner = self.inner.lock().unwrap();
        if inner.record.participants.contains(sender_chain_id) {
            Ok(())
        } else {
            Err(VoteDispatchError::UnknownParticipant)
        }
    }

    /// Applies a `DecidedEvent` fired by the engine (§4.4 `Locked`): always
    /// broadcasts `Decided`; if the event matches this slot's current
    /// in-flight xT, updates `decidedXts`/unlocks, and — if the clock
    /// already crossed seal while locked — proceeds straight to `Sealing`.
    pub fn on_decided(&self, event: DecidedEvent) -> Vec<SlotAction> {
        let mut inner = self.inner.lock().unwrap();
        let mut actions = vec![SlotAction::Broadcast(Payload::Decided(Decided {
            xt_id: event.xt_id,
            decision: matches!(event.decision, Decision::Commit),
        }))];

        if inner.record.in_flight != Some((event.xt_id, event.sequence_number)) {
            return actions;
        }
        inner.record.in_flight = None;
        if matches!(event.decision, Decision::Commit) {
            inner.record.decided_xts.push(event.xt_id);
        }

        if inner.record.seal_pending {
            actions.extend(enter_sealing(&mut inner.record));
        } else {
            inner.record.state = SlotState::Free;
        }
        actions
    }

    /// Drives clock-triggered transitions (§4.4 transitions table). Call
    /// periodically from the coordinator's clock task.
    pub fn on_clock_tick(&self, now: Instant) -> Vec<SlotAction> {
        let mut inner = self.inner.lock().unwrap();
        match inner.record.state {
            SlotState::Free if now >= inner.record.seal_at => enter_sealing(&mut inner.record),
            SlotState::Locked if now >= inner.record.seal_at => {
                inner.record.seal_pending = true;
                Vec::new()
            }
            SlotState::Sealing if now >= inner.record.end_at => {
                vec![SlotAction::SealReady(inner.record.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Accepts an `L2Block` into the record after checking it against this
    /// slot's `expectedBlocks[chainId]` (§4.5 "`blockNumber` and
    /// `parentHash` MUST match `expectedBlocks[chainId]`; reject
    /// mismatches"). Inclusion-subset checking against the final
    /// `includedXts` set is `sp_superblock`'s job at seal time. Returns a
    /// seal-ready action if this was the last expected block.
    pub fn accept_l2_block(&self, chain_id: &ChainId, block: L2Block) -> Result<Vec<SlotAction>, RecordBlockError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.record.state != SlotState::Sealing {
            return Err(RecordBlockError::NotSealing);
        }
        let Some(expected) = inner.record.expected_blocks.get(chain_id) else {
            return Err(RecordBlockError::UnexpectedChain);
        };
        if block.block_number != expected.block_number || block.parent_block_hash != expected.parent_hash {
            return Err(RecordBlockError::ContentMismatch);
        }
        if inner.record.received_blocks.contains_key(chain_id) {
            return Err(RecordBlockError::Duplicate);
        }
        inner.record.received_blocks.insert(chain_id.clone(), block);
        if inner.record.all_expected_blocks_received() {
            Ok(vec![SlotAction::SealReady(inner.record.clone())])
        } else {
            Ok(Vec::new())
        }
    }

    /// Called by the coordinator after `sp_superblock::assemble` succeeds:
    /// advances each accepted chain's tip and resets to `Starting`.
    pub fn complete_seal(&self, accepted: &BTreeMap<ChainId, L2Block>) {
        let mut inner = self.inner.lock().unwrap();
        for (chain_id, block) in accepted {
            inner.chain_tips.insert(
                chain_id.clone(),
                ChainTip { next_block_number: block.block_number + 1, last_hash: block.block_hash },
            );
        }
        inner.record.state = SlotState::Starting;
    }

    /// Forces `Rolling` (§4.4): re-arms the same slot number from scratch
    /// and broadcasts `RollBackAndStartSlot`, the rollback counterpart of
    /// `start_slot`'s `StartSlot`. Chain tips are left untouched (no block
    /// was accepted this attempt), so `expectedBlocks` is rebuilt from the
    /// same tips `start_slot` would see. Lands directly in `Free`, not
    /// `Starting`: the caller must not follow this with its own
    /// `start_slot` call, or the slot would double-broadcast and skip
    /// ahead to the next slot number.
    pub fn force_rollback(&self, next_superblock_number: u64, last_superblock_hash: Hash32) -> Vec<SlotAction> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner.record.slot;
        let participants = inner.record.participants.clone();
        let now = Instant::now();
        let seal_at = now + inner.config.slot_duration.mul_f64(inner.config.seal_fraction);
        let end_at = now + inner.config.slot_duration;

        let mut expected_blocks = BTreeMap::new();
        let mut requests = Vec::new();
        for chain_id in &participants {
            let tip = inner.chain_tips.get(chain_id).copied().unwrap_or_else(ChainTip::genesis);
            let req = L2BlockRequest {
                chain_id: chain_id.clone(),
                block_number: tip.next_block_number,
                parent_hash: tip.last_hash,
            };
            expected_blocks.insert(chain_id.clone(), req.clone());
            requests.push(req);
        }

        inner.record = SlotRecord {
            slot,
            state: SlotState::Free,
            participants,
            expected_blocks,
            decided_xts: Vec::new(),
            included_xts: BTreeSet::new(),
            received_blocks: BTreeMap::new(),
            started_at: now,
            seal_at,
            end_at,
            in_flight: None,
            next_sequence_number: 1,
            seal_pending: false,
        };

        tracing::warn!(slot = slot.0, "slot rolled back");
        vec![SlotAction::Broadcast(Payload::RollBackAndStartSlot(RollBackAndStartSlot {
            current_slot: slot,
            next_superblock_number,
            last_superblock_hash,
            requests,
        }))]
    }
}

fn enter_sealing(record: &mut SlotRecord) -> Vec<SlotAction> {
    record.state = SlotState::Sealing;
    record.seal_pending = false;
    record.included_xts = record.decided_xts.iter().copied().collect();
    tracing::info!(slot = record.slot.0, included = record.included_xts.len(), "slot sealing");
    vec![SlotAction::Broadcast(Payload::RequestSeal(RequestSeal {
        slot: record.slot,
        included_xts: record.decided_xts.clone(),
    }))]
}
