use crate::history::{History, HistoryEntry};
use crate::instance::{Decision, InstanceSnapshot, InstanceState, StartInstanceError, VoteError};
pub use crate::instance::AbortReason;
use sp_base::{ChainId, Slot, XtId};
use sp_wire::{CircMessage, XtRequest};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

/// Fired exactly once per xT, the instant it transitions `Undecided ->
/// {Commit, Abort}` (§4.3 "OnDecided"). The sink must return quickly: it
/// runs inside the instance's critical section. Slower work (broadcasting
/// `Decided`, updating a `SlotRecord`) belongs on a worker the sink hands
/// off to, per §9's "callbacks never hold coordinator locks".
pub trait DecidedSink: Send + Sync {
    fn on_decided(&self, event: DecidedEvent);
}

impl<F: Fn(DecidedEvent) + Send + Sync> DecidedSink for F {
    fn on_decided(&self, event: DecidedEvent) {
        self(event)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DecidedEvent {
    pub xt_id: XtId,
    pub slot: Slot,
    pub sequence_number: u64,
    pub decision: Decision,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Wall-clock budget an xT gets before it is force-aborted (§4.3).
    pub instance_timeout: Duration,
    pub history_max_instances: usize,
    pub history_retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            instance_timeout: Duration::from_secs(10),
            history_max_instances: 4096,
            history_retention: Duration::from_secs(3600),
        }
    }
}

struct Inner {
    config: EngineConfig,
    instances: RwLock<HashMap<XtId, Arc<Mutex<InstanceState>>>>,
    circ_staging: Mutex<HashMap<XtId, Vec<CircMessage>>>,
    history: Mutex<History>,
    sink: Box<dyn DecidedSink>,
}

/// The 2PC engine (§3, §4.3): owns every in-flight `XTInstance`, applies the
/// deterministic vote-tally decision rule, and keeps a bounded history of
/// recently-decided xTs for `Snapshot`/`History`. Cheap to clone — it is a
/// handle onto shared state, the way `sp-transport`'s connection table is.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(config: EngineConfig, sink: impl DecidedSink + 'static) -> Self {
        let history = History::new(config.history_max_instances, config.history_retention);
        Engine {
            inner: Arc::new(Inner {
                config,
                instances: RwLock::new(HashMap::new()),
                circ_staging: Mutex::new(HashMap::new()),
                history: Mutex::new(history),
                sink: Box::new(sink),
            }),
        }
    }

    /// Starts a new xT instance (§4.3 StartInstance). Drains any CIRC
    /// messages that arrived before this instance existed, and arms the
    /// instance timer.
    pub fn start_instance(&self, slot: Slot, sequence_number: u64, request: &XtRequest) -> Result<XtId, StartInstanceError> {
        let xt_id = request.xt_id();
        let participants: BTreeSet<ChainId> = request.participating_chains().into_iter().collect();
        if participants.is_empty() {
            return Err(StartInstanceError::EmptyParticipants);
        }

        let deadline = Instant::now() + self.inner.config.instance_timeout;
        let mut state = InstanceState::new(xt_id, slot, sequence_number, participants.clone(), deadline);

        {
            let mut staging = self.inner.circ_staging.lock().unwrap();
            if let Some(staged) = staging.remove(&xt_id) {
                for msg in staged {
                    stage_into(&mut state, &participants, msg);
                }
            }
        }

        {
            let mut instances = self.inner.instances.write().unwrap();
            if instances.contains_key(&xt_id) {
                return Err(StartInstanceError::DuplicateInstance);
            }
            instances.insert(xt_id, Arc::new(Mutex::new(state)));
        }

        tracing::info!(%xt_id, slot = slot.0, participants = participants.len(), "xT instance started");

        let engine = self.clone();
        let timeout_at = deadline;
        thread::spawn(move || {
            let now = Instant::now();
            if timeout_at > now {
                thread::sleep(timeout_at - now);
            }
            engine.timeout(xt_id);
        });

        Ok(xt_id)
    }

    /// Records one chain's vote (§4.3 RecordVote). Returns the decision in
    /// effect immediately after applying the vote — `Undecided` if the xT is
    /// still waiting on other participants.
    pub fn record_vote(&self, xt_id: XtId, from_chain: &ChainId, vote: bool) -> Result<Decision, VoteError> {
        let handle = {
            let instances = self.inner.instances.read().unwrap();
            instances.get(&xt_id).cloned()
        };
        let Some(handle) = handle else { return Err(VoteError::UnknownInstance) };

        let mut state = handle.lock().unwrap();
        if state.decision.is_terminal() {
            return Ok(state.decision);
        }
        if !state.participants.contains(from_chain) {
            return Err(VoteError::NonParticipant);
        }
        if state.votes.contains_key(from_chain) {
            return Err(VoteError::DuplicateVote);
        }

        state.votes.insert(from_chain.clone(), vote);

        if !vote {
            self.decide(&mut state, Decision::Abort(AbortReason::Vote));
        } else if state.votes.len() == state.participants.len() && state.votes.values().all(|v| *v) {
            self.decide(&mut state, Decision::Commit);
        }

        let decision = state.decision;
        drop(state);
        if decision.is_terminal() {
            self.finalize(xt_id);
        }
        Ok(decision)
    }

    /// Stages or delivers a CIRC message (§4.3 RecordCIRC). Messages for an
    /// xT that hasn't started yet are buffered; messages for an xT that has
    /// already terminated and been finalized are dropped.
    pub fn record_circ(&self, msg: CircMessage) {
        let xt_id = msg.xt_id;
        let handle = {
            let instances = self.inner.instances.read().unwrap();
            instances.get(&xt_id).cloned()
        };

        if let Some(handle) = handle {
            let mut state = handle.lock().unwrap();
            let participants = state.participants.clone();
            stage_into(&mut state, &participants, msg);
            return;
        }

        if self.inner.history.lock().unwrap().contains(xt_id) {
            tracing::debug!(%xt_id, "dropping CIRC for already-finalized xT");
            return;
        }

        let mut staging = self.inner.circ_staging.lock().unwrap();
        staging.entry(xt_id).or_default().push(msg);
    }

    /// Forces a decision if the instance is still undecided (§4.3 Timeout).
    /// Safe to call after the instance has already decided by vote: it is a
    /// no-op then, since `decide` only runs from `Undecided`.
    pub fn timeout(&self, xt_id: XtId) {
        let handle = {
            let instances = self.inner.instances.read().unwrap();
            instances.get(&xt_id).cloned()
        };
        let Some(handle) = handle else { return };

        let mut state = handle.lock().unwrap();
        if state.decision.is_terminal() {
            return;
        }
        self.decide(&mut state, Decision::Abort(AbortReason::Timeout));
        drop(state);
        self.finalize(xt_id);
    }

    /// A read-only view of the live instance, or `None` if it has already
    /// been finalized into history (or never existed).
    pub fn snapshot(&self, xt_id: XtId) -> Option<InstanceSnapshot> {
        let instances = self.inner.instances.read().unwrap();
        instances.get(&xt_id).map(|h| h.lock().unwrap().snapshot())
    }

    /// The most-recently-decided xTs, newest first, capped at `limit`.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.inner.history.lock().unwrap().recent(limit)
    }

    /// Force-aborts every still-undecided instance (used by `Stop()`, §4.1).
    pub fn abort_all_in_flight(&self) {
        let ids: Vec<XtId> = self.inner.instances.read().unwrap().keys().copied().collect();
        for xt_id in ids {
            self.timeout(xt_id);
        }
    }

    /// Mutates `state.decision` from `Undecided` to `decision` and fires the
    /// sink. Must be called with `state`'s lock held.
    fn decide(&self, state: &mut InstanceState, decision: Decision) {
        state.decision = decision;
        tracing::info!(xt_id = %state.xt_id, slot = state.slot.0, %decision, "xT decided");
        self.inner.sink.on_decided(DecidedEvent {
            xt_id: state.xt_id,
            slot: state.slot,
            sequence_number: state.sequence_number,
            decision,
        });
    }

    /// Moves a decided instance out of the live table and into history.
    fn finalize(&self, xt_id: XtId) {
        let removed = self.inner.instances.write().unwrap().remove(&xt_id);
        let Some(handle) = removed else { return };
        let state = handle.lock().unwrap();
        if !state.decision.is_terminal() {
            return;
        }
        self.inner.history.lock().unwrap().push(HistoryEntry {
            xt_id: state.xt_id,
            slot: state.slot,
            sequence_number: state.sequence_number,
            participants: state.participants.iter().cloned().collect(),
            votes: state.votes.clone(),
            decision: state.decision,
            decided_at: Instant::now(),
        });
    }
}

fn stage_into(state: &mut InstanceState, participants: &BTreeSet<ChainId>, msg: CircMessage) {
    if !participants.contains(&msg.source_chain) {
        tracing::debug!(xt_id = %msg.xt_id, source = %msg.source_chain, "dropping CIRC from non-participant chain");
        return;
    }
    state.circ_messages.entry(msg.source_chain.clone()).or_default().push_back(msg);
}
