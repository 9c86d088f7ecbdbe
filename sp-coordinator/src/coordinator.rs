use crate::collaborators::{ProofService, SettlementPublisher};
use crate::dispatch::dispatch;
use crate::registry::ChainRegistry;
use crate::stats::Stats;
use sp_base::{Error, Hash32, Slot};
use sp_consensus::{DecidedEvent, DecidedSink, Engine, EngineConfig};
use sp_slot::{SlotAction, SlotMachine, SlotMachineConfig};
use sp_superblock::{assemble, SuperblockPolicy, SuperblockStore};
use sp_transport::{Transport, TransportConfig};
use sp_wire::{L2Block, Message, Payload};
use std::net::ToSocketAddrs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct CoordinatorConfig {
    pub sender_id: String,
    pub slot: SlotMachineConfig,
    pub instance: EngineConfig,
    pub transport: TransportConfig,
    pub superblock_policy: SuperblockPolicy,
    pub superblock_history: usize,
    pub clock_tick: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            sender_id: "sp".into(),
            slot: SlotMachineConfig::default(),
            instance: EngineConfig::default(),
            transport: TransportConfig::default(),
            superblock_policy: SuperblockPolicy::default(),
            superblock_history: 256,
            clock_tick: Duration::from_millis(50),
        }
    }
}

pub(crate) struct Inner {
    pub config: CoordinatorConfig,
    pub transport: Transport,
    pub engine: Engine,
    pub slot: SlotMachine,
    pub store: SuperblockStore,
    pub registry: Arc<dyn ChainRegistry>,
    pub publisher: Arc<dyn SettlementPublisher>,
    pub proof: Arc<dyn ProofService>,
    pub stats: Arc<Stats>,
    pub next_superblock_number: Mutex<u64>,
    pub shutdown: AtomicBool,
    pub clock_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

/// Bridges C3's `OnDecided` to C4 without `Engine` and `SlotMachine` owning
/// each other: holds a `Weak` back to the coordinator's `Inner` (obtained
/// via `Arc::new_cyclic` before `Inner` exists) rather than a strong `Arc`,
/// so `Inner -> Engine -> sink -> Inner` never keeps itself alive.
struct ForwardingSink {
    slot: SlotMachine,
    inner: Weak<Inner>,
}

impl DecidedSink for ForwardingSink {
    /// Per §5 "callback invocations run on dedicated worker tasks ... they
    /// never hold coordinator locks": hands the event to a fresh thread
    /// and returns immediately, so `Engine::record_vote`/`timeout` never
    /// block on `Decided` broadcast or slot-unlock bookkeeping while
    /// holding the instance's own lock.
    fn on_decided(&self, event: DecidedEvent) {
        let slot = self.slot.clone();
        let inner = self.inner.clone();
        thread::spawn(move || {
            let actions = slot.on_decided(event);
            if let Some(inner) = inner.upgrade() {
                Stats::incr(&inner.stats.xts_decided);
                if matches!(event.decision, sp_consensus::Decision::Abort(sp_consensus::AbortReason::Timeout)) {
                    Stats::incr(&inner.stats.xts_timed_out);
                }
                Coordinator { inner }.apply_actions(actions);
            }
        });
    }
}

/// The coordinator task (§5 "single-writer coordinator task"): owns
/// `SlotMachine` + `Engine` + the superblock store, wires `sp-transport`'s
/// inbound dispatch to them, and turns `SlotAction`s into outbound
/// broadcasts and superblock assembly. An owned value, not a trait
/// object or a singleton.
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        registry: Arc<dyn ChainRegistry>,
        publisher: Arc<dyn SettlementPublisher>,
        proof: Arc<dyn ProofService>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let slot = SlotMachine::new(config.slot.clone());
            let engine = Engine::new(config.instance.clone(), ForwardingSink { slot: slot.clone(), inner: weak.clone() });
            let store = SuperblockStore::new(config.superblock_history);
            Inner {
                transport: Transport::new(config.transport.clone()),
                engine,
                slot,
                store,
                registry,
                publisher,
                proof,
                stats: Arc::new(Stats::new()),
                next_superblock_number: Mutex::new(1),
                shutdown: AtomicBool::new(false),
                clock_thread: Mutex::new(None),
                config,
            }
        });
        Coordinator { inner }
    }

    pub fn stats(&self) -> &Stats {
        &self.inner.stats
    }

    pub fn store(&self) -> &SuperblockStore {
        &self.inner.store
    }

    /// Starts the transport listener, registers dispatch as the inbound
    /// handler, begins the first slot, and launches the periodic clock
    /// tick thread (§5 "slot clock runs on its own periodic task").
    pub fn start(&self, listen_addr: impl ToSocketAddrs) -> Result<(), Error> {
        let handler_self = self.clone();
        self.inner.transport.set_handler(Arc::new(move |peer_id, msg| {
            handler_self.on_message(peer_id, msg);
        }));
        self.inner.transport.start(listen_addr)?;

        self.begin_next_slot();

        let tick_self = self.clone();
        let interval = self.inner.config.clock_tick;
        let handle = thread::spawn(move || loop {
            if tick_self.inner.shutdown.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(interval);
            tick_self.apply_actions(tick_self.inner.slot.on_clock_tick(Instant::now()));
        });
        *self.inner.clock_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Cancels the clock, drains the transport, and force-finalizes
    /// in-flight instances as `Abort(Timeout)` (§5 cancellation section).
    pub fn stop(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.engine.abort_all_in_flight();
        self.inner.transport.stop();
        if let Some(handle) = self.inner.clock_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn on_message(&self, peer_id: String, msg: Message) {
        dispatch(self, &peer_id, msg.payload);
    }

    pub(crate) fn broadcast(&self, payload: Payload) {
        let msg = Message::new(self.inner.config.sender_id.clone(), payload);
        self.inner.transport.broadcast(&msg, None);
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub(crate) fn slot(&self) -> &SlotMachine {
        &self.inner.slot
    }

    /// Starts the next slot: snapshots active chains from the registry,
    /// anchors `nextSuperblockNumber`/`lastSuperblockHash` on the store's
    /// latest entry (or genesis), and broadcasts `StartSlot`.
    fn begin_next_slot(&self) {
        let chains = self.inner.registry.active_chains();
        let (next_number, last_hash) = self.next_superblock_anchor();
        let next_slot = Slot(self.inner.slot.record_snapshot().slot.0 + 1);
        self.apply_actions(self.inner.slot.start_slot(next_slot, next_number, last_hash, chains));
    }

    fn next_superblock_anchor(&self) -> (u64, Hash32) {
        match self.inner.store.latest() {
            Some(sb) => (sb.number + 1, sb.hash),
            None => (*self.inner.next_superblock_number.lock().unwrap(), Hash32::ZERO),
        }
    }

    /// Turns `SlotAction`s into wire broadcasts and, for `SealReady`, into
    /// superblock assembly plus the follow-up `complete_seal`/
    /// `force_rollback` call and the start of the next slot.
    pub(crate) fn apply_actions(&self, actions: Vec<SlotAction>) {
        for action in actions {
            match action {
                SlotAction::Broadcast(payload) => self.broadcast(payload),
                SlotAction::SealReady(record) => self.seal(record),
            }
        }
    }

    fn seal(&self, record: sp_slot::SlotRecord) {
        let (number, parent_hash) = self.next_superblock_anchor();
        match assemble(&record, number, parent_hash, self.inner.config.superblock_policy) {
            Ok(superblock) => {
                Stats::incr(&self.inner.stats.superblocks_sealed);
                *self.inner.next_superblock_number.lock().unwrap() = superblock.number + 1;
                self.inner.slot.complete_seal(&record.received_blocks);
                if let Err(e) = self.inner.proof.submit(&superblock) {
                    tracing::error!(number = superblock.number, error = ?e, "proof submission failed");
                }
                if let Err(e) = self.inner.publisher.publish(&superblock, None) {
                    tracing::error!(number = superblock.number, error = ?e, "settlement publish failed");
                }
                self.inner.store.push(superblock);
                self.begin_next_slot();
            }
            Err(e) => {
                Stats::incr(&self.inner.stats.rollbacks);
                tracing::warn!(slot = record.slot.0, error = %e, "sealing failed, rolling back");
                // force_rollback re-arms the same slot and broadcasts
                // RollBackAndStartSlot itself; begin_next_slot must not
                // also run here, or the slot would advance past the
                // rollback and double-broadcast a start.
                self.apply_actions(self.inner.slot.force_rollback(number, parent_hash));
            }
        }
    }

    pub(crate) fn pump_queue(&self) {
        self.apply_actions(self.inner.slot.try_dequeue(&self.inner.engine));
    }

    pub(crate) fn accept_l2_block(&self, chain_id: &sp_base::ChainId, block: L2Block) {
        match self.inner.slot.accept_l2_block(chain_id, block) {
            Ok(actions) => self.apply_actions(actions),
            Err(e) => tracing::warn!(%chain_id, error = %e, "L2Block rejected"),
        }
    }
}
