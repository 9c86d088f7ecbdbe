//! C4: the slot state machine (§3, §4.4). A [`SlotMachine`] drives one
//! [`SlotRecord`] through `Starting → Free → Locked → Sealing → (Starting |
//! Rolling)`, dequeuing xTs into [`sp_consensus::Engine`] and handing seal
//! completion off to the caller (`sp_superblock::assemble`) rather than
//! computing hashes itself.

mod machine;
mod queue;
mod record;

pub use machine::{EnqueueError, RecordBlockError, SlotAction, SlotMachine, SlotMachineConfig, VoteDispatchError};
pub use queue::PendingRequest;
pub use record::{ChainTip, SlotRecord, SlotState};

#[cfg(test)]
mod tests {
    use super::*;
    use sp_base::{ChainId, Hash32, Slot};
    use sp_consensus::{DecidedSink, Engine, EngineConfig};
    use sp_wire::{ChainTxs, L2Block, Payload, XtRequest};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn chain(b: u8) -> ChainId {
        ChainId::from_bytes(vec![b])
    }

    fn request(chains: &[u8]) -> XtRequest {
        XtRequest {
            transactions: chains.iter().map(|&b| ChainTxs { chain_id: chain(b), tx_bytes: vec![vec![1]] }).collect(),
        }
    }

    struct ForwardingSink(SlotMachine);

    impl DecidedSink for ForwardingSink {
        fn on_decided(&self, event: sp_consensus::DecidedEvent) {
            self.0.on_decided(event);
        }
    }

    fn harness(instance_timeout: Duration) -> (SlotMachine, Engine) {
        let slot = SlotMachine::new(SlotMachineConfig { slot_duration: Duration::from_secs(3600), ..Default::default() });
        let engine = Engine::new(
            EngineConfig { instance_timeout, ..EngineConfig::default() },
            ForwardingSink(slot.clone()),
        );
        (slot, engine)
    }

    fn start(slot: &SlotMachine, active: &[u8]) {
        let chains: std::collections::BTreeSet<ChainId> = active.iter().map(|&b| chain(b)).collect();
        slot.start_slot(Slot(7), 1, Hash32::ZERO, chains);
    }

    #[test]
    fn two_chain_commit_reaches_sealing_with_included_xt() {
        let (slot, engine) = harness(Duration::from_secs(10));
        start(&slot, &[1, 2]);
        assert_eq!(slot.state(), SlotState::Free);

        slot.enqueue_request(request(&[1, 2])).unwrap();
        let actions = slot.try_dequeue(&engine);
        assert!(matches!(actions[0], SlotAction::Broadcast(Payload::StartSc(_))));
        assert_eq!(slot.state(), SlotState::Locked);

        let xt_id = request(&[1, 2]).xt_id();
        engine.record_vote(xt_id, &chain(1), true).unwrap();
        engine.record_vote(xt_id, &chain(2), true).unwrap();

        assert_eq!(slot.state(), SlotState::Free);
        assert_eq!(slot.record_snapshot().decided_xts, vec![xt_id]);
    }

    #[test]
    fn a_false_vote_aborts_and_unlocks_without_recording_the_xt() {
        let (slot, engine) = harness(Duration::from_secs(10));
        start(&slot, &[1, 2]);
        slot.enqueue_request(request(&[1, 2])).unwrap();
        slot.try_dequeue(&engine);

        let xt_id = request(&[1, 2]).xt_id();
        engine.record_vote(xt_id, &chain(1), false).unwrap();

        assert_eq!(slot.state(), SlotState::Free);
        assert!(slot.record_snapshot().decided_xts.is_empty());
    }

    #[test]
    fn sequential_xts_get_strictly_increasing_sequence_numbers() {
        let (slot, engine) = harness(Duration::from_secs(10));
        start(&slot, &[1, 2]);

        slot.enqueue_request(request(&[1, 2])).unwrap();
        let a = slot.try_dequeue(&engine);
        let Some(SlotAction::Broadcast(Payload::StartSc(sc1))) = a.into_iter().next() else { panic!() };
        assert_eq!(sc1.xt_sequence_number, 1);
        engine.record_vote(sc1.xt_id, &chain(1), true).unwrap();
        engine.record_vote(sc1.xt_id, &chain(2), true).unwrap();

        slot.enqueue_request(request(&[1])).unwrap();
        let b = slot.try_dequeue(&engine);
        let Some(SlotAction::Broadcast(Payload::StartSc(sc2))) = b.into_iter().next() else { panic!() };
        assert_eq!(sc2.xt_sequence_number, 2);
    }

    #[test]
    fn enqueueing_an_xt_for_an_unknown_chain_is_rejected() {
        let (slot, _engine) = harness(Duration::from_secs(10));
        start(&slot, &[1]);
        assert_eq!(slot.enqueue_request(request(&[9])), Err(EnqueueError::UnknownParticipant(chain(9))));
    }

    #[test]
    fn seal_crossing_while_locked_waits_then_enters_sealing() {
        let slot = SlotMachine::new(SlotMachineConfig { slot_duration: Duration::from_millis(40), seal_fraction: 0.5, ..Default::default() });
        let engine = Engine::new(
            EngineConfig { instance_timeout: Duration::from_secs(5), ..EngineConfig::default() },
            ForwardingSink(slot.clone()),
        );
        start(&slot, &[1]);
        slot.enqueue_request(request(&[1])).unwrap();
        let a = slot.try_dequeue(&engine);
        let Some(SlotAction::Broadcast(Payload::StartSc(sc))) = a.into_iter().next() else { panic!() };

        std::thread::sleep(Duration::from_millis(30));
        let tick = slot.on_clock_tick(Instant::now());
        assert!(tick.is_empty(), "still locked, must not seal yet");
        assert_eq!(slot.state(), SlotState::Locked);

        engine.record_vote(sc.xt_id, &chain(1), true).unwrap();
        assert_eq!(slot.state(), SlotState::Sealing, "decided while seal-pending must jump straight to Sealing");
    }

    #[test]
    fn all_blocks_received_triggers_seal_ready() {
        let slot = SlotMachine::new(SlotMachineConfig { slot_duration: Duration::from_millis(1), ..Default::default() });
        start(&slot, &[1]);
        std::thread::sleep(Duration::from_millis(5));
        slot.on_clock_tick(Instant::now());
        assert_eq!(slot.state(), SlotState::Sealing);

        let block = L2Block {
            slot: Slot(7),
            chain_id: chain(1),
            block_number: 0,
            block_hash: Hash32([9u8; 32]),
            parent_block_hash: Hash32::ZERO,
            included_xts: vec![],
            block_bytes: vec![1, 2, 3],
        };
        let actions = slot.accept_l2_block(&chain(1), block).unwrap();
        assert!(matches!(actions.as_slice(), [SlotAction::SealReady(_)]));
    }

    #[test]
    fn l2_block_outside_sealing_is_rejected() {
        let (slot, _engine) = harness(Duration::from_secs(10));
        start(&slot, &[1]);
        let block = L2Block {
            slot: Slot(7),
            chain_id: chain(1),
            block_number: 0,
            block_hash: Hash32::ZERO,
            parent_block_hash: Hash32::ZERO,
            included_xts: vec![],
            block_bytes: vec![],
        };
        assert_eq!(slot.accept_l2_block(&chain(1), block), Err(RecordBlockError::NotSealing));
    }

    #[test]
    fn rollback_keeps_the_same_slot_number() {
        let (slot, _engine) = harness(Duration::from_secs(10));
        start(&slot, &[1]);
        let actions = slot.force_rollback(1, Hash32::ZERO);
        let Some(SlotAction::Broadcast(Payload::RollBackAndStartSlot(rb))) = actions.into_iter().next() else { panic!() };
        assert_eq!(rb.current_slot, Slot(7));
        assert_eq!(slot.state(), SlotState::Starting);
    }
}
