//! C3: the two-phase-commit engine (§3, §4.3). Each cross-rollup
//! transaction (xT) gets exactly one [`instance::InstanceState`], tracked
//! from `StartInstance` through a deterministic `Commit`/`Abort` decision,
//! with CIRC messages staged against it and a bounded [`history::History`]
//! kept for observability after it's torn down.

mod engine;
mod history;
mod instance;

pub use engine::{DecidedEvent, DecidedSink, Engine, EngineConfig};
pub use history::HistoryEntry;
pub use instance::{AbortReason, Decision, InstanceSnapshot, StartInstanceError, VoteError};

#[cfg(test)]
mod tests {
    use super::*;
    use sp_base::ChainId;
    use sp_wire::{ChainTxs, CircMessage, XtRequest};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn chain(b: u8) -> ChainId {
        ChainId::from_bytes(vec![b])
    }

    fn request(chains: &[u8]) -> XtRequest {
        XtRequest {
            transactions: chains.iter().map(|&b| ChainTxs { chain_id: chain(b), tx_bytes: vec![vec![1]] }).collect(),
        }
    }

    struct RecordingSink(Arc<Mutex<Vec<DecidedEvent>>>);

    impl DecidedSink for RecordingSink {
        fn on_decided(&self, event: DecidedEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn engine_with_recorder(timeout: Duration) -> (Engine, Arc<Mutex<Vec<DecidedEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let config = EngineConfig { instance_timeout: timeout, ..EngineConfig::default() };
        let engine = Engine::new(config, RecordingSink(events.clone()));
        (engine, events)
    }

    #[test]
    fn unanimous_yes_votes_commit() {
        let (engine, events) = engine_with_recorder(Duration::from_secs(5));
        let req = request(&[1, 2]);
        let xt_id = engine.start_instance(sp_base::Slot(1), 0, &req).unwrap();

        assert_eq!(engine.record_vote(xt_id, &chain(1), true).unwrap(), Decision::Undecided);
        let decision = engine.record_vote(xt_id, &chain(2), true).unwrap();

        assert_eq!(decision, Decision::Commit);
        assert_eq!(events.lock().unwrap().len(), 1);
        assert!(engine.snapshot(xt_id).is_none(), "decided instance is finalized out of the live table");
        assert_eq!(engine.history(10)[0].decision, Decision::Commit);
    }

    #[test]
    fn a_single_no_vote_aborts_immediately() {
        let (engine, events) = engine_with_recorder(Duration::from_secs(5));
        let req = request(&[1, 2, 3]);
        let xt_id = engine.start_instance(sp_base::Slot(1), 0, &req).unwrap();

        let decision = engine.record_vote(xt_id, &chain(2), false).unwrap();

        assert_eq!(decision, Decision::Abort(AbortReason::Vote));
        assert_eq!(events.lock().unwrap().len(), 1);
        // Chain 1's later vote lands after the decision and is idempotent.
        assert_eq!(engine.record_vote(xt_id, &chain(1), true).unwrap(), Decision::Abort(AbortReason::Vote));
    }

    #[test]
    fn duplicate_and_non_participant_votes_are_rejected() {
        let (engine, _events) = engine_with_recorder(Duration::from_secs(5));
        let req = request(&[1, 2]);
        let xt_id = engine.start_instance(sp_base::Slot(1), 0, &req).unwrap();

        engine.record_vote(xt_id, &chain(1), true).unwrap();
        assert_eq!(engine.record_vote(xt_id, &chain(1), true), Err(VoteError::DuplicateVote));
        assert_eq!(engine.record_vote(xt_id, &chain(9), true), Err(VoteError::NonParticipant));
    }

    #[test]
    fn voting_on_an_unknown_instance_errors() {
        let (engine, _events) = engine_with_recorder(Duration::from_secs(5));
        let bogus = request(&[1]).xt_id();
        assert_eq!(engine.record_vote(bogus, &chain(1), true), Err(VoteError::UnknownInstance));
    }

    #[test]
    fn starting_the_same_xt_twice_is_rejected() {
        let (engine, _events) = engine_with_recorder(Duration::from_secs(5));
        let req = request(&[1]);
        engine.start_instance(sp_base::Slot(1), 0, &req).unwrap();
        assert_eq!(engine.start_instance(sp_base::Slot(1), 1, &req), Err(StartInstanceError::DuplicateInstance));
    }

    #[test]
    fn empty_participant_list_is_rejected() {
        let (engine, _events) = engine_with_recorder(Duration::from_secs(5));
        let req = XtRequest { transactions: vec![] };
        assert_eq!(engine.start_instance(sp_base::Slot(1), 0, &req), Err(StartInstanceError::EmptyParticipants));
    }

    #[test]
    fn timeout_force_aborts_an_undecided_instance() {
        let (engine, events) = engine_with_recorder(Duration::from_millis(20));
        let req = request(&[1, 2]);
        let xt_id = engine.start_instance(sp_base::Slot(1), 0, &req).unwrap();
        engine.record_vote(xt_id, &chain(1), true).unwrap();

        std::thread::sleep(Duration::from_millis(80));

        assert!(engine.snapshot(xt_id).is_none());
        let entry = events.lock().unwrap().last().cloned().unwrap();
        assert_eq!(entry.decision, Decision::Abort(AbortReason::Timeout));
    }

    #[test]
    fn a_late_vote_after_timeout_is_idempotent() {
        let (engine, _events) = engine_with_recorder(Duration::from_millis(20));
        let req = request(&[1, 2]);
        let xt_id = engine.start_instance(sp_base::Slot(1), 0, &req).unwrap();

        std::thread::sleep(Duration::from_millis(80));

        assert_eq!(engine.record_vote(xt_id, &chain(1), true).unwrap(), Decision::Abort(AbortReason::Timeout));
    }

    #[test]
    fn circ_arriving_before_the_instance_is_staged_then_drained() {
        let (engine, _events) = engine_with_recorder(Duration::from_secs(5));
        let req = request(&[1, 2]);
        let xt_id = req.xt_id();

        engine.record_circ(CircMessage {
            source_chain: chain(1),
            destination_chain: chain(2),
            xt_id,
            label: "note".into(),
            source: vec![],
            receiver: vec![],
            data: vec![7],
        });

        engine.start_instance(sp_base::Slot(1), 0, &req).unwrap();
        let snap = engine.snapshot(xt_id).unwrap();
        assert_eq!(snap.decision, Decision::Undecided);
    }

    #[test]
    fn circ_for_a_finalized_xt_is_dropped_not_restaged() {
        let (engine, _events) = engine_with_recorder(Duration::from_secs(5));
        let req = request(&[1]);
        let xt_id = engine.start_instance(sp_base::Slot(1), 0, &req).unwrap();
        engine.record_vote(xt_id, &chain(1), true).unwrap();

        engine.record_circ(CircMessage {
            source_chain: chain(1),
            destination_chain: chain(1),
            xt_id,
            label: "late".into(),
            source: vec![],
            receiver: vec![],
            data: vec![],
        });

        // No instance exists to stage against, and the xT is in history, so
        // re-starting it (a different sequence number would reuse this id in
        // practice it never would, since xtId is content-addressed) must not
        // see a leftover staged message.
        assert!(engine.snapshot(xt_id).is_none());
    }

    #[test]
    fn abort_all_in_flight_force_decides_everything_still_live() {
        let (engine, events) = engine_with_recorder(Duration::from_secs(30));
        let a = engine.start_instance(sp_base::Slot(1), 0, &request(&[1])).unwrap();
        let b = engine.start_instance(sp_base::Slot(1), 1, &request(&[2])).unwrap();

        engine.abort_all_in_flight();

        assert!(engine.snapshot(a).is_none());
        assert!(engine.snapshot(b).is_none());
        assert_eq!(events.lock().unwrap().len(), 2);
    }
}
