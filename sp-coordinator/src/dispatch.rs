use crate::coordinator::Coordinator;
use crate::stats::Stats;
use sp_wire::Payload;

/// The dispatch layer (§9 "matches on the message payload variant and
/// looks up a handler in a registered table"). Realized here as a match
/// over `Payload`'s variants, each arm a small named handler over
/// `(coordinator, peer_id, payload)` — the tagged-union routing table the
/// design note describes, without an indirection no caller ever needs.
pub(crate) fn dispatch(coordinator: &Coordinator, peer_id: &str, payload: Payload) {
    match payload {
        Payload::XtRequest(request) => handle_xt_request(coordinator, peer_id, request),
        Payload::Vote(vote) => handle_vote(coordinator, peer_id, vote),
        Payload::Circ(msg) => handle_circ(coordinator, peer_id, msg),
        Payload::L2Block(block) => handle_l2_block(coordinator, peer_id, block),
        Payload::Ping => coordinator.broadcast(Payload::Pong),
        Payload::Pong => {}
        other @ (Payload::StartSlot(_)
        | Payload::RequestSeal(_)
        | Payload::RollBackAndStartSlot(_)
        | Payload::StartSc(_)
        | Payload::Decided(_)) => {
            tracing::warn!(peer = peer_id, payload = ?other, "rejecting SP-outbound-only payload received inbound");
        }
    }
}

fn handle_xt_request(coordinator: &Coordinator, peer_id: &str, request: sp_wire::XtRequest) {
    match coordinator.slot().enqueue_request(request) {
        Ok(()) => coordinator.pump_queue(),
        Err(e) => tracing::warn!(peer = peer_id, error = %e, "XTRequest rejected"),
    }
}

fn handle_vote(coordinator: &Coordinator, peer_id: &str, vote: sp_wire::Vote) {
    if let Err(e) = coordinator.slot().check_vote_chain(&vote.sender_chain_id) {
        tracing::warn!(peer = peer_id, error = %e, "Vote rejected");
        return;
    }
    match coordinator.engine().record_vote(vote.xt_id, &vote.sender_chain_id, vote.vote) {
        Ok(_decision) => Stats::incr(&coordinator.stats().votes_recorded),
        Err(e) => tracing::warn!(peer = peer_id, error = %e, "Vote rejected"),
    }
}

/// Rejects CIRC referencing a chain outside this slot's allowlist at
/// dispatch (§4.4), rather than relying on `stage_into`'s later
/// participant-set filtering to catch it.
fn handle_circ(coordinator: &Coordinator, peer_id: &str, msg: sp_wire::CircMessage) {
    if let Err(e) = coordinator.slot().check_vote_chain(&msg.source_chain) {
        tracing::warn!(peer = peer_id, error = %e, "Circ source chain rejected");
        return;
    }
    if let Err(e) = coordinator.slot().check_vote_chain(&msg.destination_chain) {
        tracing::warn!(peer = peer_id, error = %e, "Circ destination chain rejected");
        return;
    }
    coordinator.engine().record_circ(msg);
}

fn handle_l2_block(coordinator: &Coordinator, peer_id: &str, block: sp_wire::L2Block) {
    let chain_id = block.chain_id.clone();
    if let Err(e) = coordinator.slot().check_vote_chain(&chain_id) {
        tracing::warn!(peer = peer_id, error = %e, "L2Block from non-participant chain rejected");
        return;
    }
    coordinator.accept_l2_block(&chain_id, block);
}
