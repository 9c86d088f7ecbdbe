use sp_wire::{Message, Payload};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// `Decided` and `RequestSeal` are the two payloads §4.1 says may never be
/// dropped under backpressure; everything else is fair game for eviction.
fn is_critical(payload: &Payload) -> bool {
    matches!(payload, Payload::Decided(_) | Payload::RequestSeal(_))
}

struct QueueItem {
    message: Message,
    critical: bool,
}

pub enum EnqueueOutcome {
    Queued,
    DroppedNonCritical,
    Overflow,
}

struct State {
    items: VecDeque<QueueItem>,
    closed: bool,
}

/// A connection's outbound queue (§4.1): ordered, bounded, with
/// non-critical messages sacrificed first when it's full. A critical
/// message that still can't fit is an `Overflow`, which the caller turns
/// into closing the connection.
pub struct PeerQueue {
    state: Mutex<State>,
    not_empty: Condvar,
    depth: usize,
}

impl PeerQueue {
    pub fn new(depth: usize) -> Self {
        PeerQueue {
            state: Mutex::new(State { items: VecDeque::new(), closed: false }),
            not_empty: Condvar::new(),
            depth,
        }
    }

    pub fn enqueue(&self, message: Message) -> EnqueueOutcome {
        let critical = is_critical(&message.payload);
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return EnqueueOutcome::Overflow;
        }
        if state.items.len() >= self.depth {
            if critical {
                return EnqueueOutcome::Overflow;
            }
            match state.items.iter().position(|i| !i.critical) {
                Some(pos) => {
                    state.items.remove(pos);
                }
                None => return EnqueueOutcome::DroppedNonCritical,
            }
        }
        state.items.push_back(QueueItem { message, critical });
        self.not_empty.notify_one();
        EnqueueOutcome::Queued
    }

    /// Blocks until a message is available or the queue is closed and
    /// drained (`None`). Used by the per-connection writer thread.
    pub fn dequeue_blocking(&self) -> Option<Message> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item.message);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Marks the queue closed; already-queued messages still drain via
    /// `dequeue_blocking` (§4.1 "drain in-flight writes up to a shutdown
    /// deadline") but no further messages are accepted.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.not_empty.notify_all();
    }
}
