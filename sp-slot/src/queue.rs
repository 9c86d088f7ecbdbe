use sp_wire::XtRequest;
use std::collections::VecDeque;
use std::time::Instant;

/// One queued xT request with an optional expiry (`queue.requestExpirationMs`, §6).
pub struct PendingRequest {
    pub request: XtRequest,
    pub queued_at: Instant,
    pub expires_at: Option<Instant>,
}

/// The slot's FIFO of xT requests awaiting dequeue into `Free` (§4.4
/// "Queue discipline"). Expired entries are purged from the head before
/// ever being handed out.
#[derive(Default)]
pub(crate) struct RequestQueue {
    items: VecDeque<PendingRequest>,
}

impl RequestQueue {
    pub fn push(&mut self, request: XtRequest, expires_at: Option<Instant>) {
        self.items.push_back(PendingRequest { request, queued_at: Instant::now(), expires_at });
    }

    fn purge_expired(&mut self, now: Instant) {
        while let Some(front) = self.items.front() {
            match front.expires_at {
                Some(deadline) if deadline <= now => {
                    self.items.pop_front();
                }
                _ => break,
            }
        }
    }

    pub fn pop_ready(&mut self, now: Instant) -> Option<XtRequest> {
        self.purge_expired(now);
        self.items.pop_front().map(|p| p.request)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
