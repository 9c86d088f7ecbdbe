use crate::queue::{EnqueueOutcome, PeerQueue};
use crate::transport::Inner;
use sp_auth::server_handshake;
use sp_wire::{read_message, write_message, Message};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;

/// A registered, handshake-verified connection: its outbound queue plus a
/// handle used to force-close the socket from `Transport::stop`/overflow.
pub(crate) struct PeerHandle {
    pub queue: Arc<PeerQueue>,
    stream: TcpStream,
}

impl PeerHandle {
    pub fn close(&self) {
        self.queue.close();
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Runs the full lifecycle of one accepted connection on its own thread:
/// handshake, registration, a dedicated writer thread draining the peer's
/// send queue, and this thread's own read loop dispatching to the handler.
/// Returns once the connection is gone; the peer table entry is removed
/// before returning.
pub(crate) fn run_connection(stream: TcpStream, peer_label: String, inner: Arc<Inner>) {
    if let Err(e) = stream.set_read_timeout(Some(inner.config.handshake.handshake_timeout)) {
        tracing::warn!(peer = %peer_label, error = %e, "failed to set handshake read timeout");
        return;
    }

    let mut handshake_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(peer = %peer_label, error = %e, "failed to clone stream for handshake");
            return;
        }
    };

    let identity = match server_handshake(&mut handshake_stream, &inner.config.handshake, &peer_label) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(peer = %peer_label, error = %e, "handshake failed");
            return;
        }
    };

    if let Err(e) = stream.set_read_timeout(None) {
        tracing::warn!(peer = %peer_label, error = %e, "failed to clear handshake read timeout");
        return;
    }

    let peer_id = identity.as_str().to_string();
    let queue = Arc::new(PeerQueue::new(inner.config.send_queue_depth));

    let writer_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(peer = %peer_id, error = %e, "failed to clone stream for writer thread");
            return;
        }
    };
    let writer_queue = queue.clone();
    let writer_peer_id = peer_id.clone();
    let writer = thread::spawn(move || writer_loop(writer_stream, writer_queue, writer_peer_id));

    let shutdown_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(peer = %peer_id, error = %e, "failed to clone stream for peer handle");
            return;
        }
    };
    {
        let mut peers = inner.peers.write().unwrap();
        peers.insert(peer_id.clone(), PeerHandle { queue: queue.clone(), stream: shutdown_stream });
    }
    tracing::info!(peer = %peer_id, known = identity.is_known(), "connection established");

    let mut reader_stream = stream;
    loop {
        match read_message::<Message, _>(&mut reader_stream, inner.config.max_frame_bytes) {
            Ok(msg) => {
                if let Some(handler) = inner.handler.read().unwrap().clone() {
                    handler(peer_id.clone(), msg);
                }
            }
            Err(e) => {
                tracing::info!(peer = %peer_id, error = %e, "connection closed");
                break;
            }
        }
    }

    inner.peers.write().unwrap().remove(&peer_id);
    queue.close();
    let _ = writer.join();
}

fn writer_loop(mut stream: TcpStream, queue: Arc<PeerQueue>, peer_id: String) {
    while let Some(msg) = queue.dequeue_blocking() {
        if let Err(e) = write_message(&mut stream, &msg) {
            tracing::info!(peer = %peer_id, error = %e, "write failed, closing connection");
            queue.close();
            let _ = stream.shutdown(Shutdown::Both);
            break;
        }
    }
}

/// Enqueues `message` onto `handle`'s queue, closing the connection if a
/// critical message overflowed it. Returns whether the peer table entry
/// should be dropped. Does not touch the peer table itself: callers walk
/// it under a single read lock, so removal has to happen afterward under
/// its own write lock rather than nested underneath the read.
pub(crate) fn enqueue_or_close(peer_id: &str, handle: &PeerHandle, message: Message) -> bool {
    match handle.queue.enqueue(message) {
        EnqueueOutcome::Queued => false,
        EnqueueOutcome::DroppedNonCritical => {
            tracing::debug!(peer = %peer_id, "dropped non-critical message under backpressure");
            false
        }
        EnqueueOutcome::Overflow => {
            tracing::warn!(peer = %peer_id, "send queue overflowed on a critical message, closing connection");
            handle.close();
            true
        }
    }
}
