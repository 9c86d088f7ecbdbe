use crate::peer::{enqueue_or_close, run_connection, PeerHandle};
use sp_auth::HandshakeConfig;
use sp_base::Error;
use sp_wire::{Message, DEFAULT_MAX_FRAME_BYTES};
use std::collections::HashMap;
use std::fmt;
use std::net::{TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

pub type InboundHandler = Arc<dyn Fn(String, Message) + Send + Sync>;

#[derive(Clone)]
pub struct TransportConfig {
    pub max_frame_bytes: u32,
    pub send_queue_depth: usize,
    pub handshake: HandshakeConfig,
    pub shutdown_drain: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            send_queue_depth: 256,
            handshake: HandshakeConfig::disabled(),
            shutdown_drain: Duration::from_secs(2),
        }
    }
}

#[derive(Debug)]
pub enum SendError {
    PeerAbsent,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::PeerAbsent => write!(f, "no connection for that peer id"),
        }
    }
}

impl std::error::Error for SendError {}

pub(crate) struct Inner {
    pub config: TransportConfig,
    pub peers: RwLock<HashMap<String, PeerHandle>>,
    pub handler: RwLock<Option<InboundHandler>>,
    pub shutdown: AtomicBool,
}

/// C1: the framed, authenticated transport (§4.1). Owns the accept loop
/// and every connection's reader/writer thread pair; `Broadcast`/`Send`
/// enqueue onto each peer's bounded queue rather than writing inline.
pub struct Transport {
    inner: Arc<Inner>,
    accept_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Transport {
            inner: Arc::new(Inner {
                config,
                peers: RwLock::new(HashMap::new()),
                handler: RwLock::new(None),
                shutdown: AtomicBool::new(false),
            }),
            accept_thread: Mutex::new(None),
        }
    }

    /// Registers the single inbound dispatcher (§4.1 `SetHandler`).
    pub fn set_handler(&self, handler: InboundHandler) {
        *self.inner.handler.write().unwrap() = Some(handler);
    }

    /// Begins accepting connections at `listen_addr` (§4.1 `Start`).
    pub fn start(&self, listen_addr: impl ToSocketAddrs) -> Result<(), Error> {
        let listener = TcpListener::bind(listen_addr)?;
        listener.set_nonblocking(true)?;
        let inner = self.inner.clone();
        let handle = thread::spawn(move || accept_loop(inner, listener));
        *self.accept_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Enqueues `msg` for every connected peer except `exclude`, if given.
    /// Peers that overflow are closed immediately but only removed from
    /// the table after the read lock below is dropped, since removal
    /// needs the write lock and `RwLock` isn't reentrant.
    pub fn broadcast(&self, msg: &Message, exclude: Option<&str>) {
        let mut overflowed = Vec::new();
        {
            let peers = self.inner.peers.read().unwrap();
            for (peer_id, handle) in peers.iter() {
                if exclude == Some(peer_id.as_str()) {
                    continue;
                }
                if enqueue_or_close(peer_id, handle, msg.clone()) {
                    overflowed.push(peer_id.clone());
                }
            }
        }
        self.drop_overflowed(overflowed);
    }

    /// Enqueues `msg` for exactly one peer.
    pub fn send(&self, peer_id: &str, msg: Message) -> Result<(), SendError> {
        let overflowed = {
            let peers = self.inner.peers.read().unwrap();
            let handle = peers.get(peer_id).ok_or(SendError::PeerAbsent)?;
            enqueue_or_close(peer_id, handle, msg)
        };
        if overflowed {
            self.drop_overflowed(vec![peer_id.to_string()]);
        }
        Ok(())
    }

    fn drop_overflowed(&self, overflowed: Vec<String>) {
        if overflowed.is_empty() {
            return;
        }
        let mut peers = self.inner.peers.write().unwrap();
        for peer_id in overflowed {
            peers.remove(&peer_id);
        }
    }

    pub fn connected_peers(&self) -> Vec<String> {
        self.inner.peers.read().unwrap().keys().cloned().collect()
    }

    /// Drains in-flight writes up to `shutdown_drain`, then force-closes
    /// every connection and stops accepting new ones (§4.1 `Stop`).
    pub fn stop(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        {
            let peers = self.inner.peers.read().unwrap();
            for handle in peers.values() {
                handle.queue.close();
            }
        }
        thread::sleep(self.inner.config.shutdown_drain);
        let mut peers = self.inner.peers.write().unwrap();
        for (_, handle) in peers.drain() {
            handle.close();
        }
        drop(peers);
        if let Some(handle) = self.accept_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(inner: Arc<Inner>, listener: TcpListener) {
    loop {
        if inner.shutdown.load(Ordering::SeqCst) {
            return;
        }
        match listener.accept() {
            Ok((stream, addr)) => {
                let peer_label = addr.to_string();
                let conn_inner = inner.clone();
                thread::spawn(move || run_connection(stream, peer_label, conn_inner));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(25));
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
            }
        }
    }
}
