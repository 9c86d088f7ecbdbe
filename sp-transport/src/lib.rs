//! C1: the framed transport (§4.1). A [`Transport`] accepts TCP
//! connections, runs the C2 handshake on each one, and from then on moves
//! [`sp_wire::Message`] frames in and out through per-connection threads
//! and bounded send queues — no async runtime, per the design note that
//! favors explicit state machines and OS threads.

mod peer;
mod queue;
mod transport;

pub use queue::EnqueueOutcome;
pub use transport::{InboundHandler, SendError, Transport, TransportConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use sp_auth::{HandshakeConfig, TrustList, TrustListEntry};
    use sp_crypto::Keypair;
    use sp_wire::Payload;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn free_addr() -> std::net::SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn disabled_auth_round_trips_a_ping() {
        let addr = free_addr();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();

        let server = Transport::new(TransportConfig::default());
        server.set_handler(Arc::new(move |peer_id, msg| {
            received_clone.lock().unwrap().push((peer_id, msg));
        }));
        server.start(addr).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let client_stream = std::net::TcpStream::connect(addr).unwrap();
        let kp = Keypair::generate();
        sp_auth::client_handshake(&mut { client_stream.try_clone().unwrap() }, "client", &kp).unwrap();
        sp_wire::write_message(&mut { client_stream.try_clone().unwrap() }, &sp_wire::Message::new("client", Payload::Ping)).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        server.stop();

        let got = received.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert!(matches!(got[0].1.payload, Payload::Ping));
    }

    #[test]
    fn enabled_auth_rejects_unknown_identity_and_closes() {
        let addr = free_addr();
        let config = TransportConfig {
            handshake: HandshakeConfig {
                enabled: true,
                trust_list: TrustList::from_entries(Vec::<TrustListEntry>::new()),
                handshake_timeout: Duration::from_millis(300),
            },
            ..TransportConfig::default()
        };
        let server = Transport::new(config);
        server.set_handler(Arc::new(|_, _| {}));
        server.start(addr).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let client_stream = std::net::TcpStream::connect(addr).unwrap();
        let kp = Keypair::generate();
        sp_auth::client_handshake(&mut { client_stream.try_clone().unwrap() }, "stranger", &kp).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert!(server.connected_peers().is_empty());
        server.stop();
    }
}
