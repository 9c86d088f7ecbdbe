//! The coordinator: wires C1 (`sp-transport`) through C5
//! (`sp-superblock`) into one running value (§5, §9). No global mutable
//! state — every piece of state lives behind [`Coordinator`]'s `Arc`, and
//! the collaborator boundaries (`ChainRegistry`, `SettlementPublisher`,
//! `ProofService`) are explicit traits a binary supplies adapters for.

mod collaborators;
mod coordinator;
mod dispatch;
mod registry;
mod stats;

pub use collaborators::{LoggingProofService, LoggingSettlementPublisher, ProofService, SettlementPublisher};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use registry::{ChainRegistry, StaticChainRegistry};
pub use stats::{Stats, StatsSnapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use sp_base::{ChainId, Hash32};
    use sp_crypto::Keypair;
    use sp_slot::SlotMachineConfig;
    use sp_wire::{ChainTxs, Message, Payload, Vote, XtRequest};
    use std::sync::Arc;
    use std::time::Duration;

    fn chain(b: u8) -> ChainId {
        ChainId::from_bytes(vec![b])
    }

    fn free_addr() -> std::net::SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    fn request(chains: &[u8]) -> XtRequest {
        XtRequest {
            transactions: chains.iter().map(|&b| ChainTxs { chain_id: chain(b), tx_bytes: vec![vec![1]] }).collect(),
        }
    }

    #[test]
    fn two_chain_commit_seals_a_superblock_end_to_end() {
        let addr = free_addr();
        let registry = Arc::new(StaticChainRegistry::new([chain(1), chain(2)]));
        let config = CoordinatorConfig {
            slot: SlotMachineConfig { slot_duration: Duration::from_millis(200), seal_fraction: 0.5, ..Default::default() },
            clock_tick: Duration::from_millis(10),
            ..Default::default()
        };
        let coordinator =
            Coordinator::new(config, registry, Arc::new(LoggingSettlementPublisher), Arc::new(LoggingProofService));
        coordinator.start(addr).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let kp = Keypair::generate();
        let client = std::net::TcpStream::connect(addr).unwrap();
        sp_auth::client_handshake(&mut { client.try_clone().unwrap() }, "participant-a", &kp).unwrap();

        let xt = request(&[1, 2]);
        let xt_id = xt.xt_id();
        sp_wire::write_message(&mut { client.try_clone().unwrap() }, &Message::new("participant-a", Payload::XtRequest(xt)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        sp_wire::write_message(
            &mut { client.try_clone().unwrap() },
            &Message::new("participant-a", Payload::Vote(Vote { sender_chain_id: chain(1), xt_id, vote: true })),
        )
        .unwrap();
        sp_wire::write_message(
            &mut { client.try_clone().unwrap() },
            &Message::new("participant-a", Payload::Vote(Vote { sender_chain_id: chain(2), xt_id, vote: true })),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(300));

        for &b in &[1u8, 2] {
            let block = sp_wire::L2Block {
                slot: sp_base::Slot(1),
                chain_id: chain(b),
                block_number: 0,
                block_hash: Hash32([b; 32]),
                parent_block_hash: Hash32::ZERO,
                included_xts: vec![xt_id],
                block_bytes: vec![b],
            };
            sp_wire::write_message(&mut { client.try_clone().unwrap() }, &Message::new("participant-a", Payload::L2Block(block)))
                .unwrap();
        }

        std::thread::sleep(Duration::from_millis(300));
        coordinator.stop();

        assert_eq!(coordinator.stats().snapshot().superblocks_sealed, 1);
        let sealed = coordinator.store().latest().expect("a superblock was sealed");
        assert_eq!(sealed.slot, sp_base::Slot(1));
        assert_eq!(sealed.l2_blocks.len(), 2);
        assert_eq!(sealed.included_xts, vec![xt_id]);
    }
}
