use serde::{Deserialize, Serialize};
use sp_base::{ChainId, Hash32, Slot, XtId};

/// The envelope every wire message shares (§6). `sender_id` is the
/// declared/verified participant id; the transport layer fills it in from
/// the handshake-verified identity before handing a message to dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: String,
    pub payload: Payload,
}

impl Message {
    pub fn new(sender_id: impl Into<String>, payload: Payload) -> Self {
        Message { sender_id: sender_id.into(), payload }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    XtRequest(XtRequest),
    Vote(Vote),
    Decided(Decided),
    StartSlot(StartSlot),
    RequestSeal(RequestSeal),
    RollBackAndStartSlot(RollBackAndStartSlot),
    L2Block(L2Block),
    StartSc(StartSc),
    Circ(CircMessage),
    Ping,
    Pong,
}

/// One chain's worth of transactions to include in an xT. `tx_bytes` entries
/// are opaque to the core (§3 XTRequest).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTxs {
    pub chain_id: ChainId,
    pub tx_bytes: Vec<Vec<u8>>,
}

/// `XTRequest.transactions[]: (chainId bytes, [txBytes])`, at least one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct XtRequest {
    pub transactions: Vec<ChainTxs>,
}

impl XtRequest {
    /// Unique chainIds appearing in the request, in first-seen order.
    pub fn participating_chains(&self) -> Vec<ChainId> {
        let mut seen = Vec::new();
        for entry in &self.transactions {
            if !seen.contains(&entry.chain_id) {
                seen.push(entry.chain_id.clone());
            }
        }
        seen
    }

    /// The deterministic `xtId` for this request (§3, §8 invariant 8).
    pub fn xt_id(&self) -> XtId {
        let entries: Vec<(&ChainId, &[Vec<u8>])> = self
            .transactions
            .iter()
            .map(|e| (&e.chain_id, e.tx_bytes.as_slice()))
            .collect();
        sp_base::xt_id(entries)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub sender_chain_id: ChainId,
    pub xt_id: XtId,
    pub vote: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decided {
    pub xt_id: XtId,
    pub decision: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2BlockRequest {
    pub chain_id: ChainId,
    pub block_number: u64,
    pub parent_hash: Hash32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSlot {
    pub slot: Slot,
    pub next_superblock_number: u64,
    pub last_superblock_hash: Hash32,
    pub requests: Vec<L2BlockRequest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSc {
    pub slot: Slot,
    pub xt_sequence_number: u64,
    pub xt_id: XtId,
    pub xt_request: XtRequest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSeal {
    pub slot: Slot,
    pub included_xts: Vec<XtId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollBackAndStartSlot {
    pub current_slot: Slot,
    pub next_superblock_number: u64,
    pub last_superblock_hash: Hash32,
    pub requests: Vec<L2BlockRequest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Block {
    pub slot: Slot,
    pub chain_id: ChainId,
    pub block_number: u64,
    pub block_hash: Hash32,
    pub parent_block_hash: Hash32,
    pub included_xts: Vec<XtId>,
    pub block_bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircMessage {
    pub source_chain: ChainId,
    pub destination_chain: ChainId,
    pub xt_id: XtId,
    pub label: String,
    pub source: Vec<u8>,
    pub receiver: Vec<u8>,
    pub data: Vec<u8>,
}
