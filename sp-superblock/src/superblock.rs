use serde::{Deserialize, Serialize};
use sp_base::{ChainId, Hash32, Slot, XtId};

/// The sealed per-slot artifact (§3 Superblock, §4.5). `l2Blocks` is ordered
/// by canonical `chainId` byte order, never by arrival.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    pub number: u64,
    pub slot: Slot,
    pub parent_hash: Hash32,
    pub l2_blocks: Vec<SuperblockBlock>,
    pub included_xts: Vec<XtId>,
    pub merkle_root: Hash32,
    pub hash: Hash32,
    pub timestamp: u64,
}

/// One chain's contribution to a superblock: the fields of its `L2Block`
/// that matter once the block is sealed in, without the raw `blockBytes`
/// the store doesn't need to keep around.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperblockBlock {
    pub chain_id: ChainId,
    pub block_number: u64,
    pub block_hash: Hash32,
    pub included_xts: Vec<XtId>,
}

/// Canonical header bytes hashed to produce `Superblock.hash` (§4.5
/// "hash of canonical header"). A free function rather than a method on
/// `Superblock` so the header can be hashed before the struct exists.
pub(crate) fn header_bytes(number: u64, slot: Slot, parent_hash: Hash32, merkle_root: Hash32, timestamp: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + 8 + 32 + 32 + 8);
    buf.extend_from_slice(&number.to_be_bytes());
    buf.extend_from_slice(&slot.0.to_be_bytes());
    buf.extend_from_slice(&parent_hash.0);
    buf.extend_from_slice(&merkle_root.0);
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf
}
