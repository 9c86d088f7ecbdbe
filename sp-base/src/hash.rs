use crate::ids::{ChainId, Hash32, XtId};
use sha2::{Digest, Sha256};

/// Computes the deterministic `xtId` for an XTRequest given as ordered
/// `(chainId, txBytes[])` pairs. Re-encoding an equivalent request yields
/// the same id (§3, §8 invariant 8): the hash runs over the canonical
/// byte layout, not over any particular wire encoding of it.
pub fn xt_id<'a>(entries: impl IntoIterator<Item = (&'a ChainId, &'a [Vec<u8>])>) -> XtId {
    let mut hasher = Sha256::new();
    for (chain_id, txs) in entries {
        hasher.update((chain_id.as_bytes().len() as u32).to_be_bytes());
        hasher.update(chain_id.as_bytes());
        hasher.update((txs.len() as u32).to_be_bytes());
        for tx in txs {
            hasher.update((tx.len() as u32).to_be_bytes());
            hasher.update(tx);
        }
    }
    XtId(hasher.finalize().into())
}

/// A deterministic binary Merkle tree over ordered leaves, duplicating the
/// last leaf on odd counts at every level (§4.5).
pub fn merkle_root(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return Hash32::ZERO;
    }
    let mut level: Vec<[u8; 32]> = leaves.iter().map(|h| h.0).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks_exact(2) {
            let mut hasher = Sha256::new();
            hasher.update(pair[0]);
            hasher.update(pair[1]);
            next.push(hasher.finalize().into());
        }
        level = next;
    }
    Hash32(level[0])
}

/// Hashes an arbitrary byte buffer with SHA-256. Used for canonical header
/// hashing (superblock hash) and block hashing by adapters.
pub fn sha256(bytes: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Hash32(hasher.finalize().into())
}
