use crate::superblock::{header_bytes, Superblock, SuperblockBlock};
use sp_base::ChainId;
use sp_slot::SlotRecord;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// How strictly a participant's `L2Block.includedXts` must match the
/// slot's committed set (§4.5 "a participant MAY include fewer than the
/// committed xTs only if policy permits"; `superblock.mergeAll`, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuperblockPolicy {
    /// Every participating chain's `includedXts` must equal `slot.includedXts`
    /// exactly. The default.
    Strict,
    /// A chain's `includedXts` may be any subset of `slot.includedXts`.
    PartialAllowed,
}

impl Default for SuperblockPolicy {
    fn default() -> Self {
        SuperblockPolicy::Strict
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    MissingBlocks(Vec<ChainId>),
    InclusionMismatch(ChainId),
    ContentMismatch(ChainId),
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssembleError::MissingBlocks(chains) => {
                write!(f, "{} expected chain(s) never delivered an L2Block", chains.len())
            }
            AssembleError::InclusionMismatch(id) => {
                write!(f, "chain {id}'s includedXts violates the superblock policy")
            }
            AssembleError::ContentMismatch(id) => {
                write!(f, "chain {id}'s block does not match this slot's expectedBlocks")
            }
        }
    }
}

impl std::error::Error for AssembleError {}

/// Assembles a `Superblock` from a sealed (or seal-ready) `SlotRecord`
/// (§4.5). Pure: takes a snapshot, returns a value, touches no shared
/// state — the caller (`sp-coordinator`) decides what happens to the
/// result, including advancing `SlotMachine`'s chain tips via
/// `complete_seal` on success or `force_rollback` on
/// [`AssembleError::MissingBlocks`].
///
/// `number` and `parent_hash` come from the caller's superblock store
/// (the previous sealed superblock, or genesis values), since `SlotRecord`
/// itself doesn't track superblock lineage.
pub fn assemble(
    record: &SlotRecord,
    number: u64,
    parent_hash: sp_base::Hash32,
    policy: SuperblockPolicy,
) -> Result<Superblock, AssembleError> {
    let missing: Vec<ChainId> = record
        .expected_blocks
        .keys()
        .filter(|c| !record.received_blocks.contains_key(*c))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(AssembleError::MissingBlocks(missing));
    }

    for (chain_id, block) in &record.received_blocks {
        let Some(expected) = record.expected_blocks.get(chain_id) else {
            return Err(AssembleError::ContentMismatch(chain_id.clone()));
        };
        if block.block_number != expected.block_number || block.parent_block_hash != expected.parent_hash {
            return Err(AssembleError::ContentMismatch(chain_id.clone()));
        }
    }

    for (chain_id, block) in &record.received_blocks {
        let ok = match policy {
            SuperblockPolicy::Strict => {
                block.included_xts.len() == record.included_xts.len()
                    && block.included_xts.iter().all(|x| record.included_xts.contains(x))
            }
            SuperblockPolicy::PartialAllowed => block.included_xts.iter().all(|x| record.included_xts.contains(x)),
        };
        if !ok {
            return Err(AssembleError::InclusionMismatch(chain_id.clone()));
        }
    }

    let mut l2_blocks: Vec<SuperblockBlock> = record
        .received_blocks
        .iter()
        .map(|(chain_id, block)| SuperblockBlock {
            chain_id: chain_id.clone(),
            block_number: block.block_number,
            block_hash: block.block_hash,
            included_xts: block.included_xts.clone(),
        })
        .collect();
    l2_blocks.sort_by(|a, b| a.chain_id.as_bytes().cmp(b.chain_id.as_bytes()));

    let leaves: Vec<sp_base::Hash32> = l2_blocks
        .iter()
        .map(|b| sp_base::sha256(&chain_and_hash(&b.chain_id, &b.block_hash)))
        .collect();
    let merkle_root = sp_base::merkle_root(&leaves);

    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let hash = sp_base::sha256(&header_bytes(number, record.slot, parent_hash, merkle_root, timestamp));

    tracing::info!(slot = record.slot.0, number, chains = l2_blocks.len(), "superblock assembled");

    Ok(Superblock {
        number,
        slot: record.slot,
        parent_hash,
        l2_blocks,
        included_xts: record.included_xts.iter().copied().collect(),
        merkle_root,
        hash,
        timestamp,
    })
}

fn chain_and_hash(chain_id: &ChainId, block_hash: &sp_base::Hash32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(chain_id.as_bytes().len() + 32);
    buf.extend_from_slice(chain_id.as_bytes());
    buf.extend_from_slice(&block_hash.0);
    buf
}
