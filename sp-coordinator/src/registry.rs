use sp_base::ChainId;
use std::collections::BTreeSet;
use std::sync::RwLock;

/// The set of chains currently participating in the SP, snapshotted at
/// slot start and held immutable for the slot (§5 "read-mostly registries
/// ... snapshotted at slot start"). The concrete adapter is left to the
/// deployment.
pub trait ChainRegistry: Send + Sync {
    fn active_chains(&self) -> BTreeSet<ChainId>;
}

/// An in-memory registry for tests and single-process demos: a fixed or
/// operator-updated set of chain ids, no external discovery.
pub struct StaticChainRegistry {
    chains: RwLock<BTreeSet<ChainId>>,
}

impl StaticChainRegistry {
    pub fn new(chains: impl IntoIterator<Item = ChainId>) -> Self {
        StaticChainRegistry { chains: RwLock::new(chains.into_iter().collect()) }
    }

    pub fn set(&self, chains: impl IntoIterator<Item = ChainId>) {
        *self.chains.write().unwrap() = chains.into_iter().collect();
    }
}

impl ChainRegistry for StaticChainRegistry {
    fn active_chains(&self) -> BTreeSet<ChainId> {
        self.chains.read().unwrap().clone()
    }
}
