//! The SP executable: config loading, logging setup, CLI, and wiring
//! `sp-coordinator` into a running process (§6 "external interfaces").
//! The workspace's top-level package carries the binary.

mod config;

pub use config::Config;

use sp_base::Error;
use sp_coordinator::{Coordinator, LoggingProofService, LoggingSettlementPublisher, StaticChainRegistry};
use std::net::ToSocketAddrs;
use std::sync::Arc;

/// Builds a [`Coordinator`] from a loaded [`Config`] and starts it
/// listening. Returns the running coordinator; the caller decides how
/// long to keep it alive and calls [`Coordinator::stop`] on shutdown.
pub fn run(config: &Config) -> Result<Coordinator, Error> {
    let registry = Arc::new(StaticChainRegistry::new(config.chain_ids()));
    let coordinator = Coordinator::new(
        config.coordinator_config()?,
        registry,
        Arc::new(LoggingSettlementPublisher),
        Arc::new(LoggingProofService),
    );
    let addr = resolve(&config.bind)?;
    coordinator.start(addr)?;
    Ok(coordinator)
}

fn resolve(bind: &str) -> Result<std::net::SocketAddr, Error> {
    bind.to_socket_addrs()?.next().ok_or_else(|| sp_base::err(format!("could not resolve bind address {bind}")))
}
