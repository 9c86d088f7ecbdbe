//! On-disk configuration (§6 "external interfaces" / §6 config keys),
//! loaded with `serde_yaml`, then turned into the typed configs each
//! crate actually wants.

use serde::Deserialize;
use sp_auth::{HandshakeConfig, TrustList, TrustListEntry};
use sp_base::{err, ChainId, Error};
use sp_coordinator::CoordinatorConfig;
use sp_crypto::PublicKey;
use sp_slot::SlotMachineConfig;
use sp_superblock::SuperblockPolicy;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub bind: String,
    pub sender_id: String,
    pub chains: Vec<String>,
    pub slot: SlotConfig,
    pub instance: InstanceConfig,
    pub transport: TransportConfigToml,
    pub auth: AuthConfig,
    pub history: HistoryConfig,
    pub queue: QueueConfig,
    pub superblock: SuperblockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1:9000".into(),
            sender_id: "sp".into(),
            chains: Vec::new(),
            slot: SlotConfig::default(),
            instance: InstanceConfig::default(),
            transport: TransportConfigToml::default(),
            auth: AuthConfig::default(),
            history: HistoryConfig::default(),
            queue: QueueConfig::default(),
            superblock: SuperblockConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlotConfig {
    pub duration_ms: u64,
    pub seal_fraction: f64,
}

impl Default for SlotConfig {
    fn default() -> Self {
        SlotConfig { duration_ms: 12_000, seal_fraction: 0.667 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstanceConfig {
    pub timeout_ms: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        InstanceConfig { timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportConfigToml {
    pub max_frame_bytes: u32,
    pub send_queue_depth: usize,
}

impl Default for TransportConfigToml {
    fn default() -> Self {
        let defaults = sp_transport::TransportConfig::default();
        TransportConfigToml {
            max_frame_bytes: defaults.max_frame_bytes,
            send_queue_depth: defaults.send_queue_depth,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
    pub enabled: bool,
    pub trust_list: Vec<TrustListEntryConfig>,
    pub handshake_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig { enabled: false, trust_list: Vec::new(), handshake_timeout_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrustListEntryConfig {
    pub id: String,
    pub public_key_hex: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    pub max_instances: usize,
    pub retention_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig { max_instances: 4096, retention_ms: 3_600_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueConfig {
    pub request_expiration_ms: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig { request_expiration_ms: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SuperblockConfig {
    pub merge_all: bool,
    pub history: usize,
}

impl Default for SuperblockConfig {
    fn default() -> Self {
        SuperblockConfig { merge_all: true, history: 256 }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&text).map_err(Error::from)?;
        Ok(config)
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        self.chains.iter().map(|c| ChainId::from_bytes(c.as_bytes().to_vec())).collect()
    }

    pub fn handshake_config(&self) -> Result<HandshakeConfig, Error> {
        if !self.auth.enabled {
            return Ok(HandshakeConfig::disabled());
        }
        let mut entries = Vec::with_capacity(self.auth.trust_list.len());
        for e in &self.auth.trust_list {
            let public_key = PublicKey::from_hex(&e.public_key_hex)?;
            entries.push(TrustListEntry { id: e.id.clone(), public_key });
        }
        Ok(HandshakeConfig {
            enabled: true,
            trust_list: TrustList::from_entries(entries),
            handshake_timeout: Duration::from_millis(self.auth.handshake_timeout_ms),
        })
    }

    pub fn coordinator_config(&self) -> Result<CoordinatorConfig, Error> {
        // merge_all=false selects the partial-inclusion policy.
        let superblock_policy =
            if self.superblock.merge_all { SuperblockPolicy::Strict } else { SuperblockPolicy::PartialAllowed };

        let handshake = self.handshake_config()?;
        let mut transport = sp_transport::TransportConfig::default();
        transport.max_frame_bytes = self.transport.max_frame_bytes;
        transport.send_queue_depth = self.transport.send_queue_depth;
        transport.handshake = handshake;

        if self.instance.timeout_ms == 0 {
            return Err(err("instance.timeoutMs must be non-zero"));
        }

        Ok(CoordinatorConfig {
            sender_id: self.sender_id.clone(),
            slot: SlotMachineConfig {
                slot_duration: Duration::from_millis(self.slot.duration_ms),
                seal_fraction: self.slot.seal_fraction,
                request_expiration: self.queue.request_expiration_ms.map(Duration::from_millis),
            },
            instance: sp_consensus::EngineConfig {
                instance_timeout: Duration::from_millis(self.instance.timeout_ms),
                history_max_instances: self.history.max_instances,
                history_retention: Duration::from_millis(self.history.retention_ms),
            },
            transport,
            superblock_policy,
            superblock_history: self.superblock.history,
            clock_tick: Duration::from_millis((self.slot.duration_ms / 20).clamp(10, 500)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_into_a_coordinator_config() {
        let config = Config::default();
        let coordinator_config = config.coordinator_config().unwrap();
        assert_eq!(coordinator_config.sender_id, "sp");
        assert_eq!(coordinator_config.superblock_policy, SuperblockPolicy::Strict);
    }

    #[test]
    fn parses_a_minimal_yaml_document() {
        let yaml = "bind: \"0.0.0.0:9000\"\nchains: [\"alpha\", \"beta\"]\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.chain_ids().len(), 2);
    }

    #[test]
    fn rejects_a_zero_instance_timeout() {
        let mut config = Config::default();
        config.instance.timeout_ms = 0;
        assert!(config.coordinator_config().is_err());
    }
}
