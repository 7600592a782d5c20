//! Harness configuration.
//!
//! Values are layered with figment: built-in defaults describing the 7-node
//! example cluster, then an optional TOML file, then `ACCTEST_`-prefixed
//! environment variables (`__` separates nested keys, e.g.
//! `ACCTEST_TIMING__FINALITY_TIMEOUT_SECS=60`).

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::{Address, address};
use base64::Engine;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{HarnessError, HarnessResult, registry::NodeId};

/// The default name for the harness configuration file.
pub const CONFIG_FILENAME: &str = "Acctest.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "ACCTEST_";

/// Size in bytes of a decoded private-transaction manager key.
const RECIPIENT_KEY_LEN: usize = 32;

/// One node of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// 1-based node index.
    pub index: u32,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Unlocked account owned by the node.
    pub account: Address,
    /// Base64 public key of the node's private-transaction manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_key: Option<String>,
}

/// Timeouts and polling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Per-request timeout for every JSON-RPC call.
    pub rpc_timeout_secs: u64,
    /// Upper bound on waiting for a transaction receipt.
    pub finality_timeout_secs: u64,
    /// First delay of the exponential receipt poll.
    pub poll_min_delay_ms: u64,
    /// Cap on a single receipt poll delay.
    pub poll_max_delay_ms: u64,
    /// How long to wait for an async-submission callback.
    pub callback_wait_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_secs: 10,
            finality_timeout_secs: 30,
            poll_min_delay_ms: 100,
            poll_max_delay_ms: 2_000,
            callback_wait_secs: 10,
        }
    }
}

impl TimingConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn finality_timeout(&self) -> Duration {
        Duration::from_secs(self.finality_timeout_secs)
    }

    pub fn callback_wait(&self) -> Duration {
        Duration::from_secs(self.callback_wait_secs)
    }
}

/// Parameters of the built-in suites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Exclusive upper bound for random public transfer amounts (wei).
    pub amount_bound: u64,
    /// Number of `emitEvent()` calls per contract visibility round.
    pub event_count: usize,
    /// Node receiving private contracts in the visibility suites.
    pub private_recipient: u32,
    /// Origin of the storage-root cross-check.
    pub storage_root_origin: u32,
    /// Recipient of the storage-root cross-check.
    pub storage_root_recipient: u32,
    /// Value (wei) attached to the private transaction that must be rejected.
    pub rejected_private_value: u64,
    /// Local address callback listeners bind to.
    pub callback_bind: String,
    /// Host the nodes use to reach local callback listeners.
    pub callback_host: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            amount_bound: 500,
            event_count: 10,
            private_recipient: 7,
            storage_root_origin: 1,
            storage_root_recipient: 7,
            rejected_private_value: 100,
            callback_bind: "127.0.0.1".to_string(),
            callback_host: "127.0.0.1".to_string(),
        }
    }
}

/// Complete harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Chain id used when signing raw transactions.
    pub chain_id: u64,
    /// Directory holding the `key<N>` keystore files of each node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_dir: Option<PathBuf>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    pub nodes: Vec<NodeConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let accounts = [
            address!("ed9d02e382b34818e88b88a309c7fe71e65f419d"),
            address!("ca843569e3427144cead5e4d5999a3d0ccf92b8e"),
            address!("0fbdc686b912d7722dc86510934589e0aaf3b55a"),
            address!("9186eb3d20cbd1f5f992a950d808c4495153abd5"),
            address!("0638e1574728b6d862dd5d3a3e0942c3be47d996"),
            address!("ae9bc6cd5145e67fbd1887a5145271fd182f0ee7"),
            address!("cc71c7546429a13796cf1bf9228bff213e7ae9cc"),
        ];
        let recipient_keys = [
            "BULeR8JyUWhiuuCMU/HLA0Q5pzkYT+cHII3ZKBey3Bo=",
            "QfeDAys9MPDs2XHExtc84jKGHxZg/aj52DTh0vtA3Xc=",
            "1iTZde/ndBHvzhcl7V68x44Vx7pl8nwx9LqnM/AfJUg=",
            "oNspPPgszVUFw0qmGFfWwh1uxVUXgvBxleXORHj07g8=",
            "R56gy4dn24YOjwyesTczYa8m5xhP6hF2uTMCju/1xkY=",
            "UfNSeSGySeKg11DVNEnqrUtxYRVor4+CvluI8tVv62Y=",
            "ROAZBWtSacxXQrOe3FGAqJDyJjFePR5ce4TSIzmJ0Bc=",
        ];

        let nodes = accounts
            .into_iter()
            .zip(recipient_keys)
            .enumerate()
            .map(|(i, (account, key))| NodeConfig {
                index: i as u32 + 1,
                rpc_url: format!("http://localhost:{}", 22000 + i),
                account,
                recipient_key: Some(key.to_string()),
            })
            .collect();

        Self {
            chain_id: 10,
            keys_dir: None,
            timing: TimingConfig::default(),
            scenario: ScenarioConfig::default(),
            nodes,
        }
    }
}

impl HarnessConfig {
    /// Load the configuration from defaults, a TOML file and the environment.
    ///
    /// An explicit `path` must exist; without one, `Acctest.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> HarnessResult<Self> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(HarnessError::config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            Some(path) if path.is_dir() => path.join(CONFIG_FILENAME),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| HarnessError::config(e.to_string()))?;

        tracing::debug!(path = %file.display(), nodes = config.nodes.len(), "Configuration loaded");
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> HarnessResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| HarnessError::config(format!("failed to serialize config: {}", e)))
    }

    /// Save the configuration as TOML.
    pub fn save_to_file(&self, path: &Path) -> HarnessResult<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| {
            HarnessError::config(format!("failed to write config to {}: {}", path.display(), e))
        })?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Path of the keystore file for `node`, if a key directory is configured.
    pub fn key_file(&self, node: NodeId) -> Option<PathBuf> {
        self.keys_dir
            .as_ref()
            .map(|dir| dir.join(format!("key{}", node.index())))
    }

    /// Static sanity checks run before any scenario touches the network.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.timing.poll_min_delay_ms == 0
            || self.timing.poll_min_delay_ms > self.timing.poll_max_delay_ms
        {
            return Err(HarnessError::config(
                "poll_min_delay_ms must be non-zero and not exceed poll_max_delay_ms",
            ));
        }

        if self.scenario.amount_bound < 2 {
            return Err(HarnessError::config(
                "amount_bound must be at least 2 to draw a non-zero amount",
            ));
        }

        for node in &self.nodes {
            if let Some(key) = &node.recipient_key {
                validate_recipient_key(key).map_err(|reason| {
                    HarnessError::config(format!("node{} recipient key {}", node.index, reason))
                })?;
            }
        }

        Ok(())
    }
}

/// A recipient key is the base64 encoding of a 32-byte public key.
fn validate_recipient_key(key: &str) -> Result<(), String> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(key)
        .map_err(|e| format!("is not valid base64: {}", e))?;
    if decoded.len() != RECIPIENT_KEY_LEN {
        return Err(format!(
            "decodes to {} bytes, expected {}",
            decoded.len(),
            RECIPIENT_KEY_LEN
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HarnessConfig::default();
        assert_eq!(config.nodes.len(), 7);
        assert_eq!(config.chain_id, 10);
        config.validate().unwrap();

        for (i, node) in config.nodes.iter().enumerate() {
            assert_eq!(node.index as usize, i + 1);
            assert_eq!(node.rpc_url, format!("http://localhost:{}", 22000 + i));
            assert!(node.recipient_key.is_some());
        }
    }

    #[test]
    fn test_validate_rejects_bad_recipient_key() {
        let mut config = HarnessConfig::default();
        config.nodes[3].recipient_key = Some("not-base64!".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("node4"));

        config.nodes[3].recipient_key = Some("AAAA".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_degenerate_amount_bound() {
        let mut config = HarnessConfig::default();
        config.scenario.amount_bound = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_key_file() {
        let mut config = HarnessConfig::default();
        assert!(config.key_file(NodeId::new(1)).is_none());

        config.keys_dir = Some(PathBuf::from("/keys"));
        assert_eq!(
            config.key_file(NodeId::new(3)).unwrap(),
            PathBuf::from("/keys/key3")
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir::TempDir::new("acctest-config").unwrap();
        let path = dir.path().join(CONFIG_FILENAME);

        let mut config = HarnessConfig::default();
        config.chain_id = 1337;
        config.nodes.truncate(3);
        config.timing.finality_timeout_secs = 45;
        config.save_to_file(&path).unwrap();

        let loaded = HarnessConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.chain_id, 1337);
        assert_eq!(loaded.nodes, config.nodes);
        assert_eq!(loaded.timing.finality_timeout_secs, 45);

        // A directory resolves to the default file name inside it.
        let from_dir = HarnessConfig::load(Some(dir.path())).unwrap();
        assert_eq!(from_dir.nodes.len(), 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir::TempDir::new("acctest-config").unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "chain_id = 99\n[scenario]\nevent_count = 4\n").unwrap();

        let loaded = HarnessConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.chain_id, 99);
        assert_eq!(loaded.scenario.event_count, 4);
        assert_eq!(loaded.scenario.amount_bound, 500);
        assert_eq!(loaded.nodes.len(), 7);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = HarnessConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }
}
