//! Static per-network configuration.
//!
//! A run is driven by a JSON array of [`ChainInfo`] entries. Everything that is
//! operationally tunable (timeouts, staleness windows, the asset indexer lag
//! tolerance, request pacing) lives here instead of in constants, so a slow
//! testnet can be given looser thresholds than its mainnet.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOP_TIER_SIZE: usize = 21;
pub const DEFAULT_API_STALENESS_SECS: i64 = 300;
pub const DEFAULT_INDEXER_STALENESS_SECS: i64 = 600;
pub const DEFAULT_ASSET_LAG_BLOCKS: u64 = 100;
pub const DEFAULT_THROTTLE_MS: u64 = 300;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
pub const DEFAULT_ONCHAIN_CONTRACT: &str = "producerjson";

/// Discovery exclusion rule: a producer is dropped when its url equals `url`
/// and its owner account ends with `owner_suffix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub url: String,
    pub owner_suffix: String,
}

impl ExclusionRule {
    pub fn matches(&self, owner: &str, url: &str) -> bool {
        self.url == url && owner.ends_with(&self.owner_suffix)
    }
}

/// A test network whose producer list is used for the registration check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestnetInfo {
    pub name: String,
    pub api_node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub name: String,
    pub chain_id: String,
    /// Chain API used for discovery and on-chain reads.
    pub api_node: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Cap on the number of discovered producers (after filtering).
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_top_tier_size")]
    pub top_tier_size: usize,
    #[serde(default = "default_api_staleness_secs")]
    pub api_staleness_secs: i64,
    #[serde(default = "default_indexer_staleness_secs")]
    pub indexer_staleness_secs: i64,
    #[serde(default = "default_asset_lag_blocks")]
    pub asset_lag_blocks: u64,
    /// Pause before every outbound request.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Pause between attempts of a retried request.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Compare the served bp.json against the copy stored in chain state.
    #[serde(default)]
    pub onchain_manifest: bool,
    #[serde(default = "default_onchain_contract")]
    pub onchain_contract: String,
    #[serde(default)]
    pub exclude: Vec<ExclusionRule>,
    #[serde(default)]
    pub testnets: Vec<TestnetInfo>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_top_tier_size() -> usize {
    DEFAULT_TOP_TIER_SIZE
}

fn default_api_staleness_secs() -> i64 {
    DEFAULT_API_STALENESS_SECS
}

fn default_indexer_staleness_secs() -> i64 {
    DEFAULT_INDEXER_STALENESS_SECS
}

fn default_asset_lag_blocks() -> u64 {
    DEFAULT_ASSET_LAG_BLOCKS
}

fn default_throttle_ms() -> u64 {
    DEFAULT_THROTTLE_MS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_onchain_contract() -> String {
    DEFAULT_ONCHAIN_CONTRACT.to_string()
}

impl ChainInfo {
    /// Chain with every tunable at its default.
    pub fn new(
        name: impl Into<String>,
        chain_id: impl Into<String>,
        api_node: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            chain_id: chain_id.into(),
            api_node: api_node.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            limit: None,
            top_tier_size: DEFAULT_TOP_TIER_SIZE,
            api_staleness_secs: DEFAULT_API_STALENESS_SECS,
            indexer_staleness_secs: DEFAULT_INDEXER_STALENESS_SECS,
            asset_lag_blocks: DEFAULT_ASSET_LAG_BLOCKS,
            throttle_ms: DEFAULT_THROTTLE_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            onchain_manifest: false,
            onchain_contract: DEFAULT_ONCHAIN_CONTRACT.to_string(),
            exclude: Vec::new(),
            testnets: Vec::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Same discovery settings pointed at a testnet's API node.
    pub fn for_testnet(&self, testnet: &TestnetInfo) -> Self {
        Self {
            name: testnet.name.clone(),
            api_node: testnet.api_node.clone(),
            limit: None,
            exclude: Vec::new(),
            testnets: Vec::new(),
            onchain_manifest: false,
            ..self.clone()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("chain name is empty".to_string()));
        }
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "chain {} has an empty chain_id",
                self.name
            )));
        }
        url::Url::parse(&self.api_node).map_err(|e| {
            ConfigError::Invalid(format!("chain {} api_node: {e}", self.name))
        })?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "chain {} timeout_secs must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

/// Parse and validate a chain list.
pub fn parse_chains(json: &str) -> Result<Vec<ChainInfo>, ConfigError> {
    let chains: Vec<ChainInfo> = serde_json::from_str(json)?;
    for chain in &chains {
        chain.validate()?;
    }
    Ok(chains)
}

/// Load the chain list from a JSON file.
pub fn load_chains(path: impl AsRef<Path>) -> Result<Vec<ChainInfo>, ConfigError> {
    let data = std::fs::read_to_string(path)?;
    parse_chains(&data)
}
