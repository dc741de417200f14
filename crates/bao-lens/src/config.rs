use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bao_types::{Address, ChainId, FarmDescriptor, MarketDescriptor};
use serde::{Deserialize, Serialize};

/// Runtime knobs of the lens.
#[derive(Debug, Clone)]
pub struct LensConfig {
    /// Period of the per-query refresh scheduler.
    pub refresh_interval: Duration,
    /// Window during which a successful read is served from cache.
    pub dedupe_interval: Duration,
    /// Upper bound for a single `eth_call`.
    pub read_timeout: Duration,
    pub block_poll_interval: Duration,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            dedupe_interval: Duration::from_secs(2),
            read_timeout: Duration::from_secs(10),
            block_poll_interval: Duration::from_secs(12),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no registry entry for chain {0}")]
    UnknownNetwork(ChainId),
    #[error("invalid registry for chain {chain_id}: {reason}")]
    Invalid { chain_id: ChainId, reason: String },
}

/// Contracts backing the ballast swap (bUSD <-> backing stablecoin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallastConfig {
    pub stabilizer: Address,
    pub backing_token: Address,
    #[serde(default = "default_token_decimals")]
    pub backing_decimals: u32,
    /// Decimals of the token minted by the stabilizer, its supply cap uses them.
    #[serde(default = "default_token_decimals")]
    pub minted_decimals: u32,
}

const fn default_token_decimals() -> u32 {
    18
}

const fn default_blocks_per_day() -> u32 {
    bao_calc::DEFAULT_BLOCKS_PER_DAY
}

/// Everything the lens needs to know about one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: ChainId,
    pub comptroller: Address,
    pub oracle: Address,
    #[serde(default)]
    pub masterchef: Option<Address>,
    pub weth: Address,
    /// Market whose oracle price is used as the WETH USD price.
    #[serde(default)]
    pub weth_price_market: Option<Address>,
    #[serde(default)]
    pub ballast: Option<BallastConfig>,
    /// Locked BAO distribution contract.
    #[serde(default)]
    pub distribution: Option<Address>,
    /// Compounding periods in a day, used for APYs.
    #[serde(default = "default_blocks_per_day")]
    pub blocks_per_day: u32,
    #[serde(default)]
    pub markets: Vec<MarketDescriptor>,
    #[serde(default)]
    pub farms: Vec<FarmDescriptor>,
}

impl NetworkConfig {
    pub fn market(&self, address: &Address) -> Option<&MarketDescriptor> {
        self.markets.iter().find(|m| m.address == *address)
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            chain_id: self.chain_id,
            reason: reason.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut markets = HashSet::new();
        for market in &self.markets {
            if !markets.insert(market.address) {
                return Err(self.invalid(format!("market {} listed twice", market.address)));
            }
            if market.underlying_decimals > 36 || market.decimals > 36 {
                return Err(self.invalid(format!("market {} decimals out of range", market.symbol)));
            }
        }

        if !self.farms.is_empty() && self.masterchef.is_none() {
            return Err(self.invalid("farms configured without a masterchef"));
        }
        let mut pids = HashSet::new();
        for farm in &self.farms {
            if !pids.insert(farm.pid) {
                return Err(self.invalid(format!("farm pid {} listed twice", farm.pid)));
            }
        }

        if self.blocks_per_day == 0 {
            return Err(self.invalid("blocks_per_day must be positive"));
        }

        if let Some(market) = &self.weth_price_market {
            if self.market(market).is_none() {
                return Err(self.invalid(format!("weth price market {market} is not a market")));
            }
        }
        Ok(())
    }
}

/// Per-network contract registry, loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    pub networks: Vec<NetworkConfig>,
}

impl Registry {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let registry: Self = serde_json::from_str(raw)?;
        for network in &registry.networks {
            network.validate()?;
        }
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn network(&self, chain_id: ChainId) -> Result<Arc<NetworkConfig>, ConfigError> {
        self.networks
            .iter()
            .find(|n| n.chain_id == chain_id)
            .cloned()
            .map(Arc::new)
            .ok_or(ConfigError::UnknownNetwork(chain_id))
    }
}
