use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::Address;

#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Networks the lens ships a registry for.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    Hash,
    Eq,
    PartialEq,
    Display,
    AsRefStr,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Gnosis,
    Kovan,
}

impl Network {
    pub const fn chain_id(self) -> ChainId {
        match self {
            Self::Mainnet => ChainId(1),
            Self::Kovan => ChainId(42),
            Self::Gnosis => ChainId(100),
        }
    }
}

/// Static configuration of a lending market (a cToken-style vault).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDescriptor {
    /// The market contract (the one holding supply / borrow balances).
    pub address: Address,
    pub underlying_address: Address,
    pub underlying_decimals: u32,
    /// Decimals of the market token itself, 8 for compound style markets.
    #[serde(default = "default_market_decimals")]
    pub decimals: u32,
    pub symbol: String,
    pub underlying_symbol: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl MarketDescriptor {
    /// Markets of the native coin are registered with a zero underlying address.
    pub fn is_native(&self) -> bool {
        self.underlying_address.is_zero()
    }
}

const fn default_market_decimals() -> u32 {
    8
}

/// Static configuration of a farm pool on the masterchef.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmDescriptor {
    pub pid: u64,
    pub lp_address: Address,
    /// The non-WETH side of the LP pair.
    pub token_address: Address,
    pub token_decimals: u32,
    pub symbol: String,
    #[serde(default)]
    pub icon: Option<String>,
}
