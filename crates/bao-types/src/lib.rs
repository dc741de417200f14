//! Shared domain types of the Bao lens.

pub mod market;
pub mod snapshot;

pub use alloy_primitives::{Address, U256};
pub use market::{ChainId, FarmDescriptor, MarketDescriptor, Network};
pub use snapshot::{BalanceSnapshot, PriceSnapshot, Snapshot};
