use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, ChainId};

/// An immutable read of per-asset on-chain state for one account.
///
/// Snapshots are replaced as a whole on every refresh, nothing ever mutates one
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// `None` for market wide data that does not depend on an account.
    pub account: Option<Address>,
    pub chain_id: ChainId,
    pub block: Option<u64>,
    pub taken_at: DateTime<Utc>,
    pub values: HashMap<Address, T>,
}

/// Asset (market) address -> balance in underlying units.
pub type BalanceSnapshot = Snapshot<Decimal>;
/// Asset (market) address -> USD price of one whole underlying token.
pub type PriceSnapshot = Snapshot<Decimal>;

impl<T> Snapshot<T> {
    pub fn new(
        account: Option<Address>,
        chain_id: ChainId,
        block: Option<u64>,
        values: HashMap<Address, T>,
    ) -> Self {
        Self {
            account,
            chain_id,
            block,
            taken_at: Utc::now(),
            values,
        }
    }

    pub fn get(&self, asset: &Address) -> Option<&T> {
        self.values.get(asset)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T: Copy + Default> Snapshot<T> {
    /// Value for `asset`, or the zero value when it was never read.
    pub fn value_or_default(&self, asset: &Address) -> T {
        self.values.get(asset).copied().unwrap_or_default()
    }
}
