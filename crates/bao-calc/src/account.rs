use std::collections::BTreeSet;
use std::sync::Arc;

use bao_types::{Address, BalanceSnapshot, PriceSnapshot, Snapshot};
use rust_decimal::Decimal;

/// Everything the lending calculator reads for one account.
///
/// Each snapshot is optional: a snapshot that has not loaded yet contributes
/// zero to every derived quantity instead of failing the computation.
#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    /// Market token balances, in whole market tokens.
    pub supply_balances: Option<Arc<BalanceSnapshot>>,
    /// Borrowed amounts, in whole underlying tokens.
    pub borrow_balances: Option<Arc<BalanceSnapshot>>,
    /// Underlying tokens per market token.
    pub exchange_rates: Option<Arc<Snapshot<Decimal>>>,
    pub prices: Option<Arc<PriceSnapshot>>,
    pub collateral_factors: Option<Arc<Snapshot<Decimal>>>,
    /// Markets the account entered as collateral.
    pub collateral_markets: Option<Arc<Snapshot<bool>>>,
}

fn lookup<T: Copy + Default>(snapshot: Option<&Arc<Snapshot<T>>>, asset: &Address) -> T {
    snapshot.map_or_else(T::default, |s| s.value_or_default(asset))
}

impl AccountSnapshot {
    /// Supplied amount in whole underlying tokens.
    pub fn supplied(&self, asset: &Address) -> Decimal {
        lookup(self.supply_balances.as_ref(), asset).saturating_mul(self.exchange_rate(asset))
    }

    pub fn borrowed(&self, asset: &Address) -> Decimal {
        lookup(self.borrow_balances.as_ref(), asset)
    }

    pub fn exchange_rate(&self, asset: &Address) -> Decimal {
        lookup(self.exchange_rates.as_ref(), asset)
    }

    pub fn price(&self, asset: &Address) -> Decimal {
        lookup(self.prices.as_ref(), asset)
    }

    /// `None` when the price snapshot or the entry is missing.
    pub fn known_price(&self, asset: &Address) -> Option<Decimal> {
        self.prices.as_ref().and_then(|p| p.get(asset).copied())
    }

    pub fn collateral_factor(&self, asset: &Address) -> Decimal {
        lookup(self.collateral_factors.as_ref(), asset)
    }

    pub fn is_collateral(&self, asset: &Address) -> bool {
        lookup(self.collateral_markets.as_ref(), asset)
    }

    /// Every asset with a supply or borrow entry, in a stable order.
    pub fn assets(&self) -> BTreeSet<Address> {
        let supplied = self.supply_balances.iter().flat_map(|s| s.values.keys());
        let borrowed = self.borrow_balances.iter().flat_map(|s| s.values.keys());
        supplied.chain(borrowed).copied().collect()
    }
}
