use bao_types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::AccountSnapshot;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Borrowing position of an account, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLiquidity {
    pub usd_supply: Decimal,
    pub usd_borrow: Decimal,
    /// Remaining borrowing capacity, `borrow_limit - usd_borrow`. Negative on shortfall.
    pub usd_borrowable: Decimal,
}

impl AccountLiquidity {
    pub fn borrow_limit(&self) -> Decimal {
        self.usd_borrow.saturating_add(self.usd_borrowable)
    }

    pub fn borrow_limit_used(&self) -> Decimal {
        borrow_limit_used(self.usd_borrow, self.borrow_limit())
    }
}

/// A user action a preview is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Supply,
    Withdraw,
    Borrow,
    Repay,
}

impl Operation {
    /// Positive for supply / repay, negative for withdraw / borrow.
    pub fn signed_delta(self, amount: Decimal) -> Decimal {
        let amount = amount.abs();
        match self {
            Self::Supply | Self::Repay => amount,
            Self::Withdraw | Self::Borrow => -amount,
        }
    }

    const fn moves_supply(self) -> bool {
        matches!(self, Self::Supply | Self::Withdraw)
    }
}

/// A hypothetical balance change on a single asset.
#[derive(Debug, Clone, Copy)]
struct Adjustment {
    asset: Address,
    operation: Operation,
    /// In underlying tokens, signed.
    delta: Decimal,
}

/// `usd_borrow / borrow_limit * 100`, zero when there is no limit.
pub fn borrow_limit_used(usd_borrow: Decimal, borrow_limit: Decimal) -> Decimal {
    usd_borrow
        .checked_div(borrow_limit)
        .map_or(Decimal::ZERO, |ratio| ratio.saturating_mul(HUNDRED))
}

pub fn borrow_limit(snapshot: &AccountSnapshot) -> Decimal {
    evaluate(snapshot, None).borrow_limit()
}

pub fn account_liquidity(snapshot: &AccountSnapshot) -> AccountLiquidity {
    evaluate(snapshot, None)
}

/// Liquidity after `operation` of `amount` underlying tokens of `asset`, the
/// snapshot itself is left untouched.
///
/// A supply counts toward the limit even for a market the account has not
/// entered yet, since minting enters it. Previews with a zero amount equal
/// [`account_liquidity`].
pub fn project(
    snapshot: &AccountSnapshot,
    operation: Operation,
    asset: &Address,
    amount: Decimal,
) -> AccountLiquidity {
    evaluate(
        snapshot,
        Some(Adjustment {
            asset: *asset,
            operation,
            delta: operation.signed_delta(amount),
        }),
    )
}

fn evaluate(snapshot: &AccountSnapshot, adjustment: Option<Adjustment>) -> AccountLiquidity {
    let mut assets = snapshot.assets();
    if let Some(adjustment) = &adjustment {
        assets.insert(adjustment.asset);
    }

    let mut usd_supply = Decimal::ZERO;
    let mut usd_borrow = Decimal::ZERO;
    let mut limit = Decimal::ZERO;

    for asset in &assets {
        let price = snapshot.price(asset);
        let collateral_factor = snapshot.collateral_factor(asset);
        let is_collateral = snapshot.is_collateral(asset);

        let supplied = snapshot.supplied(asset);
        let borrowed = snapshot.borrowed(asset);

        let (supply_delta, borrow_delta, delta_is_collateral) = match adjustment {
            Some(adj) if adj.asset == *asset && adj.operation.moves_supply() => (
                adj.delta,
                Decimal::ZERO,
                is_collateral || adj.operation == Operation::Supply,
            ),
            // Repaying (positive delta) lowers the debt, borrowing raises it.
            Some(adj) if adj.asset == *asset => (Decimal::ZERO, -adj.delta, false),
            _ => (Decimal::ZERO, Decimal::ZERO, false),
        };

        // Amounts past `Decimal::MAX` clamp instead of overflowing.
        let usd = |amount: Decimal| amount.saturating_mul(price);
        usd_supply = usd_supply.saturating_add(usd(supplied.saturating_add(supply_delta)));
        usd_borrow = usd_borrow.saturating_add(usd(borrowed.saturating_add(borrow_delta)));

        if is_collateral {
            limit = limit.saturating_add(usd(supplied).saturating_mul(collateral_factor));
        }
        if delta_is_collateral {
            limit = limit.saturating_add(usd(supply_delta).saturating_mul(collateral_factor));
        }
    }

    AccountLiquidity {
        usd_supply,
        usd_borrow,
        usd_borrowable: limit.saturating_sub(usd_borrow),
    }
}
