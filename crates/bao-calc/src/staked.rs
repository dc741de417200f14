use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reads backing the valuation of one farm pool, already scaled to whole tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReads {
    pub pid: u64,
    /// Paired token held by the LP contract.
    pub token_in_lp: Decimal,
    /// WETH held by the LP contract.
    pub weth_in_lp: Decimal,
    /// LP tokens staked in the masterchef.
    pub lp_staked: Decimal,
    pub lp_total_supply: Decimal,
    pub alloc_point: Decimal,
    pub total_alloc_point: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakedValue {
    pub pid: u64,
    pub token_amount: Decimal,
    pub weth_amount: Decimal,
    pub total_weth_value: Decimal,
    pub token_price_in_weth: Decimal,
    pub pool_weight: Decimal,
    pub total_usd_value: Decimal,
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    numerator.checked_div(denominator).unwrap_or_default()
}

/// Values the staked share of a constant product WETH pair.
///
/// Both sides of such a pair are worth the same, so the staked share is worth
/// twice its WETH side. A missing WETH price leaves the USD value at zero.
pub fn staked_value(reads: &PoolReads, weth_price_usd: Option<Decimal>) -> StakedValue {
    let portion = ratio(reads.lp_staked, reads.lp_total_supply);

    let token_amount = reads.token_in_lp.saturating_mul(portion);
    let weth_amount = reads.weth_in_lp.saturating_mul(portion);
    let total_weth_value = weth_amount.saturating_mul(Decimal::TWO);

    StakedValue {
        pid: reads.pid,
        token_amount,
        weth_amount,
        total_weth_value,
        token_price_in_weth: ratio(weth_amount, token_amount),
        pool_weight: ratio(reads.alloc_point, reads.total_alloc_point),
        total_usd_value: total_weth_value.saturating_mul(weth_price_usd.unwrap_or_default()),
    }
}

pub fn total_staked_usd(values: &[StakedValue]) -> Decimal {
    values
        .iter()
        .fold(Decimal::ZERO, |total, v| total.saturating_add(v.total_usd_value))
}
