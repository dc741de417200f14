use bao_types::MarketDescriptor;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::liquidity::AccountLiquidity;

/// Rendered for any value whose inputs are not loaded.
pub const MISSING: &str = "-";

/// Market wide state, in whole underlying tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    pub total_supplied: Decimal,
    pub total_borrows: Decimal,
    pub total_reserves: Decimal,
    pub reserve_factor: Decimal,
    pub collateral_factor: Decimal,
    /// Compounded yearly rates, in percent.
    pub supply_apy: Decimal,
    pub borrow_apy: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDetails {
    pub collateral_factor: String,
    pub reserve_factor: String,
    pub total_supplied: String,
    pub total_borrows: String,
    pub total_reserves: String,
    pub supply_apy: String,
    pub borrow_apy: String,
}

/// A value before and after a previewed operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition<T> {
    pub before: T,
    pub after: T,
}

impl Transition<Decimal> {
    pub fn render(&self, unit: Unit) -> String {
        format!("{} -> {}", unit.render(self.before), unit.render(self.after))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Usd,
    Percent,
}

impl Unit {
    fn render(self, value: Decimal) -> String {
        match self {
            Self::Usd => format_usd(value),
            Self::Percent => format!("{:.2}%", value.round_dp(2)),
        }
    }
}

/// Before / after view of a previewed operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPreview {
    pub borrow_limit: Transition<Decimal>,
    pub borrow_limit_remaining: Transition<Decimal>,
    pub borrow_limit_used: Transition<Decimal>,
}

impl LimitPreview {
    pub fn new(before: &AccountLiquidity, after: &AccountLiquidity) -> Self {
        Self {
            borrow_limit: Transition {
                before: before.borrow_limit(),
                after: after.borrow_limit(),
            },
            borrow_limit_remaining: Transition {
                before: before.usd_borrowable,
                after: after.usd_borrowable,
            },
            borrow_limit_used: Transition {
                before: before.borrow_limit_used(),
                after: after.borrow_limit_used(),
            },
        }
    }
}

/// `1234567.891` -> `$1,234,567.89`
pub fn format_usd(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    format!("{sign}${}.{fraction}", commify(integer))
}

fn commify(integer: &str) -> String {
    let mut out = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_fraction_percent(value: Decimal) -> String {
    format!("{}%", value.saturating_mul(Decimal::ONE_HUNDRED).normalize())
}

fn usd_or_missing(amount: Decimal, price: Option<Decimal>) -> String {
    match price {
        Some(price) if !amount.is_zero() => format_usd(amount.saturating_mul(price)),
        _ => MISSING.to_string(),
    }
}

/// Market statistics for display. USD totals need both a non-zero amount and
/// a known price, anything else renders as [`MISSING`].
pub fn market_details(state: Option<&MarketState>, price: Option<Decimal>) -> MarketDetails {
    let Some(state) = state else {
        return MarketDetails {
            collateral_factor: MISSING.to_string(),
            reserve_factor: MISSING.to_string(),
            total_supplied: MISSING.to_string(),
            total_borrows: MISSING.to_string(),
            total_reserves: MISSING.to_string(),
            supply_apy: MISSING.to_string(),
            borrow_apy: MISSING.to_string(),
        };
    };

    MarketDetails {
        collateral_factor: format_fraction_percent(state.collateral_factor),
        reserve_factor: if state.reserve_factor.is_zero() {
            MISSING.to_string()
        } else {
            format_fraction_percent(state.reserve_factor)
        },
        total_supplied: usd_or_missing(state.total_supplied, price),
        total_borrows: usd_or_missing(state.total_borrows, price),
        total_reserves: usd_or_missing(state.total_reserves, price),
        supply_apy: Unit::Percent.render(state.supply_apy),
        borrow_apy: Unit::Percent.render(state.borrow_apy),
    }
}

pub fn supply_balance_display(market: &MarketDescriptor, supplied: Decimal) -> String {
    format!("{:.2} {}", supplied.round_dp(2), market.underlying_symbol)
}

pub fn borrow_balance_display(market: &MarketDescriptor, borrowed: Decimal) -> String {
    format!("{:.2} {}", borrowed.round_dp(2), market.underlying_symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    fn state() -> MarketState {
        MarketState {
            total_supplied: dec!(1500000),
            total_borrows: dec!(250000.5),
            total_reserves: Decimal::ZERO,
            reserve_factor: dec!(0.1),
            collateral_factor: dec!(0.75),
            supply_apy: dec!(3.7212),
            borrow_apy: dec!(12.5),
        }
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(dec!(1234567.891)), "$1,234,567.89");
        assert_eq!(format_usd(dec!(12)), "$12.00");
        assert_eq!(format_usd(dec!(999.995)), "$1,000.00");
        assert_eq!(format_usd(dec!(-1500)), "-$1,500.00");
        assert_eq!(format_usd(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn test_market_details() {
        let details = market_details(Some(&state()), Some(dec!(2)));
        assert_eq!(details.collateral_factor, "75%");
        assert_eq!(details.reserve_factor, "10%");
        assert_eq!(details.total_supplied, "$3,000,000.00");
        assert_eq!(details.total_borrows, "$500,001.00");
        // Zero reserves render as missing.
        assert_eq!(details.total_reserves, MISSING);
        assert_eq!(details.supply_apy, "3.72%");
        assert_eq!(details.borrow_apy, "12.50%");
    }

    #[test]
    fn test_missing_price_renders_sentinel() {
        let details = market_details(Some(&state()), None);
        assert_eq!(details.total_supplied, MISSING);
        assert_eq!(details.total_borrows, MISSING);
        assert_eq!(details.total_reserves, MISSING);
        assert_eq!(details.collateral_factor, "75%");

        let details = market_details(None, Some(dec!(2)));
        assert_eq!(details.collateral_factor, MISSING);
        assert_eq!(details.supply_apy, MISSING);
    }

    #[test]
    fn test_preview_render() {
        let before = AccountLiquidity {
            usd_supply: dec!(200),
            usd_borrow: dec!(20),
            usd_borrowable: dec!(80),
        };
        let after = AccountLiquidity {
            usd_supply: dec!(120),
            usd_borrow: dec!(20),
            usd_borrowable: dec!(40),
        };
        let preview = LimitPreview::new(&before, &after);
        assert_eq!(preview.borrow_limit.render(Unit::Usd), "$100.00 -> $60.00");
        assert_eq!(
            preview.borrow_limit_used.render(Unit::Percent),
            "20.00% -> 33.33%"
        );
    }
}
