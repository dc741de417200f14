//! Pure derived metrics: borrow limits, previews, rates, USD totals, farm valuations.
//!
//! Nothing here performs I/O or mutates its inputs. Missing inputs count as
//! zero so callers always get a number to show.

pub mod account;
pub mod display;
pub mod error;
pub mod liquidity;
pub mod rates;
pub mod staked;
pub mod units;

pub use account::AccountSnapshot;
pub use display::{
    LimitPreview, MISSING, MarketDetails, MarketState, Transition, Unit, borrow_balance_display,
    format_usd, market_details, supply_balance_display,
};
pub use error::CalcError;
pub use liquidity::{
    AccountLiquidity, Operation, account_liquidity, borrow_limit, borrow_limit_used, project,
};
pub use rates::{DEFAULT_BLOCKS_PER_DAY, rate_per_block_to_apy};
pub use staked::{PoolReads, StakedValue, staked_value, total_staked_usd};
pub use units::{
    exchange_rate_to_decimal, mantissa_to_decimal, oracle_price_to_usd, scale_down,
    scale_down_saturating,
};

/// Before / after preview of `operation` for display.
pub fn preview(
    snapshot: &AccountSnapshot,
    operation: Operation,
    asset: &bao_types::Address,
    amount: rust_decimal::Decimal,
) -> LimitPreview {
    let before = account_liquidity(snapshot);
    let after = project(snapshot, operation, asset, amount);
    LimitPreview::new(&before, &after)
}
