use bao_types::U256;
use rust_decimal::{Decimal, MathematicalOps};

use crate::error::CalcError;
use crate::units::mantissa_to_decimal;

/// Mainnet blocks per day at a 13.15s block time.
pub const DEFAULT_BLOCKS_PER_DAY: u32 = 6570;

const DAYS_PER_YEAR: u64 = 365;

/// `supplyRatePerBlock` / `borrowRatePerBlock` to a yearly rate in percent,
/// compounded daily: `((rate * blocks_per_day + 1) ^ 365 - 1) * 100`.
pub fn rate_per_block_to_apy(rate: U256, blocks_per_day: u32) -> Result<Decimal, CalcError> {
    let per_block = mantissa_to_decimal(rate)?;
    let overflow = || CalcError::Overflow(format!("{rate} per block over {DAYS_PER_YEAR} days"));

    let daily = per_block
        .checked_mul(Decimal::from(blocks_per_day))
        .and_then(|d| d.checked_add(Decimal::ONE))
        .ok_or_else(overflow)?;
    let yearly = daily.checked_powu(DAYS_PER_YEAR).ok_or_else(overflow)?;
    Ok((yearly - Decimal::ONE).saturating_mul(Decimal::ONE_HUNDRED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn test_daily_compounding() {
        // 0.01% a day.
        let apy = rate_per_block_to_apy(U256::from(100_000_000_000_000_u64), 1).unwrap();
        assert_eq!(apy.round_dp(2), dec!(3.72));
    }

    #[test]
    fn test_zero_rate() {
        let apy = rate_per_block_to_apy(U256::ZERO, DEFAULT_BLOCKS_PER_DAY).unwrap();
        assert_eq!(apy, Decimal::ZERO);
    }

    #[test]
    fn test_mainnet_blocks() {
        // About 2% a year.
        let apy = rate_per_block_to_apy(U256::from(8_255_000_000_u64), DEFAULT_BLOCKS_PER_DAY)
            .unwrap();
        assert!(apy > dec!(1.9) && apy < dec!(2.1), "{apy}");
    }

    #[test]
    fn test_absurd_rate_is_an_error() {
        let rate = U256::from(10_u64).pow(U256::from(20_u64));
        assert!(matches!(
            rate_per_block_to_apy(rate, DEFAULT_BLOCKS_PER_DAY),
            Err(CalcError::Overflow(_))
        ));
    }
}
