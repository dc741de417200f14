use bao_types::U256;
use rust_decimal::Decimal;

use crate::error::CalcError;

/// Most significant digits (and largest scale) a `Decimal` can carry.
const MAX_DIGITS: usize = 28;

/// Oracle prices are scaled so that `price * balance` is a 36 decimals USD value.
const ORACLE_SCALE: u32 = 36;

/// Mantissas (collateral factor, reserve factor...) are 18 decimals fixed point.
const MANTISSA_SCALE: u32 = 18;

/// Shifts an on-chain integer down by `decimals`: `raw / 10^decimals`.
///
/// Digits beyond what a `Decimal` holds are truncated from the least
/// significant side.
pub fn scale_down(raw: U256, decimals: u32) -> Result<Decimal, CalcError> {
    if raw.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let digits = raw.to_string();
    let scale = decimals as usize;
    let excess = digits
        .len()
        .saturating_sub(MAX_DIGITS)
        .max(scale.saturating_sub(MAX_DIGITS));

    if excess >= digits.len() {
        return Ok(Decimal::ZERO);
    }
    if excess > scale {
        return Err(CalcError::Overflow(format!("{digits} / 10^{decimals}")));
    }

    let kept = &digits[..digits.len() - excess];
    let mantissa: i128 = kept
        .parse()
        .map_err(|_| CalcError::Overflow(digits.clone()))?;
    let value = Decimal::try_from_i128_with_scale(mantissa, (scale - excess) as u32)
        .map_err(|e| CalcError::Overflow(format!("{digits}: {e}")))?;
    Ok(value.normalize())
}

/// [`scale_down`] clamped to `Decimal::MAX`, for amounts like unlimited
/// allowances that routinely exceed what a `Decimal` holds.
pub fn scale_down_saturating(raw: U256, decimals: u32) -> Decimal {
    scale_down(raw, decimals).unwrap_or(Decimal::MAX)
}

/// Oracle `getUnderlyingPrice` to the USD price of one whole underlying token.
pub fn oracle_price_to_usd(raw: U256, underlying_decimals: u32) -> Result<Decimal, CalcError> {
    let shift = ORACLE_SCALE.checked_sub(underlying_decimals).ok_or_else(|| {
        CalcError::InvalidDecimals(format!("{underlying_decimals} underlying decimals"))
    })?;
    scale_down(raw, shift)
}

pub fn mantissa_to_decimal(raw: U256) -> Result<Decimal, CalcError> {
    scale_down(raw, MANTISSA_SCALE)
}

/// `exchangeRateStored` to the amount of underlying one whole market token is worth.
pub fn exchange_rate_to_decimal(
    raw: U256,
    underlying_decimals: u32,
    market_decimals: u32,
) -> Result<Decimal, CalcError> {
    let shift = (MANTISSA_SCALE + underlying_decimals)
        .checked_sub(market_decimals)
        .ok_or_else(|| {
            CalcError::InvalidDecimals(format!(
                "{market_decimals} market decimals for {underlying_decimals} underlying decimals"
            ))
        })?;
    scale_down(raw, shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    fn big(s: &str) -> U256 {
        s.parse().unwrap()
    }

    #[test]
    fn test_scale_down() {
        assert_eq!(scale_down(big("1500000"), 6).unwrap(), dec!(1.5));
        assert_eq!(scale_down(big("0"), 18).unwrap(), Decimal::ZERO);
        assert_eq!(scale_down(big("42"), 0).unwrap(), dec!(42));
    }

    #[test]
    fn test_scale_down_truncates_beyond_precision() {
        // 1 wei at 36 decimals is below what a Decimal can represent.
        assert_eq!(scale_down(big("1"), 36).unwrap(), Decimal::ZERO);
        // 33 digits with 18 decimals, the last 5 are dropped.
        let value = scale_down(big("123456789012345678901234567890123"), 18).unwrap();
        assert_eq!(value, dec!(123456789012345.6789012345678));
    }

    #[test]
    fn test_scale_down_overflow() {
        let huge = big(&"9".repeat(40));
        assert!(matches!(scale_down(huge, 0), Err(CalcError::Overflow(_))));
        assert_eq!(scale_down_saturating(huge, 0), Decimal::MAX);
        assert_eq!(scale_down_saturating(U256::MAX, 18), Decimal::MAX);
        assert_eq!(scale_down_saturating(big("1500000"), 6), dec!(1.5));
    }

    #[test]
    fn test_oracle_price_uses_36_minus_decimals() {
        // A $1 six decimals token: 1e30.
        let usdc = big(&format!("1{}", "0".repeat(30)));
        assert_eq!(oracle_price_to_usd(usdc, 6).unwrap(), dec!(1));

        // A $2 eighteen decimals token: 2e18.
        let eth_like = big("2000000000000000000");
        assert_eq!(oracle_price_to_usd(eth_like, 18).unwrap(), dec!(2));

        assert!(oracle_price_to_usd(eth_like, 40).is_err());
    }

    #[test]
    fn test_exchange_rate() {
        // 0.02 underlying per market token, 18 decimals underlying, 8 decimals market.
        let raw = big("200000000000000000000000000");
        assert_eq!(exchange_rate_to_decimal(raw, 18, 8).unwrap(), dec!(0.02));
    }

    #[test]
    fn test_mantissa() {
        assert_eq!(
            mantissa_to_decimal(big("750000000000000000")).unwrap(),
            dec!(0.75)
        );
    }
}
