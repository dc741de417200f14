//! Ballast: the fixed rate swap between the synthetic stablecoin and its backing token.

use anyhow::Context;
use bao_calc::scale_down;
use bao_chain::{ContractCall, ReadRequest, ReadResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::context::LensContext;

pub const BALLAST: &str = "ballast";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    /// Backing token in, synthetic out.
    Mint,
    /// Synthetic in, backing token out.
    Redeem,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallastInfo {
    /// Backing tokens held by the stabilizer, in whole tokens.
    pub reserves: Decimal,
    /// Mint limit of the stabilizer, in whole synthetic tokens.
    pub supply_cap: Decimal,
}

impl BallastInfo {
    /// Largest amount swappable in `direction`.
    pub const fn limit(&self, direction: SwapDirection) -> Decimal {
        match direction {
            SwapDirection::Mint => self.supply_cap,
            SwapDirection::Redeem => self.reserves,
        }
    }

    pub fn can_swap(&self, direction: SwapDirection, amount: Decimal) -> bool {
        amount.is_sign_positive() && !amount.is_zero() && amount <= self.limit(direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BallastField {
    Reserves,
    SupplyCap,
}

pub async fn fetch_ballast(ctx: LensContext) -> anyhow::Result<BallastInfo> {
    let ballast = ctx
        .network
        .ballast
        .as_ref()
        .context("no ballast configured for this network")?;

    let requests = vec![
        (
            BallastField::Reserves,
            ReadRequest::new(
                ballast.backing_token,
                ContractCall::BalanceOf {
                    owner: ballast.stabilizer,
                },
            ),
        ),
        (
            BallastField::SupplyCap,
            ReadRequest::new(ballast.stabilizer, ContractCall::SupplyCap),
        ),
    ];
    let mut batch = ctx.read(requests).await;

    let reserves = batch
        .take(&BallastField::Reserves)
        .and_then(ReadResult::into_uint)
        .context("reading ballast reserves")?;
    let supply_cap = batch
        .take(&BallastField::SupplyCap)
        .and_then(ReadResult::into_uint)
        .context("reading ballast supply cap")?;

    Ok(BallastInfo {
        reserves: scale_down(reserves, ballast.backing_decimals)?,
        supply_cap: scale_down(supply_cap, ballast.minted_decimals)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use rust_decimal::dec;

    use crate::config::LensConfig;
    use crate::testing::*;

    #[tokio::test]
    async fn test_fetch_ballast() {
        let chain = Arc::new(FakeChain::new());
        chain.set_uint(
            address(BACKING),
            ContractCall::BalanceOf {
                owner: address(STABILIZER),
            },
            units(250_000, 18),
        );
        chain.set_uint(address(STABILIZER), ContractCall::SupplyCap, units(1_000_000, 18));
        let ctx = LensContext::new(
            chain,
            Arc::new(network(vec![], vec![])),
            LensConfig::default(),
        );

        let info = fetch_ballast(ctx).await.unwrap();
        assert_eq!(info.reserves, dec!(250000));
        assert_eq!(info.supply_cap, dec!(1000000));
        assert!(info.can_swap(SwapDirection::Redeem, dec!(250000)));
        assert!(!info.can_swap(SwapDirection::Redeem, dec!(250000.01)));
        assert!(info.can_swap(SwapDirection::Mint, dec!(250000.01)));
        assert!(!info.can_swap(SwapDirection::Mint, Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_network_without_ballast() {
        let mut network = network(vec![], vec![]);
        network.ballast = None;
        let ctx = LensContext::new(
            Arc::new(FakeChain::new()),
            Arc::new(network),
            LensConfig::default(),
        );
        assert!(fetch_ballast(ctx).await.is_err());
    }
}
