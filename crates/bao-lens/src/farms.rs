//! Masterchef farm valuation.

use anyhow::{Context, bail};
use bao_calc::{PoolReads, StakedValue, oracle_price_to_usd, scale_down, staked_value};
use bao_chain::{BatchResult, ContractCall, ReadRequest, ReadResult};
use bao_types::{Address, FarmDescriptor};
use futures::future::join_all;
use rust_decimal::Decimal;

use crate::context::LensContext;

pub const STAKED_VALUES: &str = "staked_values";

/// LP pairs and WETH both use 18 decimals.
const LP_DECIMALS: u32 = 18;
const WETH_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PoolField {
    TokenInLp,
    WethInLp,
    LpStaked,
    LpTotalSupply,
    Info,
}

fn take_units(
    batch: &mut BatchResult<PoolField>,
    field: PoolField,
    decimals: u32,
) -> anyhow::Result<Decimal> {
    let raw = batch
        .take(&field)
        .and_then(ReadResult::into_uint)
        .with_context(|| format!("{field:?}"))?;
    Ok(scale_down(raw, decimals)?)
}

async fn fetch_pool(
    ctx: &LensContext,
    masterchef: Address,
    farm: &FarmDescriptor,
) -> anyhow::Result<PoolReads> {
    let lp = farm.lp_address;
    let requests = vec![
        (
            PoolField::TokenInLp,
            ReadRequest::new(farm.token_address, ContractCall::BalanceOf { owner: lp }),
        ),
        (
            PoolField::WethInLp,
            ReadRequest::new(ctx.network.weth, ContractCall::BalanceOf { owner: lp }),
        ),
        (
            PoolField::LpStaked,
            ReadRequest::new(lp, ContractCall::BalanceOf { owner: masterchef }),
        ),
        (
            PoolField::LpTotalSupply,
            ReadRequest::new(lp, ContractCall::TotalSupply),
        ),
        (
            PoolField::Info,
            ReadRequest::new(masterchef, ContractCall::PoolInfo { pid: farm.pid }),
        ),
    ];
    let mut batch = ctx.read(requests).await;

    let (lp_token, alloc_point) = batch
        .take(&PoolField::Info)
        .and_then(ReadResult::into_pool)
        .context("Info")?;
    if lp_token != lp {
        bail!("masterchef reports LP {lp_token}, registry has {lp}");
    }

    Ok(PoolReads {
        pid: farm.pid,
        token_in_lp: take_units(&mut batch, PoolField::TokenInLp, farm.token_decimals)?,
        weth_in_lp: take_units(&mut batch, PoolField::WethInLp, WETH_DECIMALS)?,
        lp_staked: take_units(&mut batch, PoolField::LpStaked, LP_DECIMALS)?,
        lp_total_supply: take_units(&mut batch, PoolField::LpTotalSupply, LP_DECIMALS)?,
        alloc_point: scale_down(alloc_point, 0)?,
        total_alloc_point: Decimal::ZERO,
    })
}

/// WETH USD price from the lending oracle, when the registry names a market for it.
pub async fn fetch_weth_price(ctx: &LensContext) -> Option<Decimal> {
    let market = ctx.network.weth_price_market?;
    let request = ReadRequest::new(ctx.network.oracle, ContractCall::UnderlyingPrice { market });
    let price = ctx
        .read(vec![((), request)])
        .await
        .take(&())
        .and_then(ReadResult::into_uint)
        .map_err(anyhow::Error::from)
        .and_then(|raw| Ok(oracle_price_to_usd(raw, WETH_DECIMALS)?));

    match price {
        Ok(price) => Some(price),
        Err(e) => {
            tracing::warn!("WETH price unavailable: {e:#}");
            None
        }
    }
}

/// Values every configured farm, reading all pools concurrently.
///
/// A pool whose reads fail is left out of the result. Only a failing
/// `totalAllocPoint` read fails the whole fetch, since every pool weight
/// depends on it.
pub async fn fetch_staked_values(ctx: LensContext) -> anyhow::Result<Vec<StakedValue>> {
    let farms = &ctx.network.farms;
    if farms.is_empty() {
        return Ok(Vec::new());
    }
    let masterchef = ctx
        .network
        .masterchef
        .context("farms configured without a masterchef")?;

    let total_alloc_point = async {
        let request = ReadRequest::new(masterchef, ContractCall::TotalAllocPoint);
        ctx.read(vec![((), request)])
            .await
            .take(&())
            .and_then(ReadResult::into_uint)
    };
    let pools = join_all(farms.iter().map(|farm| fetch_pool(&ctx, masterchef, farm)));
    let (total_alloc_point, pools, weth_price) =
        tokio::join!(total_alloc_point, pools, fetch_weth_price(&ctx));

    let total_alloc_point =
        scale_down(total_alloc_point.context("reading totalAllocPoint")?, 0)?;

    let mut values = Vec::with_capacity(farms.len());
    for (farm, pool) in farms.iter().zip(pools) {
        match pool {
            Ok(reads) => values.push(staked_value(
                &PoolReads {
                    total_alloc_point,
                    ..reads
                },
                weth_price,
            )),
            Err(e) => {
                tracing::warn!(pid = farm.pid, farm = %farm.symbol, "Withholding pool: {e:#}");
            }
        }
    }
    Ok(values)
}
