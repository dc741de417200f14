//! Lending market reads: account balances, rates, prices and market state.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, bail};
use bao_calc::{
    MarketState, exchange_rate_to_decimal, mantissa_to_decimal, oracle_price_to_usd,
    rate_per_block_to_apy, scale_down, scale_down_saturating,
};
use bao_chain::{ContractCall, ReadRequest, ReadResult};
use bao_types::{Address, MarketDescriptor, Snapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::context::LensContext;

pub const SUPPLY_BALANCES: &str = "supply_balances";
pub const BORROW_BALANCES: &str = "borrow_balances";
pub const EXCHANGE_RATES: &str = "exchange_rates";
pub const MARKET_PRICES: &str = "market_prices";
pub const COLLATERAL_FACTORS: &str = "collateral_factors";
pub const COLLATERAL_MARKETS: &str = "collateral_markets";
pub const MARKET_STATES: &str = "market_states";
pub const PROTOCOL_LIQUIDITY: &str = "protocol_liquidity";
pub const APPROVALS: &str = "approvals";

/// One read per configured market, all of which must succeed.
async fn per_market<T, R, C>(
    ctx: &LensContext,
    account: Option<Address>,
    request: R,
    convert: C,
) -> anyhow::Result<Snapshot<T>>
where
    R: Fn(&MarketDescriptor) -> ReadRequest,
    C: Fn(&MarketDescriptor, ReadResult) -> anyhow::Result<T>,
{
    let markets = &ctx.network.markets;
    let requests = markets.iter().map(|m| (m.address, request(m))).collect();
    let (mut batch, block) = tokio::join!(ctx.read(requests), ctx.block_number());

    let mut values = HashMap::with_capacity(markets.len());
    for market in markets {
        let result = batch
            .take(&market.address)
            .with_context(|| format!("reading market {}", market.symbol))?;
        let value = convert(market, result)
            .with_context(|| format!("converting market {}", market.symbol))?;
        values.insert(market.address, value);
    }
    Ok(Snapshot::new(account, ctx.chain_id(), block, values))
}

/// Market token balances of `account`, in whole market tokens.
pub async fn fetch_supply_balances(
    ctx: LensContext,
    account: Address,
) -> anyhow::Result<Snapshot<Decimal>> {
    per_market(
        &ctx,
        Some(account),
        |m| ReadRequest::new(m.address, ContractCall::BalanceOf { owner: account }),
        |m, result| Ok(scale_down(result.into_uint()?, m.decimals)?),
    )
    .await
}

/// Borrowed amounts of `account`, in whole underlying tokens.
pub async fn fetch_borrow_balances(
    ctx: LensContext,
    account: Address,
) -> anyhow::Result<Snapshot<Decimal>> {
    per_market(
        &ctx,
        Some(account),
        |m| ReadRequest::new(m.address, ContractCall::BorrowBalanceStored { account }),
        |m, result| Ok(scale_down(result.into_uint()?, m.underlying_decimals)?),
    )
    .await
}

pub async fn fetch_exchange_rates(ctx: LensContext) -> anyhow::Result<Snapshot<Decimal>> {
    per_market(
        &ctx,
        None,
        |m| ReadRequest::new(m.address, ContractCall::ExchangeRateStored),
        |m, result| {
            Ok(exchange_rate_to_decimal(
                result.into_uint()?,
                m.underlying_decimals,
                m.decimals,
            )?)
        },
    )
    .await
}

/// USD price of one whole underlying token per market.
pub async fn fetch_market_prices(ctx: LensContext) -> anyhow::Result<Snapshot<Decimal>> {
    let oracle = ctx.network.oracle;
    per_market(
        &ctx,
        None,
        |m| ReadRequest::new(oracle, ContractCall::UnderlyingPrice { market: m.address }),
        |m, result| Ok(oracle_price_to_usd(result.into_uint()?, m.underlying_decimals)?),
    )
    .await
}

pub async fn fetch_collateral_factors(ctx: LensContext) -> anyhow::Result<Snapshot<Decimal>> {
    let comptroller = ctx.network.comptroller;
    per_market(
        &ctx,
        None,
        |m| ReadRequest::new(comptroller, ContractCall::Markets { market: m.address }),
        |_, result| {
            let (is_listed, mantissa) = result.into_market()?;
            if !is_listed {
                return Ok(Decimal::ZERO);
            }
            Ok(mantissa_to_decimal(mantissa)?)
        },
    )
    .await
}

/// Which configured markets `account` entered as collateral.
pub async fn fetch_collateral_markets(
    ctx: LensContext,
    account: Address,
) -> anyhow::Result<Snapshot<bool>> {
    let request = ReadRequest::new(ctx.network.comptroller, ContractCall::AssetsIn { account });
    let (mut batch, block) = tokio::join!(ctx.read(vec![((), request)]), ctx.block_number());
    let entered: HashSet<Address> = batch
        .take(&())
        .context("reading entered markets")?
        .into_addresses()?
        .into_iter()
        .collect();

    let values = ctx
        .network
        .markets
        .iter()
        .map(|m| (m.address, entered.contains(&m.address)))
        .collect();
    Ok(Snapshot::new(Some(account), ctx.chain_id(), block, values))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MarketField {
    TotalSupply,
    ExchangeRate,
    TotalBorrows,
    TotalReserves,
    ReserveFactor,
    SupplyRate,
    BorrowRate,
    Listing,
}

impl MarketField {
    const ALL: [Self; 8] = [
        Self::TotalSupply,
        Self::ExchangeRate,
        Self::TotalBorrows,
        Self::TotalReserves,
        Self::ReserveFactor,
        Self::SupplyRate,
        Self::BorrowRate,
        Self::Listing,
    ];

    fn request(self, ctx: &LensContext, market: &MarketDescriptor) -> ReadRequest {
        let on_market = |call| ReadRequest::new(market.address, call);
        match self {
            Self::TotalSupply => on_market(ContractCall::TotalSupply),
            Self::ExchangeRate => on_market(ContractCall::ExchangeRateStored),
            Self::TotalBorrows => on_market(ContractCall::TotalBorrows),
            Self::TotalReserves => on_market(ContractCall::TotalReserves),
            Self::ReserveFactor => on_market(ContractCall::ReserveFactorMantissa),
            Self::SupplyRate => on_market(ContractCall::SupplyRatePerBlock),
            Self::BorrowRate => on_market(ContractCall::BorrowRatePerBlock),
            Self::Listing => ReadRequest::new(
                ctx.network.comptroller,
                ContractCall::Markets {
                    market: market.address,
                },
            ),
        }
    }
}

fn market_state(
    market: &MarketDescriptor,
    blocks_per_day: u32,
    batch: &mut bao_chain::BatchResult<(Address, MarketField)>,
) -> anyhow::Result<MarketState> {
    let mut uint = |field| {
        batch
            .take(&(market.address, field))
            .and_then(ReadResult::into_uint)
            .with_context(|| format!("{field:?}"))
    };

    let total_supply = scale_down(uint(MarketField::TotalSupply)?, market.decimals)?;
    let exchange_rate = exchange_rate_to_decimal(
        uint(MarketField::ExchangeRate)?,
        market.underlying_decimals,
        market.decimals,
    )?;
    let underlying = |raw| scale_down(raw, market.underlying_decimals);
    let total_borrows = underlying(uint(MarketField::TotalBorrows)?)?;
    let total_reserves = underlying(uint(MarketField::TotalReserves)?)?;
    let reserve_factor = mantissa_to_decimal(uint(MarketField::ReserveFactor)?)?;
    let supply_apy = rate_per_block_to_apy(uint(MarketField::SupplyRate)?, blocks_per_day)?;
    let borrow_apy = rate_per_block_to_apy(uint(MarketField::BorrowRate)?, blocks_per_day)?;

    let (is_listed, collateral_factor) = batch
        .take(&(market.address, MarketField::Listing))
        .and_then(ReadResult::into_market)
        .context("Listing")?;
    let collateral_factor = if is_listed {
        mantissa_to_decimal(collateral_factor)?
    } else {
        Decimal::ZERO
    };

    Ok(MarketState {
        total_supplied: total_supply.saturating_mul(exchange_rate),
        total_borrows,
        total_reserves,
        reserve_factor,
        collateral_factor,
        supply_apy,
        borrow_apy,
    })
}

/// Market wide statistics. A market whose reads fail is left out of the
/// snapshot and renders as missing, the others are still reported.
pub async fn fetch_market_states(ctx: LensContext) -> anyhow::Result<Snapshot<MarketState>> {
    let markets = &ctx.network.markets;
    let mut requests = Vec::with_capacity(markets.len() * MarketField::ALL.len());
    for market in markets {
        for field in MarketField::ALL {
            requests.push(((market.address, field), field.request(&ctx, market)));
        }
    }
    let (mut batch, block) = tokio::join!(ctx.read(requests), ctx.block_number());

    let mut values = HashMap::with_capacity(markets.len());
    for market in markets {
        match market_state(market, ctx.network.blocks_per_day, &mut batch) {
            Ok(state) => {
                values.insert(market.address, state);
            }
            Err(e) => tracing::warn!(market = %market.symbol, "Withholding market state: {e:#}"),
        }
    }
    if values.is_empty() && !markets.is_empty() {
        bail!("every market state read failed");
    }
    Ok(Snapshot::new(None, ctx.chain_id(), block, values))
}

/// Underlying tokens each market may pull from `account`, in whole tokens.
///
/// Native coin markets need no approval and report `Decimal::MAX`, as do
/// allowances too large for a `Decimal`.
pub async fn fetch_approvals(
    ctx: LensContext,
    account: Address,
) -> anyhow::Result<Snapshot<Decimal>> {
    let markets = &ctx.network.markets;
    let requests = markets
        .iter()
        .filter(|m| !m.is_native())
        .map(|m| {
            let call = ContractCall::Allowance {
                owner: account,
                spender: m.address,
            };
            (m.address, ReadRequest::new(m.underlying_address, call))
        })
        .collect();
    let (mut batch, block) = tokio::join!(ctx.read(requests), ctx.block_number());

    let mut values = HashMap::with_capacity(markets.len());
    for market in markets {
        let allowance = if market.is_native() {
            Decimal::MAX
        } else {
            let raw = batch
                .take(&market.address)
                .and_then(ReadResult::into_uint)
                .with_context(|| format!("reading {} allowance", market.underlying_symbol))?;
            scale_down_saturating(raw, market.underlying_decimals)
        };
        values.insert(market.address, allowance);
    }
    Ok(Snapshot::new(Some(account), ctx.chain_id(), block, values))
}

/// Liquidity and shortfall as computed by the comptroller itself, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolLiquidity {
    pub liquidity: Decimal,
    pub shortfall: Decimal,
}

pub async fn fetch_protocol_liquidity(
    ctx: LensContext,
    account: Address,
) -> anyhow::Result<ProtocolLiquidity> {
    let request = ReadRequest::new(
        ctx.network.comptroller,
        ContractCall::AccountLiquidity { account },
    );
    let (error_code, liquidity, shortfall) = ctx
        .read(vec![((), request)])
        .await
        .take(&())
        .context("reading account liquidity")?
        .into_liquidity()?;
    if !error_code.is_zero() {
        bail!("comptroller returned error code {error_code}");
    }
    Ok(ProtocolLiquidity {
        liquidity: mantissa_to_decimal(liquidity)?,
        shortfall: mantissa_to_decimal(shortfall)?,
    })
}
