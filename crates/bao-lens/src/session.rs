use std::sync::Arc;

use bao_cache::{QueryState, Subscription};
use bao_calc::{
    AccountLiquidity, AccountSnapshot, LimitPreview, MISSING, MarketDetails, MarketState,
    Operation, StakedValue, account_liquidity, borrow_balance_display, market_details,
    supply_balance_display, total_staked_usd,
};
use bao_types::{Address, ChainId, Snapshot};
use rust_decimal::Decimal;

use crate::ballast::BallastInfo;
use crate::config::NetworkConfig;
use crate::distribution::DistributionInfo;
use crate::lens::Lens;
use crate::markets::ProtocolLiquidity;

/// A derived value together with the loading / error flags of its inputs.
#[derive(Debug, Clone, Default)]
pub struct View<T> {
    pub value: T,
    /// Any input has a fetch in flight.
    pub is_loading: bool,
    /// First error among the inputs, their last good values are still used.
    pub error: Option<Arc<anyhow::Error>>,
}

impl<T> View<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> View<U> {
        View {
            value: f(self.value),
            is_loading: self.is_loading,
            error: self.error,
        }
    }
}

#[derive(Default)]
struct Status {
    is_loading: bool,
    error: Option<Arc<anyhow::Error>>,
}

impl Status {
    fn absorb<V>(&mut self, state: &QueryState<V>) -> Option<Arc<V>> {
        self.is_loading |= state.is_loading;
        if self.error.is_none() {
            self.error.clone_from(&state.error);
        }
        state.value.clone()
    }

    fn view<T>(self, value: T) -> View<T> {
        View {
            value,
            is_loading: self.is_loading,
            error: self.error,
        }
    }
}

/// Every subscription held for one connected account.
///
/// Account scoped queries are keyed by the account, market wide ones are
/// shared with every other session on the same network.
pub struct Session {
    pub(crate) lens: Lens,
    pub(crate) account: Address,
    pub(crate) supply: Subscription<Snapshot<Decimal>>,
    pub(crate) borrow: Subscription<Snapshot<Decimal>>,
    pub(crate) rates: Subscription<Snapshot<Decimal>>,
    pub(crate) prices: Subscription<Snapshot<Decimal>>,
    pub(crate) factors: Subscription<Snapshot<Decimal>>,
    pub(crate) collateral: Subscription<Snapshot<bool>>,
    pub(crate) markets: Subscription<Snapshot<MarketState>>,
    pub(crate) farms: Subscription<Vec<StakedValue>>,
    pub(crate) ballast: Option<Subscription<BallastInfo>>,
    pub(crate) protocol: Subscription<ProtocolLiquidity>,
    pub(crate) approvals: Subscription<Snapshot<Decimal>>,
    pub(crate) distribution: Option<Subscription<DistributionInfo>>,
}

async fn refresh_one<V: Send + Sync + 'static>(subscription: &Subscription<V>) -> bool {
    match subscription.refresh().await {
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            tracing::debug!(key = %subscription.key(), "Refresh failed: {e:#}");
            false
        }
        None => {
            tracing::warn!(key = %subscription.key(), "Refresh of a dropped query");
            false
        }
    }
}

async fn refresh_optional<V>(subscription: Option<&Subscription<V>>) -> bool
where
    V: Send + Sync + 'static,
{
    match subscription {
        Some(subscription) => refresh_one(subscription).await,
        None => true,
    }
}

impl Session {
    pub const fn account(&self) -> Address {
        self.account
    }

    pub fn chain_id(&self) -> ChainId {
        self.lens.context().chain_id()
    }

    fn network(&self) -> &NetworkConfig {
        &self.lens.context().network
    }

    pub fn account_snapshot(&self) -> View<AccountSnapshot> {
        let mut status = Status::default();
        let snapshot = AccountSnapshot {
            supply_balances: status.absorb(&self.supply.state()),
            borrow_balances: status.absorb(&self.borrow.state()),
            exchange_rates: status.absorb(&self.rates.state()),
            prices: status.absorb(&self.prices.state()),
            collateral_factors: status.absorb(&self.factors.state()),
            collateral_markets: status.absorb(&self.collateral.state()),
        };
        status.view(snapshot)
    }

    pub fn account_liquidity(&self) -> View<AccountLiquidity> {
        self.account_snapshot().map(|s| account_liquidity(&s))
    }

    /// Borrow limit before and after `operation` of `amount` underlying tokens.
    pub fn preview(
        &self,
        operation: Operation,
        market: &Address,
        amount: Decimal,
    ) -> View<LimitPreview> {
        self.account_snapshot()
            .map(|s| bao_calc::preview(&s, operation, market, amount))
    }

    pub fn market_details(&self, market: &Address) -> View<MarketDetails> {
        let mut status = Status::default();
        let states = status.absorb(&self.markets.state());
        let prices = status.absorb(&self.prices.state());

        let state = states.as_ref().and_then(|s| s.get(market));
        let price = prices.as_ref().and_then(|p| p.get(market)).copied();
        status.view(market_details(state, price))
    }

    /// `"12.34 ETH"`, or the missing sentinel until balances load.
    pub fn supply_balance(&self, market: &Address) -> String {
        let snapshot = self.account_snapshot().value;
        match self.network().market(market) {
            Some(descriptor) if snapshot.supply_balances.is_some() => {
                supply_balance_display(descriptor, snapshot.supplied(market))
            }
            _ => MISSING.to_string(),
        }
    }

    pub fn borrow_balance(&self, market: &Address) -> String {
        let snapshot = self.account_snapshot().value;
        match self.network().market(market) {
            Some(descriptor) if snapshot.borrow_balances.is_some() => {
                borrow_balance_display(descriptor, snapshot.borrowed(market))
            }
            _ => MISSING.to_string(),
        }
    }

    pub fn staked_values(&self) -> View<Vec<StakedValue>> {
        let mut status = Status::default();
        let values = status.absorb(&self.farms.state());
        status.view(values.map(|v| v.as_ref().clone()).unwrap_or_default())
    }

    pub fn total_staked_usd(&self) -> View<Decimal> {
        self.staked_values().map(|values| total_staked_usd(&values))
    }

    /// `None` until loaded, and on networks without a ballast.
    pub fn ballast(&self) -> View<Option<BallastInfo>> {
        let Some(ballast) = &self.ballast else {
            return View::default();
        };
        let mut status = Status::default();
        let info = status.absorb(&ballast.state());
        status.view(info.as_deref().copied())
    }

    /// Allowance granted to each market, in whole underlying tokens.
    pub fn approvals(&self) -> View<Option<Arc<Snapshot<Decimal>>>> {
        let mut status = Status::default();
        let approvals = status.absorb(&self.approvals.state());
        status.view(approvals)
    }

    /// Whether `market` may pull the underlying token already. `false`
    /// until allowances load.
    pub fn is_approved(&self, market: &Address) -> View<bool> {
        self.approvals().map(|approvals| {
            approvals
                .and_then(|a| a.get(market).copied())
                .is_some_and(|allowance| allowance > Decimal::ZERO)
        })
    }

    /// `None` until loaded, and on networks without a distribution.
    pub fn distribution(&self) -> View<Option<DistributionInfo>> {
        let Some(distribution) = &self.distribution else {
            return View::default();
        };
        let mut status = Status::default();
        let info = status.absorb(&distribution.state());
        status.view(info.as_deref().copied())
    }

    pub fn protocol_liquidity(&self) -> View<Option<ProtocolLiquidity>> {
        let mut status = Status::default();
        let liquidity = status.absorb(&self.protocol.state());
        status.view(liquidity.as_deref().copied())
    }

    /// Waits until any input changes. `false` once an input slot is gone.
    pub async fn changed(&mut self) -> bool {
        let ballast = self.ballast.as_mut();
        let ballast = async move {
            match ballast {
                Some(subscription) => subscription.changed().await,
                None => std::future::pending().await,
            }
        };
        let distribution = self.distribution.as_mut();
        let distribution = async move {
            match distribution {
                Some(subscription) => subscription.changed().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            changed = self.supply.changed() => changed,
            changed = self.borrow.changed() => changed,
            changed = self.rates.changed() => changed,
            changed = self.prices.changed() => changed,
            changed = self.factors.changed() => changed,
            changed = self.collateral.changed() => changed,
            changed = self.markets.changed() => changed,
            changed = self.farms.changed() => changed,
            changed = self.protocol.changed() => changed,
            changed = self.approvals.changed() => changed,
            changed = ballast => changed,
            changed = distribution => changed,
        }
    }

    /// Refreshes every input, joining reads already in flight. Returns how
    /// many inputs failed, they keep their last good value.
    pub async fn refresh(&self) -> usize {
        let outcomes = tokio::join!(
            refresh_one(&self.supply),
            refresh_one(&self.borrow),
            refresh_one(&self.rates),
            refresh_one(&self.prices),
            refresh_one(&self.factors),
            refresh_one(&self.collateral),
            refresh_one(&self.markets),
            refresh_one(&self.farms),
            refresh_one(&self.protocol),
            refresh_one(&self.approvals),
            refresh_optional(self.ballast.as_ref()),
            refresh_optional(self.distribution.as_ref()),
        );
        let outcomes = [
            outcomes.0, outcomes.1, outcomes.2, outcomes.3, outcomes.4, outcomes.5, outcomes.6,
            outcomes.7, outcomes.8, outcomes.9, outcomes.10, outcomes.11,
        ];
        let failed = outcomes.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            tracing::debug!(account = %self.account, failed, "Refreshed with failures");
        }
        failed
    }

    /// Detaches from every slot. Account scoped slots no other session uses
    /// are dropped, results still in flight for them are ignored.
    pub(crate) fn close(self) {
        let Self {
            account,
            supply,
            borrow,
            collateral,
            protocol,
            approvals,
            distribution,
            ..
        } = self;
        let mut dropped = [
            supply.release(),
            borrow.release(),
            collateral.release(),
            protocol.release(),
            approvals.release(),
        ]
        .into_iter()
        .filter(|dropped| *dropped)
        .count();
        if distribution.is_some_and(Subscription::release) {
            dropped += 1;
        }
        tracing::info!(account = %account, dropped, "Closed session");
    }
}

/// What the lens serves for the current wallet state.
pub enum Connection {
    Disconnected,
    Connected(Box<Session>),
}

impl Connection {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Disconnected => None,
            Self::Connected(session) => Some(session.as_ref()),
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        match self {
            Self::Disconnected => None,
            Self::Connected(session) => Some(session.as_mut()),
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.session().map(Session::account)
    }

    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub fn account_liquidity(&self) -> View<AccountLiquidity> {
        self.session()
            .map_or_else(View::default, Session::account_liquidity)
    }

    pub fn preview(
        &self,
        operation: Operation,
        market: &Address,
        amount: Decimal,
    ) -> View<LimitPreview> {
        self.session().map_or_else(View::default, |session| {
            session.preview(operation, market, amount)
        })
    }

    pub fn market_details(&self, market: &Address) -> View<MarketDetails> {
        self.session().map_or_else(
            || View {
                value: market_details(None, None),
                is_loading: false,
                error: None,
            },
            |session| session.market_details(market),
        )
    }

    pub fn staked_values(&self) -> View<Vec<StakedValue>> {
        self.session()
            .map_or_else(View::default, Session::staked_values)
    }

    pub fn ballast(&self) -> View<Option<BallastInfo>> {
        self.session().map_or_else(View::default, Session::ballast)
    }

    pub(crate) fn close(self) {
        if let Self::Connected(session) = self {
            session.close();
        }
    }
}
