use std::future::Future;
use std::sync::Arc;

use bao_cache::{CacheConfig, Fetcher, QueryCache, QueryKey};
use bao_calc::{MarketState, StakedValue};
use bao_chain::ChainReader;
use bao_types::{Address, ChainId, Snapshot};
use futures::FutureExt;
use rust_decimal::Decimal;

use crate::ballast::{self, BALLAST, BallastInfo};
use crate::config::{LensConfig, Registry};
use crate::context::{LensContext, WalletContext};
use crate::distribution::{self, DISTRIBUTION, DistributionInfo};
use crate::error::LensError;
use crate::farms::{self, STAKED_VALUES};
use crate::markets::{self, ProtocolLiquidity};
use crate::session::{Connection, Session};

/// One cache per value type, keyed by query name, account and chain.
#[derive(Clone)]
pub(crate) struct Caches {
    pub(crate) snapshots: QueryCache<Snapshot<Decimal>>,
    pub(crate) flags: QueryCache<Snapshot<bool>>,
    pub(crate) markets: QueryCache<Snapshot<MarketState>>,
    pub(crate) farms: QueryCache<Vec<StakedValue>>,
    pub(crate) ballast: QueryCache<BallastInfo>,
    pub(crate) protocol: QueryCache<ProtocolLiquidity>,
    pub(crate) distribution: QueryCache<DistributionInfo>,
}

impl Caches {
    fn new(config: CacheConfig) -> Self {
        Self {
            snapshots: QueryCache::new(config),
            flags: QueryCache::new(config),
            markets: QueryCache::new(config),
            farms: QueryCache::new(config),
            ballast: QueryCache::new(config),
            protocol: QueryCache::new(config),
            distribution: QueryCache::new(config),
        }
    }

    fn revalidate_all(&self) -> usize {
        self.snapshots.revalidate_all()
            + self.flags.revalidate_all()
            + self.markets.revalidate_all()
            + self.farms.revalidate_all()
            + self.ballast.revalidate_all()
            + self.protocol.revalidate_all()
            + self.distribution.revalidate_all()
    }
}

fn fetcher<V, F, Fut>(ctx: &LensContext, fetch: F) -> Fetcher<V>
where
    F: Fn(LensContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    let ctx = ctx.clone();
    Arc::new(move || fetch(ctx.clone()).boxed())
}

/// Entry point: hands out sessions for connected wallets and revalidates
/// every live query on new blocks.
#[derive(Clone)]
pub struct Lens {
    ctx: LensContext,
    caches: Caches,
}

impl Lens {
    pub fn new(ctx: LensContext) -> Self {
        let caches = Caches::new(CacheConfig {
            dedupe_interval: ctx.config.dedupe_interval,
        });
        Self { ctx, caches }
    }

    /// Builds a lens for `chain_id` out of the registry entry of that chain.
    pub fn from_registry(
        reader: Arc<dyn ChainReader>,
        registry: &Registry,
        chain_id: ChainId,
        config: LensConfig,
    ) -> Result<Self, LensError> {
        let network = registry.network(chain_id)?;
        Ok(Self::new(LensContext::new(reader, network, config)))
    }

    pub const fn context(&self) -> &LensContext {
        &self.ctx
    }

    #[cfg(test)]
    pub(crate) const fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Opens a session for the wallet's account. Disconnected wallets and
    /// wallets on another network get [`Connection::Disconnected`].
    pub fn connect(&self, wallet: &WalletContext) -> Connection {
        let Some(account) = wallet.active_account() else {
            tracing::info!("Wallet disconnected");
            return Connection::Disconnected;
        };
        if wallet.chain_id != self.ctx.chain_id() {
            tracing::warn!(
                account = %account,
                wallet_chain = %wallet.chain_id,
                lens_chain = %self.ctx.chain_id(),
                "Wallet is on an unsupported network"
            );
            return Connection::Disconnected;
        }
        Connection::Connected(Box::new(self.open(account)))
    }

    /// Moves `current` to the state of `wallet`, keeping the session when the
    /// account did not change. The previous account's slots are dropped.
    pub fn switch(&self, current: Connection, wallet: &WalletContext) -> Connection {
        if current.account().is_some()
            && current.account() == wallet.active_account()
            && wallet.chain_id == self.ctx.chain_id()
        {
            return current;
        }
        current.close();
        self.connect(wallet)
    }

    /// Refetches every subscribed query. Queries with a read in flight get
    /// one more read once it lands.
    pub fn on_new_block(&self, block: u64) -> usize {
        let scheduled = self.caches.revalidate_all();
        tracing::debug!(block, scheduled, "Revalidating on new block");
        scheduled
    }

    fn open(&self, account: Address) -> Session {
        let ctx = &self.ctx;
        let chain_id = ctx.chain_id();
        let interval = ctx.config.refresh_interval;
        let scoped = |query| QueryKey::new(query, Some(account), chain_id);
        let shared = |query| QueryKey::new(query, None, chain_id);
        let caches = &self.caches;

        let ballast = ctx.network.ballast.is_some().then(|| {
            caches.ballast.subscribe(
                shared(BALLAST),
                fetcher(ctx, ballast::fetch_ballast),
                interval,
            )
        });

        let distribution = ctx.network.distribution.is_some().then(|| {
            caches.distribution.subscribe(
                scoped(DISTRIBUTION),
                fetcher(ctx, move |ctx| distribution::fetch_distribution(ctx, account)),
                interval,
            )
        });

        tracing::info!(account = %account, chain_id = %chain_id, "Opened session");
        Session {
            lens: self.clone(),
            account,
            supply: caches.snapshots.subscribe(
                scoped(markets::SUPPLY_BALANCES),
                fetcher(ctx, move |ctx| markets::fetch_supply_balances(ctx, account)),
                interval,
            ),
            borrow: caches.snapshots.subscribe(
                scoped(markets::BORROW_BALANCES),
                fetcher(ctx, move |ctx| markets::fetch_borrow_balances(ctx, account)),
                interval,
            ),
            rates: caches.snapshots.subscribe(
                shared(markets::EXCHANGE_RATES),
                fetcher(ctx, markets::fetch_exchange_rates),
                interval,
            ),
            prices: caches.snapshots.subscribe(
                shared(markets::MARKET_PRICES),
                fetcher(ctx, markets::fetch_market_prices),
                interval,
            ),
            factors: caches.snapshots.subscribe(
                shared(markets::COLLATERAL_FACTORS),
                fetcher(ctx, markets::fetch_collateral_factors),
                interval,
            ),
            collateral: caches.flags.subscribe(
                scoped(markets::COLLATERAL_MARKETS),
                fetcher(ctx, move |ctx| markets::fetch_collateral_markets(ctx, account)),
                interval,
            ),
            markets: caches.markets.subscribe(
                shared(markets::MARKET_STATES),
                fetcher(ctx, markets::fetch_market_states),
                interval,
            ),
            farms: caches.farms.subscribe(
                shared(STAKED_VALUES),
                fetcher(ctx, farms::fetch_staked_values),
                interval,
            ),
            ballast,
            protocol: caches.protocol.subscribe(
                scoped(markets::PROTOCOL_LIQUIDITY),
                fetcher(ctx, move |ctx| markets::fetch_protocol_liquidity(ctx, account)),
                interval,
            ),
            approvals: caches.snapshots.subscribe(
                scoped(markets::APPROVALS),
                fetcher(ctx, move |ctx| markets::fetch_approvals(ctx, account)),
                interval,
            ),
            distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use bao_calc::{MISSING, Operation};
    use bao_chain::{ContractCall, ReadResult};
    use bao_types::U256;
    use rust_decimal::dec;

    use crate::session::View;
    use crate::testing::*;
    use crate::testing::DISTRIBUTION;

    fn lens(chain: Arc<FakeChain>) -> Lens {
        let config = LensConfig {
            refresh_interval: Duration::from_secs(3600),
            dedupe_interval: Duration::ZERO,
            ..LensConfig::default()
        };
        let network = network(vec![market(MARKET_A, "ETH")], vec![]);
        Lens::new(LensContext::new(chain, Arc::new(network), config))
    }

    fn wallet(account: u8) -> WalletContext {
        WalletContext::connected(address(account), ChainId(1))
    }

    async fn settle<T>(session: &mut Session, view: impl Fn(&Session) -> View<T>) -> View<T> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let current = view(session);
                if !current.is_loading {
                    return current;
                }
                session.changed().await;
            }
        })
        .await
        .expect("inputs never settled")
    }

    #[tokio::test]
    async fn test_borrow_limit_and_withdraw_preview() {
        let chain = Arc::new(FakeChain::new());
        script_single_collateral(&chain);
        let lens = lens(chain);

        let mut connection = lens.connect(&wallet(ACCOUNT));
        let session = connection.session_mut().unwrap();
        let liquidity = settle(session, Session::account_liquidity).await;
        assert_eq!(liquidity.value.borrow_limit(), dec!(100));
        assert_eq!(liquidity.value.usd_supply, dec!(200));

        let a = address(MARKET_A);
        let preview = session.preview(Operation::Withdraw, &a, dec!(40)).value;
        assert_eq!(preview.borrow_limit.before, dec!(100));
        assert_eq!(preview.borrow_limit.after, dec!(60));
        assert_eq!(session.supply_balance(&a), "100.00 ETH");
        assert_eq!(session.borrow_balance(&a), "0.00 ETH");
    }

    #[tokio::test]
    async fn test_missing_price_renders_sentinel_totals() {
        let chain = Arc::new(FakeChain::new());
        script_market_state(&chain, MARKET_A);
        // No oracle price scripted.
        let lens = lens(chain);

        let mut connection = lens.connect(&wallet(ACCOUNT));
        let session = connection.session_mut().unwrap();
        let details = settle(session, |s| s.market_details(&address(MARKET_A))).await;
        assert!(details.error.is_some());
        assert_eq!(details.value.total_supplied, MISSING);
        assert_eq!(details.value.total_borrows, MISSING);
        assert_eq!(details.value.collateral_factor, "75%");
        assert_eq!(details.value.supply_apy, "0.00%");
    }

    #[tokio::test]
    async fn test_sessions_sharing_an_account_survive_one_switching_away() {
        let chain = Arc::new(FakeChain::new());
        script_single_collateral(&chain);
        let a = address(MARKET_A);
        let other = address(OTHER_ACCOUNT);
        chain.set_uint(a, ContractCall::BalanceOf { owner: other }, units(50, 8));
        chain.set_uint(a, ContractCall::BorrowBalanceStored { account: other }, 0);
        chain.set(
            address(COMPTROLLER),
            ContractCall::AssetsIn { account: other },
            ReadResult::Addresses(vec![a]),
        );
        let lens = lens(Arc::clone(&chain));

        let mut first = lens.connect(&wallet(ACCOUNT));
        let second = lens.connect(&wallet(ACCOUNT));
        let first_session = first.session_mut().unwrap();
        settle(first_session, Session::account_liquidity).await;

        let second = lens.switch(second, &wallet(OTHER_ACCOUNT));
        assert_eq!(second.account(), Some(other));
        let shared_key =
            QueryKey::new(markets::SUPPLY_BALANCES, Some(address(ACCOUNT)), ChainId(1));
        assert!(lens.caches().snapshots.contains(&shared_key));

        // The balance doubles.
        chain.set_uint(a, ContractCall::BalanceOf { owner: address(ACCOUNT) }, units(10_000, 8));
        lens.on_new_block(2);
        first_session.refresh().await;
        assert_eq!(first_session.account_liquidity().value.usd_supply, dec!(400));
    }

    #[tokio::test]
    async fn test_approvals_and_distribution_views() {
        let chain = Arc::new(FakeChain::new());
        script_single_collateral(&chain);
        let account = address(ACCOUNT);
        let underlying = market(MARKET_A, "ETH").underlying_address;
        let allowance = ContractCall::Allowance {
            owner: account,
            spender: address(MARKET_A),
        };
        chain.set_uint(underlying, allowance, 0);
        chain.set(
            address(DISTRIBUTION),
            ContractCall::Distribution { account },
            ReadResult::Distribution {
                date_started: 1_650_000_000,
                date_ended: 0,
                last_claim: 1_650_000_000,
                amount_owed_total: U256::from(units(10, 18)),
            },
        );
        let lens = lens(Arc::clone(&chain));

        let mut connection = lens.connect(&wallet(ACCOUNT));
        let session = connection.session_mut().unwrap();
        let approved = settle(session, |s| s.is_approved(&address(MARKET_A))).await;
        assert!(!approved.value);

        let info = settle(session, Session::distribution).await.value.unwrap();
        assert!(info.has_started());
        assert_eq!(info.amount_owed_total, dec!(10));

        chain.set_uint(underlying, allowance, units(1, 18));
        lens.on_new_block(2);
        session.refresh().await;
        assert!(session.is_approved(&address(MARKET_A)).value);
    }

    #[tokio::test]
    async fn test_disconnected_wallet_has_empty_views() {
        let chain = Arc::new(FakeChain::new());
        script_single_collateral(&chain);
        let lens = lens(Arc::clone(&chain));

        let connection = lens.connect(&WalletContext::disconnected(ChainId(1)));
        assert!(!connection.is_connected());
        assert_eq!(connection.account_liquidity().value.borrow_limit(), Decimal::ZERO);
        assert!(connection.staked_values().value.is_empty());
        assert_eq!(
            connection.market_details(&address(MARKET_A)).value.total_supplied,
            MISSING
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        let a = address(MARKET_A);
        assert_eq!(
            chain.calls(a, ContractCall::BalanceOf { owner: address(ACCOUNT) }),
            0
        );
    }

    #[tokio::test]
    async fn test_wrong_network_is_disconnected() {
        let lens = lens(Arc::new(FakeChain::new()));
        let connection = lens.connect(&WalletContext::connected(address(ACCOUNT), ChainId(100)));
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_account_switch_ignores_late_results() {
        let chain = Arc::new(FakeChain::new());
        script_single_collateral(&chain);
        let a = address(MARKET_A);
        let old = address(ACCOUNT);
        // The old account's balance read lands long after the switch.
        chain.slow(
            a,
            ContractCall::BalanceOf { owner: old },
            Duration::from_millis(200),
            ReadResult::Uint(U256::from(units(5000, 8))),
        );
        let other = address(OTHER_ACCOUNT);
        chain.set_uint(a, ContractCall::BalanceOf { owner: other }, units(50, 8));
        chain.set_uint(a, ContractCall::BorrowBalanceStored { account: other }, 0);
        chain.set(
            address(COMPTROLLER),
            ContractCall::AssetsIn { account: other },
            ReadResult::Addresses(vec![a]),
        );
        let lens = lens(Arc::clone(&chain));

        let connection = lens.connect(&wallet(ACCOUNT));
        let mut connection = lens.switch(connection, &wallet(OTHER_ACCOUNT));
        assert_eq!(connection.account(), Some(other));

        let old_key = QueryKey::new(markets::SUPPLY_BALANCES, Some(old), ChainId(1));
        assert!(!lens.caches().snapshots.contains(&old_key));

        let session = connection.session_mut().unwrap();
        let liquidity = settle(session, Session::account_liquidity).await;
        // 50 market tokens at 0.02, $2, factor 0.5.
        assert_eq!(liquidity.value.usd_supply, dec!(2));
        assert_eq!(liquidity.value.borrow_limit(), dec!(1));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(lens.caches().snapshots.get(&old_key).is_none());
        assert_eq!(session.account_liquidity().value.usd_supply, dec!(2));
    }

    #[tokio::test]
    async fn test_same_account_keeps_the_session() {
        let chain = Arc::new(FakeChain::new());
        script_single_collateral(&chain);
        let lens = lens(Arc::clone(&chain));

        let mut connection = lens.connect(&wallet(ACCOUNT));
        settle(connection.session_mut().unwrap(), Session::account_liquidity).await;
        let connection = lens.switch(connection, &wallet(ACCOUNT));
        assert_eq!(connection.account(), Some(address(ACCOUNT)));

        let balance = ContractCall::BalanceOf {
            owner: address(ACCOUNT),
        };
        assert_eq!(chain.calls(address(MARKET_A), balance), 1);
    }

    #[tokio::test]
    async fn test_new_block_revalidates_subscriptions() {
        let chain = Arc::new(FakeChain::new());
        script_single_collateral(&chain);
        let lens = lens(Arc::clone(&chain));

        let mut connection = lens.connect(&wallet(ACCOUNT));
        let session = connection.session_mut().unwrap();
        settle(session, Session::account_liquidity).await;

        let balance = ContractCall::BalanceOf {
            owner: address(ACCOUNT),
        };
        assert_eq!(chain.calls(address(MARKET_A), balance), 1);

        // Markets, protocol, farms and ballast are subscribed too.
        assert!(lens.on_new_block(2) >= 6);
        session.refresh().await;
        assert_eq!(chain.calls(address(MARKET_A), balance), 2);
    }
}
