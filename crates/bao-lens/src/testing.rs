//! In-memory chain used by the lens tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bao_chain::{ChainReader, ContractCall, ReadError, ReadRequest, ReadResult};
use bao_types::{Address, ChainId, FarmDescriptor, MarketDescriptor, U256};

use crate::config::{BallastConfig, NetworkConfig};

#[derive(Clone)]
enum Reply {
    Value(ReadResult),
    Fail,
    Slow(Duration, ReadResult),
}

pub(crate) struct FakeChain {
    replies: Mutex<HashMap<ReadRequest, Reply>>,
    calls: Mutex<HashMap<ReadRequest, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    block: AtomicU64,
    latency: Duration,
}

impl FakeChain {
    pub(crate) fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Every read takes at least `latency`.
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            block: AtomicU64::new(1),
            latency,
        }
    }

    pub(crate) fn set(&self, contract: Address, call: ContractCall, result: ReadResult) {
        self.replies
            .lock()
            .unwrap()
            .insert(ReadRequest::new(contract, call), Reply::Value(result));
    }

    pub(crate) fn set_uint(&self, contract: Address, call: ContractCall, value: u128) {
        self.set(contract, call, ReadResult::Uint(U256::from(value)));
    }

    pub(crate) fn fail(&self, contract: Address, call: ContractCall) {
        self.replies
            .lock()
            .unwrap()
            .insert(ReadRequest::new(contract, call), Reply::Fail);
    }

    pub(crate) fn slow(
        &self,
        contract: Address,
        call: ContractCall,
        delay: Duration,
        result: ReadResult,
    ) {
        self.replies
            .lock()
            .unwrap()
            .insert(ReadRequest::new(contract, call), Reply::Slow(delay, result));
    }

    pub(crate) fn calls(&self, contract: Address, call: ContractCall) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&ReadRequest::new(contract, call))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn set_block(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn call(&self, request: &ReadRequest) -> Result<ReadResult, ReadError> {
        *self.calls.lock().unwrap().entry(*request).or_default() += 1;
        let reply = self.replies.lock().unwrap().get(request).cloned();

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;

        let outcome = match reply {
            Some(Reply::Value(result)) => Ok(result),
            Some(Reply::Slow(delay, result)) => {
                tokio::time::sleep(delay).await;
                Ok(result)
            }
            Some(Reply::Fail) => Err(ReadError::Rpc {
                code: -32000,
                message: "execution reverted".to_string(),
            }),
            None => Err(ReadError::Transport(format!(
                "nothing scripted for {} on {}",
                request.call.method(),
                request.contract
            ))),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn block_number(&self) -> Result<u64, ReadError> {
        Ok(self.block.load(Ordering::SeqCst))
    }
}

pub(crate) fn address(byte: u8) -> Address {
    Address::new([byte; 20])
}

pub(crate) fn units(whole: u128, decimals: u32) -> u128 {
    whole * 10_u128.pow(decimals)
}

pub(crate) const COMPTROLLER: u8 = 0x01;
pub(crate) const ORACLE: u8 = 0x02;
pub(crate) const MASTERCHEF: u8 = 0x03;
pub(crate) const WETH: u8 = 0x04;
pub(crate) const STABILIZER: u8 = 0x05;
pub(crate) const BACKING: u8 = 0x06;
pub(crate) const DISTRIBUTION: u8 = 0x07;
pub(crate) const MARKET_A: u8 = 0x0a;
pub(crate) const MARKET_B: u8 = 0x0b;
pub(crate) const ACCOUNT: u8 = 0xee;
pub(crate) const OTHER_ACCOUNT: u8 = 0xdd;

pub(crate) fn market(byte: u8, symbol: &str) -> MarketDescriptor {
    MarketDescriptor {
        address: address(byte),
        underlying_address: address(byte + 0x10),
        underlying_decimals: 18,
        decimals: 8,
        symbol: format!("b{symbol}"),
        underlying_symbol: symbol.to_string(),
        icon: None,
    }
}

pub(crate) fn farm(pid: u64) -> FarmDescriptor {
    let byte = 0x40 + u8::try_from(pid).unwrap() * 2;
    FarmDescriptor {
        pid,
        lp_address: address(byte),
        token_address: address(byte + 1),
        token_decimals: 18,
        symbol: format!("LP{pid}"),
        icon: None,
    }
}

pub(crate) fn network(markets: Vec<MarketDescriptor>, farms: Vec<FarmDescriptor>) -> NetworkConfig {
    NetworkConfig {
        chain_id: ChainId(1),
        comptroller: address(COMPTROLLER),
        oracle: address(ORACLE),
        masterchef: Some(address(MASTERCHEF)),
        weth: address(WETH),
        weth_price_market: None,
        distribution: Some(address(DISTRIBUTION)),
        blocks_per_day: bao_calc::DEFAULT_BLOCKS_PER_DAY,
        ballast: Some(BallastConfig {
            stabilizer: address(STABILIZER),
            backing_token: address(BACKING),
            backing_decimals: 18,
            minted_decimals: 18,
        }),
        markets,
        farms,
    }
}

/// Market A: 5 000 market tokens at 0.02 each (100 underlying), $2, factor
/// 0.5, entered as collateral by [`ACCOUNT`]. Borrow limit is $100.
pub(crate) fn script_single_collateral(chain: &FakeChain) {
    let a = address(MARKET_A);
    let account = address(ACCOUNT);
    let comptroller = address(COMPTROLLER);

    chain.set_uint(a, ContractCall::BalanceOf { owner: account }, units(5000, 8));
    chain.set_uint(a, ContractCall::BorrowBalanceStored { account }, 0);
    // Scaled by 10^(18 + 18 - 8).
    chain.set_uint(a, ContractCall::ExchangeRateStored, 2 * 10_u128.pow(26));
    chain.set_uint(address(ORACLE), ContractCall::UnderlyingPrice { market: a }, units(2, 18));
    chain.set(
        comptroller,
        ContractCall::Markets { market: a },
        ReadResult::Market {
            is_listed: true,
            collateral_factor_mantissa: U256::from(5 * 10_u128.pow(17)),
        },
    );
    chain.set(
        comptroller,
        ContractCall::AssetsIn { account },
        ReadResult::Addresses(vec![a]),
    );
}

/// Market wide reads of `byte`: 1 000 underlying supplied, 300 borrowed, 7 in
/// reserves, 10% reserve factor, 0.75 collateral factor.
pub(crate) fn script_market_state(chain: &FakeChain, byte: u8) {
    let m = address(byte);
    chain.set_uint(m, ContractCall::TotalSupply, units(50_000, 8));
    chain.set_uint(m, ContractCall::ExchangeRateStored, 2 * 10_u128.pow(26));
    chain.set_uint(m, ContractCall::TotalBorrows, units(300, 18));
    chain.set_uint(m, ContractCall::TotalReserves, units(7, 18));
    chain.set_uint(m, ContractCall::ReserveFactorMantissa, units(1, 17));
    chain.set_uint(m, ContractCall::SupplyRatePerBlock, 0);
    chain.set_uint(m, ContractCall::BorrowRatePerBlock, 10_000_000_000);
    chain.set(
        address(COMPTROLLER),
        ContractCall::Markets { market: m },
        ReadResult::Market {
            is_listed: true,
            collateral_factor_mantissa: U256::from(75 * 10_u128.pow(16)),
        },
    );
}
