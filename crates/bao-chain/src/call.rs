use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

use crate::contracts::{
    IBaoDistribution, ICToken, IComptroller, IERC20, IMasterChef, IOracle, IStabilizer,
};
use crate::error::ReadError;

/// Every read-only contract method the lens knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractCall {
    // ERC20
    BalanceOf { owner: Address },
    TotalSupply,
    Decimals,
    Allowance { owner: Address, spender: Address },
    // Markets
    ExchangeRateStored,
    BorrowBalanceStored { account: Address },
    TotalBorrows,
    TotalReserves,
    ReserveFactorMantissa,
    SupplyRatePerBlock,
    BorrowRatePerBlock,
    // Oracle
    UnderlyingPrice { market: Address },
    // Comptroller
    Markets { market: Address },
    AssetsIn { account: Address },
    AccountLiquidity { account: Address },
    // Masterchef
    PoolInfo { pid: u64 },
    TotalAllocPoint,
    // Ballast stabilizer
    SupplyCap,
    // Locked BAO distribution
    Distribution { account: Address },
}

impl ContractCall {
    pub const fn signature(&self) -> &'static str {
        match self {
            Self::BalanceOf { .. } => IERC20::balanceOfCall::SIGNATURE,
            Self::TotalSupply => IERC20::totalSupplyCall::SIGNATURE,
            Self::Decimals => IERC20::decimalsCall::SIGNATURE,
            Self::Allowance { .. } => IERC20::allowanceCall::SIGNATURE,
            Self::ExchangeRateStored => ICToken::exchangeRateStoredCall::SIGNATURE,
            Self::BorrowBalanceStored { .. } => ICToken::borrowBalanceStoredCall::SIGNATURE,
            Self::TotalBorrows => ICToken::totalBorrowsCall::SIGNATURE,
            Self::TotalReserves => ICToken::totalReservesCall::SIGNATURE,
            Self::ReserveFactorMantissa => ICToken::reserveFactorMantissaCall::SIGNATURE,
            Self::SupplyRatePerBlock => ICToken::supplyRatePerBlockCall::SIGNATURE,
            Self::BorrowRatePerBlock => ICToken::borrowRatePerBlockCall::SIGNATURE,
            Self::UnderlyingPrice { .. } => IOracle::getUnderlyingPriceCall::SIGNATURE,
            Self::Markets { .. } => IComptroller::marketsCall::SIGNATURE,
            Self::AssetsIn { .. } => IComptroller::getAssetsInCall::SIGNATURE,
            Self::AccountLiquidity { .. } => IComptroller::getAccountLiquidityCall::SIGNATURE,
            Self::PoolInfo { .. } => IMasterChef::poolInfoCall::SIGNATURE,
            Self::TotalAllocPoint => IMasterChef::totalAllocPointCall::SIGNATURE,
            Self::SupplyCap => IStabilizer::supplyCapCall::SIGNATURE,
            Self::Distribution { .. } => IBaoDistribution::distributionsCall::SIGNATURE,
        }
    }

    /// Method name, for logs.
    pub fn method(&self) -> &'static str {
        let signature = self.signature();
        signature
            .split_once('(')
            .map_or(signature, |(name, _)| name)
    }

    pub fn calldata(&self) -> Bytes {
        let data = match *self {
            Self::BalanceOf { owner } => IERC20::balanceOfCall { owner }.abi_encode(),
            Self::TotalSupply => IERC20::totalSupplyCall {}.abi_encode(),
            Self::Decimals => IERC20::decimalsCall {}.abi_encode(),
            Self::Allowance { owner, spender } => {
                IERC20::allowanceCall { owner, spender }.abi_encode()
            }
            Self::ExchangeRateStored => ICToken::exchangeRateStoredCall {}.abi_encode(),
            Self::BorrowBalanceStored { account } => {
                ICToken::borrowBalanceStoredCall { account }.abi_encode()
            }
            Self::TotalBorrows => ICToken::totalBorrowsCall {}.abi_encode(),
            Self::TotalReserves => ICToken::totalReservesCall {}.abi_encode(),
            Self::ReserveFactorMantissa => ICToken::reserveFactorMantissaCall {}.abi_encode(),
            Self::SupplyRatePerBlock => ICToken::supplyRatePerBlockCall {}.abi_encode(),
            Self::BorrowRatePerBlock => ICToken::borrowRatePerBlockCall {}.abi_encode(),
            Self::UnderlyingPrice { market } => {
                IOracle::getUnderlyingPriceCall { market }.abi_encode()
            }
            Self::Markets { market } => IComptroller::marketsCall { market }.abi_encode(),
            Self::AssetsIn { account } => IComptroller::getAssetsInCall { account }.abi_encode(),
            Self::AccountLiquidity { account } => {
                IComptroller::getAccountLiquidityCall { account }.abi_encode()
            }
            Self::PoolInfo { pid } => IMasterChef::poolInfoCall {
                pid: U256::from(pid),
            }
            .abi_encode(),
            Self::TotalAllocPoint => IMasterChef::totalAllocPointCall {}.abi_encode(),
            Self::SupplyCap => IStabilizer::supplyCapCall {}.abi_encode(),
            Self::Distribution { account } => {
                IBaoDistribution::distributionsCall { account }.abi_encode()
            }
        };
        data.into()
    }

    /// Decodes raw return data into the result shape of this method.
    pub fn decode(&self, data: &[u8]) -> Result<ReadResult, ReadError> {
        let result = match self {
            Self::BalanceOf { .. } => uint::<IERC20::balanceOfCall>(data),
            Self::TotalSupply => uint::<IERC20::totalSupplyCall>(data),
            Self::Decimals => {
                IERC20::decimalsCall::abi_decode_returns(data).map(ReadResult::Decimals)
            }
            Self::Allowance { .. } => uint::<IERC20::allowanceCall>(data),
            Self::ExchangeRateStored => uint::<ICToken::exchangeRateStoredCall>(data),
            Self::BorrowBalanceStored { .. } => uint::<ICToken::borrowBalanceStoredCall>(data),
            Self::TotalBorrows => uint::<ICToken::totalBorrowsCall>(data),
            Self::TotalReserves => uint::<ICToken::totalReservesCall>(data),
            Self::ReserveFactorMantissa => uint::<ICToken::reserveFactorMantissaCall>(data),
            Self::SupplyRatePerBlock => uint::<ICToken::supplyRatePerBlockCall>(data),
            Self::BorrowRatePerBlock => uint::<ICToken::borrowRatePerBlockCall>(data),
            Self::UnderlyingPrice { .. } => uint::<IOracle::getUnderlyingPriceCall>(data),
            Self::Markets { .. } => {
                IComptroller::marketsCall::abi_decode_returns(data).map(|r| ReadResult::Market {
                    is_listed: r.isListed,
                    collateral_factor_mantissa: r.collateralFactorMantissa,
                })
            }
            Self::AssetsIn { .. } => {
                IComptroller::getAssetsInCall::abi_decode_returns(data).map(ReadResult::Addresses)
            }
            Self::AccountLiquidity { .. } => {
                IComptroller::getAccountLiquidityCall::abi_decode_returns(data).map(|r| {
                    ReadResult::Liquidity {
                        error_code: r.errorCode,
                        liquidity: r.liquidity,
                        shortfall: r.shortfall,
                    }
                })
            }
            Self::PoolInfo { .. } => {
                IMasterChef::poolInfoCall::abi_decode_returns(data).map(|r| ReadResult::Pool {
                    lp_token: r.lpToken,
                    alloc_point: r.allocPoint,
                    last_reward_block: r.lastRewardBlock,
                })
            }
            Self::TotalAllocPoint => uint::<IMasterChef::totalAllocPointCall>(data),
            Self::SupplyCap => uint::<IStabilizer::supplyCapCall>(data),
            Self::Distribution { .. } => {
                IBaoDistribution::distributionsCall::abi_decode_returns(data).map(|r| {
                    ReadResult::Distribution {
                        date_started: r.dateStarted,
                        date_ended: r.dateEnded,
                        last_claim: r.lastClaim,
                        amount_owed_total: r.amountOwedTotal,
                    }
                })
            }
        };
        result.map_err(|e| ReadError::decode(self.method(), e.to_string()))
    }
}

fn uint<C>(data: &[u8]) -> alloy::sol_types::Result<ReadResult>
where
    C: SolCall<Return = U256>,
{
    C::abi_decode_returns(data).map(ReadResult::Uint)
}

/// A single `eth_call` against `contract`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadRequest {
    pub contract: Address,
    pub call: ContractCall,
}

impl ReadRequest {
    pub const fn new(contract: Address, call: ContractCall) -> Self {
        Self { contract, call }
    }
}

/// Decoded return value, one shape per family of methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Uint(U256),
    Decimals(u8),
    Market {
        is_listed: bool,
        collateral_factor_mantissa: U256,
    },
    Addresses(Vec<Address>),
    Liquidity {
        error_code: U256,
        liquidity: U256,
        shortfall: U256,
    },
    Pool {
        lp_token: Address,
        alloc_point: U256,
        last_reward_block: U256,
    },
    Distribution {
        date_started: u64,
        date_ended: u64,
        last_claim: u64,
        amount_owed_total: U256,
    },
}

/// `distributions(account)` of the locked BAO distribution, timestamps in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDistribution {
    pub date_started: u64,
    pub date_ended: u64,
    pub last_claim: u64,
    pub amount_owed_total: U256,
}

impl ReadResult {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Decimals(_) => "decimals",
            Self::Market { .. } => "market",
            Self::Addresses(_) => "addresses",
            Self::Liquidity { .. } => "liquidity",
            Self::Pool { .. } => "pool",
            Self::Distribution { .. } => "distribution",
        }
    }

    fn unexpected(&self, expected: &'static str) -> ReadError {
        ReadError::UnexpectedResult {
            expected,
            found: self.kind(),
        }
    }

    pub fn into_uint(self) -> Result<U256, ReadError> {
        match self {
            Self::Uint(value) => Ok(value),
            other => Err(other.unexpected("uint")),
        }
    }

    pub fn into_decimals(self) -> Result<u8, ReadError> {
        match self {
            Self::Decimals(value) => Ok(value),
            other => Err(other.unexpected("decimals")),
        }
    }

    /// `(is_listed, collateral_factor_mantissa)`
    pub fn into_market(self) -> Result<(bool, U256), ReadError> {
        match self {
            Self::Market {
                is_listed,
                collateral_factor_mantissa,
            } => Ok((is_listed, collateral_factor_mantissa)),
            other => Err(other.unexpected("market")),
        }
    }

    pub fn into_addresses(self) -> Result<Vec<Address>, ReadError> {
        match self {
            Self::Addresses(value) => Ok(value),
            other => Err(other.unexpected("addresses")),
        }
    }

    /// `(error_code, liquidity, shortfall)`
    pub fn into_liquidity(self) -> Result<(U256, U256, U256), ReadError> {
        match self {
            Self::Liquidity {
                error_code,
                liquidity,
                shortfall,
            } => Ok((error_code, liquidity, shortfall)),
            other => Err(other.unexpected("liquidity")),
        }
    }

    /// `(lp_token, alloc_point)`
    pub fn into_pool(self) -> Result<(Address, U256), ReadError> {
        match self {
            Self::Pool {
                lp_token,
                alloc_point,
                ..
            } => Ok((lp_token, alloc_point)),
            other => Err(other.unexpected("pool")),
        }
    }

    pub fn into_distribution(self) -> Result<RawDistribution, ReadError> {
        match self {
            Self::Distribution {
                date_started,
                date_ended,
                last_claim,
                amount_owed_total,
            } => Ok(RawDistribution {
                date_started,
                date_ended,
                last_claim,
                amount_owed_total,
            }),
            other => Err(other.unexpected("distribution")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: u64) -> [u8; 32] {
        U256::from(value).to_be_bytes::<32>()
    }

    fn words(values: &[u64]) -> Vec<u8> {
        values.iter().flat_map(|v| word(*v)).collect()
    }

    #[test]
    fn test_selectors_match_the_canonical_signatures() {
        let owner = Address::new([0xab; 20]);
        let data = ContractCall::BalanceOf { owner }.calldata();
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(&data[16..], owner.as_slice());

        assert_eq!(
            &ContractCall::TotalSupply.calldata()[..],
            &[0x18, 0x16, 0x0d, 0xdd]
        );
        assert_eq!(ContractCall::AssetsIn { account: owner }.method(), "getAssetsIn");
    }

    #[test]
    fn test_pool_info_calldata_encodes_pid() {
        let data = ContractCall::PoolInfo { pid: 7 }.calldata();
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 7);
    }

    #[test]
    fn test_decode_markets_ignores_trailing_is_comped() {
        let data = words(&[1, 500_000_000_000_000_000, 0]);
        let call = ContractCall::Markets {
            market: Address::ZERO,
        };
        let (is_listed, cf) = call.decode(&data).unwrap().into_market().unwrap();
        assert!(is_listed);
        assert_eq!(cf, U256::from(500_000_000_000_000_000_u64));
    }

    #[test]
    fn test_decode_assets_in() {
        let market = Address::new([0x0a; 20]);
        let mut data = words(&[32, 1]);
        data.extend_from_slice(&[0; 12]);
        data.extend_from_slice(market.as_slice());

        let call = ContractCall::AssetsIn {
            account: Address::ZERO,
        };
        assert_eq!(
            call.decode(&data).unwrap().into_addresses().unwrap(),
            vec![market]
        );
    }

    #[test]
    fn test_decode_distribution() {
        let data = words(&[1_650_000_000, 0, 1_650_000_100, 1_000]);
        let raw = ContractCall::Distribution {
            account: Address::ZERO,
        }
        .decode(&data)
        .unwrap()
        .into_distribution()
        .unwrap();
        assert_eq!(raw.date_started, 1_650_000_000);
        assert_eq!(raw.date_ended, 0);
        assert_eq!(raw.amount_owed_total, U256::from(1_000));
    }

    #[test]
    fn test_decode_empty_return_data_fails() {
        // What a call against an address without code returns.
        let err = ContractCall::TotalSupply.decode(&[]).unwrap_err();
        assert!(matches!(err, ReadError::Decode { method: "totalSupply", .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_wrong_accessor_reports_shapes() {
        let err = ReadResult::Decimals(6).into_uint().unwrap_err();
        assert_eq!(
            err,
            ReadError::UnexpectedResult {
                expected: "uint",
                found: "decimals"
            }
        );
    }
}
