//! Read-only surface of the contracts the lens talks to.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
        function allowance(address owner, address spender) external view returns (uint256);
    }

    #[sol(rpc)]
    interface ICToken {
        function exchangeRateStored() external view returns (uint256);
        function borrowBalanceStored(address account) external view returns (uint256);
        function totalBorrows() external view returns (uint256);
        function totalReserves() external view returns (uint256);
        function reserveFactorMantissa() external view returns (uint256);
        function supplyRatePerBlock() external view returns (uint256);
        function borrowRatePerBlock() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IOracle {
        function getUnderlyingPrice(address market) external view returns (uint256);
    }

    // Older comptrollers append `bool isComped` to `markets`, trailing words are ignored.
    #[sol(rpc)]
    interface IComptroller {
        function markets(address market)
            external
            view
            returns (bool isListed, uint256 collateralFactorMantissa);
        function getAssetsIn(address account) external view returns (address[] memory);
        function getAccountLiquidity(address account)
            external
            view
            returns (uint256 errorCode, uint256 liquidity, uint256 shortfall);
    }

    #[sol(rpc)]
    interface IMasterChef {
        function poolInfo(uint256 pid)
            external
            view
            returns (
                address lpToken,
                uint256 allocPoint,
                uint256 lastRewardBlock,
                uint256 accBaoPerShare
            );
        function totalAllocPoint() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IStabilizer {
        function supplyCap() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IBaoDistribution {
        function distributions(address account)
            external
            view
            returns (
                uint64 dateStarted,
                uint64 dateEnded,
                uint64 lastClaim,
                uint256 amountOwedTotal
            );
    }
}
