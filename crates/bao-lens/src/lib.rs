//! Live views over Bao markets, farms and the ballast for a connected wallet.
//!
//! Every read goes through a [`bao_cache::QueryCache`], so concurrent views of
//! the same data share one chain read and keep their last good value when a
//! refresh fails.

pub mod ballast;
pub mod block;
pub mod config;
pub mod context;
pub mod distribution;
pub mod error;
pub mod farms;
pub mod lens;
pub mod markets;
pub mod service;
pub mod session;

#[cfg(test)]
mod testing;

pub use ballast::{BallastInfo, SwapDirection};
pub use block::BlockWatcher;
pub use config::{BallastConfig, ConfigError, LensConfig, NetworkConfig, Registry};
pub use context::{LensContext, WalletContext};
pub use distribution::DistributionInfo;
pub use error::LensError;
pub use lens::Lens;
pub use markets::ProtocolLiquidity;
pub use service::LensService;
pub use session::{Connection, Session, View};
