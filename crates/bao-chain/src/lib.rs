//! Read-only contract calls against an EVM network.

pub mod call;
pub mod contracts;
pub mod error;
pub mod reader;
pub mod rpc;

pub use call::{ContractCall, RawDistribution, ReadRequest, ReadResult};
pub use error::ReadError;
pub use reader::{BatchResult, ChainReader, read_batch};
pub use rpc::RpcChainReader;
