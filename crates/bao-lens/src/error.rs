use bao_chain::ReadError;
use bao_types::ChainId;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum LensError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("node serves chain {actual}, expected {expected}")]
    ChainMismatch { expected: ChainId, actual: ChainId },
}
