use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use bao_chain::{BatchResult, ChainReader, ReadRequest, read_batch};
use bao_types::{Address, ChainId};

use crate::config::{LensConfig, NetworkConfig};

/// Connection state of the user's wallet, as reported by the wallet provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletContext {
    pub account: Option<Address>,
    pub chain_id: ChainId,
    pub is_connected: bool,
}

impl WalletContext {
    pub const fn connected(account: Address, chain_id: ChainId) -> Self {
        Self {
            account: Some(account),
            chain_id,
            is_connected: true,
        }
    }

    pub const fn disconnected(chain_id: ChainId) -> Self {
        Self {
            account: None,
            chain_id,
            is_connected: false,
        }
    }

    /// The account to read for, only while the wallet is connected.
    pub const fn active_account(&self) -> Option<Address> {
        if self.is_connected { self.account } else { None }
    }
}

/// Reader, network registry and knobs threaded through every fetcher.
#[derive(Clone)]
pub struct LensContext {
    pub reader: Arc<dyn ChainReader>,
    pub network: Arc<NetworkConfig>,
    pub config: LensConfig,
}

impl LensContext {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        network: Arc<NetworkConfig>,
        config: LensConfig,
    ) -> Self {
        Self {
            reader,
            network,
            config,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.network.chain_id
    }

    pub async fn read<K>(&self, requests: Vec<(K, ReadRequest)>) -> BatchResult<K>
    where
        K: Eq + Hash + Debug + Send,
    {
        read_batch(self.reader.as_ref(), requests, self.config.read_timeout).await
    }

    /// Current height, used to tag snapshots. `None` if the node does not answer.
    pub async fn block_number(&self) -> Option<u64> {
        match tokio::time::timeout(self.config.read_timeout, self.reader.block_number()).await {
            Ok(Ok(block)) => Some(block),
            Ok(Err(e)) => {
                tracing::debug!("Block number unavailable: {e}");
                None
            }
            Err(_) => None,
        }
    }
}
