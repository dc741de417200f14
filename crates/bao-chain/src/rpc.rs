use alloy::network::TransactionBuilder;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use bao_types::ChainId;
use url::Url;

use crate::call::{ReadRequest, ReadResult};
use crate::error::ReadError;
use crate::reader::ChainReader;

/// `ChainReader` over a JSON-RPC HTTP endpoint (`eth_call` against `latest`).
pub struct RpcChainReader {
    provider: DynProvider,
    url: Url,
}

impl RpcChainReader {
    pub fn new(url: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(url.clone()).erased();
        Self { provider, url }
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// The chain id the endpoint reports, used to check it against the registry.
    pub async fn chain_id(&self) -> Result<ChainId, ReadError> {
        Ok(ChainId(self.provider.get_chain_id().await?))
    }
}

impl std::fmt::Debug for RpcChainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainReader")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn call(&self, request: &ReadRequest) -> Result<ReadResult, ReadError> {
        let tx = TransactionRequest::default()
            .with_to(request.contract)
            .with_input(request.call.calldata());
        let data = self.provider.call(tx).await?;
        request.call.decode(&data)
    }

    async fn block_number(&self) -> Result<u64, ReadError> {
        Ok(self.provider.get_block_number().await?)
    }
}
