use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::call::{ReadRequest, ReadResult};
use crate::error::ReadError;

/// Read capability of the connected network.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn call(&self, request: &ReadRequest) -> Result<ReadResult, ReadError>;

    async fn block_number(&self) -> Result<u64, ReadError>;
}

/// Outcome of a batch: one independent result per request key.
#[derive(Debug)]
pub struct BatchResult<K> {
    results: HashMap<K, Result<ReadResult, ReadError>>,
}

impl<K: Eq + Hash + Debug> BatchResult<K> {
    /// Removes and returns the result for `key`.
    pub fn take(&mut self, key: &K) -> Result<ReadResult, ReadError> {
        self.results
            .remove(key)
            .unwrap_or_else(|| Err(ReadError::Missing(format!("{key:?}"))))
    }

    pub fn get(&self, key: &K) -> Option<&Result<ReadResult, ReadError>> {
        self.results.get(key)
    }

    pub fn failures(&self) -> usize {
        self.results.values().filter(|r| r.is_err()).count()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Issues every request concurrently, each bounded by `timeout`.
///
/// A failing or slow read only marks its own key as failed. Nothing is retried
/// here.
pub async fn read_batch<K>(
    reader: &dyn ChainReader,
    requests: Vec<(K, ReadRequest)>,
    timeout: Duration,
) -> BatchResult<K>
where
    K: Eq + Hash + Debug + Send,
{
    let results = join_all(requests.into_iter().map(|(key, request)| async move {
        let result = match tokio::time::timeout(timeout, reader.call(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ReadError::Timeout(timeout)),
        };
        if let Err(e) = &result {
            tracing::debug!(
                contract = %request.contract,
                method = request.call.method(),
                "Read failed: {e}"
            );
        }
        (key, result)
    }))
    .await;

    BatchResult {
        results: results.into_iter().collect(),
    }
}
