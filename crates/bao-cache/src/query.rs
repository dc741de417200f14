use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bao_types::{Address, ChainId};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

/// Identifies one cached query for one account on one network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub query: &'static str,
    pub account: Option<Address>,
    pub chain_id: ChainId,
}

impl QueryKey {
    pub const fn new(query: &'static str, account: Option<Address>, chain_id: ChainId) -> Self {
        Self {
            query,
            account,
            chain_id,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account {
            Some(account) => write!(f, "{}@{}:{}", self.query, self.chain_id, account),
            None => write!(f, "{}@{}", self.query, self.chain_id),
        }
    }
}

/// Produces a fresh value for a key. Called at most once at a time per key.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>;

pub(crate) type FetchOutcome<V> = Result<Arc<V>, Arc<anyhow::Error>>;

/// What subscribers observe: the last known value plus loading / error flags.
#[derive(Debug)]
pub struct QueryState<V> {
    pub value: Option<Arc<V>>,
    pub is_loading: bool,
    pub error: Option<Arc<anyhow::Error>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<V> QueryState<V> {
    pub const fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

impl<V> Default for QueryState<V> {
    fn default() -> Self {
        Self {
            value: None,
            is_loading: false,
            error: None,
            updated_at: None,
        }
    }
}

// Manual impl: cloning only bumps the `Arc`s, `V` itself needs no `Clone`.
impl<V> Clone for QueryState<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Window after a completed fetch during which `refresh` is served from cache.
    pub dedupe_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dedupe_interval: Duration::from_secs(2),
        }
    }
}
