use std::time::Duration;

use bao_chain::ReadError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::lens::Lens;

/// Polls the chain height and revalidates the lens when it moves.
pub struct BlockWatcher {
    lens: Lens,
    poll_interval: Duration,
    last_block: Option<u64>,
}

impl BlockWatcher {
    pub fn new(lens: Lens) -> Self {
        let poll_interval = lens.context().config.block_poll_interval;
        Self {
            lens,
            poll_interval,
            last_block: None,
        }
    }

    pub const fn last_block(&self) -> Option<u64> {
        self.last_block
    }

    /// Returns the new height when it advanced. The first height seen only
    /// primes the watcher.
    pub async fn poll_once(&mut self) -> Result<Option<u64>, ReadError> {
        let block = self.lens.context().reader.block_number().await?;
        match self.last_block {
            Some(last) if block <= last => Ok(None),
            previous => {
                self.last_block = Some(block);
                if previous.is_some() {
                    self.lens.on_new_block(block);
                }
                Ok(Some(block))
            }
        }
    }

    pub async fn run_forever(mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Block watcher shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(Some(block)) => tracing::debug!(block, "New block"),
                        Ok(None) => {}
                        Err(e) => tracing::warn!("Block number poll failed: {e}"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use bao_chain::ContractCall;
    use bao_types::ChainId;

    use crate::config::LensConfig;
    use crate::context::{LensContext, WalletContext};
    use crate::testing::*;

    #[tokio::test]
    async fn test_new_block_revalidates_once() {
        let chain = Arc::new(FakeChain::new());
        script_single_collateral(&chain);
        let config = LensConfig {
            refresh_interval: Duration::from_secs(3600),
            dedupe_interval: Duration::from_secs(3600),
            ..LensConfig::default()
        };
        let network = network(vec![market(MARKET_A, "ETH")], vec![]);
        let lens = Lens::new(LensContext::new(
            chain.clone(),
            Arc::new(network),
            config,
        ));
        let connection = lens.connect(&WalletContext::connected(address(ACCOUNT), ChainId(1)));
        let session = connection.session().unwrap();
        session.refresh().await;

        let balance = ContractCall::BalanceOf {
            owner: address(ACCOUNT),
        };
        let mut watcher = BlockWatcher::new(lens);
        chain.set_block(10);
        assert_eq!(watcher.poll_once().await.unwrap(), Some(10));
        // Same height: nothing to do, the refresh is served from cache.
        assert_eq!(watcher.poll_once().await.unwrap(), None);
        session.refresh().await;
        assert_eq!(chain.calls(address(MARKET_A), balance), 1);

        chain.set_block(11);
        assert_eq!(watcher.poll_once().await.unwrap(), Some(11));
        session.refresh().await;
        assert_eq!(chain.calls(address(MARKET_A), balance), 2);
        assert_eq!(watcher.last_block(), Some(11));
    }

    #[tokio::test]
    async fn test_run_forever_stops_on_cancel() {
        let lens = Lens::new(LensContext::new(
            Arc::new(FakeChain::new()),
            Arc::new(network(vec![], vec![])),
            LensConfig::default(),
        ));
        let token = CancellationToken::new();
        let handle = tokio::spawn(BlockWatcher::new(lens).run_forever(token.clone()));
        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.unwrap().unwrap().is_ok());
    }
}
