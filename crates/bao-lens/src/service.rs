use std::time::Duration;

use anyhow::Result;
use bao_calc::format_usd;
use pragma_common::services::{Service, ServiceRunner};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::block::BlockWatcher;
use crate::context::WalletContext;
use crate::lens::Lens;
use crate::session::Connection;

/// Keeps the lens live for one wallet: polls blocks and logs the derived
/// account figures on every report tick.
pub struct LensService {
    lens: Lens,
    wallet: WalletContext,
    report_interval: Duration,
}

impl LensService {
    pub const fn new(lens: Lens, wallet: WalletContext, report_interval: Duration) -> Self {
        Self {
            lens,
            wallet,
            report_interval,
        }
    }
}

fn report(connection: &Connection) {
    let Some(session) = connection.session() else {
        tracing::info!("No wallet connected");
        return;
    };

    let liquidity = session.account_liquidity();
    let staked = session.total_staked_usd();
    tracing::info!(
        account = %session.account(),
        supply = %format_usd(liquidity.value.usd_supply),
        borrow = %format_usd(liquidity.value.usd_borrow),
        borrow_limit = %format_usd(liquidity.value.borrow_limit()),
        borrow_limit_used = %liquidity.value.borrow_limit_used().round_dp(2),
        staked = %format_usd(staked.value),
        loading = liquidity.is_loading || staked.is_loading,
        "Account"
    );
    if let Some(err) = liquidity.error.as_ref().or(staked.error.as_ref()) {
        tracing::warn!("Showing last known values: {err:#}");
    }
    if let Some(ballast) = session.ballast().value {
        tracing::info!(
            reserves = %ballast.reserves,
            supply_cap = %ballast.supply_cap,
            "Ballast"
        );
    }
}

async fn run_reporter(
    lens: Lens,
    wallet: WalletContext,
    report_interval: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let connection = lens.connect(&wallet);
    let mut ticker = tokio::time::interval(report_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => report(&connection),
        }
    }

    connection.close();
    Ok(())
}

#[async_trait::async_trait]
impl Service for LensService {
    async fn start<'a>(&mut self, mut runner: ServiceRunner<'a>) -> Result<()> {
        let lens = self.lens.clone();
        let wallet = self.wallet;
        let report_interval = self.report_interval;

        runner.spawn_loop(move |ctx| async move {
            let watcher = BlockWatcher::new(lens.clone());
            let token = ctx.token.clone();
            if let Some(result) = ctx
                .run_until_cancelled(async move {
                    tokio::try_join!(
                        watcher.run_forever(token.clone()),
                        run_reporter(lens, wallet, report_interval, token.clone()),
                    )
                })
                .await
            {
                result?;
            }
            Ok::<(), anyhow::Error>(())
        });

        Ok(())
    }
}
