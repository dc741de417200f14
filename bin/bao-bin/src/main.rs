mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bao_chain::RpcChainReader;
use bao_lens::{Lens, LensConfig, LensError, LensService, Registry, WalletContext};
use bao_types::Address;
use clap::Parser;
use dotenvy::dotenv;
use pragma_common::services::{Service, ServiceGroup};
use pragma_common::telemetry::init_telemetry;
use tracing_subscriber::EnvFilter;

use crate::cli::LensCli;

const APP_NAME: &str = "bao_lens";

fn init_logger() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let LensCli {
        rpc_url,
        registry,
        network,
        account,
        otel_collector_endpoint,
        report_interval_secs,
        refresh_interval_secs,
    } = LensCli::parse();

    match otel_collector_endpoint {
        Some(endpoint) => {
            if let Err(e) = init_telemetry(APP_NAME, Some(endpoint)) {
                bail!("Could not init telemetry: {e}");
            }
        }
        None => init_logger(),
    }

    let registry = Registry::load(&registry).context("Failed to load the contract registry")?;
    let expected = network.chain_id();

    let reader = RpcChainReader::new(rpc_url);
    let actual = reader
        .chain_id()
        .await
        .context("Failed to query the node chain id")?;
    if actual != expected {
        return Err(LensError::ChainMismatch { expected, actual }.into());
    }

    let config = LensConfig {
        refresh_interval: Duration::from_secs(refresh_interval_secs),
        ..LensConfig::default()
    };
    let lens = Lens::from_registry(Arc::new(reader), &registry, expected, config)?;

    let wallet = match account {
        Some(account) => {
            let account: Address = account.parse().context("Invalid account address")?;
            WalletContext::connected(account, expected)
        }
        None => WalletContext::disconnected(expected),
    };
    tracing::info!(network = %network, chain_id = %expected, "Starting lens");

    let lens_service =
        LensService::new(lens, wallet, Duration::from_secs(report_interval_secs.max(1)));

    ServiceGroup::default()
        .with(lens_service)
        .start_and_drive_to_end()
        .await?;

    Ok(())
}
