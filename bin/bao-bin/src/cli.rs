use std::path::PathBuf;

use bao_types::Network;
use clap::Parser;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bao market, farm and ballast lens", long_about = None)]
pub struct LensCli {
    /// JSON-RPC endpoint of the node to read from
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Url,

    /// Contract registry (JSON)
    #[arg(long, env = "BAO_REGISTRY", default_value = "registry.json")]
    pub registry: PathBuf,

    #[arg(long, env = "BAO_NETWORK", default_value_t = Network::Mainnet)]
    pub network: Network,

    /// Account to follow, nothing account specific is read without one
    #[arg(long, env = "BAO_ACCOUNT")]
    pub account: Option<String>,

    /// OTEL collector endpoint
    #[arg(long, env = "OTEL_COLLECTOR_ENDPOINT")]
    pub otel_collector_endpoint: Option<String>,

    /// Seconds between two account reports
    #[arg(long, env = "REPORT_INTERVAL_SECS", default_value = "30")]
    pub report_interval_secs: u64,

    /// Seconds between two scheduled refreshes of every query
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value = "30")]
    pub refresh_interval_secs: u64,
}
