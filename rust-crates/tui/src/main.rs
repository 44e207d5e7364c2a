use clap::{
    Parser,
    ValueEnum,
};
use claw_flip::{
    config::{
        AppConfig,
        DEFAULT_LOG_DIR,
        ReceiptPolicy,
        expand_path,
    },
    logging::init_tracing,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentStore,
};
use flip_abi::Address;
use std::time::Duration;

mod client;
mod ui;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Network {
    BaseSepolia,
    Local,
}

impl From<Network> for DeploymentEnv {
    fn from(network: Network) -> Self {
        match network {
            Network::BaseSepolia => DeploymentEnv::BaseSepolia,
            Network::Local => DeploymentEnv::Local,
        }
    }
}

/// Terminal client for the Claw Flip coin-flip game.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, value_enum, default_value_t = Network::BaseSepolia)]
    network: Network,

    /// JSON-RPC endpoint exposing the signing account
    #[arg(long)]
    rpc_url: Option<String>,

    /// Game contract address; overrides the recorded deployment
    #[arg(long)]
    contract: Option<Address>,

    /// Remember `--contract` as this network's deployment
    #[arg(long, requires = "contract")]
    save_contract: bool,

    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: String,

    #[arg(long, default_value_t = 120)]
    receipt_timeout_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(&expand_path(&args.log_dir))?;
    tracing::info!("starting claw-flip client");

    deployments::ensure_structure().map_err(|e| eyre!(e))?;
    let env = DeploymentEnv::from(args.network);
    if args.save_contract
        && let Some(contract) = &args.contract
    {
        let url = args.rpc_url.as_deref().unwrap_or(env.default_rpc_url());
        let explorer = env.known_deployment().and_then(|record| record.explorer_url);
        deployments::record_deployment(env, contract, url, explorer).map_err(|e| eyre!(e))?;
        tracing::info!(%contract, %env, "recorded deployment");
    }

    let store = DeploymentStore::new(env).map_err(|e| eyre!(e))?;
    let receipt = ReceiptPolicy {
        timeout: Duration::from_secs(args.receipt_timeout_secs),
        ..ReceiptPolicy::default()
    };
    let config = AppConfig::resolve(env, args.rpc_url, args.contract, &store, receipt)?;
    client::run_app(config).await
}
