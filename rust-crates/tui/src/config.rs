use color_eyre::eyre::{
    Result,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentStore,
};
use flip_abi::Address;
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_LOG_DIR: &str = "~/.claw-flip/logs";

/// Fixed windows that drive the session view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timings {
    pub seed_poll_interval: Duration,
    pub success_banner: Duration,
    pub error_banner: Duration,
    pub celebration: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            seed_poll_interval: Duration::from_millis(2000),
            success_banner: Duration::from_secs(3),
            error_banner: Duration::from_secs(5),
            celebration: Duration::from_secs(3),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: DeploymentEnv,
    pub rpc_url: String,
    pub contract: Address,
    pub explorer_link: Option<String>,
    pub timings: Timings,
    pub receipt: ReceiptPolicy,
}

impl AppConfig {
    /// `--contract` wins over the stored deployment, which wins over the
    /// network's published deployment.
    pub fn resolve(
        network: DeploymentEnv,
        rpc_url: Option<String>,
        contract: Option<Address>,
        store: &DeploymentStore,
        receipt: ReceiptPolicy,
    ) -> Result<Self> {
        let (contract, explorer_link, record_url) = match contract {
            Some(address) => (address, None, None),
            None => {
                let record = store.resolve().map_err(|e| eyre!(e))?;
                let address = record.address().map_err(|e| eyre!(e))?;
                (
                    address,
                    record.contract_explorer_link(),
                    Some(record.network_url),
                )
            }
        };
        let rpc_url = rpc_url
            .or(record_url)
            .unwrap_or_else(|| network.default_rpc_url().to_string());
        Ok(Self {
            network,
            rpc_url,
            contract,
            explorer_link,
            timings: Timings::default(),
            receipt,
        })
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}
