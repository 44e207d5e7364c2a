use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use flip_abi::Address;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

pub const BASE_SEPOLIA_CONTRACT: &str = "0x07AC36e2660FFfFAA26CFCEE821889Eb2945b47B";
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;
pub const BASE_SEPOLIA_RPC_URL: &str = "https://sepolia.base.org";
pub const BASE_SEPOLIA_EXPLORER_URL: &str = "https://sepolia.basescan.org";
pub const LOCAL_CHAIN_ID: u64 = 31337;
pub const LOCAL_RPC_URL: &str = "http://localhost:8545";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    BaseSepolia,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::BaseSepolia => "base-sepolia",
            DeploymentEnv::Local => "local",
        }
    }

    pub fn chain_id(self) -> u64 {
        match self {
            DeploymentEnv::BaseSepolia => BASE_SEPOLIA_CHAIN_ID,
            DeploymentEnv::Local => LOCAL_CHAIN_ID,
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            DeploymentEnv::BaseSepolia => BASE_SEPOLIA_RPC_URL,
            DeploymentEnv::Local => LOCAL_RPC_URL,
        }
    }

    /// The published deployment, if the network has one.
    pub fn known_deployment(self) -> Option<DeploymentRecord> {
        match self {
            DeploymentEnv::BaseSepolia => Some(DeploymentRecord {
                recorded_at: None,
                contract_address: BASE_SEPOLIA_CONTRACT.to_string(),
                chain_id: BASE_SEPOLIA_CHAIN_ID,
                network_url: BASE_SEPOLIA_RPC_URL.to_string(),
                explorer_url: Some(BASE_SEPOLIA_EXPLORER_URL.to_string()),
            }),
            DeploymentEnv::Local => None,
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::BaseSepolia => "Base Sepolia",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// When the record was saved locally. Built-in records have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
    pub contract_address: String,
    pub chain_id: u64,
    pub network_url: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
}

impl DeploymentRecord {
    pub fn address(&self) -> Result<Address> {
        self.contract_address.parse().map_err(|e| {
            anyhow!(
                "Deployment record holds an invalid contract address {:?}: {e}",
                self.contract_address
            )
        })
    }

    /// Explorer page for the contract, e.g. `<explorer>/address/0x…`.
    pub fn contract_explorer_link(&self) -> Option<String> {
        self.explorer_url.as_ref().map(|base| {
            format!(
                "{}/address/{}",
                base.trim_end_matches('/'),
                self.contract_address
            )
        })
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::open_in(DEPLOYMENTS_ROOT, env)
    }

    pub fn open_in(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { env, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: DeploymentRecord) -> Result<()> {
        write_record(&self.path, &record)
    }

    /// Stored record first, then the network's published deployment.
    pub fn resolve(&self) -> Result<DeploymentRecord> {
        if let Some(record) = self.load()? {
            return Ok(record);
        }
        self.env.known_deployment().ok_or_else(|| {
            anyhow!(
                "No deployment recorded for {} in {}; pass --contract <address>",
                self.env,
                self.path.display()
            )
        })
    }
}

pub fn ensure_structure() -> Result<()> {
    for env in [DeploymentEnv::BaseSepolia, DeploymentEnv::Local] {
        let _ = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).context("Failed to create deployments directory")?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create deployments/{} directory", env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}

/// Records a contract address for `env` in the default store.
pub fn record_deployment(
    env: DeploymentEnv,
    contract_address: &Address,
    network_url: impl AsRef<str>,
    explorer_url: Option<impl AsRef<str>>,
) -> Result<()> {
    let store = DeploymentStore::new(env)?;
    store.save(DeploymentRecord {
        recorded_at: Some(Utc::now().to_rfc3339()),
        contract_address: contract_address.to_string(),
        chain_id: env.chain_id(),
        network_url: network_url.as_ref().to_string(),
        explorer_url: explorer_url.map(|url| url.as_ref().to_string()),
    })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn resolve__falls_back_to_published_base_sepolia_deployment() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::open_in(dir.path(), DeploymentEnv::BaseSepolia).unwrap();

        // when
        let record = store.resolve().unwrap();

        // then
        assert_eq!(record.chain_id, BASE_SEPOLIA_CHAIN_ID);
        assert_eq!(record.recorded_at, None);
        assert_eq!(
            record.address().unwrap(),
            BASE_SEPOLIA_CONTRACT.parse::<Address>().unwrap()
        );
        assert_eq!(
            record.contract_explorer_link().as_deref(),
            Some(
                "https://sepolia.basescan.org/address/0x07AC36e2660FFfFAA26CFCEE821889Eb2945b47B"
            )
        );
    }

    #[test]
    fn resolve__prefers_saved_record_over_published_one() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::open_in(dir.path(), DeploymentEnv::BaseSepolia).unwrap();
        let saved = DeploymentRecord {
            recorded_at: Some(Utc::now().to_rfc3339()),
            contract_address: String::from("0x00000000000000000000000000000000000000aa"),
            chain_id: BASE_SEPOLIA_CHAIN_ID,
            network_url: BASE_SEPOLIA_RPC_URL.to_string(),
            explorer_url: None,
        };
        store.save(saved.clone()).unwrap();

        // when
        let record = store.resolve().unwrap();

        // then
        assert_eq!(record, saved);
    }

    #[test]
    fn resolve__local_without_record_is_an_error() {
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::open_in(dir.path(), DeploymentEnv::Local).unwrap();
        assert!(store.resolve().is_err());
    }

    #[test]
    fn load__accepts_record_without_timestamp() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::open_in(dir.path(), DeploymentEnv::Local).unwrap();
        fs::write(
            store.path(),
            br#"{
                "contract_address": "0x00000000000000000000000000000000000000aa",
                "chain_id": 31337,
                "network_url": "http://localhost:8545"
            }"#,
        )
        .unwrap();

        // when
        let record = store.load().unwrap().unwrap();

        // then
        assert_eq!(record.recorded_at, None);
        assert_eq!(record.explorer_url, None);
        assert_eq!(record.chain_id, LOCAL_CHAIN_ID);
    }

    #[test]
    fn save__omits_missing_timestamp() {
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::open_in(dir.path(), DeploymentEnv::BaseSepolia).unwrap();
        let published = DeploymentEnv::BaseSepolia.known_deployment().unwrap();

        store.save(published.clone()).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("recorded_at"));
        assert_eq!(store.load().unwrap(), Some(published));
    }

    #[test]
    fn load__rejects_garbage_json() {
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::open_in(dir.path(), DeploymentEnv::Local).unwrap();
        fs::write(store.path(), b"{not json").unwrap();
        assert!(store.load().is_err());
    }
}
