use crate::{
    Error,
    Result,
    chain_client::DEFAULT_RECEIPT_POLL_INTERVAL,
    poller::DEFAULT_POLL_INTERVAL,
    types::Address,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    time::Duration,
};
use url::Url;

pub const MUMBAI_CHAIN_ID: u64 = 80001;
pub const LOCAL_CHAIN_ID: u64 = 31337;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Mumbai,
    Local,
}

impl DeploymentEnv {
    /// Chain id a wallet must report before writes are allowed on this network.
    pub fn chain_id(self) -> u64 {
        match self {
            DeploymentEnv::Mumbai => MUMBAI_CHAIN_ID,
            DeploymentEnv::Local => LOCAL_CHAIN_ID,
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Mumbai => "Mumbai",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// Where a contract was deployed and the services that front it.
///
/// Callers load these however they like; the engine only reads them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    #[serde(default)]
    pub deployed_at: Option<String>,
    pub contract_address: Address,
    pub chain_id: u64,
    pub network_url: String,
    pub index_url: String,
    #[serde(default)]
    pub wallet_url: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_receipt_poll_interval_ms() -> u64 {
    DEFAULT_RECEIPT_POLL_INTERVAL.as_millis() as u64
}

fn default_network_name() -> String {
    DeploymentEnv::Mumbai.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    pub target_chain_id: u64,
    #[serde(default = "default_network_name")]
    pub network_name: String,
    pub contract_address: Address,
    /// Chain node used for reads and receipts.
    pub node_url: Url,
    /// Wallet endpoint; holds the accounts and signs.
    pub wallet_url: Url,
    pub index_url: Url,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default)]
    pub watch_only: bool,
}

impl EngineConfig {
    /// Mumbai config with default cadences; the wallet endpoint doubles as chain node.
    pub fn new(contract_address: Address, wallet_url: Url, index_url: Url) -> Self {
        Self {
            target_chain_id: MUMBAI_CHAIN_ID,
            network_name: default_network_name(),
            contract_address,
            node_url: wallet_url.clone(),
            wallet_url,
            index_url,
            poll_interval_ms: default_poll_interval_ms(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            watch_only: false,
        }
    }

    pub fn from_deployment(env: DeploymentEnv, record: &DeploymentRecord) -> Result<Self> {
        if record.chain_id != env.chain_id() {
            return Err(Error::InvalidInput(format!(
                "{env} deployment record targets chain {}, expected {}",
                record.chain_id,
                env.chain_id()
            )));
        }
        let node_url = Url::parse(&record.network_url)?;
        let wallet_url = match &record.wallet_url {
            Some(url) => Url::parse(url)?,
            None => node_url.clone(),
        };
        Ok(Self {
            target_chain_id: record.chain_id,
            network_name: env.to_string(),
            contract_address: record.contract_address,
            node_url,
            wallet_url,
            index_url: Url::parse(&record.index_url)?,
            poll_interval_ms: default_poll_interval_ms(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            watch_only: false,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}
