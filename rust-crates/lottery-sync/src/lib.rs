pub mod abi;
pub mod chain_client;
pub mod config;
pub mod engine;
pub mod index_client;
pub mod network_gate;
pub mod poller;
pub mod reconciler;
pub mod rpc;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use chain_client::{
    ChainClient,
    ChainRpc,
    TransactionHandle,
};
pub use config::{
    DeploymentEnv,
    DeploymentRecord,
    EngineConfig,
    MUMBAI_CHAIN_ID,
};
pub use engine::{
    EngineStatus,
    LotteryEngine,
};
pub use index_client::IndexClient;
pub use network_gate::{
    NetworkGate,
    SigningHandle,
    WalletRpc,
};
pub use poller::{
    FactsSource,
    Poller,
    PollerHandle,
    RoundSource,
    Snapshot,
};
pub use reconciler::{
    GameView,
    Reconciler,
};
pub use rpc::WalletProvider;
pub use session::{
    Affordance,
    ConnectionState,
};
pub use types::{
    Address,
    ChainFacts,
    PendingAction,
    RoundRecord,
    TransactionReceipt,
    TxHash,
    U256,
    WalletSession,
    Wei,
    parse_ether,
};

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything the engine can fail with.
#[derive(Error, Debug)]
pub enum Error {
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    NetworkMismatch { expected: u64, actual: u64 },
    #[error("wallet did not expose any account")]
    WalletUnavailable,
    #[error("session has no signing capability")]
    NoSignerAvailable,
    #[error("transaction rejected by the wallet: {0}")]
    TransactionRejected(String),
    /// `hash` is `None` when the wallet refused to submit because gas estimation reverted.
    #[error("transaction reverted: {reason}")]
    TransactionReverted {
        hash: Option<TxHash>,
        reason: String,
    },
    #[error("index service unavailable: {0}")]
    IndexUnavailable(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode {what}: {detail}")]
    Decode { what: &'static str, detail: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no wallet session is connected")]
    NotConnected,
    #[error("a write is already pending: {0:?}")]
    ActionPending(PendingAction),
    #[error("no round details available yet")]
    RoundUnavailable,
    #[error("session closed before the operation finished")]
    SessionClosed,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Installs a fmt subscriber honouring `RUST_LOG`, defaulting to INFO.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
