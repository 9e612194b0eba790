use crate::{
    Error,
    Result,
    chain_client::ChainRpc,
    network_gate::WalletRpc,
    types::{
        Address,
        Bytes,
        TransactionReceipt,
        TxHash,
    },
};
use ethers::{
    providers::{
        Http,
        Middleware,
        Provider,
        ProviderError,
        RpcError,
    },
    types::{
        TransactionRequest,
        transaction::eip2718::TypedTransaction,
    },
};
use std::fmt;
use tracing::debug;
use url::Url;

/// EIP-1193 "user rejected the request".
const USER_REJECTED: i64 = 4001;

/// Geth and most wallets report a revert found during gas estimation with this code.
const EXECUTION_REVERTED: i64 = 3;

/// Chain node reads over JSON-RPC.
impl ChainRpc for Provider<Http> {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        Middleware::call(self, &tx, None).await.map_err(rpc_error)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>> {
        self.get_transaction_receipt(hash).await.map_err(rpc_error)
    }
}

/// Wallet endpoint speaking EIP-1193 methods over JSON-RPC.
#[derive(Clone)]
pub struct WalletProvider {
    provider: Provider<Http>,
    signing: bool,
}

impl WalletProvider {
    pub fn new(url: Url) -> Self {
        Self {
            provider: Provider::new(Http::new(url)),
            signing: true,
        }
    }

    /// A wallet endpoint that can report accounts but must never be asked to sign.
    pub fn watch_only(mut self) -> Self {
        self.signing = false;
        self
    }

    pub fn provider(&self) -> &Provider<Http> {
        &self.provider
    }
}

impl WalletRpc for WalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.provider
            .request("eth_requestAccounts", ())
            .await
            .map_err(rpc_error)
    }

    async fn chain_id(&self) -> Result<u64> {
        let chain_id = self.provider.get_chainid().await.map_err(rpc_error)?;
        u64::try_from(chain_id).map_err(|_| Error::Decode {
            what: "chain id",
            detail: format!("{chain_id} does not fit in 64 bits"),
        })
    }

    /// Leaves gas and nonce to the wallet, which estimates before it signs.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash> {
        debug!(to = ?tx.to, "eth_sendTransaction");
        self.provider
            .request("eth_sendTransaction", [tx])
            .await
            .map_err(|err| match rpc_error(err) {
                Error::Rpc {
                    code: USER_REJECTED,
                    message,
                } => Error::TransactionRejected(message),
                Error::Rpc { code, message }
                    if code == EXECUTION_REVERTED || message.contains("execution reverted") =>
                {
                    Error::TransactionReverted {
                        hash: None,
                        reason: message,
                    }
                }
                other => other,
            })
    }

    fn can_sign(&self) -> bool {
        self.signing
    }
}

/// JSON-RPC error objects become [`Error::Rpc`]; everything else stays a provider error.
fn rpc_error(err: ProviderError) -> Error {
    match err.as_error_response() {
        Some(response) => Error::Rpc {
            code: response.code,
            message: response.message.clone(),
        },
        None => Error::Provider(err),
    }
}

impl fmt::Display for WalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.provider.url())
    }
}
