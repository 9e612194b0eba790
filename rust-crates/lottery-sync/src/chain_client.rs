use crate::{
    Error,
    Result,
    abi,
    network_gate::{
        SigningHandle,
        WalletRpc,
    },
    types::{
        Address,
        Bytes,
        ChainFacts,
        TransactionReceipt,
        TxHash,
        WalletSession,
        Wei,
    },
};
use std::{
    future::Future,
    time::Duration,
};
use tokio::time;
use tracing::{
    info,
    warn,
};

pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Read-only access to a chain node.
pub trait ChainRpc: Send + Sync {
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = Result<Bytes>> + Send;

    /// `None` until the transaction is included in a block.
    fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<TransactionReceipt>>> + Send;
}

/// Typed view of the lottery contract.
pub struct ChainClient<R> {
    rpc: R,
    contract: Address,
    receipt_poll_interval: Duration,
}

impl<R: ChainRpc> ChainClient<R> {
    pub fn new(rpc: R, contract: Address) -> Self {
        Self {
            rpc,
            contract,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub async fn owner(&self) -> Result<Address> {
        let data = self.rpc.call(self.contract, abi::owner()).await?;
        abi::decode_owner(&data)
    }

    pub async fn is_game_started(&self) -> Result<bool> {
        let data = self.rpc.call(self.contract, abi::game_started()).await?;
        abi::decode_game_started(&data)
    }

    pub async fn is_owner(&self, session: &WalletSession) -> Result<bool> {
        Ok(self.owner().await? == session.address)
    }

    pub async fn chain_facts(&self) -> Result<ChainFacts> {
        let (game_started, owner) =
            futures::try_join!(self.is_game_started(), self.owner())?;
        Ok(ChainFacts {
            game_started,
            owner,
        })
    }

    /// Only the contract owner may call this; the contract enforces it.
    pub async fn start_game<W: WalletRpc>(
        &self,
        signer: &SigningHandle<'_, W>,
        max_players: u32,
        entry_fee: Wei,
    ) -> Result<TransactionHandle<'_, R>> {
        let max_players = u8::try_from(max_players)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "max players must be between 1 and 255, got {max_players}"
                ))
            })?;
        let hash = signer
            .send(
                self.contract,
                abi::start_game(max_players, entry_fee),
                Wei::zero(),
            )
            .await?;
        info!(?hash, max_players, %entry_fee, "startGame submitted");
        Ok(self.handle(hash))
    }

    pub async fn join_game<W: WalletRpc>(
        &self,
        signer: &SigningHandle<'_, W>,
        value: Wei,
    ) -> Result<TransactionHandle<'_, R>> {
        let hash = signer.send(self.contract, abi::join_game(), value).await?;
        info!(?hash, %value, "joinGame submitted");
        Ok(self.handle(hash))
    }

    fn handle(&self, hash: TxHash) -> TransactionHandle<'_, R> {
        TransactionHandle {
            hash,
            rpc: &self.rpc,
            poll_interval: self.receipt_poll_interval,
        }
    }
}

/// A submitted transaction, resolved by [`TransactionHandle::wait`] once mined.
pub struct TransactionHandle<'a, R> {
    hash: TxHash,
    rpc: &'a R,
    poll_interval: Duration,
}

impl<R: ChainRpc> TransactionHandle<'_, R> {
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub async fn wait(self) -> Result<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.rpc.transaction_receipt(self.hash).await? {
                // Receipts without a status predate Byzantium and only exist for included txs.
                if receipt.status.is_some_and(|status| status.is_zero()) {
                    warn!(hash = ?self.hash, "transaction reverted");
                    return Err(Error::TransactionReverted {
                        hash: Some(self.hash),
                        reason: "receipt status 0".to_string(),
                    });
                }
                info!(hash = ?self.hash, block = ?receipt.block_number, "transaction included");
                return Ok(receipt);
            }
            time::sleep(self.poll_interval).await;
        }
    }
}
