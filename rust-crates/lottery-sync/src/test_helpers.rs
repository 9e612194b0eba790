use crate::{
    Error,
    Result,
    abi::{
        GameStartedCall,
        GameStartedReturn,
        OwnerCall,
        OwnerReturn,
    },
    chain_client::ChainRpc,
    network_gate::{
        TransactionRequest,
        WalletRpc,
    },
    poller::RoundSource,
    types::{
        Address,
        Bytes,
        RoundRecord,
        TransactionReceipt,
        TxHash,
        Wei,
    },
};
use ethers::{
    contract::EthCall,
    core::abi::AbiEncode,
    types::U64,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::Notify;

pub fn arb_address(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn arb_round(id: &str, max_players: u32, players: &[&str]) -> RoundRecord {
    RoundRecord {
        round_id: id.to_string(),
        entry_fee: Wei::from(1000),
        max_players,
        players: players.iter().map(|p| p.to_string()).collect(),
        winner: None,
    }
}

#[derive(Default)]
pub struct ChainState {
    pub game_started: bool,
    pub owner: Address,
    /// Contract calls return `0x`, as for an address without code.
    pub empty_returns: bool,
    pub fail_reads: bool,
    /// When set, every sent transaction is mined immediately with this outcome.
    pub auto_mine: Option<bool>,
    pub sent: Vec<TransactionRequest>,
    pub receipts: HashMap<TxHash, bool>,
    pub receipt_polls: usize,
    pub reads: usize,
}

/// In-memory contract shared by [`FakeWallet`] (writes) and the chain client (reads).
#[derive(Clone, Default)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn with_state<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn mine(&self, hash: TxHash, success: bool) {
        self.with_state(|s| s.receipts.insert(hash, success));
    }
}

impl ChainRpc for FakeChain {
    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes> {
        self.with_state(|s| {
            s.reads += 1;
            if s.fail_reads {
                return Err(Error::Rpc {
                    code: -32000,
                    message: "node unavailable".to_string(),
                });
            }
            if s.empty_returns {
                return Ok(Bytes::new());
            }
            if data.starts_with(&GameStartedCall::selector()) {
                Ok(GameStartedReturn(s.game_started).encode().into())
            } else if data.starts_with(&OwnerCall::selector()) {
                Ok(OwnerReturn(s.owner).encode().into())
            } else {
                Err(Error::Rpc {
                    code: -32000,
                    message: "execution reverted".to_string(),
                })
            }
        })
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>> {
        self.with_state(|s| {
            s.receipt_polls += 1;
            Ok(s.receipts.get(&hash).map(|success| TransactionReceipt {
                transaction_hash: hash,
                block_number: Some(U64::one()),
                status: Some(U64::from(u64::from(*success))),
                ..Default::default()
            }))
        })
    }
}

pub struct FakeWallet {
    chain: FakeChain,
    accounts: Vec<Address>,
    chain_id: u64,
    signing: bool,
    reject: bool,
    revert: Option<String>,
    approval: Option<Arc<Notify>>,
}

impl FakeWallet {
    pub fn new(chain: FakeChain, account: Address, chain_id: u64) -> Self {
        Self {
            chain,
            accounts: vec![account],
            chain_id,
            signing: true,
            reject: false,
            revert: None,
            approval: None,
        }
    }

    pub fn without_accounts(mut self) -> Self {
        self.accounts.clear();
        self
    }

    pub fn watch_only(mut self) -> Self {
        self.signing = false;
        self
    }

    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Submissions fail gas estimation with `reason`, as for a contract precondition.
    pub fn reverting(mut self, reason: &str) -> Self {
        self.revert = Some(reason.to_string());
        self
    }

    /// Account requests block until the returned notify fires, like an open wallet prompt.
    pub fn awaiting_approval(mut self) -> (Self, Arc<Notify>) {
        let approval = Arc::new(Notify::new());
        self.approval = Some(approval.clone());
        (self, approval)
    }
}

impl WalletRpc for FakeWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        if let Some(approval) = &self.approval {
            approval.notified().await;
        }
        Ok(self.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash> {
        if self.reject {
            return Err(Error::TransactionRejected(
                "User denied transaction signature.".to_string(),
            ));
        }
        if let Some(reason) = &self.revert {
            return Err(Error::TransactionReverted {
                hash: None,
                reason: reason.clone(),
            });
        }
        Ok(self.chain.with_state(|s| {
            s.sent.push(tx.clone());
            let hash = TxHash::repeat_byte(s.sent.len() as u8);
            if let Some(success) = s.auto_mine {
                s.receipts.insert(hash, success);
            }
            hash
        }))
    }

    fn can_sign(&self) -> bool {
        self.signing
    }
}

/// Index service double; the next fetch returns whatever was last set.
#[derive(Clone)]
pub struct FakeRounds {
    latest: Arc<Mutex<Result<Option<RoundRecord>, String>>>,
}

impl FakeRounds {
    pub fn new(latest: Option<RoundRecord>) -> Self {
        Self {
            latest: Arc::new(Mutex::new(Ok(latest))),
        }
    }

    pub fn set(&self, latest: Option<RoundRecord>) {
        *self.latest.lock().unwrap() = Ok(latest);
    }

    pub fn fail(&self, reason: &str) {
        *self.latest.lock().unwrap() = Err(reason.to_string());
    }
}

impl RoundSource for FakeRounds {
    async fn fetch_latest_round(&self) -> Result<Option<RoundRecord>> {
        self.latest
            .lock()
            .unwrap()
            .clone()
            .map_err(Error::IndexUnavailable)
    }
}
