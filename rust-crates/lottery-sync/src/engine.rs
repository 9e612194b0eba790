use crate::{
    Error,
    Result,
    chain_client::{
        ChainClient,
        ChainRpc,
    },
    config::EngineConfig,
    index_client::IndexClient,
    network_gate::{
        NetworkGate,
        WalletRpc,
    },
    poller::{
        Poller,
        PollerHandle,
        RoundSource,
        Snapshot,
    },
    rpc::WalletProvider,
    session::{
        self,
        Affordance,
        ConnectionState,
    },
    types::{
        PendingAction,
        TransactionReceipt,
        WalletSession,
        Wei,
    },
};
use ethers::providers::{
    Http,
    Provider,
};
use std::{
    future::Future,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        Weak,
    },
    time::Duration,
};
use tokio::sync::watch;
use tracing::{
    error,
    info,
    warn,
};


const MAX_ERRORS: usize = 50;

/// Human-facing status line plus a bounded log of failures.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub message: Option<String>,
    pub errors: Vec<String>,
}

impl EngineStatus {
    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }
}

struct Inner<W, R, I> {
    gate: NetworkGate<W>,
    chain: Arc<ChainClient<R>>,
    index: Arc<I>,
    poll_interval: Duration,
    // Bumped on every teardown; work started under an older value is discarded.
    // Lock order: a read of `generation` comes first, then the other registers and `poller`.
    // `generation` is only ever written with nothing else held.
    generation: watch::Sender<u64>,
    connection: watch::Sender<ConnectionState>,
    pending: watch::Sender<PendingAction>,
    snapshot: watch::Sender<Option<Snapshot>>,
    poller: Mutex<Option<PollerHandle>>,
    status: Mutex<EngineStatus>,
}

/// Session lifecycle, polling and writes behind one handle.
///
/// Cloning is cheap; every clone drives the same session.
pub struct LotteryEngine<W, R, I> {
    inner: Arc<Inner<W, R, I>>,
}

impl<W, R, I> Clone for LotteryEngine<W, R, I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl LotteryEngine<WalletProvider, Provider<Http>, IndexClient> {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let wallet = WalletProvider::new(config.wallet_url.clone());
        let wallet = if config.watch_only {
            wallet.watch_only()
        } else {
            wallet
        };
        let node = Provider::new(Http::new(config.node_url.clone()));
        let gate = NetworkGate::new(wallet, config.target_chain_id, config.network_name.clone());
        let chain = ChainClient::new(node, config.contract_address)
            .with_receipt_poll_interval(config.receipt_poll_interval());
        let index = IndexClient::new(config.index_url.clone())?;
        info!(
            contract = ?config.contract_address,
            node = %config.node_url,
            index = %config.index_url,
            "engine configured"
        );
        Ok(Self::new(gate, chain, index, config.poll_interval()))
    }
}

impl<W, R, I> LotteryEngine<W, R, I>
where
    W: WalletRpc + 'static,
    R: ChainRpc + 'static,
    I: RoundSource + 'static,
{
    pub fn new(
        gate: NetworkGate<W>,
        chain: ChainClient<R>,
        index: I,
        poll_interval: Duration,
    ) -> Self {
        let inner = Inner {
            gate,
            chain: Arc::new(chain),
            index: Arc::new(index),
            poll_interval,
            generation: watch::Sender::new(0),
            connection: watch::Sender::new(ConnectionState::Disconnected),
            pending: watch::Sender::new(PendingAction::None),
            snapshot: watch::Sender::new(None),
            poller: Mutex::new(None),
            status: Mutex::new(EngineStatus::default()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn chain(&self) -> &ChainClient<R> {
        &self.inner.chain
    }

    pub fn gate(&self) -> &NetworkGate<W> {
        &self.inner.gate
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    pub fn subscribe_pending(&self) -> watch::Receiver<PendingAction> {
        self.inner.pending.subscribe()
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.inner.connection.borrow().clone()
    }

    pub fn pending_action(&self) -> PendingAction {
        *self.inner.pending.borrow()
    }

    pub fn generation(&self) -> u64 {
        *self.inner.generation.borrow()
    }

    pub fn status(&self) -> EngineStatus {
        self.lock_status().clone()
    }

    pub fn affordance(&self) -> Affordance {
        let connection = self.inner.connection.borrow();
        let snapshot = self.inner.snapshot.borrow();
        let pending = *self.inner.pending.borrow();
        session::affordance(&connection, snapshot.as_ref(), pending)
    }

    /// Asks the poller for an immediate tick. No-op while disconnected.
    pub fn refresh(&self) {
        if let Some(poller) = self.lock_poller().as_ref() {
            poller.fetch_now();
        }
    }

    /// Tears down any current session and connects anew.
    ///
    /// Waits on the wallet for as long as it takes; a [`LotteryEngine::disconnect`] in the
    /// meantime resolves this with [`Error::SessionClosed`].
    pub async fn connect(&self) -> Result<WalletSession> {
        let generation = self.teardown();
        self.inner
            .connection
            .send_replace(ConnectionState::ConnectingWallet);
        self.set_message("Connecting wallet...");

        let result = self
            .until_session_closed(generation, self.inner.gate.connect())
            .await;

        let settled = while_current(&self.inner.generation, generation, || match &result {
            Ok(session) => {
                self.inner
                    .connection
                    .send_replace(ConnectionState::Connected(session.clone()));
                self.start_poller(generation);
            }
            Err(_) => {
                self.inner
                    .connection
                    .send_replace(ConnectionState::Disconnected);
            }
        });
        if settled.is_none() {
            return Err(Error::SessionClosed);
        }
        match result {
            Ok(session) => {
                self.set_message(format!("Connected as {:?}", session.address));
                Ok(session)
            }
            Err(err) => {
                let notice = match &err {
                    Error::NetworkMismatch { .. } => self.inner.gate.mismatch_notice(),
                    other => format!("Wallet connection failed: {other}"),
                };
                self.set_message(notice.clone());
                self.lock_status().push_errors(vec![notice]);
                Err(err)
            }
        }
    }

    pub fn disconnect(&self) {
        self.teardown();
        self.inner
            .connection
            .send_replace(ConnectionState::Disconnected);
        self.set_message("Disconnected");
        info!("wallet disconnected");
    }

    /// Opens a new round. Only the contract owner succeeds.
    pub async fn start_game(
        &self,
        max_players: u32,
        entry_fee: Wei,
    ) -> Result<TransactionReceipt> {
        let action = PendingAction::StartingGame;
        let (generation, session) = self.begin_write(action)?;
        let write = async {
            let signer = self.inner.gate.require_signer(&session)?;
            self.inner
                .chain
                .start_game(&signer, max_players, entry_fee)
                .await?
                .wait()
                .await
        };
        let result = self.until_session_closed(generation, write).await;
        self.finish_write(generation, action, result)
    }

    /// Joins the open round, paying the entry fee the index reported for it.
    pub async fn join_game(&self) -> Result<TransactionReceipt> {
        self.current_session()?;
        let entry_fee = self.joinable_entry_fee()?;
        let action = PendingAction::JoiningGame;
        let (generation, session) = self.begin_write(action)?;
        let write = async {
            let signer = self.inner.gate.require_signer(&session)?;
            self.inner
                .chain
                .join_game(&signer, entry_fee)
                .await?
                .wait()
                .await
        };
        let result = self.until_session_closed(generation, write).await;
        self.finish_write(generation, action, result)
    }

    fn current_session(&self) -> Result<WalletSession> {
        self.inner
            .connection
            .borrow()
            .session()
            .cloned()
            .ok_or(Error::NotConnected)
    }

    fn joinable_entry_fee(&self) -> Result<Wei> {
        let snapshot = self.inner.snapshot.borrow();
        let view = snapshot
            .as_ref()
            .map(|snapshot| &snapshot.view)
            .filter(|view| view.started && view.index_fresh)
            .ok_or(Error::RoundUnavailable)?;
        if view.is_full {
            return Err(Error::InvalidInput("round is already full".to_string()));
        }
        view.entry_fee().ok_or(Error::RoundUnavailable)
    }

    /// Claims the pending-action register for the current session.
    fn begin_write(&self, action: PendingAction) -> Result<(u64, WalletSession)> {
        let generation = *self.inner.generation.borrow();
        let claim = || {
            let session = self.current_session()?;
            let mut claimed = Ok(());
            self.inner.pending.send_if_modified(|pending| {
                if pending.is_pending() {
                    claimed = Err(Error::ActionPending(*pending));
                    return false;
                }
                *pending = action;
                true
            });
            claimed.map(|()| session)
        };
        let session = while_current(&self.inner.generation, generation, claim)
            .unwrap_or(Err(Error::SessionClosed))?;
        Ok((generation, session))
    }

    fn finish_write(
        &self,
        generation: u64,
        action: PendingAction,
        result: Result<TransactionReceipt>,
    ) -> Result<TransactionReceipt> {
        while_current(&self.inner.generation, generation, || {
            self.inner.pending.send_replace(PendingAction::None)
        });
        let label = action_label(action);
        match &result {
            Ok(receipt) => {
                info!(hash = ?receipt.transaction_hash, "{label} confirmed");
                self.set_message(format!("{label} confirmed"));
            }
            Err(Error::SessionClosed) => {
                warn!("{label} outcome discarded; session closed");
            }
            Err(err) => {
                warn!(%err, "{label} failed");
                self.lock_status()
                    .push_errors(vec![format!("{label} failed: {err}")]);
            }
        }
        self.refresh();
        result
    }

    async fn until_session_closed<T>(
        &self,
        generation: u64,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let mut generations = self.inner.generation.subscribe();
        tokio::select! {
            result = work => result,
            _ = generations.wait_for(|current| *current != generation) => {
                Err(Error::SessionClosed)
            }
        }
    }

    /// Invalidates the current session and everything running under it.
    fn teardown(&self) -> u64 {
        let mut generation = 0;
        self.inner.generation.send_modify(|current| {
            *current += 1;
            generation = *current;
        });
        if let Some(poller) = self.lock_poller().take() {
            poller.stop();
        }
        self.inner.pending.send_replace(PendingAction::None);
        self.inner.snapshot.send_replace(None);
        generation
    }

    fn start_poller(&self, generation: u64) {
        let poller = Poller::new(
            self.inner.chain.clone(),
            self.inner.index.clone(),
            self.inner.poll_interval,
        );
        let handle = poller.start(generation, publisher(Arc::downgrade(&self.inner)));
        if let Some(previous) = self.lock_poller().replace(handle) {
            previous.stop();
        }
    }

    fn set_message(&self, message: impl Into<String>) {
        self.lock_status().message = Some(message.into());
    }

    fn lock_status(&self) -> MutexGuard<'_, EngineStatus> {
        self.inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_poller(&self) -> MutexGuard<'_, Option<PollerHandle>> {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publishes snapshots of `generation` only while it is still current.
fn publisher<W, R, I>(inner: Weak<Inner<W, R, I>>) -> impl Fn(Snapshot) -> bool + Send + 'static
where
    W: Send + Sync + 'static,
    R: Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    move |snapshot| {
        let Some(inner) = inner.upgrade() else {
            return false;
        };
        let generation = snapshot.generation;
        while_current(&inner.generation, generation, || {
            inner.snapshot.send_replace(Some(snapshot));
        })
        .is_some()
    }
}

/// Runs `f` only if `generation` is still current, holding the generation read lock
/// throughout so that no teardown can land in between. `f` must not write `generation`.
fn while_current<T>(
    register: &watch::Sender<u64>,
    generation: u64,
    f: impl FnOnce() -> T,
) -> Option<T> {
    let current = register.borrow();
    (*current == generation).then(f)
}

fn action_label(action: PendingAction) -> &'static str {
    match action {
        PendingAction::StartingGame => "startGame",
        PendingAction::JoiningGame => "joinGame",
        PendingAction::None => "write",
    }
}
