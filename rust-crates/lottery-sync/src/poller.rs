use crate::{
    Result,
    chain_client::{
        ChainClient,
        ChainRpc,
    },
    index_client::IndexClient,
    reconciler::{
        GameView,
        Reconciler,
    },
    types::{
        ChainFacts,
        RoundRecord,
    },
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Source of authoritative contract state.
pub trait FactsSource: Send + Sync {
    fn fetch_facts(&self) -> impl Future<Output = Result<ChainFacts>> + Send;
}

/// Source of the descriptive round record.
pub trait RoundSource: Send + Sync {
    fn fetch_latest_round(&self) -> impl Future<Output = Result<Option<RoundRecord>>> + Send;
}

impl<R: ChainRpc> FactsSource for ChainClient<R> {
    async fn fetch_facts(&self) -> Result<ChainFacts> {
        self.chain_facts().await
    }
}

impl RoundSource for IndexClient {
    async fn fetch_latest_round(&self) -> Result<Option<RoundRecord>> {
        self.latest_round().await
    }
}

/// One published reconciliation result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Session generation the tick ran under.
    pub generation: u64,
    pub facts: ChainFacts,
    pub view: GameView,
}

enum PollerCommand {
    FetchNow,
    Shutdown,
}

type Tick = Pin<Box<dyn Future<Output = (Result<ChainFacts>, Result<Option<RoundRecord>>)> + Send>>;

/// Spawns the repeating reconciliation task.
pub struct Poller<C, I> {
    chain: Arc<C>,
    index: Arc<I>,
    interval: Duration,
}

impl<C, I> Poller<C, I>
where
    C: FactsSource + 'static,
    I: RoundSource + 'static,
{
    pub fn new(chain: Arc<C>, index: Arc<I>, interval: Duration) -> Self {
        Self {
            chain,
            index,
            interval,
        }
    }

    /// Starts ticking at once. `publish` returns false once the generation is stale,
    /// which ends the task.
    pub fn start<P>(self, generation: u64, publish: P) -> PollerHandle
    where
        P: Fn(Snapshot) -> bool + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(generation, cmd_rx, publish));
        info!(generation, "poller started");
        PollerHandle {
            generation,
            cmd_tx,
            task,
        }
    }

    async fn run<P>(
        self,
        generation: u64,
        mut cmd_rx: mpsc::UnboundedReceiver<PollerCommand>,
        publish: P,
    ) where
        P: Fn(Snapshot) -> bool + Send + 'static,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reconciler = Reconciler::new();
        let mut last_facts = ChainFacts::default();
        let mut in_flight: Option<Tick> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.begin_tick(&mut in_flight);
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(PollerCommand::FetchNow) => self.begin_tick(&mut in_flight),
                        Some(PollerCommand::Shutdown) | None => break,
                    }
                }
                (facts, round) = settle(&mut in_flight) => {
                    in_flight = None;
                    let facts = match facts {
                        Ok(facts) => {
                            last_facts = facts;
                            facts
                        }
                        Err(err) => {
                            warn!(%err, "chain read failed; reusing last known chain facts");
                            last_facts
                        }
                    };
                    let view = reconciler.reconcile(&facts, round);
                    let snapshot = Snapshot {
                        generation,
                        facts,
                        view,
                    };
                    if !publish(snapshot) {
                        debug!(generation, "session superseded; poller exiting");
                        break;
                    }
                }
            }
        }
        info!(generation, "poller stopped");
    }

    fn begin_tick(&self, in_flight: &mut Option<Tick>) {
        if in_flight.is_some() {
            debug!("reconciliation still in flight; skipping tick");
            return;
        }
        let chain = self.chain.clone();
        let index = self.index.clone();
        *in_flight = Some(Box::pin(async move {
            futures::join!(chain.fetch_facts(), index.fetch_latest_round())
        }));
    }
}

async fn settle(
    in_flight: &mut Option<Tick>,
) -> (Result<ChainFacts>, Result<Option<RoundRecord>>) {
    match in_flight {
        Some(tick) => tick.await,
        None => std::future::pending().await,
    }
}

/// Running poller. Dropping the handle stops it as well.
pub struct PollerHandle {
    generation: u64,
    cmd_tx: mpsc::UnboundedSender<PollerCommand>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Requests an immediate tick; ignored while one is in flight.
    pub fn fetch_now(&self) {
        let _ = self.cmd_tx.send(PollerCommand::FetchNow);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops scheduling and drops any in-flight reconciliation.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(PollerCommand::Shutdown);
        self.task.abort();
    }
}
