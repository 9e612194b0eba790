use crate::{
    Result,
    types::{
        Address,
        ChainFacts,
        RoundRecord,
        Wei,
    },
};
use tracing::{
    debug,
    warn,
};

/// The merged picture of the lottery published once per tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameView {
    /// Decided by the contract alone.
    pub started: bool,
    pub round: Option<RoundRecord>,
    pub logs: Vec<String>,
    pub is_full: bool,
    /// False when `round` was carried over from an earlier tick.
    pub index_fresh: bool,
}

impl GameView {
    fn new(started: bool, round: Option<RoundRecord>, index_fresh: bool) -> Self {
        let is_full = started && round.as_ref().is_some_and(RoundRecord::is_full);
        let logs = if index_fresh {
            render_logs(started, round.as_ref())
        } else {
            Vec::new()
        };
        Self {
            started,
            round,
            logs,
            is_full,
            index_fresh,
        }
    }

    pub fn entry_fee(&self) -> Option<Wei> {
        self.round.as_ref().map(|round| round.entry_fee)
    }

    pub fn has_joined(&self, address: &Address) -> bool {
        let needle = format!("{address:?}");
        self.round.as_ref().is_some_and(|round| {
            round
                .players
                .iter()
                .any(|player| player.eq_ignore_ascii_case(&needle))
        })
    }

    /// Winner of the concluded round, only while no new round is open.
    pub fn last_winner(&self) -> Option<&str> {
        if self.started {
            return None;
        }
        self.round.as_ref().and_then(|round| round.winner.as_deref())
    }
}

fn render_logs(started: bool, round: Option<&RoundRecord>) -> Vec<String> {
    let Some(round) = round else {
        return Vec::new();
    };
    if started {
        let mut logs = vec![format!("Game has started with ID: {}", round.round_id)];
        if !round.players.is_empty() {
            logs.push(format!(
                "{} / {} already joined",
                round.players.len(),
                round.max_players
            ));
            logs.extend(round.players.iter().map(|player| format!("{player} joined")));
        }
        logs
    } else {
        match &round.winner {
            Some(winner) => vec![
                format!("Last game has ended with ID: {}", round.round_id),
                format!("Winner is: {winner}"),
                "Waiting for host to start a new game...".to_string(),
            ],
            None => Vec::new(),
        }
    }
}

/// Pure merge of one tick's chain facts with a freshly fetched round.
///
/// The contract decides open versus closed; the record only describes. An open round
/// takes the record as-is, a closed one keeps it only when it names a winner.
pub fn merge(facts: &ChainFacts, round: Option<&RoundRecord>) -> GameView {
    let round = match (facts.game_started, round) {
        (true, Some(record)) => Some(record.clone()),
        (false, Some(record)) if record.winner.is_some() => Some(record.clone()),
        _ => None,
    };
    GameView::new(facts.game_started, round, true)
}

/// Merges chain facts with index data tick after tick.
///
/// Keeps the last round it successfully merged so a failed or lagging index fetch
/// degrades to the previous description instead of flickering to nothing.
#[derive(Debug, Default)]
pub struct Reconciler {
    retained: Option<RoundRecord>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retained(&self) -> Option<&RoundRecord> {
        self.retained.as_ref()
    }

    pub fn reconcile(
        &mut self,
        facts: &ChainFacts,
        fetched: Result<Option<RoundRecord>>,
    ) -> GameView {
        let started = facts.game_started;
        match fetched {
            Ok(Some(record)) if started && record.winner.is_some() => {
                debug!(
                    round_id = %record.round_id,
                    "index still reports the concluded round; keeping previous description"
                );
                self.carry_over(started)
            }
            Ok(None) if started => {
                debug!("index has no round yet for an open game");
                self.carry_over(started)
            }
            Ok(record) => {
                let view = merge(facts, record.as_ref());
                self.retained = view.round.clone();
                view
            }
            Err(err) => {
                warn!(%err, "index fetch failed; chain facts only for this tick");
                self.carry_over(started)
            }
        }
    }

    fn carry_over(&self, started: bool) -> GameView {
        // A concluded round never describes an open one.
        let round = self
            .retained
            .clone()
            .filter(|round| !started || round.winner.is_none());
        GameView::new(started, round, false)
    }
}
