use crate::{
    poller::Snapshot,
    types::{
        PendingAction,
        WalletSession,
        Wei,
    },
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    ConnectingWallet,
    Connected(WalletSession),
}

impl ConnectionState {
    pub fn session(&self) -> Option<&WalletSession> {
        match self {
            ConnectionState::Connected(session) => Some(session),
            _ => None,
        }
    }
}

/// The single action the presentation layer should offer right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Affordance {
    Connect { in_progress: bool },
    Busy(PendingAction),
    ChoosingWinner,
    /// `entry_fee` is unknown until the index has described the open round.
    Join { entry_fee: Option<Wei> },
    StartGameForm,
    Waiting,
}

impl Affordance {
    /// Whether the affordance leads to a contract write.
    pub fn permits_write(&self) -> bool {
        matches!(
            self,
            Affordance::Join {
                entry_fee: Some(_)
            } | Affordance::StartGameForm
        )
    }
}

pub fn affordance(
    connection: &ConnectionState,
    snapshot: Option<&Snapshot>,
    pending: PendingAction,
) -> Affordance {
    let session = match connection {
        ConnectionState::Disconnected => return Affordance::Connect { in_progress: false },
        ConnectionState::ConnectingWallet => {
            return Affordance::Connect { in_progress: true };
        }
        ConnectionState::Connected(session) => session,
    };
    if pending.is_pending() {
        return Affordance::Busy(pending);
    }
    let Some(snapshot) = snapshot else {
        return Affordance::Waiting;
    };
    let view = &snapshot.view;
    match (view.started, view.is_full) {
        (true, true) => Affordance::ChoosingWinner,
        (true, false) => Affordance::Join {
            entry_fee: view.index_fresh.then(|| view.entry_fee()).flatten(),
        },
        (false, _) if snapshot.facts.owner == session.address => Affordance::StartGameForm,
        (false, _) => Affordance::Waiting,
    }
}
