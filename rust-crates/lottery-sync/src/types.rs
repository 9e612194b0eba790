use crate::{
    Error,
    Result,
};
use ethers::utils;

pub use ethers::types::{
    Address,
    Bytes,
    H256 as TxHash,
    TransactionReceipt,
    U256,
};

/// Amounts are carried in wei.
pub type Wei = U256;

const ETHER_DECIMALS: usize = 18;

/// Most recently created round as reported by the index service.
///
/// Players and winner are kept exactly as the index service spells them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundRecord {
    pub round_id: String,
    pub entry_fee: Wei,
    pub max_players: u32,
    pub players: Vec<String>,
    pub winner: Option<String>,
}

impl RoundRecord {
    pub fn occupancy(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() as u64 == u64::from(self.max_players)
    }
}

/// Contract state read on every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainFacts {
    pub game_started: bool,
    pub owner: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletSession {
    pub address: Address,
    pub chain_id: u64,
    pub signing_capability: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PendingAction {
    #[default]
    None,
    StartingGame,
    JoiningGame,
}

impl PendingAction {
    pub fn is_pending(self) -> bool {
        !matches!(self, PendingAction::None)
    }
}

/// Converts a decimal ether amount such as `"0.01"` into wei.
///
/// Negative input is clamped to zero, matching the start-game form.
pub fn parse_ether(input: &str) -> Result<Wei> {
    let trimmed = input.trim();
    let (negative, amount) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let digits = amount.replacen('.', "", 1);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!("{input:?} is not an ether amount")));
    }
    if let Some((_, fraction)) = amount.split_once('.') {
        if fraction.len() > ETHER_DECIMALS {
            return Err(Error::InvalidInput(format!(
                "{input:?} has more than {ETHER_DECIMALS} decimals"
            )));
        }
    }
    let wei = utils::parse_ether(amount)
        .map_err(|e| Error::InvalidInput(format!("{input:?}: {e}")))?;
    Ok(if negative { Wei::zero() } else { wei })
}
