//! Bindings for the lottery contract's four entry points.

use crate::{
    Error,
    Result,
    types::{
        Address,
        Bytes,
        Wei,
    },
};
use ethers::{
    contract::abigen,
    core::abi::{
        AbiDecode,
        AbiEncode,
    },
};

abigen!(
    LotteryGame,
    r#"[
        function owner() external view returns (address)
        function gameStarted() external view returns (bool)
        function startGame(uint8 maxPlayers, uint256 entryFee) external
        function joinGame() external payable
    ]"#,
);

pub fn owner() -> Bytes {
    OwnerCall.encode().into()
}

pub fn game_started() -> Bytes {
    GameStartedCall.encode().into()
}

pub fn start_game(max_players: u8, entry_fee: Wei) -> Bytes {
    StartGameCall {
        max_players,
        entry_fee,
    }
    .encode()
    .into()
}

pub fn join_game() -> Bytes {
    JoinGameCall.encode().into()
}

/// An empty return (no code, or a contract that was never initialised) reads as `false`.
pub fn decode_game_started(data: &[u8]) -> Result<bool> {
    if data.is_empty() {
        return Ok(false);
    }
    GameStartedReturn::decode(data)
        .map(|started| started.0)
        .map_err(|e| Error::Decode {
            what: "gameStarted",
            detail: e.to_string(),
        })
}

/// An empty return reads as the zero address.
pub fn decode_owner(data: &[u8]) -> Result<Address> {
    if data.is_empty() {
        return Ok(Address::zero());
    }
    OwnerReturn::decode(data)
        .map(|owner| owner.0)
        .map_err(|e| Error::Decode {
            what: "owner",
            detail: e.to_string(),
        })
}
