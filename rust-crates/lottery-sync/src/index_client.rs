use crate::{
    Error,
    Result,
    types::{
        RoundRecord,
        Wei,
    },
};
use serde::Deserialize;
use serde_json::json;
use std::{
    fmt,
    time::Duration,
};
use tracing::debug;
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(30);

const LATEST_ROUND_QUERY: &str = "query { games(orderBy: id, orderDirection: desc, first: 1) { id maxPlayers entryFee winner players } }";

/// GraphQL client for the event index.
#[derive(Clone)]
pub struct IndexClient {
    endpoint: Url,
    http: reqwest::Client,
}

impl IndexClient {
    pub fn new(endpoint: Url) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self { endpoint, http })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The most recent round, or `None` when nothing is indexed yet.
    pub async fn latest_round(&self) -> Result<Option<RoundRecord>> {
        let res = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "query": LATEST_ROUND_QUERY }))
            .send()
            .await
            .map_err(|e| unavailable(format!("index request failed: {e}")))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| unavailable(format!("failed to read index response body: {e}")))?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(unavailable(format!(
                "index responded with {status} when fetching latest round: {body}"
            )));
        }
        let response: GraphQlResponse = serde_json::from_slice(&bytes)
            .map_err(|e| unavailable(format!("invalid index payload: {e}")))?;
        if let Some(first) = response.errors.first() {
            return Err(unavailable(format!("index query failed: {}", first.message)));
        }
        let data = response
            .data
            .ok_or_else(|| unavailable("index response carried no data".to_string()))?;
        let round = data
            .games
            .into_iter()
            .next()
            .map(RoundRecord::try_from)
            .transpose()?;
        debug!(round_id = ?round.as_ref().map(|r| &r.round_id), "fetched latest round");
        Ok(round)
    }
}

fn unavailable(reason: String) -> Error {
    Error::IndexUnavailable(reason)
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<GamesDto>,
    #[serde(default)]
    errors: Vec<GraphQlErrorDto>,
}

#[derive(Deserialize)]
struct GraphQlErrorDto {
    message: String,
}

#[derive(Deserialize)]
struct GamesDto {
    games: Vec<GameDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameDto {
    id: String,
    max_players: BigIntDto,
    entry_fee: BigIntDto,
    #[serde(default)]
    winner: Option<String>,
    #[serde(default)]
    players: Vec<String>,
}

/// Subgraph `BigInt`s arrive as decimal strings; plain `Int`s as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum BigIntDto {
    Number(u64),
    Decimal(String),
}

impl BigIntDto {
    fn to_wei(&self, field: &str) -> Result<Wei> {
        match self {
            BigIntDto::Number(n) => Ok(Wei::from(*n)),
            BigIntDto::Decimal(s) => Wei::from_dec_str(s.trim())
                .map_err(|e| unavailable(format!("invalid {field} `{s}`: {e}"))),
        }
    }
}

impl TryFrom<GameDto> for RoundRecord {
    type Error = Error;

    fn try_from(dto: GameDto) -> Result<Self> {
        let max_players = dto.max_players.to_wei("maxPlayers")?;
        if max_players > Wei::from(u32::MAX) {
            return Err(unavailable(format!("maxPlayers {max_players} out of range")));
        }
        let winner = dto
            .winner
            .filter(|w| !w.is_empty() && !w.trim_start_matches("0x").chars().all(|c| c == '0'));
        Ok(RoundRecord {
            round_id: dto.id,
            entry_fee: dto.entry_fee.to_wei("entryFee")?,
            max_players: max_players.as_u32(),
            players: dto.players,
            winner,
        })
    }
}

impl fmt::Display for IndexClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}
