//! Frames exchanged with duel clients over the WebSocket channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::dto::validation::{validate_display_name, validate_room_id};

/// Score payload as reported by a client: either a running total or the per-round sequence.
///
/// Relayed to the opponent exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ScoreReport {
    /// Single cumulative total (legacy clients).
    Total(i64),
    /// Cumulative score after each round, oldest first.
    Rounds(Vec<i64>),
}

impl ScoreReport {
    /// Most recent cumulative score carried by this report.
    pub fn latest(&self) -> Option<i64> {
        match self {
            ScoreReport::Total(total) => Some(*total),
            ScoreReport::Rounds(rounds) => rounds.last().copied(),
        }
    }

    /// Per-round view of the report; a bare total counts as a single round.
    pub fn into_rounds(self) -> Vec<i64> {
        match self {
            ScoreReport::Total(total) => vec![total],
            ScoreReport::Rounds(rounds) => rounds,
        }
    }
}

impl Default for ScoreReport {
    fn default() -> Self {
        ScoreReport::Rounds(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Messages accepted from duel clients, discriminated by `action`.
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Ask to be paired with an opponent.
    Connect {
        #[serde(alias = "playerName", alias = "profileName", alias = "userName")]
        display_name: String,
        /// Used by the trophy-proximity matchmaking policy.
        #[serde(default, alias = "totalTrophies")]
        trophies: u32,
    },
    /// Leave the current room, abandoning it.
    Disconnect {
        #[serde(alias = "playerName", alias = "profileName", alias = "userName")]
        display_name: String,
    },
    /// A round finished; relay the score to the opponent.
    PlayerCompleted {
        room_id: String,
        #[serde(alias = "playerName", alias = "profileName", alias = "userName")]
        display_name: String,
        #[serde(alias = "playerPoints")]
        scores: ScoreReport,
    },
    /// The reporting client finished the match and computed its local view of the result.
    MatchCompleted {
        room_id: String,
        #[serde(default, alias = "playerName", alias = "profileName", alias = "userName")]
        display_name: Option<String>,
        #[serde(default, alias = "playerPoints")]
        scores: ScoreReport,
        #[serde(default)]
        opponent_name: Option<String>,
        #[serde(default, alias = "opponentTotalPoints")]
        opponent_scores: ScoreReport,
        #[serde(default)]
        is_perfect_score: bool,
        #[serde(default, alias = "isLightingReflexesCompleted")]
        is_fast_reflex: bool,
    },
    #[serde(other)]
    Unknown,
}

/// Reasons an inbound frame is dropped.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ClientMessage {
    /// Decode a text frame and validate the identity fields it carries.
    pub fn from_json_str(payload: &str) -> Result<Self, InboundError> {
        let message: Self = serde_json::from_str(payload)?;
        message.validate_fields()?;
        Ok(message)
    }

    /// Name of the `action` discriminator, for logs.
    pub fn action(&self) -> &'static str {
        match self {
            ClientMessage::Connect { .. } => "connect",
            ClientMessage::Disconnect { .. } => "disconnect",
            ClientMessage::PlayerCompleted { .. } => "player_completed",
            ClientMessage::MatchCompleted { .. } => "match_completed",
            ClientMessage::Unknown => "unknown",
        }
    }

    fn validate_fields(&self) -> Result<(), InboundError> {
        let check_name = |name: &str| {
            validate_display_name(name).map_err(|err| InboundError::Invalid {
                field: "displayName",
                reason: err.to_string(),
            })
        };
        let check_room = |room_id: &str| {
            validate_room_id(room_id).map_err(|err| InboundError::Invalid {
                field: "roomId",
                reason: err.to_string(),
            })
        };

        match self {
            ClientMessage::Connect { display_name, .. }
            | ClientMessage::Disconnect { display_name } => check_name(display_name),
            ClientMessage::PlayerCompleted {
                room_id,
                display_name,
                ..
            } => {
                check_room(room_id)?;
                check_name(display_name)
            }
            ClientMessage::MatchCompleted {
                room_id,
                display_name,
                ..
            } => {
                check_room(room_id)?;
                display_name.as_deref().map_or(Ok(()), check_name)
            }
            ClientMessage::Unknown => Ok(()),
        }
    }
}

/// Notice pushed to both participants once a room is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchFound {
    pub message: String,
    pub opponent_name: String,
    pub room_id: String,
}

impl MatchFound {
    pub fn new(opponent_name: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            message: "Match found!".into(),
            opponent_name: opponent_name.into(),
            room_id: room_id.into(),
        }
    }
}

/// Opponent's round result, forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRelay {
    pub opponent_total_points: ScoreReport,
}
