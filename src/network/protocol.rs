//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON objects tagged by `type`.

use serde::{Serialize, Deserialize};

use crate::game::action::ActionOutcome;
use crate::game::events::WorldEvent;
use crate::game::records::LeaderboardEntry;
use crate::game::state::WorldState;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the full world.
    GetState,

    /// Perform a player action.
    Action {
        /// Acting user.
        user_id: String,
        /// Action name ("grow", "chop", "fuel").
        action: String,
    },

    /// Post a chat message.
    Chat {
        /// Author.
        user_id: String,
        /// Text.
        message: String,
    },

    /// Ask the simulation to advance (debounced server-side).
    Tick,

    /// Request a leaderboard.
    Leaderboard {
        /// Action name to rank by.
        action: String,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client send time, echoed back.
        timestamp: u64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full world.
    State {
        /// The world.
        state: WorldState,
    },

    /// Result of an action request.
    ActionResult(ActionOutcome),

    /// Chat message stored.
    ChatAccepted,

    /// Result of a tick request.
    Ticked {
        /// Whether a step was applied.
        advanced: bool,
    },

    /// Leaderboard rows, highest first.
    Leaderboard {
        /// Action ranked by.
        action: String,
        /// Rows.
        entries: Vec<LeaderboardEntry>,
    },

    /// Pushed world event.
    Event {
        /// The event.
        event: WorldEvent,
    },

    /// Pong response.
    Pong {
        /// Echo of the ping's timestamp.
        timestamp: u64,
        /// Server clock in Unix milliseconds.
        server_time: i64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why the connection is closing.
        reason: String,
    },
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error payload.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or incomplete request.
    InvalidInput,
    /// Unknown action name.
    UnknownAction,
    /// Binary frames are not supported.
    UnsupportedFormat,
    /// Saving the world failed.
    StorageFailed,
    /// Connection limit reached.
    ServerOverloaded,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
