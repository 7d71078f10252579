//! Game Logic Module
//!
//! All world rules. Pure functions over `WorldState`; no I/O and no
//! wall-clock reads (every operation is handed `now`).
//!
//! ## Module Structure
//!
//! - `state`: World state, user ids, fire stages
//! - `action`: Player actions, cooldowns, rejection reasons
//! - `tick`: Fire simulation step
//! - `chat`: Bounded chat log
//! - `records`: High scores, action counters, leaderboards
//! - `events`: Events describing committed changes

pub mod state;
pub mod action;
pub mod tick;
pub mod chat;
pub mod records;
pub mod events;

// Re-export key types
pub use state::{WorldState, UserId, FireStage};
pub use action::{Action, ActionConfig, ActionOutcome, ActionReceipt, RejectReason};
pub use tick::{TickConfig, TickOutcome};
pub use chat::{ChatLog, ChatMessage, ChatError, CHAT_CAPACITY};
pub use records::{RecordsBlock, ActionCounts, LeaderboardEntry};
pub use events::WorldEvent;

/// Tunables for all world rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GameConfig {
    /// Action cooldowns
    pub action: ActionConfig,
    /// Fire simulation
    pub tick: TickConfig,
}
