//! World Events
//!
//! One event per committed mutation, published to connected observers.

use serde::{Serialize, Deserialize};

use crate::core::time::Timestamp;
use crate::game::action::{Action, ActionReceipt};
use crate::game::chat::ChatMessage;
use crate::game::state::{FireStage, UserId, WorldState};
use crate::game::tick::TickOutcome;

/// Something that changed the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorldEvent {
    /// A player action was applied
    ActionPerformed {
        /// Who acted
        user_id: UserId,
        /// What they did
        action: Action,
        /// When they may act again
        cooldown_until: Timestamp,
    },

    /// A chat line was posted directly
    ChatPosted {
        /// The posted line
        message: ChatMessage,
    },

    /// The simulation advanced one step
    Ticked {
        /// Fire size after the step
        fire_size: f64,
        /// Size class after the step
        stage: FireStage,
        /// Fire went out this step
        extinguished: bool,
    },

    /// A global record was broken
    RecordBroken {
        /// Which record
        record: RecordKind,
        /// New value
        value: f64,
    },
}

/// Global records tracked by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Longest continuous burn
    LongestFire,
    /// Largest fire size
    BiggestFire,
}

impl WorldEvent {
    /// Event for a successful action.
    pub fn action_performed(receipt: &ActionReceipt) -> Self {
        WorldEvent::ActionPerformed {
            user_id: receipt.user_id.clone(),
            action: receipt.action,
            cooldown_until: receipt.cooldown_until,
        }
    }

    /// Events for an applied tick. Empty if the tick was debounced.
    pub fn from_tick(state: &WorldState, outcome: &TickOutcome) -> Vec<WorldEvent> {
        let TickOutcome::Advanced { extinguished, records } = *outcome else {
            return Vec::new();
        };

        let mut events = vec![WorldEvent::Ticked {
            fire_size: state.fire_size,
            stage: state.fire_stage(),
            extinguished,
        }];
        if records.longest {
            events.push(WorldEvent::RecordBroken {
                record: RecordKind::LongestFire,
                value: state.records.longest_fire,
            });
        }
        if records.biggest {
            events.push(WorldEvent::RecordBroken {
                record: RecordKind::BiggestFire,
                value: state.records.biggest_fire,
            });
        }
        events
    }
}
