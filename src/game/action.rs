//! Player Actions
//!
//! Validates a named action against the acting user's cooldown and the
//! shared resources, then applies it.
//!
//! ## Rules
//!
//! | Action | Requires          | Effect                         | Cooldown |
//! |--------|-------------------|--------------------------------|----------|
//! | grow   | -                 | trees + 1                      | 20 s     |
//! | chop   | trees > 0         | trees - 1, wood storage + 5    | 5 s      |
//! | fuel   | wood storage > 0  | wood storage - 1, fire wood + 1| 1 s      |
//!
//! Rejections never touch the state.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::core::time::Timestamp;
use crate::game::chat::ChatMessage;
use crate::game::state::{UserId, WorldState};

/// Logs produced by chopping one tree.
pub const WOOD_PER_TREE: u32 = 5;

// =============================================================================
// ACTION
// =============================================================================

/// Something a player can do to the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Plant a tree
    Grow,
    /// Cut a tree into logs
    Chop,
    /// Put a log on the fire
    Fuel,
}

impl Action {
    /// All actions, in display order.
    pub const ALL: [Action; 3] = [Action::Grow, Action::Chop, Action::Fuel];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Grow => "grow",
            Action::Chop => "chop",
            Action::Fuel => "fuel",
        }
    }

    /// Chat line posted when this action succeeds.
    pub fn flavor_text(self) -> &'static str {
        match self {
            Action::Grow => "planted a tree",
            Action::Chop => "chopped a tree into 5 logs",
            Action::Fuel => "threw a log on the fire",
        }
    }
}

impl FromStr for Action {
    type Err = RejectReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grow" => Ok(Action::Grow),
            "chop" => Ok(Action::Chop),
            "fuel" => Ok(Action::Fuel),
            _ => Err(RejectReason::UnknownAction),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Why an action was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The user is still locked out
    CooldownActive,
    /// Chop with no standing trees
    NoTrees,
    /// Fuel with empty storage
    NoWood,
    /// Name did not match any action
    UnknownAction,
}

impl RejectReason {
    /// Message returned to the caller.
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::CooldownActive => "Cooldown active",
            RejectReason::NoTrees => "No trees",
            RejectReason::NoWood => "No wood",
            RejectReason::UnknownAction => "Unknown action",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result handed back to collaborators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Did the action apply?
    pub success: bool,
    /// Rejection message when it did not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionOutcome {
    /// Successful outcome.
    pub fn accepted() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    /// Failed outcome.
    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            success: false,
            reason: Some(reason.message().to_string()),
        }
    }
}

/// What a successful action did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionReceipt {
    /// Who acted
    pub user_id: UserId,
    /// What they did
    pub action: Action,
    /// New lockout expiry
    pub cooldown_until: Timestamp,
    /// Chat line that was appended
    pub chat_line: ChatMessage,
}

// =============================================================================
// CONFIG
// =============================================================================

/// Per-action lockout durations in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionConfig {
    /// Lockout after planting
    pub grow_cooldown_ms: i64,
    /// Lockout after chopping
    pub chop_cooldown_ms: i64,
    /// Lockout after fueling
    pub fuel_cooldown_ms: i64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            grow_cooldown_ms: 20_000,
            chop_cooldown_ms: 5_000,
            fuel_cooldown_ms: 1_000,
        }
    }
}

impl ActionConfig {
    /// Lockout for one action.
    pub fn cooldown_for(&self, action: Action) -> i64 {
        match action {
            Action::Grow => self.grow_cooldown_ms,
            Action::Chop => self.chop_cooldown_ms,
            Action::Fuel => self.fuel_cooldown_ms,
        }
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Parse a raw action name and apply it.
///
/// Unknown names are refused before the cooldown is consulted.
pub fn resolve_action(
    state: &mut WorldState,
    user: &UserId,
    raw_action: &str,
    now: Timestamp,
    config: &ActionConfig,
) -> Result<ActionReceipt, RejectReason> {
    let action: Action = raw_action.parse()?;
    apply_action(state, user, action, now, config)
}

/// Apply a typed action for `user` at `now`.
///
/// On success the resource change, new cooldown, action counter and chat
/// line are all written to `state`. On rejection `state` is untouched.
pub fn apply_action(
    state: &mut WorldState,
    user: &UserId,
    action: Action,
    now: Timestamp,
    config: &ActionConfig,
) -> Result<ActionReceipt, RejectReason> {
    if state.is_locked(user.as_str(), now) {
        return Err(RejectReason::CooldownActive);
    }

    // Check preconditions before mutating anything
    match action {
        Action::Grow => {}
        Action::Chop if state.trees == 0 => return Err(RejectReason::NoTrees),
        Action::Fuel if state.wood_storage == 0 => return Err(RejectReason::NoWood),
        Action::Chop | Action::Fuel => {}
    }

    match action {
        Action::Grow => {
            state.trees = state.trees.saturating_add(1);
        }
        Action::Chop => {
            state.trees -= 1;
            state.wood_storage = state.wood_storage.saturating_add(WOOD_PER_TREE);
        }
        Action::Fuel => {
            state.wood_storage -= 1;
            state.wood_in_fire += 1.0;
        }
    }

    let cooldown_until = now.saturating_add(config.cooldown_for(action));
    state.cooldown_end.insert(user.clone(), cooldown_until);

    state.records.record_action(user, action);

    let chat_line = ChatMessage::new(user.clone(), action.flavor_text(), now);
    state.chat.append(chat_line.clone());

    Ok(ActionReceipt {
        user_id: user.clone(),
        action,
        cooldown_until,
        chat_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::chat::CHAT_CAPACITY;

    const NOW: Timestamp = 1_700_000_000_000;

    fn user(name: &str) -> UserId {
        UserId::parse(name).unwrap()
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!("grow".parse::<Action>(), Ok(Action::Grow));
        assert_eq!("chop".parse::<Action>(), Ok(Action::Chop));
        assert_eq!("fuel".parse::<Action>(), Ok(Action::Fuel));
        assert_eq!("Grow".parse::<Action>(), Err(RejectReason::UnknownAction));
        assert_eq!("dance".parse::<Action>(), Err(RejectReason::UnknownAction));
    }

    #[test]
    fn test_fuel_on_fresh_world() {
        let mut state = WorldState::new(NOW);
        let alice = user("alice");

        let receipt = apply_action(&mut state, &alice, Action::Fuel, NOW, &ActionConfig::default())
            .unwrap();

        assert_eq!(state.wood_storage, 99);
        assert_eq!(state.wood_in_fire, 1.0);
        assert_eq!(receipt.cooldown_until, NOW + 1_000);
        assert_eq!(state.cooldown_end_for("alice"), Some(NOW + 1_000));
        assert_eq!(state.chat.len(), 1);
        assert_eq!(state.chat.latest().unwrap().message, "threw a log on the fire");
        assert_eq!(state.chat.latest().unwrap().date, NOW);
        assert_eq!(state.records.actions.get("alice").fuel, 1);
    }

    #[test]
    fn test_grow_twice_hits_cooldown() {
        let mut state = WorldState::new(NOW);
        let config = ActionConfig::default();
        let bob = user("bob");

        apply_action(&mut state, &bob, Action::Grow, NOW, &config).unwrap();
        assert_eq!(state.trees, 11);

        let before = state.clone();
        let result = apply_action(&mut state, &bob, Action::Grow, NOW + 19_999, &config);
        assert_eq!(result, Err(RejectReason::CooldownActive));
        assert_eq!(state, before);
        assert_eq!(state.trees, 11);

        // Exactly at expiry the lock is lifted
        apply_action(&mut state, &bob, Action::Grow, NOW + 20_000, &config).unwrap();
        assert_eq!(state.trees, 12);
    }

    #[test]
    fn test_cooldown_is_per_user() {
        let mut state = WorldState::new(NOW);
        let config = ActionConfig::default();

        apply_action(&mut state, &user("a"), Action::Grow, NOW, &config).unwrap();
        apply_action(&mut state, &user("b"), Action::Grow, NOW, &config).unwrap();
        assert_eq!(state.trees, 12);
    }

    #[test]
    fn test_cooldown_blocks_every_action() {
        let mut state = WorldState::new(NOW);
        let config = ActionConfig::default();
        let carol = user("carol");
        apply_action(&mut state, &carol, Action::Grow, NOW, &config).unwrap();

        let before = state.clone();
        for action in Action::ALL {
            let result = apply_action(&mut state, &carol, action, NOW + 1, &config);
            assert_eq!(result, Err(RejectReason::CooldownActive));
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_chop_without_trees() {
        let mut state = WorldState::new(NOW);
        state.trees = 0;
        let before = state.clone();

        let result = apply_action(&mut state, &user("d"), Action::Chop, NOW, &ActionConfig::default());
        assert_eq!(result, Err(RejectReason::NoTrees));
        assert_eq!(state, before);
    }

    #[test]
    fn test_chop_yields_wood() {
        let mut state = WorldState::new(NOW);
        apply_action(&mut state, &user("e"), Action::Chop, NOW, &ActionConfig::default()).unwrap();

        assert_eq!(state.trees, 9);
        assert_eq!(state.wood_storage, 105);
        assert_eq!(state.cooldown_end_for("e"), Some(NOW + 5_000));
    }

    #[test]
    fn test_fuel_without_wood() {
        let mut state = WorldState::new(NOW);
        state.wood_storage = 0;
        let before = state.clone();

        let result = apply_action(&mut state, &user("f"), Action::Fuel, NOW, &ActionConfig::default());
        assert_eq!(result, Err(RejectReason::NoWood));
        assert_eq!(state, before);
    }

    #[test]
    fn test_unknown_action_even_under_cooldown() {
        let mut state = WorldState::new(NOW);
        let config = ActionConfig::default();
        let g = user("g");
        apply_action(&mut state, &g, Action::Grow, NOW, &config).unwrap();

        let before = state.clone();
        let result = resolve_action(&mut state, &g, "juggle", NOW + 1, &config);
        assert_eq!(result, Err(RejectReason::UnknownAction));
        assert_eq!(state, before);
    }

    #[test]
    fn test_action_chat_respects_capacity() {
        let mut state = WorldState::new(NOW);
        let config = ActionConfig::default();

        for i in 0..(CHAT_CAPACITY as i64 + 3) {
            let name = format!("player{}", i);
            apply_action(&mut state, &user(&name), Action::Fuel, NOW + i, &config).unwrap();
            assert!(state.chat.len() <= CHAT_CAPACITY);
        }
        assert_eq!(state.chat.messages()[0].user_id.as_str(), "player3");
    }

    #[test]
    fn test_outcome_wire_shape() {
        let ok = serde_json::to_value(ActionOutcome::accepted()).unwrap();
        assert_eq!(ok, serde_json::json!({ "success": true }));

        let rejected = serde_json::to_value(ActionOutcome::rejected(RejectReason::NoWood)).unwrap();
        assert_eq!(rejected, serde_json::json!({ "success": false, "reason": "No wood" }));
    }
}
