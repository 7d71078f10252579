//! World State Definitions
//!
//! The single persisted aggregate shared by every player.
//! Uses BTreeMap for deterministic iteration and serialization order.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, StateHasher};
use crate::core::time::Timestamp;
use crate::game::chat::ChatLog;
use crate::game::records::RecordsBlock;

/// Trees in a freshly created world.
pub const INITIAL_TREES: u32 = 10;

/// Logs in storage in a freshly created world.
pub const INITIAL_WOOD_STORAGE: u32 = 100;

// =============================================================================
// USER ID
// =============================================================================

/// Free-form user identifier supplied by the surrounding application.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validate a raw identifier. Blank strings are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// FIRE STAGE
// =============================================================================

/// Visual size class of the fire, derived from `fire_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FireStage {
    /// No fire at all
    Dead = 0,
    /// (0, 2]
    Embers = 1,
    /// (2, 4]
    Small = 2,
    /// (4, 6]
    Medium = 3,
    /// (6, 10]
    Large = 4,
    /// Above 10
    Roaring = 5,
}

impl FireStage {
    /// Classify a fire size.
    pub fn from_size(size: f64) -> Self {
        if size > 10.0 {
            FireStage::Roaring
        } else if size > 6.0 {
            FireStage::Large
        } else if size > 4.0 {
            FireStage::Medium
        } else if size > 2.0 {
            FireStage::Small
        } else if size > 0.0 {
            FireStage::Embers
        } else {
            FireStage::Dead
        }
    }
}

// =============================================================================
// WORLD STATE
// =============================================================================

/// The complete shared world.
///
/// Field names serialize in camelCase to match the on-disk document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    /// Standing trees available to chop
    pub trees: u32,

    /// Chopped logs waiting to be burned
    pub wood_storage: u32,

    /// Wood currently burning (fractional as the fire eats it)
    pub wood_in_fire: f64,

    /// Simulated magnitude of the fire
    pub fire_size: f64,

    /// Ticks the fire has been alight since it last went out
    #[serde(default)]
    pub fire_alive_time: f64,

    /// Last time the simulation clock advanced
    pub last_update: Timestamp,

    /// Per-user action lockout expiry. Absent means unlocked.
    #[serde(default)]
    pub cooldown_end: BTreeMap<UserId, Timestamp>,

    /// Recent chat, oldest first
    #[serde(default)]
    pub chat: ChatLog,

    /// High scores and per-user action counters
    #[serde(default)]
    pub records: RecordsBlock,
}

impl WorldState {
    /// Create a fresh world whose clock starts at `now`.
    pub fn new(now: Timestamp) -> Self {
        Self {
            trees: INITIAL_TREES,
            wood_storage: INITIAL_WOOD_STORAGE,
            wood_in_fire: 0.0,
            fire_size: 0.0,
            fire_alive_time: 0.0,
            last_update: now,
            cooldown_end: BTreeMap::new(),
            chat: ChatLog::new(),
            records: RecordsBlock::default(),
        }
    }

    /// Lockout expiry for a user, if one was ever set.
    pub fn cooldown_end_for(&self, user: &str) -> Option<Timestamp> {
        self.cooldown_end.get(user).copied()
    }

    /// Is this user still locked out at `now`?
    #[inline]
    pub fn is_locked(&self, user: &str, now: Timestamp) -> bool {
        self.cooldown_end_for(user).is_some_and(|end| now < end)
    }

    /// Milliseconds until the user may act again (0 when unlocked).
    pub fn cooldown_remaining(&self, user: &str, now: Timestamp) -> i64 {
        self.cooldown_end_for(user)
            .map(|end| end.saturating_sub(now).max(0))
            .unwrap_or(0)
    }

    /// Is the fire currently burning?
    #[inline]
    pub fn is_burning(&self) -> bool {
        self.fire_size > 0.0
    }

    /// Size class of the fire.
    pub fn fire_stage(&self) -> FireStage {
        FireStage::from_size(self.fire_size)
    }

    /// Hash the complete world for change detection.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_world_state();
        hasher.update_u32(self.trees);
        hasher.update_u32(self.wood_storage);
        hasher.update_f64(self.wood_in_fire);
        hasher.update_f64(self.fire_size);
        hasher.update_f64(self.fire_alive_time);
        hasher.update_i64(self.last_update);

        // BTreeMap iterates in sorted order
        hasher.update_u64(self.cooldown_end.len() as u64);
        for (user, end) in &self.cooldown_end {
            hasher.update_str(user.as_str());
            hasher.update_i64(*end);
        }

        self.chat.hash_into(&mut hasher);
        self.records.hash_into(&mut hasher);

        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_world_defaults() {
        let state = WorldState::new(1_000);
        assert_eq!(state.trees, 10);
        assert_eq!(state.wood_storage, 100);
        assert_eq!(state.wood_in_fire, 0.0);
        assert_eq!(state.fire_size, 0.0);
        assert_eq!(state.fire_alive_time, 0.0);
        assert_eq!(state.last_update, 1_000);
        assert!(state.cooldown_end.is_empty());
        assert!(state.chat.is_empty());
        assert_eq!(state.fire_stage(), FireStage::Dead);
    }

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::parse("").is_none());
        assert!(UserId::parse("   ").is_none());
        assert_eq!(UserId::parse("BraveGoat42").unwrap().as_str(), "BraveGoat42");
    }

    #[test]
    fn test_missing_cooldown_means_unlocked() {
        let state = WorldState::new(0);
        assert!(!state.is_locked("nobody", 0));
        assert_eq!(state.cooldown_remaining("nobody", 0), 0);
    }

    #[test]
    fn test_cooldown_remaining() {
        let mut state = WorldState::new(0);
        state.cooldown_end.insert(UserId::parse("alice").unwrap(), 5_000);

        assert!(state.is_locked("alice", 4_999));
        assert!(!state.is_locked("alice", 5_000));
        assert_eq!(state.cooldown_remaining("alice", 3_000), 2_000);
        assert_eq!(state.cooldown_remaining("alice", 9_000), 0);
    }

    #[test]
    fn test_fire_stage_thresholds() {
        assert_eq!(FireStage::from_size(0.0), FireStage::Dead);
        assert_eq!(FireStage::from_size(0.01), FireStage::Embers);
        assert_eq!(FireStage::from_size(2.0), FireStage::Embers);
        assert_eq!(FireStage::from_size(3.0), FireStage::Small);
        assert_eq!(FireStage::from_size(5.0), FireStage::Medium);
        assert_eq!(FireStage::from_size(10.0), FireStage::Large);
        assert_eq!(FireStage::from_size(10.5), FireStage::Roaring);
    }

    #[test]
    fn test_camel_case_document() {
        let state = WorldState::new(42);
        let json = serde_json::to_value(&state).unwrap();

        for key in [
            "trees", "woodStorage", "woodInFire", "fireSize", "fireAliveTime",
            "lastUpdate", "cooldownEnd", "chat", "records",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
    }

    #[test]
    fn test_old_snapshot_without_records_loads() {
        let json = r#"{
            "trees": 3,
            "woodStorage": 7,
            "woodInFire": 1.5,
            "fireSize": 0.25,
            "lastUpdate": 1000
        }"#;
        let state: WorldState = serde_json::from_str(json).unwrap();

        assert_eq!(state.trees, 3);
        assert_eq!(state.fire_alive_time, 0.0);
        assert!(state.records.actions.is_empty());
        assert!(state.chat.is_empty());
    }

    #[test]
    fn test_hash_changes_with_state() {
        let a = WorldState::new(0);
        let mut b = a.clone();
        assert_eq!(a.compute_hash(), b.compute_hash());

        b.trees += 1;
        assert_ne!(a.compute_hash(), b.compute_hash());
    }
}
