//! Records and Leaderboards
//!
//! Global high scores for the fire plus per-user action counters.
//! Leaderboards are computed on demand and never stored.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::hash::StateHasher;
use crate::game::action::Action;
use crate::game::state::UserId;

// =============================================================================
// ACTION COUNTS
// =============================================================================

/// How many times one user performed each action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionCounts {
    /// Trees planted
    pub grow: u32,
    /// Trees chopped
    pub chop: u32,
    /// Logs added to the fire
    pub fuel: u32,
}

impl ActionCounts {
    /// Count for one action kind.
    #[inline]
    pub fn get(&self, action: Action) -> u32 {
        match action {
            Action::Grow => self.grow,
            Action::Chop => self.chop,
            Action::Fuel => self.fuel,
        }
    }

    /// Bump the counter for one action kind.
    pub fn increment(&mut self, action: Action) {
        let slot = match action {
            Action::Grow => &mut self.grow,
            Action::Chop => &mut self.chop,
            Action::Fuel => &mut self.fuel,
        };
        *slot = slot.saturating_add(1);
    }
}

// =============================================================================
// ACTION LEDGER
// =============================================================================

/// Per-user counters in order of each user's first appearance.
///
/// Serialized as a JSON object whose key order is the appearance order,
/// so leaderboard tie-breaks survive a save/load cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionLedger {
    entries: Vec<(UserId, ActionCounts)>,
}

impl ActionLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for a user. Absent users read as all zeros.
    pub fn get(&self, user: &str) -> ActionCounts {
        self.entries
            .iter()
            .find(|(id, _)| id.as_str() == user)
            .map(|(_, counts)| *counts)
            .unwrap_or_default()
    }

    /// Mutable counters for a user, appending a zeroed entry on first sight.
    pub fn entry_mut(&mut self, user: &UserId) -> &mut ActionCounts {
        let index = match self.entries.iter().position(|(id, _)| id == user) {
            Some(index) => index,
            None => {
                self.entries.push((user.clone(), ActionCounts::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Iterate in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &ActionCounts)> {
        self.entries.iter().map(|(id, counts)| (id, counts))
    }

    /// Number of users tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No users tracked yet?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ActionLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, counts) in &self.entries {
            map.serialize_entry(id, counts)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ActionLedger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LedgerVisitor;

        impl<'de> Visitor<'de> for LedgerVisitor {
            type Value = ActionLedger;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of user id to action counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut ledger = ActionLedger::new();
                while let Some((id, counts)) = access.next_entry::<UserId, ActionCounts>()? {
                    // Duplicate keys: last one wins, first position kept.
                    *ledger.entry_mut(&id) = counts;
                }
                Ok(ledger)
            }
        }

        deserializer.deserialize_map(LedgerVisitor)
    }
}

// =============================================================================
// RECORDS BLOCK
// =============================================================================

/// Which global records a tick broke.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordBreak {
    /// New longest-burning fire
    pub longest: bool,
    /// New biggest fire
    pub biggest: bool,
}

impl RecordBreak {
    /// Did anything change?
    pub fn any(self) -> bool {
        self.longest || self.biggest
    }
}

/// A leaderboard row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Player
    pub user_id: UserId,
    /// Count for the ranked action
    pub count: u32,
}

/// Global maxima and per-user counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordsBlock {
    /// Longest continuous burn, in ticks
    pub longest_fire: f64,
    /// Largest fire size ever reached
    pub biggest_fire: f64,
    /// Per-user action counters
    pub actions: ActionLedger,
}

impl RecordsBlock {
    /// Fold the current fire into the global maxima. Never lowers a record.
    pub fn observe_fire(&mut self, alive_time: f64, size: f64) -> RecordBreak {
        let mut broke = RecordBreak::default();
        if alive_time > self.longest_fire {
            self.longest_fire = alive_time;
            broke.longest = true;
        }
        if size > self.biggest_fire {
            self.biggest_fire = size;
            broke.biggest = true;
        }
        broke
    }

    /// Count one successful action.
    pub fn record_action(&mut self, user: &UserId, action: Action) {
        self.actions.entry_mut(user).increment(action);
    }

    /// Users ranked by count for `action`, highest first.
    ///
    /// Ties keep first-appearance order.
    pub fn leaderboard(&self, action: Action) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<LeaderboardEntry> = self
            .actions
            .iter()
            .map(|(user_id, counts)| LeaderboardEntry {
                user_id: user_id.clone(),
                count: counts.get(action),
            })
            .collect();
        // sort_by is stable
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows
    }

    /// Hash into a world hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_f64(self.longest_fire);
        hasher.update_f64(self.biggest_fire);
        hasher.update_u64(self.actions.len() as u64);
        for (id, counts) in self.actions.iter() {
            hasher.update_str(id.as_str());
            hasher.update_u32(counts.grow);
            hasher.update_u32(counts.chop);
            hasher.update_u32(counts.fuel);
        }
    }
}
