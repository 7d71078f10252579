//! Core primitives.
//!
//! Time and hashing helpers shared by the game, store and network layers.

pub mod time;
pub mod hash;

// Re-export core types
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use hash::{StateHash, StateHasher, hash_bytes};
