//! # Bonfire World Server
//!
//! A shared campfire that every player tends together: plant trees, chop
//! them into logs, feed the fire, and watch it burn for as long as the
//! group can keep it alive. The world is durably stored between requests.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BONFIRE SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── time.rs     - Millisecond timestamps, clock seam        │
//! │  └── hash.rs     - SHA-256 state digests                     │
//! │                                                              │
//! │  game/           - World rules (pure, no I/O)                │
//! │  ├── state.rs    - World state, user ids, fire stages        │
//! │  ├── action.rs   - Grow / chop / fuel with cooldowns         │
//! │  ├── tick.rs     - Fixed-step fire simulation                │
//! │  ├── chat.rs     - Bounded chat log                          │
//! │  ├── records.rs  - High scores and leaderboards              │
//! │  └── events.rs   - Committed-change events                   │
//! │                                                              │
//! │  store/          - Persistence                               │
//! │  └── snapshot.rs - Snapshot file with .new / .backup         │
//! │                                                              │
//! │  network/        - Collaborator surface                      │
//! │  ├── service.rs  - Single-writer world service               │
//! │  ├── protocol.rs - Message types                             │
//! │  └── server.rs   - WebSocket server and tick loop            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! Every operation runs load → mutate → save under one lock held by
//! [`network::WorldService`]. Concurrent players cannot overwrite each
//! other's changes, and two tick requests cannot both pass the 900 ms
//! debounce for the same step.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod store;
pub mod network;

// Re-export commonly used types
pub use core::time::{Clock, ManualClock, SystemClock, Timestamp};
pub use game::{Action, ActionOutcome, GameConfig, WorldState, UserId, WorldEvent};
pub use store::{SnapshotStore, StoreError};
pub use network::{WorldService, ServiceError, BonfireServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
