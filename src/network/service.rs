//! World Service
//!
//! Single owner of the snapshot store. Every operation holds one lock for
//! its whole load → mutate → save span, so concurrent callers can neither
//! lose each other's updates nor both slip through the tick debounce.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::core::hash::short_hex;
use crate::core::time::{Clock, SystemClock};
use crate::game::action::{apply_action, Action, ActionOutcome, RejectReason};
use crate::game::chat::{validate_chat, ChatError};
use crate::game::events::WorldEvent;
use crate::game::records::LeaderboardEntry;
use crate::game::state::{UserId, WorldState};
use crate::game::tick::{tick, TickOutcome};
use crate::game::GameConfig;
use crate::store::{SnapshotStore, StoreError};

/// Capacity of the world event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The world could not be saved.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Chat submission was rejected.
    #[error("Invalid chat message: {0}")]
    Chat(#[from] ChatError),

    /// User id was missing or blank.
    #[error("Missing userId")]
    InvalidUser,

    /// Action name did not parse.
    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

/// Shared world, serialized through one lock.
pub struct WorldService {
    /// Snapshot store. The lock is the single-writer discipline.
    store: Mutex<SnapshotStore>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// World rules.
    config: GameConfig,
    /// Event broadcast channel.
    event_tx: broadcast::Sender<WorldEvent>,
}

impl WorldService {
    /// Create a service over `store` with an explicit clock.
    pub fn new(store: SnapshotStore, clock: Arc<dyn Clock>, config: GameConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store: Mutex::new(store),
            clock,
            config,
            event_tx,
        }
    }

    /// Create a service that reads the system clock.
    pub fn with_system_clock(store: SnapshotStore, config: GameConfig) -> Self {
        Self::new(store, Arc::new(SystemClock), config)
    }

    /// World rules in effect.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Receive every event committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.event_tx.subscribe()
    }

    /// Current world.
    pub async fn get_state(&self) -> WorldState {
        let store = self.store.lock().await;
        store.load(self.clock.now())
    }

    /// Apply a named action for a user.
    ///
    /// Rule violations come back as `success: false`; only a blank user id
    /// or a failed save are errors. Rejections are never persisted.
    pub async fn perform_action(
        &self,
        user_id: &str,
        action: &str,
    ) -> Result<ActionOutcome, ServiceError> {
        let user = UserId::parse(user_id).ok_or(ServiceError::InvalidUser)?;
        let action: Action = match action.parse() {
            Ok(action) => action,
            Err(reason) => {
                debug!("Rejected action {:?} from {}: {}", action, user, reason);
                return Ok(ActionOutcome::rejected(reason));
            }
        };

        let store = self.store.lock().await;
        let now = self.clock.now();
        let mut state = store.load(now);

        let receipt = match apply_action(&mut state, &user, action, now, &self.config.action) {
            Ok(receipt) => receipt,
            Err(RejectReason::CooldownActive) => {
                debug!(
                    "Rejected {} from {}: cooldown, {} ms left",
                    action,
                    user,
                    state.cooldown_remaining(user.as_str(), now)
                );
                return Ok(ActionOutcome::rejected(RejectReason::CooldownActive));
            }
            Err(reason) => {
                debug!("Rejected {} from {}: {}", action, user, reason);
                return Ok(ActionOutcome::rejected(reason));
            }
        };

        self.persist(&store, &state)?;
        drop(store);

        info!("{} performed {} (locked until {})", user, action, receipt.cooldown_until);
        self.publish(WorldEvent::action_performed(&receipt));

        Ok(ActionOutcome::accepted())
    }

    /// Post a chat message.
    pub async fn add_chat_message(&self, user_id: &str, message: &str) -> Result<(), ServiceError> {
        let draft = validate_chat(user_id, message)?;

        let store = self.store.lock().await;
        let now = self.clock.now();
        let mut state = store.load(now);

        let line = draft.stamp(now);
        state.chat.append(line.clone());

        self.persist(&store, &state)?;
        drop(store);

        debug!("Chat from {}", line.user_id);
        self.publish(WorldEvent::ChatPosted { message: line });

        Ok(())
    }

    /// Advance the fire one step if the debounce window has passed.
    pub async fn advance_tick(&self) -> Result<TickOutcome, ServiceError> {
        let store = self.store.lock().await;
        let now = self.clock.now();
        let mut state = store.load(now);

        let outcome = tick(&mut state, now, &self.config.tick);
        if !outcome.advanced() {
            return Ok(outcome);
        }

        self.persist(&store, &state)?;
        drop(store);

        for event in WorldEvent::from_tick(&state, &outcome) {
            if let WorldEvent::RecordBroken { record, value } = &event {
                info!("New record {:?}: {:.2}", record, value);
            }
            self.publish(event);
        }

        Ok(outcome)
    }

    /// Ranking for one action kind.
    pub async fn leaderboard(&self, action: &str) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let action: Action = action
            .parse()
            .map_err(|_| ServiceError::UnknownAction(action.to_string()))?;
        let state = self.get_state().await;
        Ok(state.records.leaderboard(action))
    }

    fn persist(&self, store: &SnapshotStore, state: &WorldState) -> Result<(), ServiceError> {
        match store.save(state) {
            Ok(report) => {
                debug!(
                    "World {} saved ({} bytes, file {})",
                    short_hex(&state.compute_hash()),
                    report.bytes,
                    short_hex(&report.hash)
                );
                Ok(())
            }
            Err(err) => {
                warn!("World save failed, update dropped: {}", err);
                Err(err.into())
            }
        }
    }

    fn publish(&self, event: WorldEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
