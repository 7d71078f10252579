//! Simulation Tick
//!
//! Advances the fire by one fixed step when enough real time has passed.
//!
//! Each step is a forward-Euler update of two coupled quantities:
//! the fire eats wood in proportion to its own size, then relaxes toward
//! half of the wood left, damped by `growth_damping`. Running out of wood
//! puts the fire out at once and resets its alive time.

use crate::core::time::Timestamp;
use crate::game::records::RecordBreak;
use crate::game::state::WorldState;

/// Configuration for the fire simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct TickConfig {
    /// Minimum real time between two steps
    pub debounce_ms: i64,
    /// Step size in simulation units
    pub delta: f64,
    /// Wood consumed per unit of fire size per step
    pub consume_rate: f64,
    /// Share of remaining wood the fire grows toward
    pub target_ratio: f64,
    /// Divisor slowing growth toward the target
    pub growth_damping: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 900,
            delta: 1.0,
            consume_rate: 0.1,
            target_ratio: 0.5,
            growth_damping: 50.0,
        }
    }
}

/// Result of a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// Called too soon after the previous step; nothing changed
    Debounced {
        /// Milliseconds since the last step (negative if the clock went back)
        elapsed_ms: i64,
    },
    /// One step was applied
    Advanced {
        /// The fire went out (or stayed out) this step
        extinguished: bool,
        /// Global records broken this step
        records: RecordBreak,
    },
}

impl TickOutcome {
    /// Did the world change?
    pub fn advanced(&self) -> bool {
        matches!(self, TickOutcome::Advanced { .. })
    }
}

/// Run one simulation tick at `now`.
///
/// The step size is always `config.delta`, regardless of how long it has
/// been since the last step. A clock that moved backwards counts as "too
/// soon", so `last_update` never decreases.
pub fn tick(state: &mut WorldState, now: Timestamp, config: &TickConfig) -> TickOutcome {
    let elapsed_ms = now.saturating_sub(state.last_update);
    if elapsed_ms < config.debounce_ms {
        return TickOutcome::Debounced { elapsed_ms };
    }

    let extinguished = step_fire(state, config);
    let records = state
        .records
        .observe_fire(state.fire_alive_time, state.fire_size);

    state.last_update = now;

    TickOutcome::Advanced {
        extinguished,
        records,
    }
}

/// Apply one Euler step to the fire. Returns true if the fire is out.
fn step_fire(state: &mut WorldState, config: &TickConfig) -> bool {
    let delta = config.delta;

    if state.wood_in_fire > 0.0 {
        // 1. Burn wood proportional to fire size
        let consume = state.fire_size * config.consume_rate * delta;
        state.wood_in_fire = (state.wood_in_fire - consume).max(0.0);

        // 2. Grow toward a share of what is left
        let target = state.wood_in_fire * config.target_ratio;
        let growth = (target - state.fire_size) / config.growth_damping * delta;
        state.fire_size = (state.fire_size + growth).max(0.0);

        // 3. Keep the clock running while lit
        if state.is_burning() {
            state.fire_alive_time += delta;
        }
        false
    } else {
        state.fire_size = 0.0;
        state.fire_alive_time = 0.0;
        true
    }
}

/// Run `count` steps spaced exactly one debounce window apart.
///
/// Returns the final timestamp used.
#[cfg(test)]
pub(crate) fn simulate(
    state: &mut WorldState,
    start: Timestamp,
    count: u32,
    config: &TickConfig,
) -> Timestamp {
    let mut now = start;
    for _ in 0..count {
        now = now.saturating_add(config.debounce_ms);
        tick(state, now, config);
    }
    now
}
