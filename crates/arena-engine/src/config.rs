//! Authority-side rule tuning.
//!
//! These values only change what the authority decides to dispatch and when.
//! Quantities the reducer applies (damage, pack sizes, weapon stats) are
//! constants in [`factory`](crate::factory) and [`reducer`](crate::reducer),
//! so a mirror never needs this configuration to reach the same state.

use serde::{Deserialize, Serialize};

use crate::reducer::{JOIN_SPAWN_DELAY, RESPAWN_DELAY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Seconds between `PLAYER_JOIN` and the player's first spawn.
    pub join_spawn_delay: f32,
    /// Seconds between `KILL_PLAYER` and the respawn.
    pub respawn_delay: f32,
    /// Seconds before an unexpired projectile is removed.
    pub bullet_lifetime: f32,
    /// Seconds before a collected pickup reappears.
    pub pickup_respawn_delay: f32,
    /// Maximum per-axis velocity jitter added to each shot.
    pub max_spread: f32,
    /// Ticks between `SYNC_ALL_PLAYERS` broadcasts; 0 disables resync.
    pub resync_interval_ticks: u64,
    /// Ticks between state-hash checkpoints in the action log; 0 disables them.
    pub checkpoint_interval_ticks: u64,
    /// Seed for the authority's random draws.
    pub seed: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            join_spawn_delay: JOIN_SPAWN_DELAY,
            respawn_delay: RESPAWN_DELAY,
            bullet_lifetime: 2.0,
            pickup_respawn_delay: 15.0,
            max_spread: 0.6,
            resync_interval_ticks: 300,
            checkpoint_interval_ticks: 60,
            seed: 0x5eed,
        }
    }
}
