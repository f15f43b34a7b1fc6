//! Action log with state-hash checkpoints, and deterministic replay.
//!
//! The authority records every action it dispatches, in dispatch order, with
//! the tick it happened on. Every `checkpoint_interval` ticks it also records
//! the BLAKE3 [`state_hash`](GameState::state_hash) together with the number
//! of actions applied so far. [`replay`] re-applies the log to a fresh state
//! and compares hashes at each checkpoint; because the reducer is pure, any
//! mismatch means the log or the reducer changed.
//!
//! ```
//! use arena_engine::prelude::*;
//!
//! let map = TileMap::default_arena();
//! let mut log = ActionLog::new(1);
//! let mut state = GameState::new();
//! for (tick, action) in [Action::init_game(), Action::player_join("p1", "ann")]
//!     .into_iter()
//!     .enumerate()
//! {
//!     state = reduce(state, &action, &map);
//!     log.record(tick as u64, &action);
//!     log.checkpoint(tick as u64 + 1, &state);
//! }
//!
//! let report = replay(&log, &map).unwrap();
//! assert!(report.first_divergence.is_none());
//! assert_eq!(report.final_hash, state.state_hash());
//! ```

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::map::TileMap;
use crate::reducer;
use crate::state::GameState;

// ---------------------------------------------------------------------------
// Log types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub tick: u64,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub tick: u64,
    /// Number of log entries applied when the hash was taken.
    pub applied: usize,
    pub state_hash: String,
}

/// Everything dispatched by one authority, starting from an empty state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionLog {
    entries: Vec<LogEntry>,
    checkpoints: Vec<Checkpoint>,
    checkpoint_interval: u64,
    #[serde(skip)]
    disabled: bool,
}

impl ActionLog {
    /// A recording log. `checkpoint_interval` 0 disables checkpoints.
    pub fn new(checkpoint_interval: u64) -> Self {
        Self {
            checkpoint_interval,
            ..Self::default()
        }
    }

    /// A log that ignores everything it is given.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn is_recording(&self) -> bool {
        !self.disabled
    }

    pub fn record(&mut self, tick: u64, action: &Action) {
        if self.disabled {
            return;
        }
        self.entries.push(LogEntry {
            tick,
            action: action.clone(),
        });
    }

    /// Record a checkpoint if `tick` falls on the interval.
    pub fn checkpoint(&mut self, tick: u64, state: &GameState) {
        if self.disabled || self.checkpoint_interval == 0 || tick % self.checkpoint_interval != 0 {
            return;
        }
        self.checkpoints.push(Checkpoint {
            tick,
            applied: self.entries.len(),
            state_hash: state.state_hash(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("checkpoint at tick {tick} claims {applied} applied actions but the log has {len}")]
    CheckpointPastEnd { tick: u64, applied: usize, len: usize },

    #[error("checkpoints out of order at tick {tick}")]
    CheckpointOrder { tick: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub tick: u64,
    pub applied: usize,
    pub expected_hash: String,
    pub actual_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Whether every entry was applied. False when replay stopped at a
    /// divergence.
    pub completed: bool,
    pub actions_replayed: usize,
    pub first_divergence: Option<ReplayDivergence>,
    /// Hash of the state where replay stopped.
    pub final_hash: String,
}

/// Re-apply `log` to an empty state, checking every checkpoint.
///
/// # Errors
///
/// Returns an error, without replaying anything, if the checkpoints are not
/// consistent with the entries.
pub fn replay(log: &ActionLog, map: &TileMap) -> Result<ReplayReport, ReplayError> {
    let mut previous = 0;
    for cp in &log.checkpoints {
        if cp.applied > log.entries.len() {
            return Err(ReplayError::CheckpointPastEnd {
                tick: cp.tick,
                applied: cp.applied,
                len: log.entries.len(),
            });
        }
        if cp.applied < previous {
            return Err(ReplayError::CheckpointOrder { tick: cp.tick });
        }
        previous = cp.applied;
    }

    let mut state = GameState::new();
    let mut checkpoints = log.checkpoints.iter().peekable();
    let mut applied = 0;

    loop {
        while let Some(cp) = checkpoints.next_if(|cp| cp.applied == applied) {
            let actual_hash = state.state_hash();
            if actual_hash != cp.state_hash {
                return Ok(ReplayReport {
                    completed: false,
                    actions_replayed: applied,
                    first_divergence: Some(ReplayDivergence {
                        tick: cp.tick,
                        applied,
                        expected_hash: cp.state_hash.clone(),
                        actual_hash: actual_hash.clone(),
                    }),
                    final_hash: actual_hash,
                });
            }
        }
        let Some(entry) = log.entries.get(applied) else {
            break;
        };
        reducer::apply(&mut state, &entry.action, map);
        applied += 1;
    }

    Ok(ReplayReport {
        completed: true,
        actions_replayed: applied,
        first_divergence: None,
        final_hash: state.state_hash(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
