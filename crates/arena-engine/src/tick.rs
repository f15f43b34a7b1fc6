//! Fixed-timestep tick loop for the authoritative simulation.
//!
//! The [`TickLoop`] never touches game state itself. Each tick it:
//!
//! 1. Releases every scheduled action whose tick has come, in the order they
//!    were scheduled.
//! 2. Runs all registered systems in declaration order. Each system reads a
//!    [`Frame`] (state, rules, tick, dt) and queues actions into an
//!    [`ActionBuffer`]; deferred actions go into the schedule.
//! 3. Advances the tick counter.
//!
//! The returned actions are handed to the authority, which dispatches them one
//! by one through the same path as client actions. Given the same state, the
//! same systems and the same schedule, a tick yields the same actions.
//!
//! # Example
//!
//! ```
//! use arena_engine::prelude::*;
//!
//! let mut tick_loop = TickLoop::new(TickConfig::default());
//! tick_loop.add_system("noop", |_frame, _out| {});
//!
//! let state = GameState::new();
//! let rules = RulesConfig::default();
//! for _ in 0..10 {
//!     assert!(tick_loop.tick(&state, &rules).is_empty());
//! }
//! assert_eq!(tick_loop.tick_count(), 10);
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::config::RulesConfig;
use crate::state::GameState;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Ticks per second. Must be positive.
    pub tick_rate_hz: u32,
    /// Headless mode: tick as fast as possible instead of on a timer.
    pub headless: bool,
}

impl Default for TickConfig {
    /// 60 Hz, real-time.
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            headless: false,
        }
    }
}

impl TickConfig {
    /// Seconds per tick.
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate_hz as f32
    }

    /// Wall-clock period of one tick.
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system, in execution order.
    pub system_times: Vec<(String, Duration)>,
    pub total_time: Duration,
    /// Actions released from the schedule.
    pub released: usize,
    /// Actions emitted by systems.
    pub emitted: usize,
}

// ---------------------------------------------------------------------------
// Frame / ActionBuffer
// ---------------------------------------------------------------------------

/// Read-only view handed to systems.
pub struct Frame<'a> {
    pub state: &'a GameState,
    pub rules: &'a RulesConfig,
    /// Index of the tick being run, starting at 0.
    pub tick: u64,
    /// Seconds per tick.
    pub dt: f32,
}

impl Frame<'_> {
    /// Whole ticks covering `seconds`, at least one.
    pub fn ticks_for(&self, seconds: f32) -> u64 {
        ticks_for(seconds, self.dt)
    }
}

/// Whole ticks covering `seconds` at `dt` seconds per tick, at least one.
pub fn ticks_for(seconds: f32, dt: f32) -> u64 {
    // Tolerate f32 rounding so that exact multiples do not gain a tick.
    let ticks = (seconds / dt - 1e-3).ceil();
    if ticks.is_finite() && ticks >= 1.0 {
        ticks as u64
    } else {
        1
    }
}

/// FIFO of actions produced by systems and reactions.
#[derive(Debug, Default)]
pub struct ActionBuffer {
    now: Vec<Action>,
    later: Vec<(u64, Action)>,
}

impl ActionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action for this tick.
    pub fn push(&mut self, action: Action) {
        self.now.push(action);
    }

    /// Queue an action `ticks` ticks from now (0 is treated as 1).
    pub fn push_after(&mut self, ticks: u64, action: Action) {
        self.later.push((ticks.max(1), action));
    }

    pub fn is_empty(&self) -> bool {
        self.now.is_empty() && self.later.is_empty()
    }

    /// Split into immediate and deferred actions.
    pub fn into_parts(self) -> (Vec<Action>, Vec<(u64, Action)>) {
        (self.now, self.later)
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Actions waiting for a future tick.
#[derive(Debug, Default)]
pub struct Schedule {
    due: BTreeMap<u64, Vec<Action>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tick: u64, action: Action) {
        self.due.entry(tick).or_default().push(action);
    }

    /// Remove and return everything due at or before `tick`.
    pub fn take_due(&mut self, tick: u64) -> Vec<Action> {
        let later = self.due.split_off(&(tick + 1));
        let due = std::mem::replace(&mut self.due, later);
        due.into_values().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.due.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }

    pub fn clear(&mut self) {
        self.due.clear();
    }
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// A system reads the frame and queues actions. It never mutates state.
pub type SystemFn = fn(&Frame<'_>, &mut ActionBuffer);

#[derive(Debug)]
struct RegisteredSystem {
    name: String,
    func: SystemFn,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

pub struct TickLoop {
    systems: Vec<RegisteredSystem>,
    schedule: Schedule,
    tick_counter: u64,
    config: TickConfig,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// # Panics
    ///
    /// Panics if `config.tick_rate_hz` is 0.
    pub fn new(config: TickConfig) -> Self {
        assert!(
            config.tick_rate_hz > 0,
            "tick_rate_hz must be positive, got {}",
            config.tick_rate_hz
        );
        Self {
            systems: Vec::new(),
            schedule: Schedule::new(),
            tick_counter: 0,
            config,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Register a system to run each tick, after those already registered.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn) {
        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );
        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            func,
        });
    }

    /// Schedule `action` for `delay` ticks after the current one.
    pub fn schedule_after(&mut self, delay: u64, action: Action) {
        self.schedule
            .insert(self.tick_counter + delay.max(1), action);
    }

    /// Drop every pending scheduled action.
    pub fn clear_schedule(&mut self) {
        self.schedule.clear();
    }

    /// Run one tick against `state` and return the actions to dispatch:
    /// released scheduled actions first, then system output.
    pub fn tick(&mut self, state: &GameState, rules: &RulesConfig) -> Vec<Action> {
        let tick_start = Instant::now();
        let mut actions = self.schedule.take_due(self.tick_counter);
        let released = actions.len();

        let frame = Frame {
            state,
            rules,
            tick: self.tick_counter,
            dt: self.config.fixed_dt(),
        };
        let mut system_times = Vec::with_capacity(self.systems.len());
        let mut buffer = ActionBuffer::new();
        for system in &self.systems {
            let sys_start = Instant::now();
            (system.func)(&frame, &mut buffer);
            system_times.push((system.name.clone(), sys_start.elapsed()));
        }
        let (now, later) = buffer.into_parts();
        let emitted = now.len();
        actions.extend(now);
        for (delay, action) in later {
            self.schedule.insert(self.tick_counter + delay, action);
        }

        self.tick_counter += 1;
        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
            released,
            emitted,
        };
        actions
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulated seconds, computed from the tick count to avoid drift.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 / f64::from(self.config.tick_rate_hz)
    }

    pub fn fixed_dt(&self) -> f32 {
        self.config.fixed_dt()
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn pending(&self) -> usize {
        self.schedule.len()
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    pub fn is_headless(&self) -> bool {
        self.config.headless
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameState {
        GameState::new()
    }

    fn leave_a(_frame: &Frame<'_>, out: &mut ActionBuffer) {
        out.push(Action::player_leave("a"));
    }

    fn leave_b(_frame: &Frame<'_>, out: &mut ActionBuffer) {
        out.push(Action::player_leave("b"));
    }

    fn defer_c(_frame: &Frame<'_>, out: &mut ActionBuffer) {
        out.push_after(2, Action::player_leave("c"));
    }

    #[test]
    fn default_config_is_60hz() {
        let config = TickConfig::default();
        assert!((config.fixed_dt() - 1.0 / 60.0).abs() < f32::EPSILON);
        assert_eq!(config.period(), Duration::from_secs(1) / 60);
    }

    #[test]
    #[should_panic(expected = "tick_rate_hz must be positive")]
    fn zero_rate_panics() {
        let _ = TickLoop::new(TickConfig {
            tick_rate_hz: 0,
            ..Default::default()
        });
    }

    #[test]
    #[should_panic(expected = "duplicate system name")]
    fn duplicate_system_name_panics() {
        let mut tl = TickLoop::new(TickConfig::default());
        tl.add_system("a", leave_a);
        tl.add_system("a", leave_b);
    }

    #[test]
    fn systems_emit_in_registration_order() {
        let mut tl = TickLoop::new(TickConfig::default());
        tl.add_system("a", leave_a);
        tl.add_system("b", leave_b);
        let out = tl.tick(&state(), &RulesConfig::default());
        assert_eq!(out, vec![Action::player_leave("a"), Action::player_leave("b")]);
        assert_eq!(tl.system_names(), vec!["a", "b"]);
        assert_eq!(tl.last_diagnostics().emitted, 2);
    }

    #[test]
    fn deferred_actions_release_on_their_tick() {
        let mut tl = TickLoop::new(TickConfig::default());
        tl.add_system("defer", defer_c);
        let rules = RulesConfig::default();
        // Scheduled at tick 0 for tick 2.
        assert!(tl.tick(&state(), &rules).is_empty());
        assert!(tl.tick(&state(), &rules).is_empty());
        let third = tl.tick(&state(), &rules);
        assert_eq!(third, vec![Action::player_leave("c")]);
        assert_eq!(tl.last_diagnostics().released, 1);
    }

    #[test]
    fn schedule_after_and_clear() {
        let mut tl = TickLoop::new(TickConfig::default());
        tl.schedule_after(1, Action::player_leave("x"));
        tl.schedule_after(5, Action::player_leave("y"));
        assert_eq!(tl.pending(), 2);
        let rules = RulesConfig::default();
        assert!(tl.tick(&state(), &rules).is_empty());
        assert_eq!(tl.tick(&state(), &rules), vec![Action::player_leave("x")]);
        tl.clear_schedule();
        assert_eq!(tl.pending(), 0);
    }

    #[test]
    fn take_due_keeps_future_entries() {
        let mut s = Schedule::new();
        s.insert(3, Action::player_leave("late"));
        s.insert(1, Action::player_leave("early"));
        assert_eq!(s.take_due(2), vec![Action::player_leave("early")]);
        assert_eq!(s.len(), 1);
        assert!(s.take_due(2).is_empty());
        assert_eq!(s.take_due(3).len(), 1);
        assert!(s.is_empty());
    }

    #[test]
    fn ticks_for_rounds_up() {
        assert_eq!(ticks_for(1.0, 1.0 / 60.0), 60);
        assert_eq!(ticks_for(0.001, 1.0 / 60.0), 1);
        assert_eq!(ticks_for(0.0, 1.0 / 60.0), 1);
    }

    #[test]
    fn sim_time_is_computed() {
        let mut tl = TickLoop::new(TickConfig {
            tick_rate_hz: 10,
            headless: true,
        });
        for _ in 0..5 {
            tl.tick(&state(), &RulesConfig::default());
        }
        assert!((tl.sim_time() - 0.5).abs() < 1e-12);
        assert!(tl.is_headless());
    }
}
