//! The per-process game context.
//!
//! A [`Game`] owns one [`GameState`] and the [`TileMap`] used by `INIT_GAME`.
//! There is no global world: the authority and every mirror hold their own
//! `Game` and thread it through each dispatch.

use std::sync::Arc;

use crate::action::Action;
use crate::map::TileMap;
use crate::reducer;
use crate::scene::{self, SceneDirective};
use crate::state::GameState;

pub struct Game {
    state: GameState,
    map: Arc<TileMap>,
    scene: Vec<SceneDirective>,
    dispatched: u64,
}

impl Game {
    /// A context with an empty state. Nothing is loaded until `INIT_GAME`.
    pub fn new(map: Arc<TileMap>) -> Self {
        Self {
            state: GameState::new(),
            map,
            scene: Vec::new(),
            dispatched: 0,
        }
    }

    /// Apply one action. Never fails.
    pub fn dispatch(&mut self, action: &Action) {
        reducer::apply(&mut self.state, action, &self.map);
        if matches!(action, Action::InitGame { .. }) {
            self.scene.extend(scene::arena_lighting());
        }
        self.dispatched += 1;
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn map(&self) -> &Arc<TileMap> {
        &self.map
    }

    /// Take the presentation directives queued since the last call.
    pub fn drain_scene(&mut self) -> Vec<SceneDirective> {
        std::mem::take(&mut self.scene)
    }

    /// Number of actions applied so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn state_hash(&self) -> String {
        self.state.state_hash()
    }
}
