//! Arena Engine -- game state, reducer and replication for the arena shooter.
//!
//! This crate builds on [`arena_ecs`] to provide everything above the entity
//! store: the closed [`Action`](action::Action) vocabulary and its wire codec,
//! entity factories, tile maps, the pure [`reduce`](reducer::reduce)
//! function, and the two replication roles. An
//! [`Authority`](authority::Authority) runs the fixed-rate tick loop and
//! broadcasts every action it applies; any number of
//! [`Mirror`](mirror::Mirror)s apply that stream in order and reach the same
//! state.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use arena_engine::prelude::*;
//!
//! let map = Arc::new(TileMap::default_arena());
//! let mut authority = Authority::new(Arc::clone(&map), TickConfig::default(), RulesConfig::default());
//! let mut mirror = Mirror::new(map);
//!
//! authority.start(0);
//! authority.connect("p1".into(), "ann");
//! for _ in 0..120 {
//!     authority.tick();
//! }
//!
//! for envelope in authority.drain_outbox() {
//!     match envelope {
//!         Envelope::Broadcast(action) => mirror.receive(&action),
//!         Envelope::To(id, action) if id.as_str() == "p1" => mirror.receive(&action),
//!         Envelope::To(..) => {}
//!     }
//! }
//! assert_eq!(mirror.state_hash(), authority.state().state_hash());
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod authority;
pub mod config;
pub mod factory;
pub mod game;
pub mod log;
pub mod map;
pub mod mirror;
pub mod physics;
pub mod protocol;
pub mod reducer;
pub mod rules;
pub mod scene;
pub mod state;
pub mod tick;

/// Re-export the ECS crate for convenience.
pub use arena_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use arena_ecs::prelude::*;

    pub use crate::action::{Action, PlayerDescriptor, Shot};
    pub use crate::authority::{Authority, Envelope};
    pub use crate::config::RulesConfig;
    pub use crate::factory;
    pub use crate::game::Game;
    pub use crate::log::{
        replay, ActionLog, Checkpoint, LogEntry, ReplayDivergence, ReplayError, ReplayReport,
    };
    pub use crate::map::{MapError, Tile, TileMap, TILE_SIZE};
    pub use crate::mirror::Mirror;
    pub use crate::protocol::{ClientFrame, ProtocolError, ServerFrame};
    pub use crate::reducer::reduce;
    pub use crate::scene::{Light, LightKind, SceneDirective};
    pub use crate::state::{CameraView, GameState};
    pub use crate::tick::{ActionBuffer, Frame, SystemFn, TickConfig, TickDiagnostics, TickLoop};
}
