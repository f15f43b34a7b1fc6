//! The game state aggregate and its content hash.
//!
//! [`GameState`] is everything the reducer reads and writes: the entity store,
//! the camera view, the game start timestamp, the roster of connected player
//! ids, the player spawn points and the bullet sequence counter.
//!
//! # Hashing
//!
//! [`GameState::state_hash`] is a BLAKE3 hex digest of the canonical JSON of
//! the replicated fields. The camera view is excluded: it is derived from each
//! process's own viewport and legitimately differs between mirrors.

use arena_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::action::{Action, PlayerDescriptor};

// ---------------------------------------------------------------------------
// CameraView
// ---------------------------------------------------------------------------

/// Perspective camera configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Width over height of the viewport.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            fov: 75.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The single aggregate of mutable game data owned by one game context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub entities: EntityStore,
    pub camera: CameraView,
    /// Milliseconds since the Unix epoch at `INIT_GAME`, or 0 if unknown.
    pub started_at_ms: u64,
    /// Connected player ids in join order.
    pub roster: Vec<EntityId>,
    /// World positions of tile-1 spawn points, in map raster order.
    pub player_spawns: Vec<Vec3>,
    /// Number of bullets created since `INIT_GAME`.
    pub bullet_seq: u64,
}

/// Borrowed view of the replicated fields, serialized for hashing.
#[derive(Serialize)]
struct Hashable<'a> {
    entities: &'a EntityStore,
    started_at_ms: u64,
    roster: &'a [EntityId],
    player_spawns: &'a [Vec3],
    bullet_seq: u64,
}

impl GameState {
    /// An empty state: no entities, default camera.
    pub fn new() -> Self {
        Self::default()
    }

    /// BLAKE3 hex digest (64 lowercase hex chars) of the replicated state.
    pub fn state_hash(&self) -> String {
        let hashable = Hashable {
            entities: &self.entities,
            started_at_ms: self.started_at_ms,
            roster: &self.roster,
            player_spawns: &self.player_spawns,
            bullet_seq: self.bullet_seq,
        };
        let bytes = serde_json::to_vec(&hashable)
            .expect("GameState should always be JSON-serializable");
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// Descriptors for every player entity (live or ghost), in store order.
    pub fn players(&self) -> Vec<PlayerDescriptor> {
        self.entities
            .group(ComponentKind::Player)
            .filter_map(PlayerDescriptor::from_entity)
            .collect()
    }

    /// A `SYNC_ALL_PLAYERS` snapshot of the current roster.
    pub fn sync_all_players(&self) -> Action {
        Action::SyncAllPlayers {
            players: self.players(),
        }
    }

    /// Whether `id` is a live (spawned) player.
    pub fn is_spawned(&self, id: &str) -> bool {
        self.entities
            .get(id)
            .is_some_and(|e| e.player.is_some() && e.ghost.is_none())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory;

    #[test]
    fn hash_ignores_camera() {
        let mut a = GameState::new();
        let mut b = GameState::new();
        a.camera.aspect = 16.0 / 9.0;
        b.camera.aspect = 4.0 / 3.0;
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(a.state_hash().len(), 64);
    }

    #[test]
    fn hash_tracks_entities() {
        let mut a = GameState::new();
        let before = a.state_hash();
        a.entities
            .add(factory::player_ghost(&PlayerDescriptor::new("p1", "ann"), 1.0));
        assert_ne!(before, a.state_hash());
    }

    #[test]
    fn players_lists_live_and_ghosts() {
        let mut s = GameState::new();
        s.entities
            .add(factory::player_ghost(&PlayerDescriptor::new("g", "gus"), 1.0));
        s.entities.add(factory::player(&PlayerDescriptor::new("l", "lou")));
        s.entities.add(factory::wall("80", Vec3::ZERO));

        let players = s.players();
        assert_eq!(players.len(), 2);
        assert!(!players[0].is_alive());
        assert!(players[1].is_alive());
        assert!(s.is_spawned("l"));
        assert!(!s.is_spawned("g"));
        assert!(!s.is_spawned("80"));
    }
}
