//! The action vocabulary.
//!
//! An [`Action`] is the only legal way to change game state and the only unit
//! sent over the network. The set of kinds is closed: the reducer matches on
//! every variant, so adding a kind is a compile error until it is handled.
//!
//! On the wire an action is `{"kind": "SHOOT_BULLET", "data": {...}}`; see
//! [`protocol`](crate::protocol) for the codec.

use arena_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// Replicated description of a player, live or ghost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDescriptor {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    /// Seconds until respawn; 0 means alive.
    #[serde(default)]
    pub respawn_timer: f32,
}

impl PlayerDescriptor {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kills: 0,
            deaths: 0,
            respawn_timer: 0.0,
        }
    }

    /// Build a descriptor from an entity's player and score components.
    ///
    /// Returns `None` for entities without a player component.
    pub fn from_entity(entity: &Entity) -> Option<Self> {
        let player = entity.player.as_ref()?;
        let score = entity.score.unwrap_or_default();
        Some(Self {
            id: entity.id.clone(),
            name: player.name.clone(),
            kills: score.kills,
            deaths: score.deaths,
            respawn_timer: player.respawn_timer,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.respawn_timer == 0.0
    }
}

/// Random draws for one shot, made by the authority before broadcast so that
/// every mirror creates an identical projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub bullet_id: EntityId,
    /// Per-axis velocity jitter added to the aimed velocity.
    pub spread: Vec3,
    /// Initial projectile rotation.
    pub spin: Vec3,
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One legal state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Discard all state and rebuild the world from the tile map.
    InitGame {
        /// Players to re-admit as ghosts into the fresh state.
        #[serde(default)]
        players: Vec<EntityId>,
        /// Game start timestamp, stamped by the authority.
        #[serde(default)]
        started_at_ms: Option<u64>,
    },
    /// Add a not-yet-spawned player.
    PlayerJoin { player: PlayerDescriptor },
    /// Remove a player's entity, spawned or ghost.
    PlayerLeave { id: EntityId },
    /// Reconcile the local roster with a full list of players.
    SyncAllPlayers { players: Vec<PlayerDescriptor> },
    /// Replace a ghost with a live player at `spawn`.
    SpawnPlayer {
        player: PlayerDescriptor,
        spawn: Vec3,
    },
    /// Overwrite position, velocity and orientation.
    SyncPlayer {
        id: EntityId,
        x: f32,
        y: f32,
        z: f32,
        vx: f32,
        vy: f32,
        vz: f32,
        /// Head pitch.
        rx: f32,
        /// Body yaw.
        ry: f32,
    },
    SyncPlayerScore {
        id: EntityId,
        kills: u32,
        deaths: u32,
    },
    SetCameraView { width: f32, height: f32 },
    SetInput {
        id: EntityId,
        input: String,
        value: InputValue,
    },
    /// `vertical` turns the body about the vertical axis (yaw); `horizontal`
    /// tilts the head about the horizontal axis (pitch).
    SetAim {
        id: EntityId,
        vertical: f32,
        horizontal: f32,
    },
    ShootBullet {
        id: EntityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shot: Option<Shot>,
    },
    ReloadStart { id: EntityId },
    ReloadDone { id: EntityId },
    HitPlayer { id: EntityId, hp: i32 },
    KillPlayer { id: EntityId },
    SpawnAmmoPack { id: EntityId, position: Vec3 },
    SpawnHealthPack { id: EntityId, position: Vec3 },
    /// Player `id` collects pickup `pickup_id`.
    PickupItem { id: EntityId, pickup_id: EntityId },
    RemoveEntity { id: EntityId },
}

impl Action {
    /// Every kind name, as it appears on the wire.
    pub const KINDS: [&'static str; 19] = [
        "INIT_GAME",
        "PLAYER_JOIN",
        "PLAYER_LEAVE",
        "SYNC_ALL_PLAYERS",
        "SPAWN_PLAYER",
        "SYNC_PLAYER",
        "SYNC_PLAYER_SCORE",
        "SET_CAMERA_VIEW",
        "SET_INPUT",
        "SET_AIM",
        "SHOOT_BULLET",
        "RELOAD_START",
        "RELOAD_DONE",
        "HIT_PLAYER",
        "KILL_PLAYER",
        "SPAWN_AMMO_PACK",
        "SPAWN_HEALTH_PACK",
        "PICKUP_ITEM",
        "REMOVE_ENTITY",
    ];

    /// The wire name of this action's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::InitGame { .. } => "INIT_GAME",
            Action::PlayerJoin { .. } => "PLAYER_JOIN",
            Action::PlayerLeave { .. } => "PLAYER_LEAVE",
            Action::SyncAllPlayers { .. } => "SYNC_ALL_PLAYERS",
            Action::SpawnPlayer { .. } => "SPAWN_PLAYER",
            Action::SyncPlayer { .. } => "SYNC_PLAYER",
            Action::SyncPlayerScore { .. } => "SYNC_PLAYER_SCORE",
            Action::SetCameraView { .. } => "SET_CAMERA_VIEW",
            Action::SetInput { .. } => "SET_INPUT",
            Action::SetAim { .. } => "SET_AIM",
            Action::ShootBullet { .. } => "SHOOT_BULLET",
            Action::ReloadStart { .. } => "RELOAD_START",
            Action::ReloadDone { .. } => "RELOAD_DONE",
            Action::HitPlayer { .. } => "HIT_PLAYER",
            Action::KillPlayer { .. } => "KILL_PLAYER",
            Action::SpawnAmmoPack { .. } => "SPAWN_AMMO_PACK",
            Action::SpawnHealthPack { .. } => "SPAWN_HEALTH_PACK",
            Action::PickupItem { .. } => "PICKUP_ITEM",
            Action::RemoveEntity { .. } => "REMOVE_ENTITY",
        }
    }

    /// The entity the action is about, when there is a single one.
    pub fn target(&self) -> Option<&EntityId> {
        match self {
            Action::PlayerJoin { player } | Action::SpawnPlayer { player, .. } => Some(&player.id),
            Action::PlayerLeave { id }
            | Action::SyncPlayer { id, .. }
            | Action::SyncPlayerScore { id, .. }
            | Action::SetInput { id, .. }
            | Action::SetAim { id, .. }
            | Action::ShootBullet { id, .. }
            | Action::ReloadStart { id }
            | Action::ReloadDone { id }
            | Action::HitPlayer { id, .. }
            | Action::KillPlayer { id }
            | Action::SpawnAmmoPack { id, .. }
            | Action::SpawnHealthPack { id, .. }
            | Action::PickupItem { id, .. }
            | Action::RemoveEntity { id } => Some(id),
            Action::InitGame { .. } | Action::SyncAllPlayers { .. } | Action::SetCameraView { .. } => {
                None
            }
        }
    }

    /// Whether a client may submit this kind at all.
    pub fn is_client_submittable(&self) -> bool {
        matches!(
            self,
            Action::SetInput { .. }
                | Action::SetAim { .. }
                | Action::ShootBullet { .. }
                | Action::ReloadStart { .. }
        )
    }

    // -- constructors -------------------------------------------------------

    /// `INIT_GAME` with no roster and no start time.
    pub fn init_game() -> Self {
        Action::InitGame {
            players: Vec::new(),
            started_at_ms: None,
        }
    }

    pub fn player_join(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Action::PlayerJoin {
            player: PlayerDescriptor::new(id, name),
        }
    }

    pub fn player_leave(id: impl Into<EntityId>) -> Self {
        Action::PlayerLeave { id: id.into() }
    }

    pub fn spawn_player(player: PlayerDescriptor, spawn: Vec3) -> Self {
        Action::SpawnPlayer { player, spawn }
    }

    /// `SHOOT_BULLET` as a client sends it, without authority draws.
    pub fn shoot_bullet(id: impl Into<EntityId>) -> Self {
        Action::ShootBullet {
            id: id.into(),
            shot: None,
        }
    }

    /// `SYNC_PLAYER` from an entity's current transform, head and velocity.
    ///
    /// Missing components contribute zeros.
    pub fn sync_player(entity: &Entity) -> Self {
        let transform = entity.transform.unwrap_or_default();
        let velocity = entity.velocity.unwrap_or_default().linear;
        let pitch = entity.head.map_or(0.0, |h| h.pitch);
        Action::SyncPlayer {
            id: entity.id.clone(),
            x: transform.position.x,
            y: transform.position.y,
            z: transform.position.z,
            vx: velocity.x,
            vy: velocity.y,
            vz: velocity.z,
            rx: pitch,
            ry: transform.rotation.y,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
