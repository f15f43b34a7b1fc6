//! Component types and capability flags.
//!
//! Each component is a plain serde value type. Which components an entity
//! carries is summarised by a [`ComponentSet`] bitset, and single kinds are
//! named by [`ComponentKind`] (used for group lookups).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentKind / ComponentSet
// ---------------------------------------------------------------------------

/// Names a single component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Transform,
    Head,
    Velocity,
    Health,
    Weapon,
    Controller,
    Collider,
    Damage,
    Player,
    Score,
    Ghost,
    Pickup,
    Wall,
}

impl ComponentKind {
    /// All kinds, in declaration order.
    pub const ALL: [ComponentKind; 13] = [
        ComponentKind::Transform,
        ComponentKind::Head,
        ComponentKind::Velocity,
        ComponentKind::Health,
        ComponentKind::Weapon,
        ComponentKind::Controller,
        ComponentKind::Collider,
        ComponentKind::Damage,
        ComponentKind::Player,
        ComponentKind::Score,
        ComponentKind::Ghost,
        ComponentKind::Pickup,
        ComponentKind::Wall,
    ];

    /// The lowercase name used for group tags.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Transform => "transform",
            ComponentKind::Head => "head",
            ComponentKind::Velocity => "velocity",
            ComponentKind::Health => "health",
            ComponentKind::Weapon => "weapon",
            ComponentKind::Controller => "controller",
            ComponentKind::Collider => "collider",
            ComponentKind::Damage => "damage",
            ComponentKind::Player => "player",
            ComponentKind::Score => "score",
            ComponentKind::Ghost => "ghost",
            ComponentKind::Pickup => "pickup",
            ComponentKind::Wall => "wall",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentKind {
    type Err = EcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| EcsError::UnknownComponent {
                name: s.to_owned(),
                registered: ComponentKind::ALL
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

bitflags! {
    /// Bitset of component kinds present on an entity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ComponentSet: u16 {
        const TRANSFORM  = 1 << 0;
        const HEAD       = 1 << 1;
        const VELOCITY   = 1 << 2;
        const HEALTH     = 1 << 3;
        const WEAPON     = 1 << 4;
        const CONTROLLER = 1 << 5;
        const COLLIDER   = 1 << 6;
        const DAMAGE     = 1 << 7;
        const PLAYER     = 1 << 8;
        const SCORE      = 1 << 9;
        const GHOST      = 1 << 10;
        const PICKUP     = 1 << 11;
        const WALL       = 1 << 12;
    }
}

impl From<ComponentKind> for ComponentSet {
    fn from(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Transform => ComponentSet::TRANSFORM,
            ComponentKind::Head => ComponentSet::HEAD,
            ComponentKind::Velocity => ComponentSet::VELOCITY,
            ComponentKind::Health => ComponentSet::HEALTH,
            ComponentKind::Weapon => ComponentSet::WEAPON,
            ComponentKind::Controller => ComponentSet::CONTROLLER,
            ComponentKind::Collider => ComponentSet::COLLIDER,
            ComponentKind::Damage => ComponentSet::DAMAGE,
            ComponentKind::Player => ComponentSet::PLAYER,
            ComponentKind::Score => ComponentSet::SCORE,
            ComponentKind::Ghost => ComponentSet::GHOST,
            ComponentKind::Pickup => ComponentSet::PICKUP,
            ComponentKind::Wall => ComponentSet::WALL,
        }
    }
}

// ---------------------------------------------------------------------------
// Spatial components
// ---------------------------------------------------------------------------

/// Position and Euler rotation. `rotation.y` is the body yaw.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Transform {
    /// A transform at `position` with no rotation.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
        }
    }
}

/// Aim sub-orientation carried by entities that can look up and down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Head {
    /// Rotation about the horizontal axis, in radians.
    pub pitch: f32,
}

impl Head {
    /// Unit facing direction for a body yaw and this head's pitch.
    ///
    /// Yaw 0 / pitch 0 faces `-Z`; positive yaw turns towards `-X`, positive
    /// pitch looks up.
    pub fn facing_direction(&self, yaw: f32) -> Vec3 {
        let (sin_yaw, cos_yaw) = yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(-sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }
}

/// Linear velocity in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Whether two boxes overlap (touching faces do not count).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Whether `point` lies inside or on the box.
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Box collision volume.
///
/// The box is centred on the transform horizontally and extends upwards from
/// the transform's `y`, so a position is always the "feet" of the entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub size: Vec3,
}

impl Collider {
    /// The world-space box for an entity at `position`.
    pub fn aabb(&self, position: Vec3) -> Aabb {
        let half = Vec3::new(self.size.x * 0.5, 0.0, self.size.z * 0.5);
        Aabb {
            min: position - half,
            max: position + half + Vec3::new(0.0, self.size.y, 0.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Combat components
// ---------------------------------------------------------------------------

/// Hit points. Reaching zero does not destroy anything by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub hp: i32,
    pub max_hp: i32,
}

impl Health {
    pub fn full(max_hp: i32) -> Self {
        Self { hp: max_hp, max_hp }
    }
}

/// Static description of a weapon type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponType {
    pub max_loaded_ammo: u32,
    /// Reload duration in seconds.
    pub reload_speed: f32,
}

/// Ammunition state of a carried weapon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub loaded_ammo: u32,
    pub reserved_ammo: u32,
    /// Seconds of reload remaining; 0 when not reloading.
    pub reload_timer: f32,
    #[serde(rename = "type")]
    pub kind: WeaponType,
}

impl Weapon {
    /// A fully loaded weapon with `reserved_ammo` spare rounds.
    pub fn loaded(kind: WeaponType, reserved_ammo: u32) -> Self {
        Self {
            loaded_ammo: kind.max_loaded_ammo,
            reserved_ammo,
            reload_timer: 0.0,
            kind,
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_timer > 0.0
    }
}

/// Marks a projectile and records who fired it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Damage {
    pub creator_id: EntityId,
    pub amount: i32,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single input channel value: a button or an analog axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Button(bool),
    Axis(f32),
}

impl InputValue {
    /// Buttons are active when pressed; axes when past a small dead zone.
    pub fn is_active(self) -> bool {
        match self {
            InputValue::Button(pressed) => pressed,
            InputValue::Axis(v) => v.abs() > 0.05,
        }
    }

    /// Analog reading in `[-1, 1]`; buttons read as 0 or 1.
    pub fn amount(self) -> f32 {
        match self {
            InputValue::Button(true) => 1.0,
            InputValue::Button(false) => 0.0,
            InputValue::Axis(v) => v.clamp(-1.0, 1.0),
        }
    }
}

/// Named input channels. Only keys present at construction are writable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub input: BTreeMap<String, InputValue>,
}

impl Controller {
    /// The channels every player controller recognises.
    pub const KEYS: [&'static str; 5] = ["forward", "back", "left", "right", "jump"];

    /// A controller with every recognised key released.
    pub fn player() -> Self {
        Self {
            input: Self::KEYS
                .iter()
                .map(|k| ((*k).to_owned(), InputValue::Button(false)))
                .collect(),
        }
    }

    /// Whether the named channel is currently active. Unknown keys read as inactive.
    pub fn is_active(&self, key: &str) -> bool {
        self.input.get(key).is_some_and(|v| v.is_active())
    }

    /// Analog amount for `key`, 0 when absent.
    pub fn amount(&self, key: &str) -> f32 {
        self.input.get(key).map_or(0.0, |v| v.amount())
    }
}

// ---------------------------------------------------------------------------
// Identity and markers
// ---------------------------------------------------------------------------

/// Player identity carried by live players and by their ghosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    /// Seconds until respawn; 0 means the player is alive.
    pub respawn_timer: f32,
}

/// Kill/death counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub kills: u32,
    pub deaths: u32,
}

/// Marks a player entity that is connected but not spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ghost {}

/// Marks a static wall tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Wall {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupKind {
    Ammo,
    Health,
}

/// A collectable item lying in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pickup {
    pub kind: PickupKind,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
