//! Entity identifiers and the entity record.
//!
//! An [`EntityId`] is an opaque string handle. Ids are chosen by whoever
//! creates the entity (the transport for players, the authority for bullets,
//! the map loader for tiles) so that every process names the same entity the
//! same way without a shared allocator.
//!
//! An [`Entity`] is the id plus one optional slot per component type. There is
//! no subclassing: archetypes are just different sets of filled slots, and
//! "has component X" is a plain `Option::is_some` check.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::{
    Collider, ComponentKind, ComponentSet, Controller, Damage, Ghost, Head, Health, Pickup,
    Player, Score, Transform, Velocity, Wall, Weapon,
};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An opaque, string-valued entity identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Construct an id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An identified bundle of components.
///
/// Every slot is optional. Empty slots are omitted from the serialized form so
/// that snapshots and state hashes only reflect components that exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The entity's identity. Immutable for the entity's lifetime.
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Head>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Velocity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<Weapon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<Controller>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collider: Option<Collider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<Damage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost: Option<Ghost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<Pickup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall: Option<Wall>,
}

impl Entity {
    /// Create an entity with no components.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            transform: None,
            head: None,
            velocity: None,
            health: None,
            weapon: None,
            controller: None,
            collider: None,
            damage: None,
            player: None,
            score: None,
            ghost: None,
            pickup: None,
            wall: None,
        }
    }

    // -- builders -----------------------------------------------------------

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_head(mut self, head: Head) -> Self {
        self.head = Some(head);
        self
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn with_health(mut self, health: Health) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_weapon(mut self, weapon: Weapon) -> Self {
        self.weapon = Some(weapon);
        self
    }

    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = Some(collider);
        self
    }

    pub fn with_damage(mut self, damage: Damage) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_player(mut self, player: Player) -> Self {
        self.player = Some(player);
        self
    }

    pub fn with_score(mut self, score: Score) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_ghost(mut self) -> Self {
        self.ghost = Some(Ghost {});
        self
    }

    pub fn with_pickup(mut self, pickup: Pickup) -> Self {
        self.pickup = Some(pickup);
        self
    }

    pub fn with_wall(mut self) -> Self {
        self.wall = Some(Wall {});
        self
    }

    // -- capability queries -------------------------------------------------

    /// The set of component kinds present on this entity.
    pub fn component_set(&self) -> ComponentSet {
        let mut set = ComponentSet::empty();
        set.set(ComponentSet::TRANSFORM, self.transform.is_some());
        set.set(ComponentSet::HEAD, self.head.is_some());
        set.set(ComponentSet::VELOCITY, self.velocity.is_some());
        set.set(ComponentSet::HEALTH, self.health.is_some());
        set.set(ComponentSet::WEAPON, self.weapon.is_some());
        set.set(ComponentSet::CONTROLLER, self.controller.is_some());
        set.set(ComponentSet::COLLIDER, self.collider.is_some());
        set.set(ComponentSet::DAMAGE, self.damage.is_some());
        set.set(ComponentSet::PLAYER, self.player.is_some());
        set.set(ComponentSet::SCORE, self.score.is_some());
        set.set(ComponentSet::GHOST, self.ghost.is_some());
        set.set(ComponentSet::PICKUP, self.pickup.is_some());
        set.set(ComponentSet::WALL, self.wall.is_some());
        set
    }

    /// Whether the entity carries a component of the given kind.
    #[inline]
    pub fn has(&self, kind: ComponentKind) -> bool {
        self.component_set().contains(kind.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn empty_entity_has_no_components() {
        let e = Entity::new("a");
        assert!(e.component_set().is_empty());
        assert!(!e.has(ComponentKind::Transform));
    }

    #[test]
    fn component_set_tracks_filled_slots() {
        let e = Entity::new("w")
            .with_transform(Transform::at(Vec3::ZERO))
            .with_wall();
        let set = e.component_set();
        assert!(set.contains(ComponentSet::TRANSFORM | ComponentSet::WALL));
        assert!(!set.contains(ComponentSet::HEALTH));
        assert!(e.has(ComponentKind::Wall));
    }

    #[test]
    fn empty_slots_are_not_serialized() {
        let e = Entity::new("x").with_ghost();
        let json = serde_json::to_value(&e).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2, "only id and ghost expected, got {json}");
        assert!(obj.contains_key("ghost"));
    }

    #[test]
    fn entity_id_displays_raw_string() {
        let id = EntityId::from("p1");
        assert_eq!(id.to_string(), "p1");
        assert_eq!(format!("{id:?}"), "EntityId(p1)");
    }
}
