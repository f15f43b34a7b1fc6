//! The entity store: id → entity, in insertion order.
//!
//! [`EntityStore`] is the container behind every game state. It supports
//! insert-or-replace, lookup by id, a never-failing component view, group
//! queries by component kind and idempotent deletion.
//!
//! Iteration order is insertion order. Replacing an entity keeps its original
//! slot, so a ghost swapped for a live player (and back) does not move within
//! the store. That keeps serialized snapshots, and therefore state hashes,
//! stable across processes that applied the same operations.
//!
//! # Example
//!
//! ```
//! use arena_ecs::prelude::*;
//! use glam::Vec3;
//!
//! let mut store = EntityStore::new();
//! store.add(Entity::new("w1").with_transform(Transform::at(Vec3::ZERO)).with_wall());
//! store.add(Entity::new("p1").with_player(Player { name: "ann".into(), respawn_timer: 0.0 }));
//!
//! assert_eq!(store.group(ComponentKind::Wall).count(), 1);
//! assert!(store.components("p1").transform.is_none());
//! store.delete("p1");
//! assert!(store.get("p1").is_none());
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::component::{
    Collider, ComponentKind, ComponentSet, Controller, Damage, Ghost, Head, Health, Pickup,
    Player, Score, Transform, Velocity, Wall, Weapon,
};
use crate::entity::{Entity, EntityId};

// ---------------------------------------------------------------------------
// Components view
// ---------------------------------------------------------------------------

/// Borrowed view over whichever components an entity has.
///
/// Returned by [`EntityStore::components`]. Missing entities yield a view with
/// every field `None`, so callers destructure it without a not-found branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Components<'a> {
    pub transform: Option<&'a Transform>,
    pub head: Option<&'a Head>,
    pub velocity: Option<&'a Velocity>,
    pub health: Option<&'a Health>,
    pub weapon: Option<&'a Weapon>,
    pub controller: Option<&'a Controller>,
    pub collider: Option<&'a Collider>,
    pub damage: Option<&'a Damage>,
    pub player: Option<&'a Player>,
    pub score: Option<&'a Score>,
    pub ghost: Option<&'a Ghost>,
    pub pickup: Option<&'a Pickup>,
    pub wall: Option<&'a Wall>,
}

impl<'a> Components<'a> {
    fn of(entity: &'a Entity) -> Self {
        Self {
            transform: entity.transform.as_ref(),
            head: entity.head.as_ref(),
            velocity: entity.velocity.as_ref(),
            health: entity.health.as_ref(),
            weapon: entity.weapon.as_ref(),
            controller: entity.controller.as_ref(),
            collider: entity.collider.as_ref(),
            damage: entity.damage.as_ref(),
            player: entity.player.as_ref(),
            score: entity.score.as_ref(),
            ghost: entity.ghost.as_ref(),
            pickup: entity.pickup.as_ref(),
            wall: entity.wall.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

/// Insertion-ordered map of entities keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityStore {
    entities: IndexMap<EntityId, Entity>,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entities: IndexMap::new(),
        }
    }

    /// Insert `entity`, replacing any entity with the same id in place.
    ///
    /// Returns the replaced entity, if any.
    pub fn add(&mut self, entity: Entity) -> Option<Entity> {
        let replaced = self.entities.insert(entity.id.clone(), entity);
        if let Some(old) = &replaced {
            tracing::trace!(entity = %old.id, "replaced entity");
        }
        replaced
    }

    /// Look up an entity by id.
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// The components present on `id`. Never fails: unknown ids give an
    /// all-`None` view.
    pub fn components(&self, id: &str) -> Components<'_> {
        self.entities.get(id).map(Components::of).unwrap_or_default()
    }

    /// All entities carrying a component of `kind`, in insertion order.
    pub fn group(&self, kind: ComponentKind) -> impl Iterator<Item = &Entity> + '_ {
        self.with_all(kind.into())
    }

    /// Ids of all entities carrying a component of `kind`.
    ///
    /// Collected eagerly so the caller may mutate the store while walking it.
    pub fn group_ids(&self, kind: ComponentKind) -> Vec<EntityId> {
        self.group(kind).map(|e| e.id.clone()).collect()
    }

    /// All entities carrying every component in `required`.
    pub fn with_all(&self, required: ComponentSet) -> impl Iterator<Item = &Entity> + '_ {
        self.entities
            .values()
            .filter(move |e| e.component_set().contains(required))
    }

    /// Remove the entity with `id`. No-op if absent.
    ///
    /// Remaining entities keep their relative order.
    pub fn delete(&mut self, id: &str) -> Option<Entity> {
        self.entities.shift_remove(id)
    }

    /// Whether an entity with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate all entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Iterate all ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.entities.keys()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Score;
    use glam::Vec3;

    fn ghost(id: &str) -> Entity {
        Entity::new(id)
            .with_player(Player {
                name: id.to_owned(),
                respawn_timer: 1.0,
            })
            .with_score(Score::default())
            .with_ghost()
    }

    #[test]
    fn add_then_get() {
        let mut store = EntityStore::new();
        assert!(store.add(ghost("p1")).is_none());
        assert_eq!(store.get("p1").unwrap().id.as_str(), "p1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn add_replaces_in_place() {
        let mut store = EntityStore::new();
        store.add(ghost("a"));
        store.add(ghost("b"));
        store.add(ghost("c"));
        let live = Entity::new("b").with_transform(Transform::at(Vec3::ONE));
        let old = store.add(live).unwrap();
        assert!(old.ghost.is_some());

        let order: Vec<&str> = store.ids().map(|id| id.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert!(store.get("b").unwrap().ghost.is_none());
    }

    #[test]
    fn components_of_missing_entity_is_empty() {
        let store = EntityStore::new();
        let view = store.components("nobody");
        assert!(view.transform.is_none());
        assert!(view.weapon.is_none());
        assert!(view.player.is_none());
    }

    #[test]
    fn group_filters_by_component() {
        let mut store = EntityStore::new();
        store.add(ghost("p1"));
        store.add(Entity::new("w").with_wall());
        store.add(ghost("p2"));

        let players = store.group_ids(ComponentKind::Player);
        assert_eq!(players, vec![EntityId::from("p1"), EntityId::from("p2")]);
        assert_eq!(store.group(ComponentKind::Wall).count(), 1);
        assert_eq!(store.group(ComponentKind::Damage).count(), 0);
    }

    #[test]
    fn with_all_requires_every_kind() {
        let mut store = EntityStore::new();
        store.add(ghost("g"));
        store.add(
            Entity::new("live")
                .with_player(Player {
                    name: "l".into(),
                    respawn_timer: 0.0,
                })
                .with_transform(Transform::default()),
        );
        let hits: Vec<_> = store
            .with_all(ComponentSet::PLAYER | ComponentSet::TRANSFORM)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(hits, ["live"]);
    }

    #[test]
    fn delete_is_idempotent_and_preserves_order() {
        let mut store = EntityStore::new();
        store.add(ghost("a"));
        store.add(ghost("b"));
        store.add(ghost("c"));
        assert!(store.delete("b").is_some());
        assert!(store.delete("b").is_none());
        assert!(store.delete("never").is_none());
        let order: Vec<&str> = store.ids().map(|id| id.as_str()).collect();
        assert_eq!(order, ["a", "c"]);
    }

    #[test]
    fn serializes_as_ordered_map() {
        let mut store = EntityStore::new();
        store.add(ghost("z"));
        store.add(ghost("a"));
        let json = serde_json::to_string(&store).unwrap();
        assert!(json.find("\"z\"").unwrap() < json.find("\"a\"").unwrap());
        let back: EntityStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }
}
