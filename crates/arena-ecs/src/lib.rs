//! Arena ECS -- entity/component state container for the arena shooter.
//!
//! Entities are identified by opaque string ids and carry an explicit set of
//! optional component slots (transform, health, weapon, controller, ...).
//! Whether an entity "has" a component is a statically typed `Option` check,
//! summarised as a [`ComponentSet`](component::ComponentSet) bitset for group
//! queries.
//!
//! The [`EntityStore`](store::EntityStore) keeps entities in insertion order
//! so that two processes applying the same operations serialize to the same
//! bytes.
//!
//! # Quick Start
//!
//! ```
//! use arena_ecs::prelude::*;
//! use glam::Vec3;
//!
//! let mut store = EntityStore::new();
//! store.add(
//!     Entity::new("p1")
//!         .with_transform(Transform::at(Vec3::new(1.0, 0.0, 2.0)))
//!         .with_health(Health::full(100)),
//! );
//!
//! let Components { transform, health, weapon, .. } = store.components("p1");
//! assert_eq!(transform.unwrap().position.x, 1.0);
//! assert_eq!(health.unwrap().hp, 100);
//! assert!(weapon.is_none());
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod store;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A component kind was named that does not exist.
    #[error("unknown component kind '{name}'. Known kinds: [{registered}]")]
    UnknownComponent { name: String, registered: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{
        Aabb, Collider, ComponentKind, ComponentSet, Controller, Damage, Ghost, Head, Health,
        InputValue, Pickup, PickupKind, Player, Score, Transform, Velocity, Wall, Weapon,
        WeaponType,
    };
    pub use crate::entity::{Entity, EntityId};
    pub use crate::store::{Components, EntityStore};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
