//! Entity archetypes.
//!
//! Each function returns a fixed bundle of components. The reducer is the only
//! caller in production; tests use them to build fixtures.

use arena_ecs::prelude::*;
use glam::Vec3;

use crate::action::PlayerDescriptor;

/// Player collision box: feet at the transform, 1.8 units tall.
pub const PLAYER_SIZE: Vec3 = Vec3::new(0.8, 1.8, 0.8);
pub const PLAYER_MAX_HP: i32 = 100;

pub const BULLET_SIZE: Vec3 = Vec3::new(0.2, 0.2, 0.2);
pub const BULLET_DAMAGE: i32 = 25;

pub const PICKUP_SIZE: Vec3 = Vec3::new(1.0, 1.0, 1.0);
/// Rounds added to reserve ammo by an ammo pickup.
pub const AMMO_PACK_ROUNDS: u32 = 16;
/// Hit points restored by a health pickup.
pub const HEALTH_PACK_HP: i32 = 50;

/// The only weapon in the game.
pub const RIFLE: WeaponType = WeaponType {
    max_loaded_ammo: 16,
    reload_speed: 1.5,
};
pub const RIFLE_STARTING_RESERVE: u32 = 48;

/// A live, spawned player at the origin.
pub fn player(descriptor: &PlayerDescriptor) -> Entity {
    Entity::new(descriptor.id.clone())
        .with_transform(Transform::at(Vec3::ZERO))
        .with_head(Head::default())
        .with_velocity(Velocity::default())
        .with_health(Health::full(PLAYER_MAX_HP))
        .with_weapon(Weapon::loaded(RIFLE, RIFLE_STARTING_RESERVE))
        .with_controller(Controller::player())
        .with_collider(Collider { size: PLAYER_SIZE })
        .with_player(Player {
            name: descriptor.name.clone(),
            respawn_timer: 0.0,
        })
        .with_score(Score {
            kills: descriptor.kills,
            deaths: descriptor.deaths,
        })
}

/// A placeholder for a connected player who is not spawned.
///
/// Carries only identity and score, which is all a respawn needs.
pub fn player_ghost(descriptor: &PlayerDescriptor, respawn_timer: f32) -> Entity {
    let name = if descriptor.name.is_empty() {
        descriptor.id.to_string()
    } else {
        descriptor.name.clone()
    };
    Entity::new(descriptor.id.clone())
        .with_player(Player {
            name,
            respawn_timer,
        })
        .with_score(Score {
            kills: descriptor.kills,
            deaths: descriptor.deaths,
        })
        .with_ghost()
}

/// A projectile owned by `creator`. Position and velocity are set by the caller.
pub fn bullet(id: impl Into<EntityId>, creator: EntityId) -> Entity {
    Entity::new(id)
        .with_transform(Transform::default())
        .with_velocity(Velocity::default())
        .with_collider(Collider { size: BULLET_SIZE })
        .with_damage(Damage {
            creator_id: creator,
            amount: BULLET_DAMAGE,
        })
}

pub fn wall(id: impl Into<EntityId>, position: Vec3) -> Entity {
    Entity::new(id)
        .with_transform(Transform::at(position))
        .with_collider(Collider {
            size: Vec3::splat(crate::map::TILE_SIZE),
        })
        .with_wall()
}

pub fn ammo_pickup(id: impl Into<EntityId>, position: Vec3) -> Entity {
    pickup(id, position, PickupKind::Ammo)
}

pub fn health_pickup(id: impl Into<EntityId>, position: Vec3) -> Entity {
    pickup(id, position, PickupKind::Health)
}

fn pickup(id: impl Into<EntityId>, position: Vec3, kind: PickupKind) -> Entity {
    Entity::new(id)
        .with_transform(Transform::at(position))
        .with_collider(Collider { size: PICKUP_SIZE })
        .with_pickup(Pickup { kind })
}
