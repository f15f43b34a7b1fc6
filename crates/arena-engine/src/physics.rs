//! Kinematic collaborator: ground checks and body integration.
//!
//! The reducer only needs one physics question answered, "is this entity
//! resting on something", which [`is_resting`] derives from wall colliders in
//! the state itself so that every process gets the same answer.
//!
//! [`step_body`] advances one entity by one tick (walking from controller
//! input, jumping, gravity, axis-separated wall resolution). It is a pure
//! function of the state; the authority turns its output into `SYNC_PLAYER`
//! actions, so mirrors never integrate on their own.

use arena_ecs::prelude::*;
use glam::Vec3;

/// Downward acceleration in units/s^2.
pub const GRAVITY: f32 = 20.0;
/// Horizontal walking speed in units/s.
pub const WALK_SPEED: f32 = 6.0;
/// Initial upward speed of a jump in units/s.
pub const JUMP_SPEED: f32 = 8.0;
/// Lowest height any body can reach.
pub const FLOOR_Y: f32 = 0.0;
/// Distance below the feet probed for ground contact.
pub const GROUND_EPSILON: f32 = 0.05;

/// New position and velocity for a body after one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Whether entity `id` stands on the floor or on top of a wall.
///
/// Entities without a transform and collider are never resting.
pub fn is_resting(entities: &EntityStore, id: &str) -> bool {
    let view = entities.components(id);
    let (Some(transform), Some(collider)) = (view.transform, view.collider) else {
        return false;
    };
    let feet = collider.aabb(transform.position);
    if feet.min.y <= FLOOR_Y + GROUND_EPSILON {
        return true;
    }
    let probe = Aabb {
        min: Vec3::new(feet.min.x, feet.min.y - GROUND_EPSILON, feet.min.z),
        max: Vec3::new(feet.max.x, feet.min.y, feet.max.z),
    };
    wall_boxes(entities).any(|wall| wall.intersects(&probe))
}

/// World boxes of every wall.
pub fn wall_boxes(entities: &EntityStore) -> impl Iterator<Item = Aabb> + '_ {
    entities.group(ComponentKind::Wall).filter_map(|wall| {
        let transform = wall.transform?;
        let collider = wall.collider?;
        Some(collider.aabb(transform.position))
    })
}

/// The first wall overlapping `aabb`, if any.
pub fn blocking_wall(entities: &EntityStore, aabb: &Aabb) -> Option<Aabb> {
    wall_boxes(entities).find(|wall| wall.intersects(aabb))
}

/// Advance `entity` by `dt` seconds.
///
/// Returns `None` when the entity has no transform/velocity or nothing
/// changed. Projectiles (entities with a damage component) fly straight and
/// ignore walls; impact handling is a game rule, not physics.
pub fn step_body(entities: &EntityStore, entity: &Entity, dt: f32) -> Option<Body> {
    let transform = entity.transform?;
    let mut velocity = entity.velocity?.linear;
    let position = transform.position;

    if entity.damage.is_some() {
        if velocity == Vec3::ZERO {
            return None;
        }
        return Some(Body {
            position: position + velocity * dt,
            velocity,
        });
    }

    let resting = is_resting(entities, entity.id.as_str());

    if let Some(controller) = &entity.controller {
        let (sin_yaw, cos_yaw) = transform.rotation.y.sin_cos();
        let forward = Vec3::new(-sin_yaw, 0.0, -cos_yaw);
        let right = Vec3::new(cos_yaw, 0.0, -sin_yaw);
        let mut wish = forward * (controller.amount("forward") - controller.amount("back"))
            + right * (controller.amount("right") - controller.amount("left"));
        if wish.length_squared() > 1.0 {
            wish = wish.normalize();
        }
        velocity.x = wish.x * WALK_SPEED;
        velocity.z = wish.z * WALK_SPEED;
        if resting && controller.is_active("jump") {
            velocity.y = JUMP_SPEED;
        }
    }

    if resting && velocity.y <= 0.0 {
        velocity.y = 0.0;
    } else {
        velocity.y -= GRAVITY * dt;
    }

    let mut next = position;
    match entity.collider {
        Some(collider) => {
            // x, z, then y, so a body slides along walls and lands on tops.
            for axis in [0usize, 2, 1] {
                let mut candidate = next;
                candidate[axis] += velocity[axis] * dt;
                let aabb = collider.aabb(candidate);
                if let Some(wall) = blocking_wall(entities, &aabb) {
                    if axis == 1 && velocity.y < 0.0 {
                        candidate.y = wall.max.y;
                    } else {
                        candidate[axis] = next[axis];
                    }
                    velocity[axis] = 0.0;
                }
                next = candidate;
            }
        }
        None => next += velocity * dt,
    }

    if next.y < FLOOR_Y {
        next.y = FLOOR_Y;
        velocity.y = 0.0;
    }

    if next == position && velocity == entity.velocity?.linear {
        return None;
    }
    Some(Body {
        position: next,
        velocity,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
