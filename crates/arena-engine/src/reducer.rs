//! The reducer: `(state, action) -> state`.
//!
//! [`reduce`] is total. An action that names a missing entity or a missing
//! component degrades to a no-op on that part of the payload and is logged at
//! `debug`; nothing here returns an error or panics. Every process runs this
//! same function, so it must not read clocks, draw random numbers or look at
//! anything outside its arguments.
//!
//! `INIT_GAME` discards the previous state and rebuilds the world from the
//! [`TileMap`]; every other kind edits the state in place.

use arena_ecs::prelude::*;
use glam::Vec3;
use tracing::debug;

use crate::action::{Action, PlayerDescriptor};
use crate::factory;
use crate::map::{tile_position, Tile, TileMap};
use crate::physics;
use crate::state::GameState;

/// Projectile speed in units/s.
pub const BULLET_SPEED: f32 = 60.0;
/// Distance below the shooter's collider top where projectiles appear.
pub const MUZZLE_DROP: f32 = 0.5;
/// Distance a projectile is pushed forward along its velocity at spawn.
pub const MUZZLE_OFFSET: f32 = 0.75;
/// Upward speed given to a resting player that gets hit.
pub const KNOCKBACK_SPEED: f32 = physics::JUMP_SPEED * 0.5;
/// Ghost timer, in seconds, for a player who was just killed.
pub const RESPAWN_DELAY: f32 = 3.0;
/// Ghost timer, in seconds, for a player who just joined.
pub const JOIN_SPAWN_DELAY: f32 = 1.0;
/// Entity ids for map tiles start here and count up in hex.
pub const TILE_ID_BASE: usize = 128;

/// Apply `action` to `state` and return the next state.
///
/// ```
/// use arena_engine::prelude::*;
///
/// let map = TileMap::empty();
/// let state = reduce(GameState::new(), &Action::player_join("p1", "ann"), &map);
/// assert!(state.entities.get("p1").is_some_and(|p| p.ghost.is_some()));
/// ```
pub fn reduce(mut state: GameState, action: &Action, map: &TileMap) -> GameState {
    apply(&mut state, action, map);
    state
}

/// In-place form of [`reduce`], used by the game context and by cases that
/// dispatch other actions.
pub fn apply(state: &mut GameState, action: &Action, map: &TileMap) {
    match action {
        Action::InitGame {
            players,
            started_at_ms,
        } => {
            *state = init_game(players, started_at_ms.unwrap_or(0), map);
        }

        Action::PlayerJoin { player } => {
            state
                .entities
                .add(factory::player_ghost(player, JOIN_SPAWN_DELAY));
            if !state.roster.contains(&player.id) {
                state.roster.push(player.id.clone());
            }
        }

        Action::PlayerLeave { id } => {
            if state.entities.delete(id.as_str()).is_none() {
                stale(action);
            }
            state.roster.retain(|r| r != id);
        }

        Action::SyncAllPlayers { players } => sync_all_players(state, players, map),

        Action::SpawnPlayer { player, spawn } => {
            // Identity and score come from the entity already in the store;
            // the payload only decides where.
            let Some(descriptor) = state
                .entities
                .get(player.id.as_str())
                .and_then(PlayerDescriptor::from_entity)
            else {
                return stale(action);
            };
            let mut live = factory::player(&descriptor);
            live.transform = Some(Transform::at(*spawn));
            state.entities.add(live);
        }

        Action::SyncPlayer {
            id,
            x,
            y,
            z,
            vx,
            vy,
            vz,
            rx,
            ry,
        } => {
            let Some(entity) = state.entities.get_mut(id.as_str()) else {
                return stale(action);
            };
            if let Some(head) = entity.head.as_mut() {
                head.pitch = *rx;
            }
            if let Some(transform) = entity.transform.as_mut() {
                transform.position = Vec3::new(*x, *y, *z);
                transform.rotation.y = *ry;
            }
            if let Some(velocity) = entity.velocity.as_mut() {
                velocity.linear = Vec3::new(*vx, *vy, *vz);
            }
        }

        Action::SyncPlayerScore { id, kills, deaths } => {
            match state
                .entities
                .get_mut(id.as_str())
                .and_then(|e| e.score.as_mut())
            {
                Some(score) => {
                    score.kills = *kills;
                    score.deaths = *deaths;
                }
                None => stale(action),
            }
        }

        Action::SetCameraView { width, height } => {
            let aspect = width / height;
            if aspect.is_finite() && aspect > 0.0 {
                state.camera.aspect = aspect;
            } else {
                debug!(width, height, "ignoring degenerate viewport");
            }
        }

        Action::SetInput { id, input, value } => {
            match state
                .entities
                .get_mut(id.as_str())
                .and_then(|e| e.controller.as_mut())
                .and_then(|c| c.input.get_mut(input.as_str()))
            {
                Some(slot) => *slot = *value,
                None => stale(action),
            }
        }

        Action::SetAim {
            id,
            vertical,
            horizontal,
        } => {
            let Some(entity) = state.entities.get_mut(id.as_str()) else {
                return stale(action);
            };
            match (entity.transform.as_mut(), entity.head.as_mut()) {
                (Some(transform), Some(head)) => {
                    transform.rotation.y = *vertical;
                    head.pitch = *horizontal;
                }
                _ => stale(action),
            }
        }

        Action::ShootBullet { id, shot } => {
            let Some(shooter) = state.entities.get(id.as_str()) else {
                return stale(action);
            };
            let (Some(transform), Some(head)) = (shooter.transform, shooter.head) else {
                return stale(action);
            };
            let top = shooter
                .collider
                .map_or(transform.position.y, |c| c.aabb(transform.position).max.y);

            let (bullet_id, spread, spin) = match shot {
                Some(shot) => (shot.bullet_id.clone(), shot.spread, shot.spin),
                None => (
                    EntityId::new(format!("{id}:{}", state.bullet_seq)),
                    Vec3::ZERO,
                    Vec3::ZERO,
                ),
            };

            let velocity =
                head.facing_direction(transform.rotation.y) * BULLET_SPEED + spread;
            let muzzle = Vec3::new(transform.position.x, top - MUZZLE_DROP, transform.position.z);
            let position = muzzle + velocity.normalize_or_zero() * MUZZLE_OFFSET;

            let mut bullet = factory::bullet(bullet_id, id.clone());
            bullet.transform = Some(Transform {
                position,
                rotation: spin,
            });
            bullet.velocity = Some(Velocity { linear: velocity });

            if let Some(weapon) = state
                .entities
                .get_mut(id.as_str())
                .and_then(|e| e.weapon.as_mut())
            {
                weapon.loaded_ammo = weapon.loaded_ammo.saturating_sub(1);
            }
            state.bullet_seq += 1;
            state.entities.add(bullet);
        }

        Action::ReloadStart { id } => {
            match state
                .entities
                .get_mut(id.as_str())
                .and_then(|e| e.weapon.as_mut())
            {
                Some(weapon) => weapon.reload_timer = weapon.kind.reload_speed,
                None => stale(action),
            }
        }

        Action::ReloadDone { id } => {
            let Some(weapon) = state
                .entities
                .get_mut(id.as_str())
                .and_then(|e| e.weapon.as_mut())
            else {
                return stale(action);
            };
            let capacity = weapon.kind.max_loaded_ammo;
            let transfer = capacity
                .saturating_sub(weapon.loaded_ammo)
                .min(weapon.reserved_ammo);
            if transfer > 0 {
                weapon.loaded_ammo += transfer;
                weapon.reserved_ammo -= transfer;
            }
            weapon.reload_timer = 0.0;
        }

        Action::HitPlayer { id, hp } => {
            let resting = physics::is_resting(&state.entities, id.as_str());
            let Some(entity) = state.entities.get_mut(id.as_str()) else {
                return stale(action);
            };
            match entity.health.as_mut() {
                Some(health) => health.hp = *hp,
                None => return stale(action),
            }
            if resting {
                if let Some(velocity) = entity.velocity.as_mut() {
                    velocity.linear.y = KNOCKBACK_SPEED;
                }
            }
        }

        Action::KillPlayer { id } => {
            let Some(descriptor) = state
                .entities
                .get(id.as_str())
                .and_then(PlayerDescriptor::from_entity)
            else {
                return stale(action);
            };
            state
                .entities
                .add(factory::player_ghost(&descriptor, RESPAWN_DELAY));
        }

        Action::SpawnAmmoPack { id, position } => {
            state.entities.add(factory::ammo_pickup(id.clone(), *position));
        }

        Action::SpawnHealthPack { id, position } => {
            state
                .entities
                .add(factory::health_pickup(id.clone(), *position));
        }

        Action::PickupItem { id, pickup_id } => {
            let Some(kind) = state
                .entities
                .get(pickup_id.as_str())
                .and_then(|e| e.pickup)
                .map(|p| p.kind)
            else {
                return stale(action);
            };
            let Some(player) = state.entities.get_mut(id.as_str()) else {
                return stale(action);
            };
            match (kind, player.weapon.as_mut(), player.health.as_mut()) {
                (PickupKind::Ammo, Some(weapon), _) => {
                    weapon.reserved_ammo = weapon
                        .reserved_ammo
                        .saturating_add(factory::AMMO_PACK_ROUNDS);
                }
                (PickupKind::Health, _, Some(health)) => {
                    health.hp = health
                        .hp
                        .saturating_add(factory::HEALTH_PACK_HP)
                        .min(health.max_hp);
                }
                _ => return stale(action),
            }
            state.entities.delete(pickup_id.as_str());
        }

        Action::RemoveEntity { id } => {
            // Players leave through PLAYER_LEAVE so the roster stays in step.
            match state.entities.get(id.as_str()) {
                Some(entity) if entity.player.is_none() => {
                    state.entities.delete(id.as_str());
                }
                _ => stale(action),
            }
        }
    }
}

fn stale(action: &Action) {
    debug!(
        kind = action.kind(),
        target = action.target().map(EntityId::as_str),
        "stale reference, ignoring"
    );
}

fn init_game(players: &[EntityId], started_at_ms: u64, map: &TileMap) -> GameState {
    let mut state = GameState::new();
    state.started_at_ms = started_at_ms;

    map.for_each_tile(|tile, x, y, z| {
        let position = tile_position(x, y, z);
        let id = format!("{:x}", TILE_ID_BASE + state.entities.len());
        match Tile::from_id(tile) {
            Some(Tile::PlayerSpawn) => state.player_spawns.push(position),
            Some(Tile::Wall) => {
                state.entities.add(factory::wall(id, position));
            }
            Some(Tile::AmmoPickup) => {
                state.entities.add(factory::ammo_pickup(id, position));
            }
            Some(Tile::HealthPickup) => {
                state.entities.add(factory::health_pickup(id, position));
            }
            None => {}
        }
    });

    for id in players {
        let join = Action::PlayerJoin {
            player: PlayerDescriptor::new(id.clone(), ""),
        };
        apply(&mut state, &join, map);
    }
    state
}

fn sync_all_players(state: &mut GameState, players: &[PlayerDescriptor], map: &TileMap) {
    for descriptor in players {
        if !state.entities.contains(descriptor.id.as_str()) {
            apply(
                state,
                &Action::PlayerJoin {
                    player: descriptor.clone(),
                },
                map,
            );
        }

        let Some(entity) = state.entities.get_mut(descriptor.id.as_str()) else {
            continue;
        };
        let Some(player) = entity.player.as_mut() else {
            debug!(id = %descriptor.id, "roster entry names a non-player entity");
            continue;
        };
        if !descriptor.name.is_empty() {
            player.name = descriptor.name.clone();
        }
        player.respawn_timer = descriptor.respawn_timer;
        if let Some(score) = entity.score.as_mut() {
            score.kills = descriptor.kills;
            score.deaths = descriptor.deaths;
        }

        if descriptor.is_alive() && entity.ghost.is_some() {
            apply(
                state,
                &Action::SpawnPlayer {
                    player: descriptor.clone(),
                    spawn: Vec3::ZERO,
                },
                map,
            );
        }
    }

    let departed: Vec<EntityId> = state
        .entities
        .group_ids(ComponentKind::Player)
        .into_iter()
        .filter(|id| !players.iter().any(|d| &d.id == id))
        .collect();
    for id in departed {
        apply(state, &Action::PlayerLeave { id }, map);
    }
    for descriptor in players {
        if !state.roster.contains(&descriptor.id) {
            state.roster.push(descriptor.id.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Shot;

    fn with_live(id: &str) -> GameState {
        let map = TileMap::empty();
        let s = reduce(GameState::new(), &Action::player_join(id, id), &map);
        reduce(
            s,
            &Action::spawn_player(PlayerDescriptor::new(id, ""), Vec3::ZERO),
            &map,
        )
    }

    #[test]
    fn init_game_assigns_hex_ids_in_raster_order() {
        let map = TileMap::new(vec![vec![vec![2, 1, 3, 0, 5]]]).unwrap();
        let s = reduce(GameState::new(), &Action::init_game(), &map);
        let ids: Vec<&str> = s.entities.ids().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["80", "81", "82"]);
        assert!(s.entities.get("80").unwrap().wall.is_some());
        assert_eq!(
            s.entities.get("81").unwrap().pickup.unwrap().kind,
            PickupKind::Ammo
        );
        assert_eq!(s.player_spawns, vec![Vec3::new(2.0, 0.0, 0.0)]);
    }

    #[test]
    fn init_game_readmits_roster_as_ghosts() {
        let mut s = with_live("p1");
        s.bullet_seq = 9;
        let s = reduce(
            s,
            &Action::InitGame {
                players: vec!["p1".into(), "p2".into()],
                started_at_ms: Some(42),
            },
            &TileMap::empty(),
        );
        assert_eq!(s.started_at_ms, 42);
        assert_eq!(s.bullet_seq, 0);
        assert_eq!(s.roster.len(), 2);
        assert!(s.entities.get("p1").unwrap().ghost.is_some());
        assert_eq!(s.entities.get("p2").unwrap().player.as_ref().unwrap().name, "p2");
    }

    #[test]
    fn shot_payload_controls_the_bullet() {
        let s = with_live("p1");
        let action = Action::ShootBullet {
            id: "p1".into(),
            shot: Some(Shot {
                bullet_id: "b-7".into(),
                spread: Vec3::new(0.5, 0.0, 0.0),
                spin: Vec3::new(0.0, 1.0, 0.0),
            }),
        };
        let s = reduce(s, &action, &TileMap::empty());
        let b = s.entities.get("b-7").unwrap();
        assert_eq!(b.velocity.unwrap().linear.x, 0.5);
        assert_eq!(b.transform.unwrap().rotation.y, 1.0);
    }

    #[test]
    fn bullet_starts_below_head_and_ahead_of_shooter() {
        let s = reduce(with_live("p1"), &Action::shoot_bullet("p1"), &TileMap::empty());
        let b = s.entities.get("p1:0").unwrap();
        let pos = b.transform.unwrap().position;
        let top = factory::PLAYER_SIZE.y;
        assert!((pos.y - (top - MUZZLE_DROP)).abs() < 1e-5);
        assert!((pos.z + MUZZLE_OFFSET).abs() < 1e-5);
        assert_eq!(s.bullet_seq, 1);
    }

    #[test]
    fn shooting_spends_one_round() {
        let s = reduce(with_live("p1"), &Action::shoot_bullet("p1"), &TileMap::empty());
        let w = s.entities.get("p1").unwrap().weapon.unwrap();
        assert_eq!(w.loaded_ammo, factory::RIFLE.max_loaded_ammo - 1);
    }

    #[test]
    fn ghosts_cannot_shoot() {
        let s = reduce(
            GameState::new(),
            &Action::player_join("p1", "ann"),
            &TileMap::empty(),
        );
        let before = s.clone();
        let s = reduce(s, &Action::shoot_bullet("p1"), &TileMap::empty());
        assert_eq!(s, before);
    }

    #[test]
    fn set_input_ignores_unknown_keys() {
        let s = with_live("p1");
        let before = s.clone();
        let s = reduce(
            s,
            &Action::SetInput {
                id: "p1".into(),
                input: "fly".into(),
                value: InputValue::Button(true),
            },
            &TileMap::empty(),
        );
        assert_eq!(s, before);
    }

    #[test]
    fn set_aim_splits_yaw_and_pitch() {
        let s = reduce(
            with_live("p1"),
            &Action::SetAim {
                id: "p1".into(),
                vertical: 1.25,
                horizontal: -0.5,
            },
            &TileMap::empty(),
        );
        let p = s.entities.get("p1").unwrap();
        assert_eq!(p.transform.unwrap().rotation.y, 1.25);
        assert_eq!(p.head.unwrap().pitch, -0.5);
    }

    #[test]
    fn hit_on_resting_player_knocks_up() {
        let s = reduce(
            with_live("p1"),
            &Action::HitPlayer {
                id: "p1".into(),
                hp: 75,
            },
            &TileMap::empty(),
        );
        let p = s.entities.get("p1").unwrap();
        assert_eq!(p.health.unwrap().hp, 75);
        assert_eq!(p.velocity.unwrap().linear.y, KNOCKBACK_SPEED);
    }

    #[test]
    fn hit_in_the_air_has_no_knockback() {
        let mut s = with_live("p1");
        if let Some(t) = s.entities.get_mut("p1").and_then(|e| e.transform.as_mut()) {
            t.position.y = 10.0;
        }
        let s = reduce(
            s,
            &Action::HitPlayer {
                id: "p1".into(),
                hp: 10,
            },
            &TileMap::empty(),
        );
        assert_eq!(s.entities.get("p1").unwrap().velocity.unwrap().linear.y, 0.0);
    }

    #[test]
    fn camera_aspect_follows_viewport() {
        let map = TileMap::empty();
        let s = reduce(
            GameState::new(),
            &Action::SetCameraView {
                width: 1600.0,
                height: 900.0,
            },
            &map,
        );
        assert!((s.camera.aspect - 16.0 / 9.0).abs() < 1e-6);
        let s = reduce(
            s,
            &Action::SetCameraView {
                width: 100.0,
                height: 0.0,
            },
            &map,
        );
        assert!((s.camera.aspect - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn pickups_feed_the_player_and_disappear() {
        let map = TileMap::empty();
        let mut s = with_live("p1");
        if let Some(h) = s.entities.get_mut("p1").and_then(|e| e.health.as_mut()) {
            h.hp = 80;
        }
        s = reduce(
            s,
            &Action::SpawnHealthPack {
                id: "h".into(),
                position: Vec3::ZERO,
            },
            &map,
        );
        s = reduce(
            s,
            &Action::SpawnAmmoPack {
                id: "a".into(),
                position: Vec3::ZERO,
            },
            &map,
        );
        for pickup in ["h", "a"] {
            s = reduce(
                s,
                &Action::PickupItem {
                    id: "p1".into(),
                    pickup_id: pickup.into(),
                },
                &map,
            );
        }
        let p = s.entities.get("p1").unwrap();
        assert_eq!(p.health.unwrap().hp, factory::PLAYER_MAX_HP);
        assert_eq!(
            p.weapon.unwrap().reserved_ammo,
            factory::RIFLE_STARTING_RESERVE + factory::AMMO_PACK_ROUNDS
        );
        assert!(!s.entities.contains("h") && !s.entities.contains("a"));
    }

    #[test]
    fn ghost_cannot_collect_pickups() {
        let map = TileMap::empty();
        let mut s = reduce(GameState::new(), &Action::player_join("p1", "ann"), &map);
        s = reduce(
            s,
            &Action::SpawnAmmoPack {
                id: "a".into(),
                position: Vec3::ZERO,
            },
            &map,
        );
        let s = reduce(
            s,
            &Action::PickupItem {
                id: "p1".into(),
                pickup_id: "a".into(),
            },
            &map,
        );
        assert!(s.entities.contains("a"));
    }

    #[test]
    fn extreme_payloads_saturate() {
        let map = TileMap::empty();
        let mut s = reduce(
            with_live("p1"),
            &Action::HitPlayer {
                id: "p1".into(),
                hp: i32::MAX,
            },
            &map,
        );
        if let Some(w) = s.entities.get_mut("p1").and_then(|e| e.weapon.as_mut()) {
            w.reserved_ammo = u32::MAX - 1;
        }
        for (pickup, spawn) in [
            (
                "h",
                Action::SpawnHealthPack {
                    id: "h".into(),
                    position: Vec3::ZERO,
                },
            ),
            (
                "a",
                Action::SpawnAmmoPack {
                    id: "a".into(),
                    position: Vec3::ZERO,
                },
            ),
        ] {
            s = reduce(s, &spawn, &map);
            s = reduce(
                s,
                &Action::PickupItem {
                    id: "p1".into(),
                    pickup_id: pickup.into(),
                },
                &map,
            );
        }
        let p = s.entities.get("p1").unwrap();
        assert_eq!(p.health.unwrap().hp, factory::PLAYER_MAX_HP);
        assert_eq!(p.weapon.unwrap().reserved_ammo, u32::MAX);
    }

    #[test]
    fn remove_entity_spares_players() {
        let map = TileMap::empty();
        let s = reduce(with_live("p1"), &Action::shoot_bullet("p1"), &map);
        let s = reduce(s, &Action::RemoveEntity { id: "p1:0".into() }, &map);
        let s = reduce(s, &Action::RemoveEntity { id: "p1".into() }, &map);
        assert!(!s.entities.contains("p1:0"));
        assert!(s.entities.contains("p1"));
    }

    #[test]
    fn sync_all_players_reconciles_roster() {
        let map = TileMap::empty();
        let mut s = with_live("stale");
        s = reduce(s, &Action::player_join("keep", "kim"), &map);

        let mut alive = PlayerDescriptor::new("keep", "kim");
        alive.kills = 4;
        let mut waiting = PlayerDescriptor::new("new", "ned");
        waiting.respawn_timer = 2.0;

        let s = reduce(
            s,
            &Action::SyncAllPlayers {
                players: vec![alive, waiting],
            },
            &map,
        );

        assert!(!s.entities.contains("stale"));
        assert!(s.is_spawned("keep"));
        assert_eq!(s.entities.get("keep").unwrap().score.unwrap().kills, 4);
        let ghost = s.entities.get("new").unwrap();
        assert!(ghost.ghost.is_some());
        assert_eq!(ghost.player.as_ref().unwrap().respawn_timer, 2.0);
        assert_eq!(s.roster, vec![EntityId::from("keep"), EntityId::from("new")]);
    }

    #[test]
    fn sync_all_players_keeps_live_positions() {
        let map = TileMap::empty();
        let mut s = with_live("p1");
        if let Some(t) = s.entities.get_mut("p1").and_then(|e| e.transform.as_mut()) {
            t.position = Vec3::new(3.0, 0.0, 3.0);
        }
        let resync = s.sync_all_players();
        let s = reduce(s, &resync, &map);
        assert_eq!(
            s.entities.get("p1").unwrap().transform.unwrap().position,
            Vec3::new(3.0, 0.0, 3.0)
        );
    }
}
