//! Authority-only game rules.
//!
//! Nothing in this module mutates state. Systems look at a [`Frame`] and queue
//! actions; the [`Referee`] decides which client actions to accept, fills in
//! the random draws an action needs before it is broadcast, and reacts to
//! dispatched actions by scheduling their consequences (reload completion,
//! respawns, bullet expiry). Mirrors never run any of this; they only see the
//! resulting actions.

use arena_ecs::prelude::*;
use glam::Vec3;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use tracing::{debug, warn};

use crate::action::{Action, PlayerDescriptor, Shot};
use crate::config::RulesConfig;
use crate::physics;
use crate::state::GameState;
use crate::tick::{ticks_for, ActionBuffer, Frame, TickLoop};

pub const MOVEMENT_SYSTEM: &str = "movement";
pub const BULLET_SYSTEM: &str = "bullets";
pub const PICKUP_SYSTEM: &str = "pickups";
pub const RESYNC_SYSTEM: &str = "resync";

/// Register the standard systems in their canonical order.
pub fn install_systems(tick_loop: &mut TickLoop) {
    tick_loop.add_system(BULLET_SYSTEM, bullet_system);
    tick_loop.add_system(PICKUP_SYSTEM, pickup_system);
    tick_loop.add_system(MOVEMENT_SYSTEM, movement_system);
    tick_loop.add_system(RESYNC_SYSTEM, resync_system);
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Integrate every body and publish moved ones as `SYNC_PLAYER`.
pub fn movement_system(frame: &Frame<'_>, out: &mut ActionBuffer) {
    let entities = &frame.state.entities;
    let movers = ComponentSet::TRANSFORM | ComponentSet::VELOCITY;
    for entity in entities.with_all(movers) {
        let Some(body) = physics::step_body(entities, entity, frame.dt) else {
            continue;
        };
        let mut moved = entity.clone();
        if let Some(t) = moved.transform.as_mut() {
            t.position = body.position;
        }
        if let Some(v) = moved.velocity.as_mut() {
            v.linear = body.velocity;
        }
        out.push(Action::sync_player(&moved));
    }
}

/// Resolve projectile impacts against walls and live players.
///
/// Damage from several bullets hitting the same player in one tick is summed
/// into a single `HIT_PLAYER`, or a `KILL_PLAYER` when it is lethal. The first
/// bullet that hits a victim owns the kill. Each player whose score changed
/// gets one `SYNC_PLAYER_SCORE` ahead of the kills.
pub fn bullet_system(frame: &Frame<'_>, out: &mut ActionBuffer) {
    let entities = &frame.state.entities;
    let mut wounds: Vec<(EntityId, i32, EntityId)> = Vec::new();

    for bullet in entities.group(ComponentKind::Damage) {
        let (Some(damage), Some(transform), Some(collider)) =
            (&bullet.damage, bullet.transform, bullet.collider)
        else {
            continue;
        };
        let aabb = collider.aabb(transform.position);

        if physics::blocking_wall(entities, &aabb).is_some() {
            out.push(Action::RemoveEntity {
                id: bullet.id.clone(),
            });
            continue;
        }

        let victim = entities.group(ComponentKind::Health).find(|target| {
            target.id != damage.creator_id
                && target.ghost.is_none()
                && match (target.transform, target.collider) {
                    (Some(t), Some(c)) => c.aabb(t.position).intersects(&aabb),
                    _ => false,
                }
        });
        let Some(victim) = victim else { continue };

        out.push(Action::RemoveEntity {
            id: bullet.id.clone(),
        });
        match wounds.iter_mut().find(|(id, _, _)| *id == victim.id) {
            Some((_, total, _)) => *total = total.saturating_add(damage.amount),
            None => wounds.push((victim.id.clone(), damage.amount, damage.creator_id.clone())),
        }
    }

    // Score changes are totalled per player so one killer with two kills, or
    // two players trading kills, end the tick with every kill and death.
    let mut tallies: Vec<(EntityId, u32, u32)> = Vec::new();
    let mut tally = |id: &EntityId, kills: u32, deaths: u32| {
        match tallies.iter_mut().find(|(t, _, _)| t == id) {
            Some((_, k, d)) => {
                *k = k.saturating_add(kills);
                *d = d.saturating_add(deaths);
            }
            None => tallies.push((id.clone(), kills, deaths)),
        }
    };
    let mut killed = Vec::new();

    for (victim_id, total, killer_id) in wounds {
        let Some(victim) = entities.get(victim_id.as_str()) else {
            continue;
        };
        let Some(health) = victim.health else { continue };
        let hp = health.hp.saturating_sub(total);
        if hp > 0 {
            out.push(Action::HitPlayer { id: victim_id, hp });
            continue;
        }
        if entities
            .get(killer_id.as_str())
            .is_some_and(|k| k.score.is_some())
        {
            tally(&killer_id, 1, 0);
        }
        tally(&victim_id, 0, 1);
        killed.push(victim_id);
    }

    for (id, kills, deaths) in tallies {
        let score = entities
            .get(id.as_str())
            .and_then(|e| e.score)
            .unwrap_or_default();
        out.push(Action::SyncPlayerScore {
            id,
            kills: score.kills.saturating_add(kills),
            deaths: score.deaths.saturating_add(deaths),
        });
    }
    for id in killed {
        out.push(Action::KillPlayer { id });
    }
}

/// Hand each pickup to the first live player touching it who can use it,
/// and schedule the pickup's return.
pub fn pickup_system(frame: &Frame<'_>, out: &mut ActionBuffer) {
    let entities = &frame.state.entities;
    for item in entities.group(ComponentKind::Pickup) {
        let (Some(pickup), Some(transform), Some(collider)) =
            (item.pickup, item.transform, item.collider)
        else {
            continue;
        };
        let aabb = collider.aabb(transform.position);
        let collector = entities.group(ComponentKind::Player).find(|p| {
            let wants = match pickup.kind {
                PickupKind::Ammo => p.weapon.is_some(),
                PickupKind::Health => p.health.is_some_and(|h| h.hp < h.max_hp),
            };
            wants
                && p.ghost.is_none()
                && match (p.transform, p.collider) {
                    (Some(t), Some(c)) => c.aabb(t.position).intersects(&aabb),
                    _ => false,
                }
        });
        let Some(collector) = collector else { continue };

        out.push(Action::PickupItem {
            id: collector.id.clone(),
            pickup_id: item.id.clone(),
        });
        let respawn = match pickup.kind {
            PickupKind::Ammo => Action::SpawnAmmoPack {
                id: item.id.clone(),
                position: transform.position,
            },
            PickupKind::Health => Action::SpawnHealthPack {
                id: item.id.clone(),
                position: transform.position,
            },
        };
        out.push_after(frame.ticks_for(frame.rules.pickup_respawn_delay), respawn);
    }
}

/// Periodic roster snapshot so mirrors repair any drift.
pub fn resync_system(frame: &Frame<'_>, out: &mut ActionBuffer) {
    let interval = frame.rules.resync_interval_ticks;
    if interval == 0 || frame.tick == 0 || frame.tick % interval != 0 {
        return;
    }
    if frame.state.roster.is_empty() {
        return;
    }
    out.push(frame.state.sync_all_players());
}

// ---------------------------------------------------------------------------
// Referee
// ---------------------------------------------------------------------------

/// Trust boundary and randomness source of the authority.
pub struct Referee {
    rules: RulesConfig,
    rng: Pcg64Mcg,
}

impl Referee {
    pub fn new(rules: RulesConfig) -> Self {
        let rng = Pcg64Mcg::seed_from_u64(rules.seed);
        Self { rules, rng }
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Filter a client-submitted action.
    ///
    /// Only input, aim, shoot and reload-start are accepted, always on behalf
    /// of the sender. Shots are refused while reloading or with an empty
    /// magazine; reloads are refused when they would achieve nothing.
    pub fn admit(&self, state: &GameState, sender: &EntityId, action: Action) -> Option<Action> {
        let kind = action.kind();
        let admitted = match action {
            Action::SetInput { input, value, .. } => Action::SetInput {
                id: sender.clone(),
                input,
                value,
            },
            Action::SetAim {
                vertical,
                horizontal,
                ..
            } => Action::SetAim {
                id: sender.clone(),
                vertical,
                horizontal,
            },
            Action::ShootBullet { .. } => {
                let weapon = state.entities.get(sender.as_str()).and_then(|e| e.weapon);
                if !weapon.is_some_and(|w| w.loaded_ammo > 0 && !w.is_reloading()) {
                    debug!(player = %sender, "shot refused");
                    return None;
                }
                // Draws are the authority's business; client values are dropped.
                Action::ShootBullet {
                    id: sender.clone(),
                    shot: None,
                }
            }
            Action::ReloadStart { .. } => {
                let weapon = state.entities.get(sender.as_str()).and_then(|e| e.weapon);
                let useful = weapon.is_some_and(|w| {
                    !w.is_reloading()
                        && w.reserved_ammo > 0
                        && w.loaded_ammo < w.kind.max_loaded_ammo
                });
                if !useful {
                    debug!(player = %sender, "reload refused");
                    return None;
                }
                Action::ReloadStart { id: sender.clone() }
            }
            _ => {
                warn!(player = %sender, kind, "client sent a server-only action");
                return None;
            }
        };
        Some(admitted)
    }

    /// Fill in the random draws `action` needs so every mirror applies the
    /// same thing.
    pub fn augment(&mut self, state: &GameState, action: Action) -> Action {
        match action {
            Action::ShootBullet { id, shot: None } => {
                let spread = self.rules.max_spread;
                let mut jitter = || {
                    if spread > 0.0 {
                        self.rng.gen_range(-spread..=spread)
                    } else {
                        0.0
                    }
                };
                let spread = Vec3::new(jitter(), jitter(), jitter());
                let spin = Vec3::new(
                    self.rng.gen_range(0.0..std::f32::consts::TAU),
                    self.rng.gen_range(0.0..std::f32::consts::TAU),
                    self.rng.gen_range(0.0..std::f32::consts::TAU),
                );
                let bullet_id = EntityId::new(format!("{id}:{}", state.bullet_seq));
                Action::ShootBullet {
                    id,
                    shot: Some(Shot {
                        bullet_id,
                        spread,
                        spin,
                    }),
                }
            }
            other => other,
        }
    }

    /// Whether a scheduled or system action still makes sense against the
    /// current state.
    pub fn confirm(&self, state: &GameState, action: &Action) -> bool {
        let entities = &state.entities;
        match action {
            Action::SpawnPlayer { player, .. } => entities
                .get(player.id.as_str())
                .is_some_and(|e| e.ghost.is_some()),
            Action::ReloadDone { id } => entities
                .get(id.as_str())
                .and_then(|e| e.weapon)
                .is_some_and(|w| w.is_reloading()),
            Action::RemoveEntity { id } => entities.contains(id.as_str()),
            Action::SpawnAmmoPack { id, .. } | Action::SpawnHealthPack { id, .. } => {
                !entities.contains(id.as_str())
            }
            _ => true,
        }
    }

    /// Queue the consequences of an action that was just applied.
    ///
    /// `state` is the state after the action; `dt` converts delays to ticks.
    pub fn react(&mut self, state: &GameState, action: &Action, dt: f32, out: &mut ActionBuffer) {
        let entities = &state.entities;
        match action {
            Action::InitGame { .. } => {
                for id in &state.roster {
                    self.schedule_spawn(state, id, self.rules.join_spawn_delay, dt, out);
                }
            }
            Action::PlayerJoin { player } => {
                self.schedule_spawn(state, &player.id, self.rules.join_spawn_delay, dt, out);
            }
            Action::KillPlayer { id } => {
                self.schedule_spawn(state, id, self.rules.respawn_delay, dt, out);
            }
            Action::ShootBullet { id, shot } => {
                if let Some(shot) = shot {
                    out.push_after(
                        ticks_for(self.rules.bullet_lifetime, dt),
                        Action::RemoveEntity {
                            id: shot.bullet_id.clone(),
                        },
                    );
                }
                let empty = entities.get(id.as_str()).and_then(|e| e.weapon).is_some_and(|w| {
                    w.loaded_ammo == 0 && w.reserved_ammo > 0 && !w.is_reloading()
                });
                if empty {
                    out.push(Action::ReloadStart { id: id.clone() });
                }
            }
            Action::ReloadStart { id } => {
                if let Some(weapon) = entities.get(id.as_str()).and_then(|e| e.weapon) {
                    out.push_after(
                        ticks_for(weapon.reload_timer, dt),
                        Action::ReloadDone { id: id.clone() },
                    );
                }
            }
            _ => {}
        }
    }

    fn schedule_spawn(
        &mut self,
        state: &GameState,
        id: &EntityId,
        delay: f32,
        dt: f32,
        out: &mut ActionBuffer,
    ) {
        let Some(player) = state
            .entities
            .get(id.as_str())
            .and_then(PlayerDescriptor::from_entity)
        else {
            return;
        };
        let spawn = self.pick_spawn(state);
        out.push_after(ticks_for(delay, dt), Action::SpawnPlayer { player, spawn });
    }

    /// A random map spawn point, or the origin when the map has none.
    pub fn pick_spawn(&mut self, state: &GameState) -> Vec3 {
        state
            .player_spawns
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Vec3::ZERO)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory;
    use crate::map::TileMap;
    use crate::reducer::reduce;

    const DT: f32 = 1.0 / 60.0;

    fn live(ids: &[&str]) -> GameState {
        let map = TileMap::empty();
        let mut s = GameState::new();
        for id in ids {
            s = reduce(s, &Action::player_join(*id, *id), &map);
            s = reduce(
                s,
                &Action::spawn_player(PlayerDescriptor::new(*id, ""), Vec3::ZERO),
                &map,
            );
        }
        s
    }

    fn run(system: fn(&Frame<'_>, &mut ActionBuffer), state: &GameState) -> (Vec<Action>, Vec<(u64, Action)>) {
        let rules = RulesConfig::default();
        let frame = Frame {
            state,
            rules: &rules,
            tick: 1,
            dt: DT,
        };
        let mut out = ActionBuffer::new();
        system(&frame, &mut out);
        out.into_parts()
    }

    fn place_bullet(state: &mut GameState, id: &str, owner: &str, at: Vec3) {
        let mut bullet = factory::bullet(id, owner.into());
        bullet.transform = Some(Transform::at(at));
        state.entities.add(bullet);
    }

    fn move_to(state: &mut GameState, id: &str, at: Vec3) {
        if let Some(t) = state.entities.get_mut(id).and_then(|e| e.transform.as_mut()) {
            t.position = at;
        }
    }

    #[test]
    fn bullets_ignore_their_owner() {
        let mut s = live(&["p1"]);
        place_bullet(&mut s, "b", "p1", Vec3::new(0.0, 1.0, 0.0));
        let (now, _) = run(bullet_system, &s);
        assert!(now.is_empty());
    }

    #[test]
    fn bullet_hit_wounds_victim() {
        let mut s = live(&["p1", "p2"]);
        move_to(&mut s, "p1", Vec3::new(10.0, 0.0, 0.0));
        place_bullet(&mut s, "b", "p1", Vec3::new(0.0, 1.0, 0.0));
        let (now, _) = run(bullet_system, &s);
        assert_eq!(
            now,
            vec![
                Action::RemoveEntity { id: "b".into() },
                Action::HitPlayer {
                    id: "p2".into(),
                    hp: factory::PLAYER_MAX_HP - factory::BULLET_DAMAGE,
                },
            ]
        );
    }

    #[test]
    fn lethal_hit_scores_and_kills() {
        let mut s = live(&["p1", "p2"]);
        move_to(&mut s, "p1", Vec3::new(10.0, 0.0, 0.0));
        if let Some(h) = s.entities.get_mut("p2").and_then(|e| e.health.as_mut()) {
            h.hp = 40;
        }
        place_bullet(&mut s, "b1", "p1", Vec3::new(0.0, 1.0, 0.0));
        place_bullet(&mut s, "b2", "p1", Vec3::new(0.1, 1.0, 0.0));
        let (now, _) = run(bullet_system, &s);
        assert_eq!(
            now,
            vec![
                Action::RemoveEntity { id: "b1".into() },
                Action::RemoveEntity { id: "b2".into() },
                Action::SyncPlayerScore {
                    id: "p1".into(),
                    kills: 1,
                    deaths: 0,
                },
                Action::SyncPlayerScore {
                    id: "p2".into(),
                    kills: 0,
                    deaths: 1,
                },
                Action::KillPlayer { id: "p2".into() },
            ]
        );
    }

    #[test]
    fn two_kills_in_one_tick_both_count() {
        let mut s = live(&["k", "v1", "v2"]);
        move_to(&mut s, "k", Vec3::new(10.0, 0.0, 0.0));
        move_to(&mut s, "v2", Vec3::new(-10.0, 0.0, 0.0));
        for id in ["v1", "v2"] {
            if let Some(h) = s.entities.get_mut(id).and_then(|e| e.health.as_mut()) {
                h.hp = 10;
            }
        }
        place_bullet(&mut s, "b1", "k", Vec3::new(0.0, 1.0, 0.0));
        place_bullet(&mut s, "b2", "k", Vec3::new(-10.0, 1.0, 0.0));
        let (now, _) = run(bullet_system, &s);

        let after = now
            .iter()
            .fold(s, |state, action| reduce(state, action, &TileMap::empty()));
        let score = |id: &str| after.entities.get(id).and_then(|e| e.score).unwrap();
        assert_eq!((score("k").kills, score("k").deaths), (2, 0));
        assert_eq!((score("v1").kills, score("v1").deaths), (0, 1));
        assert_eq!((score("v2").kills, score("v2").deaths), (0, 1));
        assert_eq!(
            now.iter()
                .filter(|a| matches!(a, Action::SyncPlayerScore { id, .. } if id.as_str() == "k"))
                .count(),
            1
        );
    }

    #[test]
    fn trading_kills_keeps_both_scores() {
        let mut s = live(&["a", "b"]);
        move_to(&mut s, "b", Vec3::new(10.0, 0.0, 0.0));
        for id in ["a", "b"] {
            if let Some(h) = s.entities.get_mut(id).and_then(|e| e.health.as_mut()) {
                h.hp = 10;
            }
        }
        place_bullet(&mut s, "from-a", "a", Vec3::new(10.0, 1.0, 0.0));
        place_bullet(&mut s, "from-b", "b", Vec3::new(0.0, 1.0, 0.0));
        let (now, _) = run(bullet_system, &s);

        let first_kill = now
            .iter()
            .position(|a| matches!(a, Action::KillPlayer { .. }))
            .unwrap();
        assert!(now[first_kill..]
            .iter()
            .all(|a| matches!(a, Action::KillPlayer { .. })));

        let after = now
            .iter()
            .fold(s, |state, action| reduce(state, action, &TileMap::empty()));
        for id in ["a", "b"] {
            let score = after.entities.get(id).and_then(|e| e.score).unwrap();
            assert_eq!((score.kills, score.deaths), (1, 1), "{id}");
            assert!(after.entities.get(id).unwrap().ghost.is_some());
        }
    }

    #[test]
    fn walls_stop_bullets() {
        let mut s = live(&[]);
        s.entities.add(factory::wall("80", Vec3::ZERO));
        place_bullet(&mut s, "b", "p1", Vec3::new(0.0, 1.0, 0.0));
        let (now, _) = run(bullet_system, &s);
        assert_eq!(now, vec![Action::RemoveEntity { id: "b".into() }]);
    }

    #[test]
    fn pickup_is_collected_and_rescheduled() {
        let mut s = live(&["p1"]);
        s.entities.add(factory::ammo_pickup("a", Vec3::ZERO));
        let (now, later) = run(pickup_system, &s);
        assert_eq!(
            now,
            vec![Action::PickupItem {
                id: "p1".into(),
                pickup_id: "a".into(),
            }]
        );
        assert_eq!(later.len(), 1);
        assert!(matches!(later[0].1, Action::SpawnAmmoPack { .. }));
    }

    #[test]
    fn healthy_players_leave_health_packs() {
        let mut s = live(&["p1"]);
        s.entities.add(factory::health_pickup("h", Vec3::ZERO));
        let (now, _) = run(pickup_system, &s);
        assert!(now.is_empty());
    }

    #[test]
    fn movement_publishes_falling_bodies_only() {
        let mut s = live(&["grounded", "airborne"]);
        move_to(&mut s, "airborne", Vec3::new(5.0, 6.0, 5.0));
        let (now, _) = run(movement_system, &s);
        assert_eq!(now.len(), 1);
        assert_eq!(now[0].target().map(EntityId::as_str), Some("airborne"));
    }

    #[test]
    fn resync_fires_on_interval() {
        let s = live(&["p1"]);
        let rules = RulesConfig {
            resync_interval_ticks: 10,
            ..Default::default()
        };
        let mut fired = Vec::new();
        for tick in 0..=20 {
            let frame = Frame {
                state: &s,
                rules: &rules,
                tick,
                dt: DT,
            };
            let mut out = ActionBuffer::new();
            resync_system(&frame, &mut out);
            if !out.is_empty() {
                fired.push(tick);
            }
        }
        assert_eq!(fired, vec![10, 20]);
    }

    #[test]
    fn admit_rewrites_sender_and_drops_server_actions() {
        let s = live(&["p1"]);
        let referee = Referee::new(RulesConfig::default());
        let sender = EntityId::from("p1");

        let aim = Action::SetAim {
            id: "someone-else".into(),
            vertical: 1.0,
            horizontal: 0.0,
        };
        assert_eq!(
            referee.admit(&s, &sender, aim).and_then(|a| a.target().cloned()),
            Some(sender.clone())
        );
        assert!(referee
            .admit(&s, &sender, Action::KillPlayer { id: "p1".into() })
            .is_none());
        assert!(referee.admit(&s, &sender, Action::init_game()).is_none());
    }

    #[test]
    fn admit_refuses_dry_shots_and_pointless_reloads() {
        let mut s = live(&["p1"]);
        let referee = Referee::new(RulesConfig::default());
        let sender = EntityId::from("p1");
        // Full magazine: reload is pointless.
        assert!(referee
            .admit(&s, &sender, Action::ReloadStart { id: sender.clone() })
            .is_none());
        if let Some(w) = s.entities.get_mut("p1").and_then(|e| e.weapon.as_mut()) {
            w.loaded_ammo = 0;
        }
        assert!(referee
            .admit(&s, &sender, Action::shoot_bullet("p1"))
            .is_none());
        assert!(referee
            .admit(&s, &sender, Action::ReloadStart { id: sender.clone() })
            .is_some());
    }

    #[test]
    fn augment_is_seeded() {
        let s = live(&["p1"]);
        let mut a = Referee::new(RulesConfig::default());
        let mut b = Referee::new(RulesConfig::default());
        let shot_a = a.augment(&s, Action::shoot_bullet("p1"));
        let shot_b = b.augment(&s, Action::shoot_bullet("p1"));
        assert_eq!(shot_a, shot_b);
        match shot_a {
            Action::ShootBullet { shot: Some(shot), .. } => {
                assert_eq!(shot.bullet_id.as_str(), "p1:0");
                assert!(shot.spread.abs().max_element() <= RulesConfig::default().max_spread);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn react_schedules_reload_completion() {
        let map = TileMap::empty();
        let s = reduce(live(&["p1"]), &Action::ReloadStart { id: "p1".into() }, &map);
        let mut referee = Referee::new(RulesConfig::default());
        let mut out = ActionBuffer::new();
        referee.react(&s, &Action::ReloadStart { id: "p1".into() }, DT, &mut out);
        let (_, later) = out.into_parts();
        assert_eq!(
            later,
            vec![(
                ticks_for(factory::RIFLE.reload_speed, DT),
                Action::ReloadDone { id: "p1".into() }
            )]
        );
    }

    #[test]
    fn confirm_drops_spawns_for_live_players() {
        let s = live(&["p1"]);
        let referee = Referee::new(RulesConfig::default());
        let spawn = Action::spawn_player(PlayerDescriptor::new("p1", ""), Vec3::ZERO);
        assert!(!referee.confirm(&s, &spawn));
        assert!(!referee.confirm(&s, &Action::RemoveEntity { id: "gone".into() }));
        assert!(referee.confirm(&s, &Action::player_leave("p1")));
    }
}
