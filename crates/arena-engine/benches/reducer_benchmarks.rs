//! Reducer and tick loop benchmarks.
//!
//! At 60 Hz the authority has 16.67ms per tick. These benchmarks track the
//! pieces that run every tick on the built-in arena: applying a single action,
//! a full authority tick with every player walking, and the state hash used
//! for checkpoints.
//!
//! Run with: `cargo bench --bench reducer_benchmarks`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use arena_engine::prelude::*;
use glam::Vec3;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn player_id(i: usize) -> EntityId {
    EntityId::new(format!("p{i}"))
}

/// The built-in arena with `players` live players at the origin.
fn arena_with_players(players: usize) -> (GameState, TileMap) {
    let map = TileMap::default_arena();
    let mut state = reduce(GameState::new(), &Action::init_game(), &map);
    for i in 0..players {
        let descriptor = PlayerDescriptor::new(player_id(i), format!("player {i}"));
        state = reduce(
            state,
            &Action::PlayerJoin {
                player: descriptor.clone(),
            },
            &map,
        );
        state = reduce(state, &Action::spawn_player(descriptor, Vec3::ZERO), &map);
    }
    (state, map)
}

/// An authority with `players` connected, spawned and holding "forward".
fn busy_authority(players: usize) -> Authority {
    let rules = RulesConfig::default();
    let tick = TickConfig {
        headless: true,
        ..TickConfig::default()
    };
    let mut authority = Authority::new(Arc::new(TileMap::default_arena()), tick, rules)
        .with_log(ActionLog::disabled());
    authority.start(0);
    for i in 0..players {
        authority.connect(player_id(i), format!("player {i}"));
    }
    for _ in 0..70 {
        authority.tick();
    }
    for i in 0..players {
        authority.receive(
            &player_id(i),
            Action::SetInput {
                id: player_id(i),
                input: "forward".into(),
                value: InputValue::Button(true),
            },
        );
    }
    authority.drain_outbox();
    authority
}

// ---------------------------------------------------------------------------
// Benchmark 1: one SYNC_PLAYER against a populated arena
// ---------------------------------------------------------------------------

fn bench_reduce_sync_player(c: &mut Criterion) {
    let (mut state, map) = arena_with_players(8);
    let mut x = 0.0f32;

    c.bench_function("reduce_sync_player_8_players", |b| {
        b.iter(|| {
            x += 0.01;
            let action = Action::SyncPlayer {
                id: player_id(0),
                x,
                y: 0.0,
                z: 4.0,
                vx: 1.0,
                vy: 0.0,
                vz: 0.0,
                rx: 0.0,
                ry: 0.5,
            };
            arena_engine::reducer::apply(&mut state, &action, &map);
            black_box(&state);
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 2: INIT_GAME, which rebuilds the whole arena
// ---------------------------------------------------------------------------

fn bench_init_game(c: &mut Criterion) {
    let map = TileMap::default_arena();

    c.bench_function("reduce_init_game_default_arena", |b| {
        b.iter(|| black_box(reduce(GameState::new(), &Action::init_game(), &map)));
    });
}

// ---------------------------------------------------------------------------
// Benchmark 3: full authority tick, scaling with player count
// ---------------------------------------------------------------------------

fn bench_authority_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("authority_tick");
    for players in [2, 8, 16] {
        let mut authority = busy_authority(players);
        group.bench_with_input(BenchmarkId::from_parameter(players), &players, |b, _| {
            b.iter(|| {
                authority.tick();
                black_box(authority.drain_outbox());
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark 4: state hash, taken at every checkpoint
// ---------------------------------------------------------------------------

fn bench_state_hash(c: &mut Criterion) {
    let (state, _) = arena_with_players(8);

    c.bench_function("state_hash_8_players", |b| {
        b.iter(|| black_box(state.state_hash()));
    });
}

criterion_group!(
    benches,
    bench_reduce_sync_player,
    bench_init_game,
    bench_authority_tick,
    bench_state_hash
);
criterion_main!(benches);
