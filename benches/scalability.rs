//! Scalability benchmarks for the Hole in the Wall server
//!
//! Measures pattern generation, wall movement and full manager ticks with
//! many concurrent games.
//!
//! Run with: cargo bench --bench scalability

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parking_lot::RwLock;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use hole_in_the_wall::config::{ArenaValidationConfig, GameConfig, WallConfig};
use hole_in_the_wall::game::arena::Arena;
use hole_in_the_wall::game::arena_manager::ArenaManager;
use hole_in_the_wall::game::pattern::{self, PatternKind};
use hole_in_the_wall::game::wall::Wall;
use hole_in_the_wall::game::wall_manager::WallManager;
use hole_in_the_wall::host::{Location, MemoryPlayerHost};
use hole_in_the_wall::lobby::game::GameServices;
use hole_in_the_wall::lobby::manager::GameManager;
use hole_in_the_wall::stats::MemoryResultSink;
use hole_in_the_wall::util::vec3::Vec3;
use hole_in_the_wall::world::MemoryWorld;

/// Arenas laid out on a line far enough apart that walls never overlap
fn arena_spacing(i: usize) -> Vec3 {
    Vec3::new(i as f64 * 100.0, 64.0, 0.0)
}

/// A manager with `games` active matches of four players who never get hit
fn create_manager(games: usize) -> (GameManager, Arc<MemoryPlayerHost>) {
    let world = Arc::new(MemoryWorld::with_world("world"));
    let mut arenas = ArenaManager::new(world.clone(), ArenaValidationConfig::default());
    let host = Arc::new(MemoryPlayerHost::new());
    let services = GameServices {
        world: world.clone(),
        host: host.clone(),
        walls: Arc::new(WallManager::new(WallConfig::default())),
        results: Arc::new(MemoryResultSink::new()),
    };
    let config = GameConfig {
        min_players: 4,
        max_players: 4,
        countdown_seconds: 0,
        ..GameConfig::default()
    };

    let mut arena_list = Vec::with_capacity(games);
    for i in 0..games {
        let center = Location::new("world", arena_spacing(i));
        arena_list.push(arenas.create_arena(&format!("arena{}", i), center, 15).unwrap());
    }

    let mut manager = GameManager::new(Arc::new(RwLock::new(arenas)), services, config, games)
        .with_seed(42);
    for (i, arena) in arena_list.into_iter().enumerate() {
        let game_id = manager.create_game(arena).unwrap();
        let game = manager.game_mut(game_id).unwrap();
        for p in 0..4 {
            let name = format!("P{}-{}", i, p);
            let id = host.add(&name, Some(Location::new("world", arena_spacing(i))));
            game.add_player(id, &name).unwrap();
        }
    }

    // Countdown of zero: one tick starts every game
    manager.tick();
    for game in manager.games() {
        for id in game.player_ids() {
            host.set_position(id, Vec3::new(0.0, 200.0, 0.0));
        }
    }

    (manager, host)
}

/// Benchmark grid generation for every pattern
fn bench_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_generate");
    group.sample_size(50);
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for kind in PatternKind::ALL {
        group.bench_with_input(BenchmarkId::new(kind.name(), "17x9"), &kind, |b, kind| {
            b.iter(|| black_box(pattern::generate(*kind, 17, 9, &mut rng)))
        });
    }
    group.finish();
}

/// Benchmark a single wall sweeping across an arena
fn bench_wall_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("wall_tick");
    group.sample_size(50);

    for size in [10u32, 20, 30] {
        let world = MemoryWorld::with_world("world");
        let arena = Arena::new("bench", Location::new("world", Vec3::new(0.0, 64.0, 0.0)), size);
        arena.build(&world).unwrap();
        let arena = Arc::new(arena);
        let mut rng = ChaCha8Rng::seed_from_u64(size as u64);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("sweep", size), &size, |b, _| {
            b.iter(|| {
                let spawn = arena.wall_spawn_points()[0];
                let mut wall = Wall::spawn(
                    "bench",
                    arena.clone(),
                    PatternKind::RandomHoles,
                    spawn,
                    8.0,
                    &mut rng,
                    &world,
                );
                while wall.tick(&world) {}
                wall.remove(&world);
                black_box(wall.age())
            })
        });
    }
    group.finish();
}

/// Benchmark a full manager tick at various game counts
fn bench_manager_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_tick");
    group.sample_size(30);

    for games in [10, 50, 100, 250] {
        let (mut manager, _host) = create_manager(games);

        group.throughput(Throughput::Elements(games as u64));
        group.bench_with_input(BenchmarkId::new("games", games), &games, |b, _| {
            b.iter(|| black_box(manager.tick()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_patterns, bench_wall_tick, bench_manager_tick);

criterion_main!(benches);
