use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hole_in_the_wall::config::ServerConfig;
use hole_in_the_wall::demo::DemoCrowd;
use hole_in_the_wall::game::arena_manager::ArenaManager;
use hole_in_the_wall::game::constants::arena::DEFAULT_SIZE;
use hole_in_the_wall::game::constants::sim::{
    OVERRUN_WARN_INTERVAL_SECS, TICK_DURATION_MS, TICK_RATE,
};
use hole_in_the_wall::game::wall_manager::WallManager;
use hole_in_the_wall::host::{Location, MemoryPlayerHost};
use hole_in_the_wall::lobby::game::GameServices;
use hole_in_the_wall::lobby::manager::GameManager;
use hole_in_the_wall::metrics::{self, Metrics};
use hole_in_the_wall::stats::JsonlResultWriter;
use hole_in_the_wall::util::vec3::Vec3;
use hole_in_the_wall::world::MemoryWorld;

const WORLD: &str = "world";
const DEFAULT_ARENA: &str = "default";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Hole in the Wall server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    info!(
        "Configuration loaded: data_dir={}, max_games={}, players={}-{}",
        config.data_dir.display(),
        config.max_games,
        config.game.min_players,
        config.game.max_players
    );

    let world = Arc::new(MemoryWorld::with_world(WORLD));
    let host = Arc::new(MemoryPlayerHost::new());

    let mut arenas = ArenaManager::with_file(world.clone(), config.game.arena, config.arenas_file());
    if arenas.arena_names().is_empty() {
        let center = Location::new(WORLD, Vec3::new(0.0, 64.0, 0.0));
        if let Err(e) = arenas.create_arena(DEFAULT_ARENA, center, DEFAULT_SIZE) {
            warn!("Could not create default arena: {}", e);
        }
    }
    let arenas = Arc::new(RwLock::new(arenas));

    let results = Arc::new(JsonlResultWriter::spawn(config.results_file())?);
    let services = GameServices {
        world: world.clone(),
        host: host.clone(),
        walls: Arc::new(WallManager::new(config.game.walls.clone())),
        results: results.clone(),
    };
    let manager = Arc::new(Mutex::new(GameManager::new(
        arenas.clone(),
        services,
        config.game.clone(),
        config.max_games,
    )));

    let metrics = Arc::new(Metrics::new());
    if config.metrics_port != 0 {
        let metrics_clone = metrics.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let mut crowd = (config.demo_players > 0).then(|| {
        info!("Enrolling {} demo players", config.demo_players);
        let lobby = Location::new(WORLD, Vec3::new(0.0, 64.0, 0.0));
        DemoCrowd::enrol(host.clone(), config.demo_players, &lobby, rand::random())
    });

    let tick_loop = {
        let manager = manager.clone();
        let arenas = arenas.clone();
        let metrics = metrics.clone();
        async move {
            let budget = Duration::from_millis(TICK_DURATION_MS);
            let mut ticker = interval(budget);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_overrun_warning: Option<Instant> = None;

            info!("Tick loop started at {} Hz", TICK_RATE);
            loop {
                ticker.tick().await;
                let started = Instant::now();

                let (census, report) = {
                    let mut manager = manager.lock();
                    if let Some(crowd) = crowd.as_mut() {
                        crowd.step(&mut manager);
                    }
                    let report = manager.tick();
                    (manager.census(), report)
                };

                let elapsed = started.elapsed();
                metrics.record_tick_time(elapsed);
                metrics.observe(&census, &report);
                metrics
                    .arenas_active
                    .store(arenas.read().arenas().len() as u64, Ordering::Relaxed);

                if elapsed > budget {
                    let due = last_overrun_warning.map_or(true, |at| {
                        at.elapsed() >= Duration::from_secs(OVERRUN_WARN_INTERVAL_SECS)
                    });
                    if due {
                        warn!(
                            "Tick took {:?} (budget {:?}) with {} games, {} walls",
                            elapsed, budget, census.games, census.active_walls
                        );
                        last_overrun_warning = Some(Instant::now());
                    }
                }

                if metrics.tick_count.load(Ordering::Relaxed) % (TICK_RATE as u64 * 30) == 0 {
                    info!(
                        "{} games ({} active), {} players ({} alive), {} walls",
                        census.games,
                        census.active,
                        census.players,
                        census.alive_players,
                        census.active_walls
                    );
                }
            }
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        _ = tick_loop => {}
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    // Cleanup
    manager.lock().stop_all();
    if let Err(e) = arenas.read().save() {
        error!("Failed to save arenas: {}", e);
    }
    if let Err(e) = results.flush() {
        error!("Failed to flush match results: {}", e);
    }
    results.shutdown();
    info!("{} match results written, server stopped", results.written());

    Ok(())
}
