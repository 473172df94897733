use std::path::PathBuf;
use std::str::FromStr;

use crate::game::constants::{arena, game};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding arena definitions and match results
    pub data_dir: PathBuf,
    /// Port for the metrics endpoint (0 disables it)
    pub metrics_port: u16,
    /// Maximum number of concurrent games
    pub max_games: usize,
    /// Simulated participants enrolled at startup
    pub demo_players: usize,
    /// Match rules
    pub game: GameConfig,
}

/// Per-match rules shared by every game
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
    /// Move to STARTING automatically once `min_players` have joined
    pub auto_start: bool,
    /// STARTING countdown before the match begins
    pub countdown_seconds: u32,
    pub walls: WallConfig,
    pub arena: ArenaValidationConfig,
}

/// Wall speed and difficulty scaling
#[derive(Debug, Clone, PartialEq)]
pub struct WallConfig {
    /// Blocks per second at round 0
    pub base_speed: f64,
    /// Added per round
    pub speed_increment: f64,
    pub max_speed: f64,
    /// Ticks between periodic spawns
    pub spawn_interval_ticks: u32,
    /// First round that draws ADVANCED patterns
    pub basic_to_advanced: u32,
    /// First round that draws EXPERT patterns
    pub advanced_to_expert: u32,
}

/// Bounds enforced when creating arenas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaValidationConfig {
    pub min_platform_size: u32,
    pub max_platform_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            metrics_port: 9090,
            max_games: 100,
            demo_players: 0,
            game: GameConfig::default(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 20,
            auto_start: true,
            countdown_seconds: game::COUNTDOWN_SECONDS,
            walls: WallConfig::default(),
            arena: ArenaValidationConfig::default(),
        }
    }
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            base_speed: 2.0,
            speed_increment: 0.2,
            max_speed: 8.0,
            spawn_interval_ticks: game::WALL_SPAWN_INTERVAL,
            basic_to_advanced: 5,
            advanced_to_expert: 10,
        }
    }
}

impl Default for ArenaValidationConfig {
    fn default() -> Self {
        Self {
            min_platform_size: arena::DEFAULT_MIN_SIZE,
            max_platform_size: arena::DEFAULT_MAX_SIZE,
        }
    }
}

/// Parse an env var, warning and keeping the current value when it is invalid
fn env_override<T: FromStr>(key: &str, target: &mut T, accept: impl Fn(&T) -> bool) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(parsed) if accept(&parsed) => *target = parsed,
        Ok(_) => tracing::warn!("{} '{}' is out of range, using default", key, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", key, raw),
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("HITW_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        env_override("HITW_METRICS_PORT", &mut config.metrics_port, |_| true);
        env_override("HITW_MAX_GAMES", &mut config.max_games, |v| (1..=10_000).contains(v));
        env_override("HITW_DEMO_PLAYERS", &mut config.demo_players, |v| *v <= 1000);

        let g = &mut config.game;
        env_override("HITW_MIN_PLAYERS", &mut g.min_players, |v| *v >= 1);
        env_override("HITW_MAX_PLAYERS", &mut g.max_players, |v| *v >= 1);
        env_override("HITW_AUTO_START", &mut g.auto_start, |_| true);
        env_override("HITW_COUNTDOWN_SECONDS", &mut g.countdown_seconds, |v| *v <= 300);

        let w = &mut g.walls;
        env_override("HITW_WALL_BASE_SPEED", &mut w.base_speed, |v| *v > 0.0);
        env_override("HITW_WALL_SPEED_INCREMENT", &mut w.speed_increment, |v| *v >= 0.0);
        env_override("HITW_WALL_MAX_SPEED", &mut w.max_speed, |v| *v > 0.0);
        env_override("HITW_WALL_SPAWN_INTERVAL", &mut w.spawn_interval_ticks, |v| *v > 0);
        env_override("HITW_BASIC_TO_ADVANCED", &mut w.basic_to_advanced, |_| true);
        env_override("HITW_ADVANCED_TO_EXPERT", &mut w.advanced_to_expert, |_| true);

        let a = &mut g.arena;
        env_override("HITW_ARENA_MIN_SIZE", &mut a.min_platform_size, |_| true);
        env_override("HITW_ARENA_MAX_SIZE", &mut a.max_platform_size, |_| true);

        config
    }

    /// Path of the persisted arena definitions
    pub fn arenas_file(&self) -> PathBuf {
        self.data_dir.join("arenas.json")
    }

    /// Path of the match result log
    pub fn results_file(&self) -> PathBuf {
        self.data_dir.join("match_results.jsonl")
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.max_games == 0 {
            return Err("max_games must be at least 1".to_string());
        }
        self.game.validate()
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_players < 1 {
            return Err("min_players must be at least 1".to_string());
        }
        if self.max_players < self.min_players {
            return Err("max_players cannot be less than min_players".to_string());
        }
        self.walls.validate()?;
        self.arena.validate()
    }

    /// STARTING countdown length in ticks
    pub fn countdown_ticks(&self) -> u32 {
        self.countdown_seconds * crate::game::constants::sim::TICK_RATE
    }
}

impl WallConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_speed <= 0.0 {
            return Err("wall base_speed must be greater than 0".to_string());
        }
        if self.max_speed < self.base_speed {
            return Err("wall max_speed cannot be less than base_speed".to_string());
        }
        if self.speed_increment < 0.0 {
            return Err("wall speed_increment cannot be negative".to_string());
        }
        if self.spawn_interval_ticks == 0 {
            return Err("wall spawn_interval_ticks must be at least 1".to_string());
        }
        if self.basic_to_advanced >= self.advanced_to_expert {
            return Err("basic_to_advanced must be below advanced_to_expert".to_string());
        }
        Ok(())
    }
}

impl ArenaValidationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_platform_size > self.max_platform_size {
            return Err("arena min_platform_size cannot exceed max_platform_size".to_string());
        }
        if self.min_platform_size < arena::MIN_VALID_SIZE || self.max_platform_size > arena::MAX_VALID_SIZE {
            return Err(format!(
                "arena size bounds must lie within {}-{}",
                arena::MIN_VALID_SIZE,
                arena::MAX_VALID_SIZE
            ));
        }
        Ok(())
    }

    pub fn accepts(&self, size: u32) -> bool {
        (self.min_platform_size..=self.max_platform_size).contains(&size)
    }
}
