use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::game::arena::Arena;
use crate::game::arena_manager::ArenaManager;
use crate::host::PlayerId;
use crate::lobby::game::{Game, GameError, GameEvent, GameServices, GameState};

/// Registry of running games and the player to game index
pub struct GameManager {
    games: HashMap<Uuid, Game>,
    player_games: HashMap<PlayerId, Uuid>,
    arenas: Arc<RwLock<ArenaManager>>,
    services: GameServices,
    config: GameConfig,
    max_games: usize,
    /// Events from games torn down outside `tick`
    pending: TickReport,
    rng: ChaCha8Rng,
}

impl GameManager {
    pub fn new(
        arenas: Arc<RwLock<ArenaManager>>,
        services: GameServices,
        config: GameConfig,
        max_games: usize,
    ) -> Self {
        Self {
            games: HashMap::new(),
            player_games: HashMap::new(),
            arenas,
            services,
            config,
            max_games,
            pending: TickReport::default(),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Fix the random source used for arena choice and per-game seeds
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn arenas(&self) -> &Arc<RwLock<ArenaManager>> {
        &self.arenas
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Open a new WAITING game on the given arena
    pub fn create_game(&mut self, arena: Arc<Arena>) -> Result<Uuid, ManagerError> {
        if self.games.len() >= self.max_games {
            return Err(ManagerError::TooManyGames);
        }

        let game = Game::new(arena, self.config.clone(), self.services.clone())
            .with_seed(self.rng.gen());
        let id = game.id();
        info!("Created game {} on arena {}", id, game.arena().name());
        self.games.insert(id, game);

        Ok(id)
    }

    /// Stop and discard a game, releasing every player mapped to it
    pub fn remove_game(&mut self, game_id: Uuid) -> Result<(), ManagerError> {
        let mut game = self
            .games
            .remove(&game_id)
            .ok_or(ManagerError::GameNotFound)?;

        game.stop();
        for event in game.drain_events() {
            self.pending.record(&event);
        }
        // A finished game has already released its roster, so sweep the index
        self.player_games.retain(|_, id| *id != game_id);

        info!("Removed game {}", game_id);
        Ok(())
    }

    /// Fullest joinable game, if any
    fn find_joinable(&self) -> Option<Uuid> {
        self.games
            .values()
            .filter(|g| g.can_join())
            .max_by(|a, b| {
                a.player_count()
                    .cmp(&b.player_count())
                    .then_with(|| b.created_at().cmp(&a.created_at()))
                    .then_with(|| b.id().cmp(&a.id()))
            })
            .map(|g| g.id())
    }

    /// Place a player into a waiting game, opening one when none has room
    pub fn join_game(&mut self, player: PlayerId, name: &str) -> Result<Uuid, ManagerError> {
        if self.player_games.contains_key(&player) {
            return Err(ManagerError::AlreadyInGame);
        }

        let (game_id, fresh) = match self.find_joinable() {
            Some(id) => (id, false),
            None => {
                let location = self.services.host.location(player);
                let arena = self
                    .arenas
                    .read()
                    .best_arena(location.as_ref(), &mut self.rng)
                    .ok_or(ManagerError::NoArenaAvailable)?;
                (self.create_game(arena)?, true)
            }
        };

        let game = self
            .games
            .get_mut(&game_id)
            .ok_or(ManagerError::GameNotFound)?;
        if let Err(e) = game.add_player(player, name) {
            if fresh {
                self.games.remove(&game_id);
            }
            return Err(e.into());
        }

        self.player_games.insert(player, game_id);
        debug!("{} joined game {}", name, game_id);
        Ok(game_id)
    }

    /// Take a player out of their game; empty games are discarded
    pub fn leave_game(&mut self, player: PlayerId) -> Result<Uuid, ManagerError> {
        let game_id = self
            .player_games
            .remove(&player)
            .ok_or(ManagerError::NotInGame)?;

        let Some(game) = self.games.get_mut(&game_id) else {
            return Err(ManagerError::GameNotFound);
        };
        game.remove_player(player);

        if game.is_empty() {
            self.remove_game(game_id)?;
        }

        Ok(game_id)
    }

    /// Advance every game by one tick and reap the finished ones
    pub fn tick(&mut self) -> TickReport {
        let mut report = std::mem::take(&mut self.pending);

        for game in self.games.values_mut() {
            game.tick_countdown();
            game.tick();
            for event in game.drain_events() {
                report.record(&event);
            }
        }

        let finished: Vec<Uuid> = self
            .games
            .iter()
            .filter(|(_, game)| game.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for game_id in finished {
            if self.remove_game(game_id).is_ok() {
                report.games_reaped += 1;
            }
        }
        let late = std::mem::take(&mut self.pending);
        report.merge(&late);

        report
    }

    /// Stop and discard every game; returns how many were running
    pub fn stop_all(&mut self) -> usize {
        let count = self.games.len();
        for game in self.games.values_mut() {
            game.stop();
        }
        self.games.clear();
        self.player_games.clear();
        self.pending = TickReport::default();

        if count > 0 {
            info!("Stopped {} games", count);
        }
        count
    }

    pub fn player_game(&self, player: PlayerId) -> Option<Uuid> {
        self.player_games.get(&player).copied()
    }

    pub fn is_in_game(&self, player: PlayerId) -> bool {
        self.player_games.contains_key(&player)
    }

    pub fn game(&self, game_id: Uuid) -> Option<&Game> {
        self.games.get(&game_id)
    }

    pub fn game_mut(&mut self, game_id: Uuid) -> Option<&mut Game> {
        self.games.get_mut(&game_id)
    }

    pub fn games(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn total_player_count(&self) -> usize {
        self.games.values().map(|g| g.player_count()).sum()
    }

    /// Summaries of every game, oldest first
    pub fn list_games(&self) -> Vec<GameInfo> {
        let mut games: Vec<&Game> = self.games.values().collect();
        games.sort_by_key(|g| (g.created_at(), g.id()));
        games
            .into_iter()
            .map(|g| GameInfo {
                id: g.id(),
                arena: g.arena().name().to_string(),
                state: g.state(),
                player_count: g.player_count(),
                alive_count: g.alive_count(),
                max_players: self.config.max_players,
                round: g.round(),
                active_walls: g.active_walls().len(),
            })
            .collect()
    }

    /// Current totals for gauges
    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for game in self.games.values() {
            census.games += 1;
            match game.state() {
                GameState::Waiting => census.waiting += 1,
                GameState::Starting => census.starting += 1,
                GameState::Active => census.active += 1,
                GameState::Finished => {}
            }
            census.players += game.player_count();
            census.alive_players += game.alive_count();
            census.active_walls += game.active_walls().len();
        }
        census
    }
}

/// Game information for listing
#[derive(Debug, Clone, Serialize)]
pub struct GameInfo {
    pub id: Uuid,
    pub arena: String,
    pub state: GameState,
    pub player_count: usize,
    pub alive_count: usize,
    pub max_players: usize,
    pub round: u32,
    pub active_walls: usize,
}

/// Snapshot of manager-wide totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    pub games: usize,
    pub waiting: usize,
    pub starting: usize,
    pub active: usize,
    pub players: usize,
    pub alive_players: usize,
    pub active_walls: usize,
}

/// What happened during one manager tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub games_started: u32,
    pub walls_spawned: u32,
    pub walls_despawned: u32,
    pub eliminations: u32,
    pub games_finished: u32,
    /// Finished games that produced a match record
    pub matches_completed: u32,
    pub games_reaped: u32,
}

impl TickReport {
    fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Started { .. } => self.games_started += 1,
            GameEvent::WallSpawned { .. } => self.walls_spawned += 1,
            GameEvent::WallDespawned { .. } => self.walls_despawned += 1,
            GameEvent::PlayerEliminated { .. } => self.eliminations += 1,
            GameEvent::Finished { recorded, .. } => {
                self.games_finished += 1;
                if *recorded {
                    self.matches_completed += 1;
                }
            }
        }
    }

    fn merge(&mut self, other: &TickReport) {
        self.games_started += other.games_started;
        self.walls_spawned += other.walls_spawned;
        self.walls_despawned += other.walls_despawned;
        self.eliminations += other.eliminations;
        self.games_finished += other.games_finished;
        self.matches_completed += other.matches_completed;
        self.games_reaped += other.games_reaped;
    }
}

/// Manager errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    #[error("too many games")]
    TooManyGames,
    #[error("game not found")]
    GameNotFound,
    #[error("no arena available")]
    NoArenaAvailable,
    #[error("already in a game")]
    AlreadyInGame,
    #[error("not in a game")]
    NotInGame,
    #[error(transparent)]
    Game(#[from] GameError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArenaValidationConfig, WallConfig};
    use crate::game::wall_manager::WallManager;
    use crate::host::{Location, MemoryPlayerHost};
    use crate::stats::MemoryResultSink;
    use crate::util::vec3::Vec3;
    use crate::world::{Material, MemoryWorld};

    struct Harness {
        world: Arc<MemoryWorld>,
        host: Arc<MemoryPlayerHost>,
        results: Arc<MemoryResultSink>,
        manager: GameManager,
    }

    fn harness(max_games: usize, arenas: &[(&str, f64)]) -> Harness {
        let world = Arc::new(MemoryWorld::with_world("world"));
        let mut registry = ArenaManager::new(world.clone(), ArenaValidationConfig::default());
        for (name, x) in arenas {
            registry
                .create_arena(name, Location::new("world", Vec3::new(*x, 64.0, 0.0)), 15)
                .unwrap();
        }

        let host = Arc::new(MemoryPlayerHost::new());
        let results = Arc::new(MemoryResultSink::new());
        let services = GameServices {
            world: world.clone(),
            host: host.clone(),
            walls: Arc::new(WallManager::new(WallConfig::default())),
            results: results.clone(),
        };
        let config = GameConfig {
            min_players: 2,
            max_players: 3,
            countdown_seconds: 1,
            ..GameConfig::default()
        };
        let manager = GameManager::new(Arc::new(RwLock::new(registry)), services, config, max_games)
            .with_seed(5);
        Harness {
            world,
            host,
            results,
            manager,
        }
    }

    impl Harness {
        fn player(&self, name: &str, x: f64) -> PlayerId {
            self.host.add(name, Some(Location::new("world", Vec3::new(x, 64.0, 0.0))))
        }

        fn join(&mut self, name: &str) -> (PlayerId, Uuid) {
            let id = self.player(name, 0.0);
            let game = self.manager.join_game(id, name).unwrap();
            (id, game)
        }

        /// Hold every rostered player above the barrier
        fn lift_all(&self) {
            for game in self.manager.games() {
                for id in game.player_ids() {
                    self.host.set_position(id, Vec3::new(0.0, 90.0, 0.0));
                }
            }
        }
    }

    #[test]
    fn test_join_creates_game() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (p1, game_id) = h.join("P1");

        assert_eq!(h.manager.game_count(), 1);
        assert_eq!(h.manager.player_game(p1), Some(game_id));
        assert!(h.manager.is_in_game(p1));
        assert_eq!(h.manager.game(game_id).unwrap().arena().name(), "alpha");
    }

    #[test]
    fn test_join_fills_waiting_game() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (_, first) = h.join("P1");
        let (_, second) = h.join("P2");

        assert_eq!(first, second);
        assert_eq!(h.manager.game_count(), 1);
        assert_eq!(h.manager.total_player_count(), 2);
        // Now STARTING, so a third player opens another game
        let (_, third) = h.join("P3");
        assert_ne!(third, first);
        assert_eq!(h.manager.game_count(), 2);
    }

    #[test]
    fn test_cannot_join_twice() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (p1, _) = h.join("P1");

        assert_eq!(h.manager.join_game(p1, "P1"), Err(ManagerError::AlreadyInGame));
    }

    #[test]
    fn test_join_without_arena() {
        let mut h = harness(10, &[]);
        let p1 = h.player("P1", 0.0);

        assert_eq!(h.manager.join_game(p1, "P1"), Err(ManagerError::NoArenaAvailable));
        assert_eq!(h.manager.game_count(), 0);
        assert!(!h.manager.is_in_game(p1));
    }

    #[test]
    fn test_join_picks_closest_arena() {
        let mut h = harness(10, &[("alpha", 0.0), ("beta", 200.0)]);
        let p1 = h.player("P1", 190.0);

        let game_id = h.manager.join_game(p1, "P1").unwrap();

        assert_eq!(h.manager.game(game_id).unwrap().arena().name(), "beta");
    }

    #[test]
    fn test_max_games() {
        let mut h = harness(1, &[("alpha", 0.0)]);
        h.join("P1");
        h.join("P2");

        let p3 = h.player("P3", 0.0);
        assert_eq!(h.manager.join_game(p3, "P3"), Err(ManagerError::TooManyGames));

        let arena = h.manager.arenas().read().get_arena("alpha").unwrap();
        assert_eq!(h.manager.create_game(arena), Err(ManagerError::TooManyGames));
    }

    #[test]
    fn test_leave_removes_empty_game() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (p1, game_id) = h.join("P1");

        assert_eq!(h.manager.leave_game(p1), Ok(game_id));

        assert!(h.manager.game(game_id).is_none());
        assert!(!h.manager.is_in_game(p1));
        assert_eq!(h.manager.leave_game(p1), Err(ManagerError::NotInGame));
    }

    #[test]
    fn test_leave_keeps_populated_game() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (p1, game_id) = h.join("P1");
        let (p2, _) = h.join("P2");

        h.manager.leave_game(p1).unwrap();

        let game = h.manager.game(game_id).unwrap();
        assert_eq!(game.player_count(), 1);
        assert!(h.manager.is_in_game(p2));
    }

    #[test]
    fn test_joiner_refills_game_left_during_countdown() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (_, game_id) = h.join("P1");
        let (p2, _) = h.join("P2");
        h.manager.tick();

        h.manager.leave_game(p2).unwrap();
        assert_eq!(h.manager.game(game_id).unwrap().state(), GameState::Waiting);

        let (_, joined) = h.join("P3");
        assert_eq!(joined, game_id);
        assert_eq!(h.manager.game_count(), 1);

        for _ in 0..20 {
            h.manager.tick();
        }
        assert_eq!(h.manager.game(game_id).unwrap().state(), GameState::Active);
    }

    #[test]
    fn test_tick_runs_countdown_and_starts() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (_, game_id) = h.join("P1");
        h.join("P2");
        assert_eq!(h.manager.game(game_id).unwrap().state(), GameState::Starting);

        let mut started = 0;
        let mut spawned = 0;
        for _ in 0..20 {
            let report = h.manager.tick();
            started += report.games_started;
            spawned += report.walls_spawned;
        }

        assert_eq!(started, 1);
        assert_eq!(spawned, 1);
        assert_eq!(h.manager.game(game_id).unwrap().state(), GameState::Active);
        let census = h.manager.census();
        assert_eq!(census.active, 1);
        assert_eq!(census.active_walls, 1);
        assert_eq!(census.alive_players, 2);
    }

    #[test]
    fn test_finished_game_is_reaped() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (p1, game_id) = h.join("P1");
        let (p2, _) = h.join("P2");
        for _ in 0..20 {
            h.manager.tick();
        }
        h.lift_all();

        h.manager.game_mut(game_id).unwrap().remove_player(p2);
        let report = h.manager.tick();

        assert_eq!(report.matches_completed, 1);
        assert_eq!(report.games_reaped, 1);
        assert_eq!(h.manager.game_count(), 0);
        assert!(!h.manager.is_in_game(p1));
        assert_eq!(h.results.len(), 1);
        assert_eq!(h.results.records()[0].winner, Some(p1));
    }

    #[test]
    fn test_leave_during_match_ends_it() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (p1, game_id) = h.join("P1");
        let (p2, _) = h.join("P2");
        for _ in 0..20 {
            h.manager.tick();
        }

        h.manager.leave_game(p2).unwrap();
        // The survivor was released with the finished roster
        assert!(h.manager.game(game_id).is_none());
        assert!(!h.manager.is_in_game(p1));
        assert_eq!(h.world.count("world", Material::Wall), 0);

        let report = h.manager.tick();
        assert_eq!(report.matches_completed, 1);
        assert_eq!(h.results.len(), 1);
    }

    #[test]
    fn test_remove_game() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        let (p1, game_id) = h.join("P1");

        h.manager.remove_game(game_id).unwrap();

        assert!(!h.manager.is_in_game(p1));
        assert!(!h.host.is_prepared(p1));
        assert_eq!(h.manager.remove_game(game_id), Err(ManagerError::GameNotFound));
    }

    #[test]
    fn test_stop_all_clears_walls() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        h.join("P1");
        h.join("P2");
        for _ in 0..20 {
            h.manager.tick();
        }
        h.lift_all();
        assert!(h.world.count("world", Material::Wall) > 0);

        assert_eq!(h.manager.stop_all(), 1);

        assert_eq!(h.manager.game_count(), 0);
        assert_eq!(h.manager.total_player_count(), 0);
        assert_eq!(h.world.count("world", Material::Wall), 0);
        assert_eq!(h.manager.stop_all(), 0);
    }

    #[test]
    fn test_list_games() {
        let mut h = harness(10, &[("alpha", 0.0)]);
        h.join("P1");
        h.join("P2");
        h.join("P3");

        let games = h.manager.list_games();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].state, GameState::Starting);
        assert_eq!(games[0].player_count, 2);
        assert_eq!(games[1].state, GameState::Waiting);
        assert_eq!(games[1].max_players, 3);
    }
}
