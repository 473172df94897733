use std::sync::Arc;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::game::arena::Arena;
use crate::game::constants::game::{FIRST_ROUND, MODE};
use crate::game::constants::score::WIN_BONUS_POINTS;
use crate::game::constants::ticks_to_ms;
use crate::game::match_result::{
    assign_placements, check_match_end, sole_survivor, EndReason, MatchRecord, ParticipantResult,
};
use crate::game::pattern::PatternKind;
use crate::game::wall::Wall;
use crate::game::wall_manager::WallManager;
use crate::host::{PlayerHost, PlayerId};
use crate::lobby::player::GamePlayer;
use crate::stats::ResultSink;
use crate::world::WorldGrid;

/// Game state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum GameState {
    /// Gathering participants
    Waiting,
    /// Countdown before the first wall
    Starting,
    /// Walls are running
    Active,
    /// Over; walls cleared and participants released
    Finished,
}

/// Something observable that happened during a game step
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Started { players: usize },
    WallSpawned { wall_id: String, pattern: PatternKind, round: u32 },
    WallDespawned { wall_id: String },
    PlayerEliminated { player: PlayerId, round: u32 },
    /// `recorded` is false when the game never reached ACTIVE
    Finished {
        winner: Option<PlayerId>,
        reason: EndReason,
        recorded: bool,
    },
}

/// Game errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Game is full")]
    GameFull,
    #[error("Game already in progress")]
    GameInProgress,
    #[error("Player already in this game")]
    AlreadyJoined,
    #[error("Game cannot start from {0:?}")]
    CannotStart(GameState),
}

/// Collaborators every game talks to
#[derive(Clone)]
pub struct GameServices {
    pub world: Arc<dyn WorldGrid>,
    pub host: Arc<dyn PlayerHost>,
    pub walls: Arc<WallManager>,
    pub results: Arc<dyn ResultSink>,
}

/// One match on one arena
pub struct Game {
    id: Uuid,
    arena: Arc<Arena>,
    config: GameConfig,
    services: GameServices,
    players: HashMap<PlayerId, GamePlayer>,
    walls: Vec<Wall>,
    state: GameState,
    created_at: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    round: u32,
    /// Ticks since `start()`
    ticks: u64,
    countdown_remaining: u32,
    walls_spawned: u32,
    events: Vec<GameEvent>,
    rng: ChaCha8Rng,
}

impl Game {
    pub fn new(arena: Arc<Arena>, config: GameConfig, services: GameServices) -> Self {
        Self {
            id: Uuid::new_v4(),
            countdown_remaining: config.countdown_ticks(),
            arena,
            config,
            services,
            players: HashMap::new(),
            walls: Vec::new(),
            state: GameState::Waiting,
            created_at: Utc::now(),
            start_time: None,
            round: FIRST_ROUND,
            ticks: 0,
            walls_spawned: 0,
            events: Vec::new(),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Fix the random source for pattern and spawn-point choices
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == GameState::Finished
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn walls_spawned(&self) -> u32 {
        self.walls_spawned
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Ticks left before the countdown starts the game
    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn has_player(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player)
    }

    pub fn get_player(&self, player: PlayerId) -> Option<&GamePlayer> {
        self.players.get(&player)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    pub fn alive_players(&self) -> Vec<&GamePlayer> {
        self.players.values().filter(|p| p.is_alive()).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    pub fn active_walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Whether a new participant would be accepted
    pub fn can_join(&self) -> bool {
        self.state == GameState::Waiting && self.players.len() < self.config.max_players
    }

    /// Events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Add a participant and move them to the arena spawn
    pub fn add_player(&mut self, player: PlayerId, name: &str) -> Result<(), GameError> {
        if self.state != GameState::Waiting {
            return Err(GameError::GameInProgress);
        }
        if self.players.contains_key(&player) {
            return Err(GameError::AlreadyJoined);
        }
        if self.players.len() >= self.config.max_players {
            return Err(GameError::GameFull);
        }

        self.players.insert(player, GamePlayer::new(player, name.to_string()));
        self.services.host.teleport(player, &self.arena.spawn_point());
        debug!("{} joined game {} ({} players)", name, self.id, self.players.len());

        self.check_start_conditions();
        Ok(())
    }

    fn check_start_conditions(&mut self) {
        if self.state == GameState::Waiting
            && self.config.auto_start
            && self.players.len() >= self.config.min_players
        {
            self.state = GameState::Starting;
            self.countdown_remaining = self.config.countdown_ticks();
            info!(
                "Game {} starting in {} ticks on arena {}",
                self.id,
                self.countdown_remaining,
                self.arena.name()
            );
        }
    }

    /// Drop a participant and restore their state; returns false if unknown
    pub fn remove_player(&mut self, player: PlayerId) -> bool {
        let Some(removed) = self.players.remove(&player) else {
            return false;
        };
        self.services.host.restore(player);
        debug!("{} left game {}", removed.name, self.id);

        match self.state {
            GameState::Active => {
                if let Some(reason) = check_match_end(self.alive_count()) {
                    self.end_game(reason);
                }
            }
            GameState::Starting if self.players.len() < self.config.min_players => {
                self.state = GameState::Waiting;
                self.countdown_remaining = self.config.countdown_ticks();
                info!(
                    "Game {} back to waiting ({}/{} players)",
                    self.id,
                    self.players.len(),
                    self.config.min_players
                );
            }
            _ => {}
        }
        true
    }

    /// Advance the STARTING countdown; starts the game when it runs out
    pub fn tick_countdown(&mut self) {
        if self.state != GameState::Starting || self.players.len() < self.config.min_players {
            return;
        }
        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        if self.countdown_remaining == 0 {
            if let Err(e) = self.start() {
                debug!("Game {} countdown ended but start failed: {}", self.id, e);
            }
        }
    }

    /// Begin play: prepare participants and spawn the first wall
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.state != GameState::Starting {
            return Err(GameError::CannotStart(self.state));
        }

        self.state = GameState::Active;
        self.start_time = Some(Utc::now());
        self.ticks = 0;
        self.round = FIRST_ROUND;
        self.countdown_remaining = 0;

        let spawn = self.arena.spawn_point();
        for id in self.players.keys() {
            self.services.host.prepare(*id);
            self.services.host.teleport(*id, &spawn);
        }

        info!(
            "Game {} started on arena {} with {} players",
            self.id,
            self.arena.name(),
            self.players.len()
        );
        self.events.push(GameEvent::Started {
            players: self.players.len(),
        });

        self.spawn_wall();
        Ok(())
    }

    fn spawn_wall(&mut self) {
        let wall = self.services.walls.create_wall_for_round(
            &self.arena,
            self.round,
            &mut self.rng,
            self.services.world.as_ref(),
        );
        self.walls_spawned += 1;
        self.events.push(GameEvent::WallSpawned {
            wall_id: wall.id().to_string(),
            pattern: wall.pattern(),
            round: self.round,
        });
        self.walls.push(wall);
    }

    /// One simulation step; does nothing unless ACTIVE
    pub fn tick(&mut self) {
        if self.state != GameState::Active {
            return;
        }
        self.ticks += 1;

        self.update_walls();
        self.check_collisions();

        if self.ticks % self.services.walls.spawn_interval_ticks().max(1) as u64 == 0 {
            self.round += 1;
            self.spawn_wall();
        }

        if let Some(reason) = check_match_end(self.alive_count()) {
            self.end_game(reason);
        }
    }

    /// Move walls, drop the ones that left, and credit survivors
    fn update_walls(&mut self) {
        let world = self.services.world.as_ref();
        let mut crossed = 0u32;
        let events = &mut self.events;

        self.walls.retain_mut(|wall| {
            if wall.tick(world) {
                return true;
            }
            wall.remove(world);
            debug!("{} despawned after {} ticks", wall.id(), wall.age());
            events.push(GameEvent::WallDespawned {
                wall_id: wall.id().to_string(),
            });
            crossed += 1;
            false
        });

        for _ in 0..crossed {
            for player in self.players.values_mut().filter(|p| p.is_alive()) {
                player.dodge_wall();
            }
        }
    }

    /// Eliminate every alive participant touching a wall
    ///
    /// A participant the host cannot locate is skipped for this tick only.
    fn check_collisions(&mut self) {
        if self.walls.is_empty() {
            return;
        }

        let host = self.services.host.as_ref();
        let survival_ms = ticks_to_ms(self.ticks);
        for player in self.players.values_mut() {
            if !player.is_alive() {
                continue;
            }
            let Some(location) = host.location(player.id) else {
                continue;
            };
            if !self.walls.iter().any(|w| w.check_collision(&location)) {
                continue;
            }
            if player.eliminate(self.round, survival_ms) {
                host.on_eliminated(player.id);
                debug!("{} eliminated in game {} (round {})", player.name, self.id, self.round);
                self.events.push(GameEvent::PlayerEliminated {
                    player: player.id,
                    round: self.round,
                });
            }
        }
    }

    fn clear_walls(&mut self) {
        let world = self.services.world.as_ref();
        for wall in &mut self.walls {
            wall.remove(world);
        }
        self.walls.clear();
    }

    /// Finish the match, emit its record and release everything
    fn end_game(&mut self, reason: EndReason) {
        if self.state == GameState::Finished {
            return;
        }
        let was_active = self.state == GameState::Active;
        self.state = GameState::Finished;
        self.clear_walls();

        let mut winner = None;
        if was_active {
            let record = self.build_record(reason);
            winner = record.winner;
            info!(
                "Game {} finished on arena {}: {:?}, winner {}",
                self.id,
                self.arena.name(),
                reason,
                record.winner_name.as_deref().unwrap_or("none")
            );
            self.services.results.submit(record);
        } else {
            info!("Game {} stopped before starting", self.id);
        }

        for id in self.players.keys() {
            self.services.host.restore(*id);
        }
        self.players.clear();
        self.events.push(GameEvent::Finished {
            winner,
            reason,
            recorded: was_active,
        });
    }

    fn build_record(&mut self, reason: EndReason) -> MatchRecord {
        let survival_ms = ticks_to_ms(self.ticks);
        for player in self.players.values_mut().filter(|p| p.is_alive()) {
            player.set_survival_ms(survival_ms);
        }

        let mut participants: Vec<ParticipantResult> = self
            .players
            .values()
            .map(|p| ParticipantResult {
                player_id: p.id,
                name: p.name.clone(),
                final_score: p.score(),
                survival_ms: p.survival_ms(),
                walls_dodged: p.walls_dodged(),
                placement: 0,
                eliminated_round: p.elimination_round(),
                survived: p.is_alive(),
            })
            .collect();

        let winner = match reason {
            EndReason::LastPlayerStanding => sole_survivor(&participants).map(|r| r.player_id),
            _ => None,
        };
        if let Some(id) = winner {
            if let Some(p) = participants.iter_mut().find(|p| p.player_id == id) {
                p.final_score += WIN_BONUS_POINTS;
            }
            if let Some(p) = self.players.get_mut(&id) {
                p.add_score(WIN_BONUS_POINTS);
            }
        }
        assign_placements(&mut participants);

        let end_time = Utc::now();
        let start_time = self.start_time.unwrap_or(end_time);
        MatchRecord {
            game_id: self.id,
            arena_name: self.arena.name().to_string(),
            mode: MODE.to_string(),
            start_time,
            end_time,
            duration_ms: survival_ms,
            winner,
            winner_name: winner.and_then(|id| self.players.get(&id)).map(|p| p.name.clone()),
            player_count: participants.len(),
            walls_spawned: self.walls_spawned,
            max_round: self.round,
            end_reason: reason,
            participants,
        }
    }

    /// Force the game to FINISHED; repeated calls do nothing
    pub fn stop(&mut self) {
        self.end_game(EndReason::Stopped);
    }
}
