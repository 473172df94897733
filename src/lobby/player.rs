use crate::game::constants::score::WALL_DODGE_POINTS;
use crate::host::PlayerId;

/// Per-match participant record
#[derive(Debug, Clone)]
pub struct GamePlayer {
    pub id: PlayerId,
    pub name: String,
    alive: bool,
    eliminated: bool,
    elimination_round: Option<u32>,
    score: u32,
    /// Simulated milliseconds survived, set on elimination or game end
    survival_ms: u64,
    walls_dodged: u32,
}

impl GamePlayer {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            alive: true,
            eliminated: false,
            elimination_round: None,
            score: 0,
            survival_ms: 0,
            walls_dodged: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive && !self.eliminated
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated
    }

    /// Knock the participant out; returns false if already out
    pub fn eliminate(&mut self, round: u32, survival_ms: u64) -> bool {
        if self.eliminated {
            return false;
        }
        self.eliminated = true;
        self.alive = false;
        self.elimination_round = Some(round);
        self.survival_ms = survival_ms;
        true
    }

    pub fn elimination_round(&self) -> Option<u32> {
        self.elimination_round
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn add_score(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }

    pub fn survival_ms(&self) -> u64 {
        self.survival_ms
    }

    pub fn set_survival_ms(&mut self, ms: u64) {
        self.survival_ms = ms;
    }

    pub fn walls_dodged(&self) -> u32 {
        self.walls_dodged
    }

    /// Credit a wall that crossed the arena without touching this participant
    pub fn dodge_wall(&mut self) {
        self.walls_dodged += 1;
        self.add_score(WALL_DODGE_POINTS);
    }
}
