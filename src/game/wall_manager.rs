//! Pattern registry and wall factory

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::config::WallConfig;
use crate::game::arena::Arena;
use crate::game::pattern::{Difficulty, PatternKind};
use crate::game::wall::Wall;
use crate::world::WorldGrid;

type PatternList = SmallVec<[PatternKind; 4]>;

/// Registry summary
#[derive(Debug, Clone, Serialize)]
pub struct WallStatistics {
    pub total_patterns: usize,
    pub patterns_by_difficulty: BTreeMap<&'static str, usize>,
    pub walls_created: u64,
}

pub struct WallManager {
    patterns: HashMap<&'static str, PatternKind>,
    by_difficulty: HashMap<Difficulty, PatternList>,
    config: RwLock<WallConfig>,
    next_id: AtomicU64,
}

impl WallManager {
    pub fn new(config: WallConfig) -> Self {
        let patterns: HashMap<_, _> = PatternKind::ALL.iter().map(|k| (k.name(), *k)).collect();
        info!("Registered {} wall patterns", patterns.len());

        let mut manager = Self {
            patterns,
            by_difficulty: HashMap::new(),
            config: RwLock::new(config),
            next_id: AtomicU64::new(1),
        };
        manager.index_by_difficulty();
        manager
    }

    fn index_by_difficulty(&mut self) {
        self.by_difficulty.clear();
        for difficulty in Difficulty::ALL {
            self.by_difficulty.insert(difficulty, PatternList::new());
        }
        // Registry order, so random picks are reproducible under a fixed seed
        for kind in PatternKind::ALL {
            if self.patterns.contains_key(kind.name()) {
                self.by_difficulty.entry(kind.difficulty()).or_default().push(kind);
            }
        }
    }

    pub fn pattern(&self, name: &str) -> Option<PatternKind> {
        self.patterns.get(name).copied()
    }

    pub fn patterns(&self) -> Vec<PatternKind> {
        let mut all: Vec<_> = self.patterns.values().copied().collect();
        all.sort_by_key(|k| k.name());
        all
    }

    pub fn patterns_by_difficulty(&self, difficulty: Difficulty) -> Vec<PatternKind> {
        self.by_difficulty
            .get(&difficulty)
            .map(|list| list.to_vec())
            .unwrap_or_default()
    }

    /// Random pattern of a tier, falling back to BASIC and then single_hole
    pub fn random_pattern<R: Rng + ?Sized>(&self, difficulty: Difficulty, rng: &mut R) -> PatternKind {
        [difficulty, Difficulty::Basic]
            .iter()
            .filter_map(|d| self.by_difficulty.get(d))
            .find(|list| !list.is_empty())
            .and_then(|list| list.choose(rng).copied())
            .unwrap_or(PatternKind::SingleHole)
    }

    pub fn difficulty_for_round(&self, round: u32) -> Difficulty {
        let config = self.config.read();
        if round < config.basic_to_advanced {
            Difficulty::Basic
        } else if round < config.advanced_to_expert {
            Difficulty::Advanced
        } else {
            Difficulty::Expert
        }
    }

    /// `base_speed + round * speed_increment`, capped at `max_speed`
    pub fn speed_for_round(&self, round: u32) -> f64 {
        let config = self.config.read();
        (config.base_speed + round as f64 * config.speed_increment).min(config.max_speed)
    }

    pub fn spawn_interval_ticks(&self) -> u32 {
        self.config.read().spawn_interval_ticks
    }

    fn next_wall_id(&self) -> String {
        format!("wall_{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Spawn a wall at a random anchor of `arena`
    pub fn create_wall<R: Rng + ?Sized>(
        &self,
        arena: &Arc<Arena>,
        pattern: PatternKind,
        speed: f64,
        rng: &mut R,
        world: &dyn WorldGrid,
    ) -> Wall {
        let anchors = arena.wall_spawn_points();
        let spawn = anchors[rng.gen_range(0..anchors.len())];
        let wall = Wall::spawn(self.next_wall_id(), arena.clone(), pattern, spawn, speed, rng, world);
        debug!(
            "Spawned {} ({}) in arena {} at speed {:.2}",
            wall.id(),
            pattern.name(),
            arena.name(),
            speed
        );
        wall
    }

    /// Spawn a wall whose tier and speed follow the round number
    pub fn create_wall_for_round<R: Rng + ?Sized>(
        &self,
        arena: &Arc<Arena>,
        round: u32,
        rng: &mut R,
        world: &dyn WorldGrid,
    ) -> Wall {
        let pattern = self.random_pattern(self.difficulty_for_round(round), rng);
        let speed = self.speed_for_round(round);
        self.create_wall(arena, pattern, speed, rng, world)
    }

    pub fn walls_created(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }

    pub fn statistics(&self) -> WallStatistics {
        WallStatistics {
            total_patterns: self.patterns.len(),
            patterns_by_difficulty: Difficulty::ALL
                .iter()
                .map(|d| (d.name(), self.by_difficulty.get(d).map_or(0, |l| l.len())))
                .collect(),
            walls_created: self.walls_created(),
        }
    }

    /// Swap in new scaling settings; games pick them up on their next spawn
    pub fn reload(&self, config: WallConfig) {
        *self.config.write() = config;
        info!("Wall manager reloaded");
    }
}
