//! Simulated participants for running the server without a host
//!
//! Each demo player queues for a game whenever it is not in one and, during
//! a match, sidesteps along the face of the nearest wall toward its closest
//! hole. Footwork speed varies per player so matches actually end.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::host::{Location, MemoryPlayerHost, PlayerHost, PlayerId};
use crate::lobby::game::GameState;
use crate::lobby::manager::GameManager;

/// Walls farther than this are ignored
const REACTION_DISTANCE: f64 = 12.0;

#[derive(Debug, Clone)]
struct DemoPlayer {
    id: PlayerId,
    name: String,
    /// Blocks moved per tick while dodging
    footwork: f64,
}

/// A crowd of scripted participants backed by a [`MemoryPlayerHost`]
pub struct DemoCrowd {
    host: Arc<MemoryPlayerHost>,
    players: Vec<DemoPlayer>,
    rng: ChaCha8Rng,
}

impl DemoCrowd {
    /// Register `count` players in the host, standing at `lobby`
    pub fn enrol(host: Arc<MemoryPlayerHost>, count: usize, lobby: &Location, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let players = (0..count)
            .map(|i| {
                let name = format!("Demo{}", i + 1);
                DemoPlayer {
                    id: host.add(&name, Some(lobby.clone())),
                    name,
                    footwork: rng.gen_range(0.05..0.35),
                }
            })
            .collect();

        Self { host, players, rng }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// Queue idle players and move the ones in a running match
    pub fn step(&mut self, manager: &mut GameManager) {
        for player in &self.players {
            let Some(game_id) = manager.player_game(player.id) else {
                if let Err(e) = manager.join_game(player.id, &player.name) {
                    debug!("{} could not queue: {}", player.name, e);
                }
                continue;
            };

            let Some(game) = manager.game(game_id) else {
                continue;
            };
            if game.state() != GameState::Active
                || !game.get_player(player.id).is_some_and(|p| p.is_alive())
            {
                continue;
            }
            let Some(location) = self.host.location(player.id) else {
                continue;
            };
            let here = location.position;

            let threat = game
                .active_walls()
                .iter()
                .filter(|w| w.is_close_to(here, REACTION_DISTANCE))
                .min_by(|a, b| {
                    a.position()
                        .distance_sq_to(here)
                        .total_cmp(&b.position().distance_sq_to(here))
                });
            let Some(wall) = threat else {
                continue;
            };
            let Some(hole) = wall.closest_hole(here) else {
                continue;
            };

            let axis = wall.orientation().face_axis();
            let target = hole + axis * 0.5;
            let offset = (target - here).dot(axis);
            // Occasional hesitation
            let stride = if self.rng.gen_bool(0.1) { 0.0 } else { player.footwork };
            let step = offset.clamp(-stride, stride);
            self.host.set_position(player.id, here + axis * step);
        }
    }
}
