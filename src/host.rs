//! Player-state collaborator
//!
//! Games never touch inventories, game modes or entity positions directly.
//! Everything they need from the participant side goes through [`PlayerHost`].

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::vec3::Vec3;

/// Unique participant identifier
pub type PlayerId = Uuid;

/// A position inside a named world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub position: Vec3,
}

impl Location {
    pub fn new(world: impl Into<String>, position: Vec3) -> Self {
        Self {
            world: world.into(),
            position,
        }
    }

    pub fn distance_to(&self, other: &Location) -> Option<f64> {
        (self.world == other.world).then(|| self.position.distance_to(other.position))
    }
}

/// Host-side participant operations used at match boundaries
pub trait PlayerHost: Send + Sync {
    /// Save and clear the participant's state for play
    fn prepare(&self, player: PlayerId);
    /// Undo [`PlayerHost::prepare`]
    fn restore(&self, player: PlayerId);
    fn teleport(&self, player: PlayerId, to: &Location);
    /// Current location, `None` when the participant is offline
    fn location(&self, player: PlayerId) -> Option<Location>;
    /// Called once when a participant is knocked out
    fn on_eliminated(&self, _player: PlayerId) {}
}

/// Participant record tracked by [`MemoryPlayerHost`]
#[derive(Debug, Clone)]
pub struct HostPlayer {
    pub name: String,
    pub location: Option<Location>,
    pub prepared: bool,
    pub eliminated: bool,
    pub restore_count: u32,
}

/// In-memory player host for the server binary and tests
#[derive(Debug, Default)]
pub struct MemoryPlayerHost {
    players: RwLock<HashMap<PlayerId, HostPlayer>>,
}

impl MemoryPlayerHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant and return its id
    pub fn add(&self, name: &str, location: Option<Location>) -> PlayerId {
        let id = Uuid::new_v4();
        self.players.write().insert(
            id,
            HostPlayer {
                name: name.to_string(),
                location,
                prepared: false,
                eliminated: false,
                restore_count: 0,
            },
        );
        id
    }

    pub fn remove(&self, player: PlayerId) {
        self.players.write().remove(&player);
    }

    pub fn set_position(&self, player: PlayerId, position: Vec3) {
        if let Some(p) = self.players.write().get_mut(&player) {
            if let Some(location) = p.location.as_mut() {
                location.position = position;
            }
        }
    }

    pub fn get(&self, player: PlayerId) -> Option<HostPlayer> {
        self.players.read().get(&player).cloned()
    }

    pub fn is_prepared(&self, player: PlayerId) -> bool {
        self.players.read().get(&player).is_some_and(|p| p.prepared)
    }
}

impl PlayerHost for MemoryPlayerHost {
    fn prepare(&self, player: PlayerId) {
        if let Some(p) = self.players.write().get_mut(&player) {
            p.prepared = true;
        }
    }

    fn restore(&self, player: PlayerId) {
        if let Some(p) = self.players.write().get_mut(&player) {
            p.prepared = false;
            p.restore_count += 1;
        }
    }

    fn teleport(&self, player: PlayerId, to: &Location) {
        if let Some(p) = self.players.write().get_mut(&player) {
            p.location = Some(to.clone());
        }
    }

    fn location(&self, player: PlayerId) -> Option<Location> {
        self.players.read().get(&player).and_then(|p| p.location.clone())
    }

    fn on_eliminated(&self, player: PlayerId) {
        if let Some(p) = self.players.write().get_mut(&player) {
            p.eliminated = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_restore() {
        let host = MemoryPlayerHost::new();
        let id = host.add("P1", None);

        host.prepare(id);
        assert!(host.is_prepared(id));

        host.restore(id);
        assert!(!host.is_prepared(id));
        assert_eq!(host.get(id).unwrap().restore_count, 1);
    }

    #[test]
    fn test_teleport_and_location() {
        let host = MemoryPlayerHost::new();
        let id = host.add("P1", None);
        assert!(host.location(id).is_none());

        let target = Location::new("world", Vec3::new(0.5, 65.0, 0.5));
        host.teleport(id, &target);
        assert_eq!(host.location(id), Some(target));

        host.set_position(id, Vec3::new(3.0, 65.0, 3.0));
        assert_eq!(host.location(id).unwrap().position, Vec3::new(3.0, 65.0, 3.0));
    }

    #[test]
    fn test_location_distance_requires_same_world() {
        let a = Location::new("world", Vec3::ZERO);
        let b = Location::new("world", Vec3::new(3.0, 4.0, 0.0));
        let c = Location::new("other", Vec3::ZERO);

        assert_eq!(a.distance_to(&b), Some(5.0));
        assert_eq!(a.distance_to(&c), None);
    }
}
