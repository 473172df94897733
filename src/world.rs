//! World grid substrate
//!
//! The simulation never owns world storage. It reads and writes cells through
//! [`WorldGrid`]; the host decides what a cell write means. [`MemoryWorld`] is
//! the in-process implementation used by the server binary and the tests.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::util::vec3::BlockPos;

/// Cell contents the simulation cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Material {
    #[default]
    Air,
    /// Arena floor
    Platform,
    /// Invisible but solid arena boundary
    Barrier,
    /// Solid wall segment
    Wall,
}

/// Substrate errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("world '{0}' is not loaded")]
    NotLoaded(String),
    #[error("world '{0}' does not exist")]
    UnknownWorld(String),
}

/// Block storage the simulation paints into
///
/// Writes are best effort: a failed write is never rolled back and callers
/// treat it as "cell unchanged".
pub trait WorldGrid: Send + Sync {
    fn set_cell(&self, world: &str, pos: BlockPos, material: Material) -> Result<(), WorldError>;
    fn get_cell(&self, world: &str, pos: BlockPos) -> Result<Material, WorldError>;
    fn is_loaded(&self, world: &str) -> bool;
}

#[derive(Debug, Default)]
struct WorldData {
    loaded: bool,
    cells: FxHashMap<BlockPos, Material>,
}

/// In-memory sparse world grid (air is implicit)
#[derive(Debug, Default)]
pub struct MemoryWorld {
    worlds: RwLock<HashMap<String, WorldData>>,
    writes: AtomicU64,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world with a single loaded world
    pub fn with_world(name: &str) -> Self {
        let world = Self::new();
        world.load_world(name);
        world
    }

    /// Load (or create) a world
    pub fn load_world(&self, name: &str) {
        self.worlds
            .write()
            .entry(name.to_string())
            .or_default()
            .loaded = true;
    }

    /// Unload a world, keeping its cells for a later reload
    pub fn unload_world(&self, name: &str) {
        if let Some(data) = self.worlds.write().get_mut(name) {
            data.loaded = false;
        }
    }

    /// Count the cells holding a material
    pub fn count(&self, world: &str, material: Material) -> usize {
        self.worlds
            .read()
            .get(world)
            .map(|data| data.cells.values().filter(|m| **m == material).count())
            .unwrap_or(0)
    }

    /// Count the cells holding a material that satisfy a predicate
    pub fn count_where(
        &self,
        world: &str,
        material: Material,
        predicate: impl Fn(BlockPos) -> bool,
    ) -> usize {
        self.worlds
            .read()
            .get(world)
            .map(|data| {
                data.cells
                    .iter()
                    .filter(|(pos, m)| **m == material && predicate(**pos))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Total successful writes since creation
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl WorldGrid for MemoryWorld {
    fn set_cell(&self, world: &str, pos: BlockPos, material: Material) -> Result<(), WorldError> {
        let mut worlds = self.worlds.write();
        let data = worlds
            .get_mut(world)
            .ok_or_else(|| WorldError::UnknownWorld(world.to_string()))?;
        if !data.loaded {
            return Err(WorldError::NotLoaded(world.to_string()));
        }

        if material == Material::Air {
            data.cells.remove(&pos);
        } else {
            data.cells.insert(pos, material);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn get_cell(&self, world: &str, pos: BlockPos) -> Result<Material, WorldError> {
        let worlds = self.worlds.read();
        let data = worlds
            .get(world)
            .ok_or_else(|| WorldError::UnknownWorld(world.to_string()))?;
        if !data.loaded {
            return Err(WorldError::NotLoaded(world.to_string()));
        }
        Ok(data.cells.get(&pos).copied().unwrap_or_default())
    }

    fn is_loaded(&self, world: &str) -> bool {
        self.worlds.read().get(world).is_some_and(|data| data.loaded)
    }
}
