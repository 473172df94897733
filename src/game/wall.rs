//! Moving walls
//!
//! A wall is a vertical plane of solid cells with holes that sweeps across an
//! arena. Its position is continuous; cell positions are the floor of the
//! origin plus each cell's offset on the face. Substrate writes are the diff
//! between the painted set before and after each move.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::game::arena::Arena;
use crate::game::constants::per_tick;
use crate::game::constants::wall::{PLAYER_HEIGHT, SHIFT_RESEED_TICKS, WIDTH_PADDING};
use crate::game::pattern::{self, Cell, HoleGrid, PatternKind};
use crate::host::Location;
use crate::util::aabb::Aabb;
use crate::util::vec3::{BlockPos, Vec3};
use crate::world::{Material, WorldGrid};

/// Wall lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallState {
    Spawning,
    Active,
    Removed,
}

/// Axis the wall travels along; the face spans the other horizontal axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    AlongX,
    AlongZ,
}

impl Orientation {
    /// Dominant horizontal axis of a movement direction
    pub fn from_direction(direction: Vec3) -> Self {
        if direction.x.abs() > direction.z.abs() {
            Orientation::AlongX
        } else {
            Orientation::AlongZ
        }
    }

    /// Unit vector along the wall face
    pub fn face_axis(&self) -> Vec3 {
        match self {
            Orientation::AlongX => Vec3::SOUTH,
            Orientation::AlongZ => Vec3::EAST,
        }
    }
}

pub struct Wall {
    id: String,
    arena: Arc<Arena>,
    pattern: PatternKind,
    direction: Vec3,
    /// Blocks per second
    speed: f64,
    width: usize,
    height: usize,
    orientation: Orientation,
    origin: Vec3,
    grid: HoleGrid,
    shift_seed: u64,
    solid: Vec<BlockPos>,
    holes: Vec<BlockPos>,
    /// Cells this wall wrote into the substrate
    painted: FxHashSet<BlockPos>,
    bounds: Option<Aabb>,
    state: WallState,
    spawned_at: DateTime<Utc>,
    ticks_alive: u64,
}

impl Wall {
    /// Build a wall at `spawn` heading for the arena centre and paint it
    pub fn spawn<R: Rng + ?Sized>(
        id: impl Into<String>,
        arena: Arc<Arena>,
        pattern: PatternKind,
        spawn: Vec3,
        speed: f64,
        rng: &mut R,
        world: &dyn WorldGrid,
    ) -> Self {
        let direction = (arena.center() - spawn).horizontal().normalize();
        let width = (arena.platform_size() + WIDTH_PADDING) as usize;
        let height = (arena.barrier_height() - 1).max(1) as usize;

        let shift_seed: u64 = rng.gen();
        let grid = if pattern.is_shifting() {
            pattern::generate(pattern, width, height, &mut pattern::shifting_rng(shift_seed, 0))
        } else {
            pattern::generate(pattern, width, height, rng)
        };

        let mut wall = Self {
            id: id.into(),
            orientation: Orientation::from_direction(direction),
            arena,
            pattern,
            direction,
            speed,
            width,
            height,
            origin: spawn,
            grid,
            shift_seed,
            solid: Vec::new(),
            holes: Vec::new(),
            painted: FxHashSet::default(),
            bounds: None,
            state: WallState::Spawning,
            spawned_at: Utc::now(),
            ticks_alive: 0,
        };

        wall.layout();
        wall.repaint(world);
        wall.state = WallState::Active;
        wall
    }

    /// Cell for grid coordinate (i, j) at the current origin
    fn cell_at(&self, i: usize, j: usize) -> BlockPos {
        let along = i as f64 - (self.width / 2) as f64;
        (self.origin + self.orientation.face_axis() * along + Vec3::new(0.0, j as f64, 0.0)).block()
    }

    /// Recompute solid and hole cells from the grid and origin
    fn layout(&mut self) {
        let mut solid = Vec::with_capacity(self.grid.solid_count());
        let mut holes = Vec::with_capacity(self.grid.hole_count());
        for (i, j, cell) in self.grid.cells() {
            let pos = self.cell_at(i, j);
            match cell {
                Cell::Solid => solid.push(pos),
                Cell::Hole => holes.push(pos),
            }
        }
        self.bounds = Aabb::covering(&solid);
        self.solid = solid;
        self.holes = holes;
    }

    /// Bring the substrate in line with the current solid cells
    ///
    /// Only cells near the platform are painted, only air is overwritten, and
    /// only cells this wall painted are cleared.
    fn repaint(&mut self, world: &dyn WorldGrid) {
        let limit = self.width as f64;
        let target: FxHashSet<BlockPos> = self
            .solid
            .iter()
            .copied()
            .filter(|pos| self.arena.distance_from_edge_point(pos.center()) <= limit)
            .collect();

        let name = self.arena.world();
        let stale: Vec<BlockPos> = self.painted.difference(&target).copied().collect();
        for pos in stale {
            self.painted.remove(&pos);
            if let Err(e) = world.set_cell(name, pos, Material::Air) {
                debug!("Wall {} failed to clear {:?}: {}", self.id, pos, e);
            }
        }

        for pos in target {
            if self.painted.contains(&pos) {
                continue;
            }
            match world.get_cell(name, pos) {
                Ok(Material::Air) => match world.set_cell(name, pos, Material::Wall) {
                    Ok(()) => {
                        self.painted.insert(pos);
                    }
                    Err(e) => debug!("Wall {} failed to paint {:?}: {}", self.id, pos, e),
                },
                Ok(_) => {}
                Err(e) => debug!("Wall {} failed to read {:?}: {}", self.id, pos, e),
            }
        }
    }

    /// Advance one tick; returns false once the wall has left the arena
    pub fn tick(&mut self, world: &dyn WorldGrid) -> bool {
        if self.state != WallState::Active {
            return false;
        }

        self.ticks_alive += 1;

        let next = self.origin + self.direction * per_tick(self.speed);
        if !self.arena.contains_point(next)
            && next.distance_to(self.arena.center()) > self.width as f64
        {
            self.remove(world);
            return false;
        }
        self.origin = next;

        if self.pattern.is_shifting() && self.ticks_alive % SHIFT_RESEED_TICKS == 0 {
            let epoch = self.ticks_alive / SHIFT_RESEED_TICKS;
            let mut rng = pattern::shifting_rng(self.shift_seed, epoch);
            self.grid = pattern::generate(self.pattern, self.width, self.height, &mut rng);
        }

        self.layout();
        self.repaint(world);
        true
    }

    /// Whether a participant standing at `location` touches the wall
    ///
    /// A participant overlapping any hole cell is safe even when it also
    /// overlaps a solid cell.
    pub fn check_collision(&self, location: &Location) -> bool {
        if self.state != WallState::Active || location.world != self.arena.world() {
            return false;
        }
        let Some(bounds) = self.bounds else {
            return false;
        };
        let p = location.position;
        if !bounds.contains(p) {
            return false;
        }

        if self.holes.iter().any(|cell| overlaps(p, *cell)) {
            return false;
        }
        self.solid.iter().any(|cell| overlaps(p, *cell))
    }

    /// Clear painted cells and deactivate; repeated calls do nothing
    pub fn remove(&mut self, world: &dyn WorldGrid) {
        if self.state == WallState::Removed {
            return;
        }
        self.state = WallState::Removed;

        let name = self.arena.world();
        for pos in self.painted.drain() {
            if matches!(world.get_cell(name, pos), Ok(Material::Wall)) {
                if let Err(e) = world.set_cell(name, pos, Material::Air) {
                    debug!("Wall {} failed to clear {:?}: {}", self.id, pos, e);
                }
            }
        }

        self.solid.clear();
        self.holes.clear();
        self.bounds = None;
    }

    pub fn is_close_to(&self, position: Vec3, distance: f64) -> bool {
        self.is_active() && self.origin.distance_to(position) <= distance
    }

    /// Corner of the hole cell nearest to `position`
    pub fn closest_hole(&self, position: Vec3) -> Option<Vec3> {
        self.holes
            .iter()
            .map(|cell| cell.corner())
            .min_by(|a, b| a.distance_sq_to(position).total_cmp(&b.distance_sq_to(position)))
    }

    /// Distance from the wall origin to the arena centre
    pub fn distance_from_arena(&self) -> f64 {
        self.origin.distance_to(self.arena.center())
    }

    pub fn info(&self) -> String {
        format!(
            "Wall[{}] Pattern: {}, Speed: {:.2}, Blocks: {}, Holes: {}, Age: {} ticks",
            self.id,
            self.pattern.name(),
            self.speed,
            self.solid.len(),
            self.holes.len(),
            self.ticks_alive
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub fn pattern(&self) -> PatternKind {
        self.pattern
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn position(&self) -> Vec3 {
        self.origin
    }

    pub fn solid_cells(&self) -> &[BlockPos] {
        &self.solid
    }

    pub fn hole_cells(&self) -> &[BlockPos] {
        &self.holes
    }

    pub fn painted_count(&self) -> usize {
        self.painted.len()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn state(&self) -> WallState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == WallState::Active
    }

    pub fn spawned_at(&self) -> DateTime<Utc> {
        self.spawned_at
    }

    /// Ticks since spawn
    pub fn age(&self) -> u64 {
        self.ticks_alive
    }
}

impl std::fmt::Debug for Wall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wall")
            .field("id", &self.id)
            .field("pattern", &self.pattern.name())
            .field("origin", &self.origin)
            .field("state", &self.state)
            .finish()
    }
}

/// Simplified participant box: one cell wide, `PLAYER_HEIGHT` tall, inclusive
#[inline]
fn overlaps(p: Vec3, cell: BlockPos) -> bool {
    let c = cell.corner();
    p.x >= c.x
        && p.x <= c.x + 1.0
        && p.y >= c.y
        && p.y <= c.y + PLAYER_HEIGHT
        && p.z >= c.z
        && p.z <= c.z + 1.0
}
