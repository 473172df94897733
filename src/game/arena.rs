//! Arena geometry
//!
//! An arena is a square platform with a barrier ring around it. It is immutable
//! during play apart from the enabled flag, and shared read-only by games.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::constants::arena::{
    BARRIER_HEIGHT, DEFAULT_SIZE, MAX_VALID_SIZE, MIN_VALID_SIZE, WALL_SPAWN_OFFSET,
};
use crate::host::Location;
use crate::util::aabb::Aabb;
use crate::util::vec3::{BlockPos, Vec3};
use crate::world::{Material, WorldError, WorldGrid};

/// Persisted form of an arena; geometry is rebuilt from this tuple alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaDefinition {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_size() -> u32 {
    DEFAULT_SIZE
}

fn default_enabled() -> bool {
    true
}

/// Arena errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArenaError {
    #[error("arena '{0}' already exists")]
    AlreadyExists(String),
    #[error("arena '{0}' not found")]
    NotFound(String),
    #[error("arena size {size} must be between {min} and {max}")]
    InvalidSize { size: u32, min: u32, max: u32 },
    #[error("world '{0}' is not available")]
    WorldUnavailable(String),
    #[error("world error: {0}")]
    World(#[from] WorldError),
    #[error("failed to persist arenas: {0}")]
    Persistence(String),
}

/// A named platform + barrier volume where one game plays out
#[derive(Debug, Clone)]
pub struct Arena {
    name: String,
    world: String,
    center: Vec3,
    spawn_point: Vec3,
    platform_size: u32,
    barrier_height: i32,
    bounds: Aabb,
    wall_spawn_points: [Vec3; 4],
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl Arena {
    pub fn new(name: impl Into<String>, center: Location, platform_size: u32) -> Self {
        let half = platform_size as f64 / 2.0;
        let c = center.position;
        let barrier_height = BARRIER_HEIGHT;

        let bounds = Aabb::new(
            Vec3::new(c.x - half, c.y - 1.0, c.z - half),
            Vec3::new(c.x + half, c.y + barrier_height as f64, c.z + half),
        );

        let reach = half + WALL_SPAWN_OFFSET;
        let wall_spawn_points = [
            c + Vec3::new(0.0, 1.0, -reach), // north
            c + Vec3::new(0.0, 1.0, reach),  // south
            c + Vec3::new(reach, 1.0, 0.0),  // east
            c + Vec3::new(-reach, 1.0, 0.0), // west
        ];

        Self {
            name: name.into(),
            world: center.world,
            center: c,
            spawn_point: c + Vec3::new(0.0, 1.0, 0.0),
            platform_size,
            barrier_height,
            bounds,
            wall_spawn_points,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// Rebuild an arena from its persisted definition
    pub fn from_definition(name: impl Into<String>, def: &ArenaDefinition) -> Self {
        let mut arena = Self::new(
            name,
            Location::new(def.world.clone(), Vec3::new(def.x, def.y, def.z)),
            def.size,
        );
        arena.enabled = def.enabled;
        arena
    }

    pub fn definition(&self) -> ArenaDefinition {
        ArenaDefinition {
            world: self.world.clone(),
            x: self.center.x,
            y: self.center.y,
            z: self.center.z,
            size: self.platform_size,
            enabled: self.enabled,
        }
    }

    /// Platform cell span on one horizontal axis: every cell overlapping the footprint
    fn platform_span(center: f64, half: f64) -> RangeInclusive<i32> {
        let lo = (center - half).floor() as i32;
        let hi = (center + half).ceil() as i32 - 1;
        lo..=hi
    }

    pub fn platform_x(&self) -> RangeInclusive<i32> {
        Self::platform_span(self.center.x, self.half_size())
    }

    pub fn platform_z(&self) -> RangeInclusive<i32> {
        Self::platform_span(self.center.z, self.half_size())
    }

    /// Y level of the platform floor
    pub fn floor_y(&self) -> i32 {
        self.center.y.floor() as i32
    }

    /// Materialize the platform with clearance above and the barrier ring
    pub fn build(&self, world: &dyn WorldGrid) -> Result<(), ArenaError> {
        if !world.is_loaded(&self.world) {
            return Err(ArenaError::WorldUnavailable(self.world.clone()));
        }

        let floor = self.floor_y();
        for x in self.platform_x() {
            for z in self.platform_z() {
                world.set_cell(&self.world, BlockPos::new(x, floor, z), Material::Platform)?;

                for y in floor + 1..=floor + self.barrier_height {
                    let pos = BlockPos::new(x, y, z);
                    if world.get_cell(&self.world, pos)? != Material::Air {
                        world.set_cell(&self.world, pos, Material::Air)?;
                    }
                }
            }
        }

        for pos in self.barrier_cells() {
            world.set_cell(&self.world, pos, Material::Barrier)?;
        }

        Ok(())
    }

    /// Cells of the barrier ring one step outside the platform
    pub fn barrier_cells(&self) -> Vec<BlockPos> {
        let (xs, zs) = (self.platform_x(), self.platform_z());
        let (x0, x1) = (*xs.start() - 1, *xs.end() + 1);
        let (z0, z1) = (*zs.start() - 1, *zs.end() + 1);
        let floor = self.floor_y();

        let mut cells = Vec::new();
        for y in floor + 1..=floor + self.barrier_height {
            for x in x0..=x1 {
                cells.push(BlockPos::new(x, y, z0));
                cells.push(BlockPos::new(x, y, z1));
            }
            for z in z0 + 1..z1 {
                cells.push(BlockPos::new(x0, y, z));
                cells.push(BlockPos::new(x1, y, z));
            }
        }
        cells
    }

    /// Clear the platform and barrier footprint back to air
    ///
    /// Best effort: an unloaded world leaves the footprint untouched.
    pub fn remove(&self, world: &dyn WorldGrid) {
        if !world.is_loaded(&self.world) {
            return;
        }

        let (xs, zs) = (self.platform_x(), self.platform_z());
        let floor = self.floor_y();
        for x in *xs.start() - 1..=*xs.end() + 1 {
            for z in *zs.start() - 1..=*zs.end() + 1 {
                for y in floor..=floor + self.barrier_height {
                    let pos = BlockPos::new(x, y, z);
                    if matches!(world.get_cell(&self.world, pos), Ok(m) if m != Material::Air) {
                        if let Err(e) = world.set_cell(&self.world, pos, Material::Air) {
                            debug!("Failed to clear {:?} of arena {}: {}", pos, self.name, e);
                        }
                    }
                }
            }
        }
    }

    /// Check if a location is within the arena bounds
    pub fn contains(&self, location: &Location) -> bool {
        location.world == self.world && self.bounds.contains(location.position)
    }

    /// Bounds test for a point already known to be in this arena's world
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.bounds.contains(p)
    }

    /// Check if a location is over the platform, between floor and barrier top
    pub fn is_on_platform(&self, location: &Location) -> bool {
        if location.world != self.world {
            return false;
        }
        let half = self.half_size();
        let (c, p) = (self.center, location.position);
        p.x >= c.x - half
            && p.x <= c.x + half
            && p.z >= c.z - half
            && p.z <= c.z + half
            && p.y >= c.y
            && p.y <= c.y + self.barrier_height as f64
    }

    /// X/Z distance outside the platform footprint, 0 inside
    pub fn distance_from_edge(&self, location: &Location) -> f64 {
        if location.world != self.world {
            return f64::MAX;
        }
        self.distance_from_edge_point(location.position)
    }

    pub fn distance_from_edge_point(&self, p: Vec3) -> f64 {
        let half = self.half_size();
        let dx = ((p.x - self.center.x).abs() - half).max(0.0);
        let dz = ((p.z - self.center.z).abs() - half).max(0.0);
        (dx * dx + dz * dz).sqrt()
    }

    /// World loaded, size in range and enabled
    pub fn is_valid(&self, world: &dyn WorldGrid) -> bool {
        self.is_valid_with(world.is_loaded(&self.world))
    }

    /// Validity given the current world availability
    pub fn is_valid_with(&self, world_loaded: bool) -> bool {
        world_loaded
            && self.center.is_finite()
            && (MIN_VALID_SIZE..=MAX_VALID_SIZE).contains(&self.platform_size)
            && self.enabled
    }

    pub fn info(&self) -> String {
        let b = self.center.block();
        format!(
            "Arena: {} | World: {} | Size: {}x{} | Center: {},{},{} | Enabled: {}",
            self.name, self.world, self.platform_size, self.platform_size, b.x, b.y, b.z, self.enabled
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn center_location(&self) -> Location {
        Location::new(self.world.clone(), self.center)
    }

    pub fn spawn_point(&self) -> Location {
        Location::new(self.world.clone(), self.spawn_point)
    }

    pub fn platform_size(&self) -> u32 {
        self.platform_size
    }

    pub fn half_size(&self) -> f64 {
        self.platform_size as f64 / 2.0
    }

    pub fn barrier_height(&self) -> i32 {
        self.barrier_height
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// The only legal wall origins
    pub fn wall_spawn_points(&self) -> &[Vec3; 4] {
        &self.wall_spawn_points
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl PartialEq for Arena {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Arena {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;

    fn alpha() -> Arena {
        Arena::new("alpha", Location::new("world", Vec3::new(0.0, 64.0, 0.0)), 15)
    }

    #[test]
    fn test_build_platform_and_barrier() {
        let world = MemoryWorld::with_world("world");
        let arena = alpha();

        arena.build(&world).unwrap();

        assert_eq!(world.count("world", Material::Platform), 16 * 16);
        assert_eq!(
            world.count_where("world", Material::Platform, |p| p.y == 64),
            256
        );

        // Ring of 18x18 perimeter cells, 10 rows high
        assert_eq!(world.count("world", Material::Barrier), 68 * 10);
        assert_eq!(world.count_where("world", Material::Barrier, |p| p.y == 65), 68);
        assert_eq!(world.count_where("world", Material::Barrier, |p| p.y == 74), 68);
        assert_eq!(world.count_where("world", Material::Barrier, |p| p.y > 74), 0);
    }

    #[test]
    fn test_build_clears_space_above_platform() {
        let world = MemoryWorld::with_world("world");
        world.set_cell("world", BlockPos::new(0, 66, 0), Material::Wall).unwrap();

        alpha().build(&world).unwrap();

        assert_eq!(world.get_cell("world", BlockPos::new(0, 66, 0)).unwrap(), Material::Air);
    }

    #[test]
    fn test_build_fails_without_world() {
        let world = MemoryWorld::new();
        let result = alpha().build(&world);
        assert!(matches!(result, Err(ArenaError::WorldUnavailable(_))));
    }

    #[test]
    fn test_remove_clears_footprint() {
        let world = MemoryWorld::with_world("world");
        let arena = alpha();
        arena.build(&world).unwrap();

        arena.remove(&world);

        assert_eq!(world.count("world", Material::Platform), 0);
        assert_eq!(world.count("world", Material::Barrier), 0);
    }

    #[test]
    fn test_remove_on_unloaded_world_is_noop() {
        let world = MemoryWorld::with_world("world");
        let arena = alpha();
        arena.build(&world).unwrap();
        world.unload_world("world");

        arena.remove(&world);
        world.load_world("world");

        assert_eq!(world.count("world", Material::Platform), 256);
    }

    #[test]
    fn test_contains() {
        let arena = alpha();
        assert!(arena.contains(&Location::new("world", Vec3::new(7.5, 63.0, -7.5))));
        assert!(arena.contains(&Location::new("world", Vec3::new(0.0, 74.0, 0.0))));
        assert!(!arena.contains(&Location::new("world", Vec3::new(7.6, 65.0, 0.0))));
        assert!(!arena.contains(&Location::new("other", Vec3::new(0.0, 65.0, 0.0))));
    }

    #[test]
    fn test_is_on_platform() {
        let arena = alpha();
        assert!(arena.is_on_platform(&Location::new("world", Vec3::new(1.0, 65.0, 1.0))));
        // Below the floor top
        assert!(!arena.is_on_platform(&Location::new("world", Vec3::new(1.0, 63.5, 1.0))));
        assert!(!arena.is_on_platform(&Location::new("world", Vec3::new(9.0, 65.0, 1.0))));
    }

    #[test]
    fn test_distance_from_edge() {
        let arena = alpha();
        let inside = Location::new("world", Vec3::new(3.0, 65.0, 3.0));
        assert_eq!(arena.distance_from_edge(&inside), 0.0);

        let east = Location::new("world", Vec3::new(10.5, 65.0, 0.0));
        assert!((arena.distance_from_edge(&east) - 3.0).abs() < 1e-9);

        let corner = Location::new("world", Vec3::new(10.5, 65.0, 11.5));
        assert!((arena.distance_from_edge(&corner) - 5.0).abs() < 1e-9);

        let elsewhere = Location::new("nether", Vec3::ZERO);
        assert_eq!(arena.distance_from_edge(&elsewhere), f64::MAX);
    }

    #[test]
    fn test_wall_spawn_points() {
        let arena = alpha();
        let points = arena.wall_spawn_points();
        assert_eq!(points[0], Vec3::new(0.0, 65.0, -12.5));
        assert_eq!(points[1], Vec3::new(0.0, 65.0, 12.5));
        assert_eq!(points[2], Vec3::new(12.5, 65.0, 0.0));
        assert_eq!(points[3], Vec3::new(-12.5, 65.0, 0.0));
        for p in points {
            assert!(!arena.contains_point(*p));
        }
    }

    #[test]
    fn test_validity() {
        let world = MemoryWorld::with_world("world");
        let mut arena = alpha();
        assert!(arena.is_valid(&world));

        arena.set_enabled(false);
        assert!(!arena.is_valid(&world));

        arena.set_enabled(true);
        world.unload_world("world");
        assert!(!arena.is_valid(&world));

        let tiny = Arena::new("tiny", Location::new("world", Vec3::ZERO), 4);
        assert!(!tiny.is_valid_with(true));
    }

    #[test]
    fn test_definition_round_trip_preserves_geometry() {
        let mut arena = alpha();
        arena.set_enabled(false);

        let json = serde_json::to_string(&arena.definition()).unwrap();
        let def: ArenaDefinition = serde_json::from_str(&json).unwrap();
        let rebuilt = Arena::from_definition("alpha", &def);

        assert_eq!(rebuilt.bounds(), arena.bounds());
        assert_eq!(rebuilt.wall_spawn_points(), arena.wall_spawn_points());
        assert_eq!(rebuilt.spawn_point(), arena.spawn_point());
        assert!(!rebuilt.is_enabled());
    }

    #[test]
    fn test_definition_defaults() {
        let def: ArenaDefinition =
            serde_json::from_str(r#"{"world":"world","x":0.0,"y":64.0,"z":0.0}"#).unwrap();
        assert_eq!(def.size, 15);
        assert!(def.enabled);
    }

    #[test]
    fn test_info() {
        let info = alpha().info();
        assert!(info.contains("alpha"));
        assert!(info.contains("15x15"));
    }

    /// Reports every cell as solid and rejects every write
    struct ReadOnlyWorld {
        writes: std::sync::atomic::AtomicUsize,
    }

    impl WorldGrid for ReadOnlyWorld {
        fn set_cell(&self, world: &str, _: BlockPos, _: Material) -> Result<(), WorldError> {
            self.writes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Err(WorldError::NotLoaded(world.to_string()))
        }

        fn get_cell(&self, _: &str, _: BlockPos) -> Result<Material, WorldError> {
            Ok(Material::Platform)
        }

        fn is_loaded(&self, _: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_remove_continues_past_failed_writes() {
        let world = ReadOnlyWorld {
            writes: std::sync::atomic::AtomicUsize::new(0),
        };

        alpha().remove(&world);

        // 16x16 platform plus the ring, floor through barrier top
        let attempted = world.writes.load(std::sync::atomic::Ordering::Relaxed);
        assert_eq!(attempted, 18 * 18 * (BARRIER_HEIGHT as usize + 1));
    }
}
