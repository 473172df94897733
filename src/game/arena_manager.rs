//! Arena registry
//!
//! Holds active and disabled arenas in separate tables, persists their
//! definitions to a JSON file, and reacts to world availability changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::ArenaValidationConfig;
use crate::game::arena::{Arena, ArenaDefinition, ArenaError};
use crate::host::Location;
use crate::world::WorldGrid;

/// On-disk layout of the arena file
#[derive(Debug, Default, Serialize, Deserialize)]
struct ArenaFile {
    #[serde(default)]
    arenas: BTreeMap<String, serde_json::Value>,
}

/// Outcome of loading the arena file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub failed: usize,
    pub disabled: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArenaStatistics {
    pub total_arenas: usize,
    pub active_arenas: usize,
    pub disabled_arenas: usize,
    pub arenas_by_world: BTreeMap<String, usize>,
}

pub struct ArenaManager {
    arenas: HashMap<String, Arc<Arena>>,
    disabled: HashMap<String, Arc<Arena>>,
    world: Arc<dyn WorldGrid>,
    bounds: ArenaValidationConfig,
    file: Option<PathBuf>,
}

impl ArenaManager {
    /// Registry without a backing file
    pub fn new(world: Arc<dyn WorldGrid>, bounds: ArenaValidationConfig) -> Self {
        Self {
            arenas: HashMap::new(),
            disabled: HashMap::new(),
            world,
            bounds,
            file: None,
        }
    }

    /// Registry persisted to `path`, loading whatever it already holds
    pub fn with_file(
        world: Arc<dyn WorldGrid>,
        bounds: ArenaValidationConfig,
        path: impl Into<PathBuf>,
    ) -> Self {
        let mut manager = Self::new(world, bounds);
        manager.file = Some(path.into());
        manager.load();
        manager
    }

    /// Read definitions from the backing file into the registry
    pub fn load(&mut self) -> LoadSummary {
        let mut summary = LoadSummary::default();
        let Some(path) = self.file.clone() else {
            return summary;
        };

        let file = match read_arena_file(&path) {
            Ok(Some(file)) => file,
            Ok(None) => {
                info!("No arenas found in {}", path.display());
                return summary;
            }
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return summary;
            }
        };

        for (name, value) in file.arenas {
            let def: ArenaDefinition = match serde_json::from_value(value) {
                Ok(def) => def,
                Err(e) => {
                    warn!("Failed to load arena '{}': {}", name, e);
                    summary.failed += 1;
                    continue;
                }
            };

            let arena = Arc::new(Arena::from_definition(name.clone(), &def));
            if arena.is_valid(self.world.as_ref()) {
                self.arenas.insert(name, arena);
                summary.loaded += 1;
            } else {
                warn!("Arena '{}' is invalid and has been disabled", name);
                self.disabled.insert(name, arena);
                summary.disabled += 1;
            }
        }

        info!(
            "Loaded {} arenas ({} failed, {} disabled)",
            summary.loaded, summary.failed, summary.disabled
        );
        summary
    }

    /// Write every definition to the backing file
    pub fn save(&self) -> Result<(), ArenaError> {
        let Some(path) = &self.file else {
            return Ok(());
        };

        let file = ArenaFile {
            arenas: self
                .all_arenas()
                .into_iter()
                .map(|a| {
                    let value = serde_json::to_value(a.definition())
                        .map_err(|e| ArenaError::Persistence(e.to_string()))?;
                    Ok((a.name().to_string(), value))
                })
                .collect::<Result<_, ArenaError>>()?,
        };

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| ArenaError::Persistence(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(&file).map_err(|e| ArenaError::Persistence(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| ArenaError::Persistence(e.to_string()))
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            error!("{}", e);
        }
    }

    /// Validate, build and register a new arena
    pub fn create_arena(
        &mut self,
        name: &str,
        center: Location,
        size: u32,
    ) -> Result<Arc<Arena>, ArenaError> {
        if self.arena_exists(name) {
            return Err(ArenaError::AlreadyExists(name.to_string()));
        }
        if !self.bounds.accepts(size) {
            return Err(ArenaError::InvalidSize {
                size,
                min: self.bounds.min_platform_size,
                max: self.bounds.max_platform_size,
            });
        }
        if !self.world.is_loaded(&center.world) {
            return Err(ArenaError::WorldUnavailable(center.world));
        }

        let arena = Arena::new(name, center, size);
        arena.build(self.world.as_ref())?;

        let block = arena.center().block();
        info!(
            "Created arena: {} at {} {},{},{}",
            name,
            arena.world(),
            block.x,
            block.y,
            block.z
        );

        let arena = Arc::new(arena);
        self.arenas.insert(name.to_string(), arena.clone());
        self.persist();
        Ok(arena)
    }

    /// Unregister an arena and clear its footprint
    pub fn delete_arena(&mut self, name: &str) -> Result<(), ArenaError> {
        let arena = self
            .arenas
            .remove(name)
            .or_else(|| self.disabled.remove(name))
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?;

        arena.remove(self.world.as_ref());
        self.persist();
        info!("Deleted arena: {}", name);
        Ok(())
    }

    /// Active or disabled arena by name
    pub fn get_arena(&self, name: &str) -> Option<Arc<Arena>> {
        self.arenas.get(name).or_else(|| self.disabled.get(name)).cloned()
    }

    pub fn arena_exists(&self, name: &str) -> bool {
        self.arenas.contains_key(name) || self.disabled.contains_key(name)
    }

    /// Active arenas that can host a game, in name order
    fn playable(&self) -> Vec<&Arc<Arena>> {
        let mut playable: Vec<_> = self
            .arenas
            .values()
            .filter(|a| a.is_valid(self.world.as_ref()))
            .collect();
        playable.sort_by(|a, b| a.name().cmp(b.name()));
        playable
    }

    pub fn random_arena<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Arc<Arena>> {
        self.playable().choose(rng).map(|a| Arc::clone(a))
    }

    /// Closest playable arena in the participant's world, else a random one
    pub fn best_arena<R: Rng + ?Sized>(
        &self,
        location: Option<&Location>,
        rng: &mut R,
    ) -> Option<Arc<Arena>> {
        let closest = location.and_then(|loc| {
            self.playable()
                .into_iter()
                .filter_map(|a| a.center_location().distance_to(loc).map(|d| (d, a)))
                .min_by(|(a, _), (b, _)| a.total_cmp(b))
                .map(|(_, a)| a.clone())
        });
        closest.or_else(|| self.random_arena(rng))
    }

    /// Enable or disable an arena, moving it between tables
    pub fn set_arena_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ArenaError> {
        let mut arena = self
            .arenas
            .remove(name)
            .or_else(|| self.disabled.remove(name))
            .ok_or_else(|| ArenaError::NotFound(name.to_string()))?;

        Arc::make_mut(&mut arena).set_enabled(enabled);
        if enabled && arena.is_valid(self.world.as_ref()) {
            self.arenas.insert(name.to_string(), arena);
            info!("Arena '{}' enabled", name);
        } else {
            self.disabled.insert(name.to_string(), arena);
            info!("Arena '{}' disabled", name);
        }

        self.persist();
        Ok(())
    }

    /// Move active arenas that no longer validate to the disabled table
    pub fn validate_arenas(&mut self) -> usize {
        let invalid: Vec<String> = self
            .arenas
            .iter()
            .filter(|(_, a)| !a.is_valid(self.world.as_ref()))
            .map(|(name, _)| name.clone())
            .collect();

        for name in &invalid {
            if let Some(arena) = self.arenas.remove(name) {
                self.disabled.insert(name.clone(), arena);
                warn!("Arena '{}' has been disabled due to validation failure", name);
            }
        }

        if !invalid.is_empty() {
            self.persist();
        }
        invalid.len()
    }

    /// Host notification that a world was loaded or unloaded
    pub fn on_world_availability_changed(&mut self, world: &str, loaded: bool) {
        if loaded {
            let revived: Vec<String> = self
                .disabled
                .iter()
                .filter(|(_, a)| a.world() == world && a.is_valid(self.world.as_ref()))
                .map(|(name, _)| name.clone())
                .collect();
            for name in revived {
                if let Some(arena) = self.disabled.remove(&name) {
                    info!("Arena '{}' re-enabled after world load", name);
                    self.arenas.insert(name, arena);
                }
            }
            self.validate_arenas();
        } else {
            let affected: Vec<String> = self
                .arenas
                .iter()
                .filter(|(_, a)| a.world() == world)
                .map(|(name, _)| name.clone())
                .collect();
            for name in affected {
                if let Some(arena) = self.arenas.remove(&name) {
                    info!("Arena '{}' disabled due to world unload", name);
                    self.disabled.insert(name, arena);
                }
            }
        }
    }

    /// Active arenas
    pub fn arenas(&self) -> Vec<Arc<Arena>> {
        self.arenas.values().cloned().collect()
    }

    /// Active and disabled arenas, in name order
    pub fn all_arenas(&self) -> Vec<Arc<Arena>> {
        let mut all: Vec<_> = self.arenas.values().chain(self.disabled.values()).cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Names of active arenas
    pub fn arena_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.arenas.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn statistics(&self) -> ArenaStatistics {
        let mut arenas_by_world = BTreeMap::new();
        for arena in self.arenas.values().chain(self.disabled.values()) {
            *arenas_by_world.entry(arena.world().to_string()).or_insert(0) += 1;
        }
        ArenaStatistics {
            total_arenas: self.arenas.len() + self.disabled.len(),
            active_arenas: self.arenas.len(),
            disabled_arenas: self.disabled.len(),
            arenas_by_world,
        }
    }

    /// Drop everything and re-read the backing file
    pub fn reload(&mut self) -> LoadSummary {
        self.arenas.clear();
        self.disabled.clear();
        let summary = self.load();
        info!("Arena manager reloaded");
        summary
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

fn read_arena_file(path: &Path) -> Result<Option<ArenaFile>, ArenaError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| ArenaError::Persistence(e.to_string()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| ArenaError::Persistence(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec3::Vec3;
    use crate::world::{Material, MemoryWorld};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Arc<MemoryWorld>, ArenaManager) {
        let world = Arc::new(MemoryWorld::with_world("world"));
        let manager = ArenaManager::new(world.clone(), ArenaValidationConfig::default());
        (world, manager)
    }

    fn at(x: f64, z: f64) -> Location {
        Location::new("world", Vec3::new(x, 64.0, z))
    }

    fn temp_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hitw-arenas-{}-{}.json", tag, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_create_arena_builds_and_registers() {
        let (world, mut manager) = setup();
        let arena = manager.create_arena("alpha", at(0.0, 0.0), 15).unwrap();

        assert_eq!(arena.name(), "alpha");
        assert!(manager.arena_exists("alpha"));
        assert_eq!(world.count("world", Material::Platform), 256);
    }

    #[test]
    fn test_create_arena_rejections() {
        let (_world, mut manager) = setup();
        manager.create_arena("alpha", at(0.0, 0.0), 15).unwrap();

        assert_eq!(
            manager.create_arena("alpha", at(100.0, 0.0), 15).unwrap_err(),
            ArenaError::AlreadyExists("alpha".to_string())
        );
        assert!(matches!(
            manager.create_arena("tiny", at(100.0, 0.0), 9),
            Err(ArenaError::InvalidSize { size: 9, min: 10, max: 30 })
        ));
        assert!(matches!(
            manager.create_arena("huge", at(100.0, 0.0), 31),
            Err(ArenaError::InvalidSize { .. })
        ));
        assert!(matches!(
            manager.create_arena("lost", Location::new("nether", Vec3::ZERO), 15),
            Err(ArenaError::WorldUnavailable(_))
        ));
        assert_eq!(manager.statistics().total_arenas, 1);
    }

    #[test]
    fn test_delete_arena() {
        let (world, mut manager) = setup();
        manager.create_arena("alpha", at(0.0, 0.0), 15).unwrap();

        manager.delete_arena("alpha").unwrap();
        assert!(!manager.arena_exists("alpha"));
        assert_eq!(world.count("world", Material::Platform), 0);
        assert_eq!(
            manager.delete_arena("alpha").unwrap_err(),
            ArenaError::NotFound("alpha".to_string())
        );
    }

    #[test]
    fn test_best_arena_prefers_closest() {
        let (_world, mut manager) = setup();
        manager.create_arena("near", at(0.0, 0.0), 15).unwrap();
        manager.create_arena("far", at(200.0, 0.0), 15).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let best = manager.best_arena(Some(&at(180.0, 5.0)), &mut rng).unwrap();
        assert_eq!(best.name(), "far");

        // Different world falls back to a random playable arena
        let other = Location::new("nether", Vec3::ZERO);
        assert!(manager.best_arena(Some(&other), &mut rng).is_some());
        assert!(manager.best_arena(None, &mut rng).is_some());
    }

    #[test]
    fn test_disabled_arena_is_not_playable() {
        let (_world, mut manager) = setup();
        manager.create_arena("alpha", at(0.0, 0.0), 15).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        manager.set_arena_enabled("alpha", false).unwrap();
        assert!(manager.random_arena(&mut rng).is_none());
        assert!(manager.arena_exists("alpha"));
        assert_eq!(manager.statistics().disabled_arenas, 1);

        manager.set_arena_enabled("alpha", true).unwrap();
        assert!(manager.random_arena(&mut rng).is_some());
        assert!(manager.set_arena_enabled("ghost", true).is_err());
    }

    #[test]
    fn test_world_unload_and_reload() {
        let (world, mut manager) = setup();
        manager.create_arena("alpha", at(0.0, 0.0), 15).unwrap();

        world.unload_world("world");
        manager.on_world_availability_changed("world", false);
        assert!(manager.arena_names().is_empty());
        assert_eq!(manager.statistics().disabled_arenas, 1);

        world.load_world("world");
        manager.on_world_availability_changed("world", true);
        assert_eq!(manager.arena_names(), vec!["alpha".to_string()]);
    }

    #[test]
    fn test_world_load_keeps_admin_disabled_arena_disabled() {
        let (world, mut manager) = setup();
        manager.create_arena("alpha", at(0.0, 0.0), 15).unwrap();
        manager.set_arena_enabled("alpha", false).unwrap();

        world.unload_world("world");
        manager.on_world_availability_changed("world", false);
        world.load_world("world");
        manager.on_world_availability_changed("world", true);

        assert!(manager.arena_names().is_empty());
    }

    #[test]
    fn test_validate_arenas() {
        let (world, mut manager) = setup();
        manager.create_arena("alpha", at(0.0, 0.0), 15).unwrap();
        assert_eq!(manager.validate_arenas(), 0);

        world.unload_world("world");
        assert_eq!(manager.validate_arenas(), 1);
        assert!(manager.get_arena("alpha").is_some());
        assert!(manager.arena_names().is_empty());
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = temp_file("roundtrip");
        let world = Arc::new(MemoryWorld::with_world("world"));
        {
            let mut manager =
                ArenaManager::with_file(world.clone(), ArenaValidationConfig::default(), &path);
            manager.create_arena("alpha", at(0.0, 0.0), 15).unwrap();
            manager.create_arena("beta", at(100.0, 0.0), 20).unwrap();
            manager.set_arena_enabled("beta", false).unwrap();
        }

        let manager = ArenaManager::with_file(world, ArenaValidationConfig::default(), &path);
        let alpha = manager.get_arena("alpha").unwrap();
        let beta = manager.get_arena("beta").unwrap();
        assert_eq!(alpha.bounds(), Arena::new("alpha", at(0.0, 0.0), 15).bounds());
        assert_eq!(beta.platform_size(), 20);
        assert!(!beta.is_enabled());
        assert_eq!(manager.arena_names(), vec!["alpha".to_string()]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_counts_failures_and_disabled() {
        let path = temp_file("load");
        std::fs::write(
            &path,
            r#"{"arenas": {
                "good": {"world": "world", "x": 0.0, "y": 64.0, "z": 0.0},
                "broken": {"world": "world", "x": "left"},
                "elsewhere": {"world": "nether", "x": 0.0, "y": 64.0, "z": 0.0, "size": 12}
            }}"#,
        )
        .unwrap();

        let world = Arc::new(MemoryWorld::with_world("world"));
        let mut manager = ArenaManager::new(world, ArenaValidationConfig::default());
        manager.file = Some(path.clone());
        let summary = manager.load();

        assert_eq!(summary, LoadSummary { loaded: 1, failed: 1, disabled: 1 });
        assert_eq!(manager.get_arena("good").unwrap().platform_size(), 15);
        assert_eq!(manager.statistics().arenas_by_world["nether"], 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let world = Arc::new(MemoryWorld::with_world("world"));
        let manager =
            ArenaManager::with_file(world, ArenaValidationConfig::default(), temp_file("missing"));
        assert_eq!(manager.statistics().total_arenas, 0);
    }
}
