//! Loader and watcher for block/material RON files, supporting hot reload.
//!
//! A host calls [`load_registry_from_dir`] once at startup and
//! [`check_registry_changes`] once per frame (outside the `remesh`/`update`
//! hot path); if the watcher observed a filesystem change, the registry is
//! rebuilt from disk and swapped in.

use super::registry::BlockRegistry;
use crate::error::ConfigError;
use crate::ron_io::{self, RonWatcher};

/// Materials are authored as plain color entries for now; texture-backed
/// materials are constructed programmatically via
/// [`BlockRegistry::add_material_of_texture`] since a texture handle is a
/// renderer concern this crate doesn't own.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MaterialDef {
    pub name: String,
    pub color: [f32; 4],
    #[serde(default)]
    pub liquid: bool,
}

/// Build a `BlockRegistry` from `materials_dir` and `blocks_dir`, in that
/// order (blocks reference materials by name, so materials load first).
///
/// # Errors
/// Returns the first `ConfigError` hit while registering materials or
/// blocks (duplicate name, unknown material reference, bad shorthand).
pub fn load_registry_from_dir(materials_dir: &str, blocks_dir: &str) -> Result<BlockRegistry, ConfigError> {
    let mut registry = BlockRegistry::new();
    let materials: Vec<MaterialDef> = ron_io::load_ron_files(materials_dir);
    for m in materials {
        registry.add_material_of_color(&m.name, m.color, m.liquid)?;
    }
    registry.load_blocks_from_dir(blocks_dir)?;
    Ok(registry)
}

/// Watch both the materials and blocks directories for changes.
pub struct RegistryWatcher {
    pub materials: RonWatcher,
    pub blocks: RonWatcher,
}

impl RegistryWatcher {
    #[must_use]
    pub fn stub() -> Self {
        Self { materials: RonWatcher::stub(), blocks: RonWatcher::stub() }
    }
}

/// Set up filesystem watchers for both registry directories. Falls back to a
/// stub watcher for whichever directory fails, logging the failure, rather
/// than aborting startup.
#[must_use]
pub fn setup_registry_watcher(materials_dir: &str, blocks_dir: &str) -> RegistryWatcher {
    let materials = ron_io::setup_ron_watcher(materials_dir).unwrap_or_else(|e| {
        log::warn!("could not watch '{materials_dir}': {e}");
        RonWatcher::stub()
    });
    let blocks = ron_io::setup_ron_watcher(blocks_dir).unwrap_or_else(|e| {
        log::warn!("could not watch '{blocks_dir}': {e}");
        RonWatcher::stub()
    });
    RegistryWatcher { materials, blocks }
}

/// If either watched directory changed since the last call, reload the
/// registry from disk and return the new one.
///
/// # Errors
/// Returns a `ConfigError` if the reload itself fails; the caller keeps its
/// last-known-good registry in that case.
pub fn check_registry_changes(
    watcher: &RegistryWatcher,
    materials_dir: &str,
    blocks_dir: &str,
) -> Result<Option<BlockRegistry>, ConfigError> {
    let changed = watcher.materials.take_changed() | watcher.blocks.take_changed();
    if !changed {
        return Ok(None);
    }
    log::info!("registry changed, reloading from {materials_dir} / {blocks_dir}");
    load_registry_from_dir(materials_dir, blocks_dir).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_materials_then_blocks_from_ron() {
        let dir = std::env::temp_dir().join(format!("stratum-test-{}", std::process::id()));
        let materials_dir = dir.join("materials");
        let blocks_dir = dir.join("blocks");
        std::fs::create_dir_all(&materials_dir).unwrap();
        std::fs::create_dir_all(&blocks_dir).unwrap();

        let mut f = std::fs::File::create(materials_dir.join("stone.ron")).unwrap();
        writeln!(f, "(name: \"stone\", color: (0.5, 0.5, 0.5, 1.0), liquid: false)").unwrap();

        let mut f = std::fs::File::create(blocks_dir.join("stone.ron")).unwrap();
        writeln!(f, "(name: \"stone\", materials: [\"stone\"], solid: true)").unwrap();

        let registry = load_registry_from_dir(materials_dir.to_str().unwrap(), blocks_dir.to_str().unwrap()).unwrap();
        assert!(registry.block_id("stone").is_some());

        std::fs::remove_dir_all(&dir).ok();
    }
}
