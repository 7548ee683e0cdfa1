//! Block and material tables consulted by the mesher and by world queries.
//!
//! Block 0 is always `empty`; block 1 is always `unknown` (the sentinel
//! returned for a query into not-yet-loaded world). Every other id is
//! assigned by the application through [`BlockRegistry::add_block`] /
//! [`BlockRegistry::add_block_mesh`].

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Compact block identifier. Kept as `u8` to keep chunk storage small.
pub type BlockId = u8;

/// Sentinel id for empty space.
pub const AIR: BlockId = 0;
/// Sentinel id returned for queries into not-yet-loaded chunks.
pub const UNKNOWN: BlockId = 1;

const FIRST_FREE_ID: BlockId = 2;

/// The six block faces, in the fixed order the spec keys material arrays by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

pub const FACES: [Face; 6] = [Face::PosX, Face::NegX, Face::PosY, Face::NegY, Face::PosZ, Face::NegZ];

/// Handle into [`BlockRegistry::materials`]. `NO_MATERIAL` means "emit no
/// face here" — used by instanced-mesh blocks.
pub type MaterialId = u32;
pub const NO_MATERIAL: MaterialId = MaterialId::MAX;

/// An optional texture backing a material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureRef {
    pub path: String,
    /// Punch-through alpha testing (foliage, glass panes) rather than a
    /// fully opaque sample.
    #[serde(default)]
    pub alpha_test: bool,
    #[serde(default)]
    pub layer: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub color: [f32; 4],
    #[serde(default)]
    pub liquid: bool,
    #[serde(default)]
    pub texture: Option<TextureRef>,
}

impl Material {
    /// A material disables the owning block's opacity if it blends or
    /// alpha-tests, or if it's a liquid surface.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.liquid || self.color[3] < 1.0 || self.texture.as_ref().is_some_and(|t| t.alpha_test)
    }
}

/// Identifies the instanced (sprite) mesh kind a block spawns, for blocks
/// that don't participate in face meshing at all (grass tufts, etc).
pub type InstancedMeshKind = u32;

#[derive(Debug, Clone)]
pub enum BlockKind {
    /// A block meshed as part of the padded-volume surface pass. Carries one
    /// material per face, in [`FACES`] order; a face may be [`NO_MATERIAL`].
    Faces([MaterialId; 6]),
    /// A block that never emits a face quad; instead the chunk reserves one
    /// instance per occupied, non-equi-level cell in the named mesh kind.
    InstancedMesh(InstancedMeshKind),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub kind: BlockKind,
    pub opaque: bool,
    pub solid: bool,
}

/// Serializable authoring shorthand for a block's face materials: 1 entry
/// (all faces), 2 (top+bottom, sides), 3 (top, bottom, sides), or 6
/// (explicit `[+x,-x,+y,-y,+z,-z]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDef {
    pub name: String,
    pub materials: Vec<String>,
    #[serde(default = "default_true")]
    pub solid: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Default)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
    blocks_by_name: HashMap<String, BlockId>,
    materials: Vec<Material>,
    materials_by_name: HashMap<String, MaterialId>,
}

impl BlockRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut reg = Self::default();
        reg.blocks.push(Block {
            id: AIR,
            name: "empty".to_string(),
            kind: BlockKind::Faces([NO_MATERIAL; 6]),
            opaque: false,
            solid: false,
        });
        reg.blocks.push(Block {
            id: UNKNOWN,
            name: "unknown".to_string(),
            kind: BlockKind::Faces([NO_MATERIAL; 6]),
            opaque: false,
            solid: false,
        });
        reg
    }

    fn next_block_id(&self) -> BlockId {
        self.blocks.len() as BlockId
    }

    fn check_name(name: &str) -> Result<(), ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(())
    }

    pub fn add_material_of_color(
        &mut self,
        name: &str,
        rgba: [f32; 4],
        liquid: bool,
    ) -> Result<MaterialId, ConfigError> {
        self.add_material(Material { name: name.to_string(), color: rgba, liquid, texture: None })
    }

    pub fn add_material_of_texture(
        &mut self,
        name: &str,
        texture: TextureRef,
        rgba: Option<[f32; 4]>,
        liquid: bool,
    ) -> Result<MaterialId, ConfigError> {
        self.add_material(Material {
            name: name.to_string(),
            color: rgba.unwrap_or([1.0, 1.0, 1.0, 1.0]),
            liquid,
            texture: Some(texture),
        })
    }

    fn add_material(&mut self, material: Material) -> Result<MaterialId, ConfigError> {
        Self::check_name(&material.name)?;
        if self.materials_by_name.contains_key(&material.name) {
            return Err(ConfigError::DuplicateMaterial(material.name));
        }
        let id = self.materials.len() as MaterialId;
        self.materials_by_name.insert(material.name.clone(), id);
        self.materials.push(material);
        Ok(id)
    }

    #[must_use]
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        if id == NO_MATERIAL {
            return None;
        }
        self.materials.get(id as usize)
    }

    #[must_use]
    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.materials_by_name.get(name).copied()
    }

    /// Expand a 1/2/3/6-entry material-name shorthand into the fixed
    /// `[+x,-x,+y,-y,+z,-z]` face order.
    fn expand_faces(&self, names: &[&str]) -> Result<[MaterialId; 6], ConfigError> {
        let lookup = |n: &str| -> Result<MaterialId, ConfigError> {
            self.material_id(n).ok_or_else(|| ConfigError::UnknownMaterial(n.to_string()))
        };

        let (top, bottom, side) = match names {
            [all] => (*all, *all, *all),
            [top_bottom, sides] => (*top_bottom, *top_bottom, *sides),
            [top, bottom, sides] => (*top, *bottom, *sides),
            [px, nx, py, ny, pz, nz] => {
                return Ok([lookup(px)?, lookup(nx)?, lookup(py)?, lookup(ny)?, lookup(pz)?, lookup(nz)?]);
            }
            other => return Err(ConfigError::BadFaceShorthand(other.len())),
        };
        let side_id = lookup(side)?;
        Ok([side_id, side_id, lookup(top)?, lookup(bottom)?, side_id, side_id])
    }

    pub fn add_block(&mut self, name: &str, material_names: &[&str], solid: bool) -> Result<BlockId, ConfigError> {
        Self::check_name(name)?;
        if self.blocks_by_name.contains_key(name) {
            return Err(ConfigError::DuplicateBlock(name.to_string()));
        }
        let faces = self.expand_faces(material_names)?;
        let opaque = faces
            .iter()
            .all(|&m| m != NO_MATERIAL && !self.material(m).is_some_and(Material::is_transparent));

        let id = self.next_block_id();
        self.blocks_by_name.insert(name.to_string(), id);
        self.blocks.push(Block { id, name: name.to_string(), kind: BlockKind::Faces(faces), opaque, solid });
        Ok(id)
    }

    pub fn add_block_mesh(&mut self, name: &str, instanced_mesh: InstancedMeshKind, solid: bool) -> Result<BlockId, ConfigError> {
        Self::check_name(name)?;
        if self.blocks_by_name.contains_key(name) {
            return Err(ConfigError::DuplicateBlock(name.to_string()));
        }
        let id = self.next_block_id();
        self.blocks_by_name.insert(name.to_string(), id);
        self.blocks.push(Block { id, name: name.to_string(), kind: BlockKind::InstancedMesh(instanced_mesh), opaque: false, solid });
        Ok(id)
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    #[must_use]
    pub fn block_id(&self, name: &str) -> Option<BlockId> {
        self.blocks_by_name.get(name).copied()
    }

    #[must_use]
    pub fn is_opaque(&self, id: BlockId) -> bool {
        self.block(id).is_some_and(|b| b.opaque)
    }

    #[must_use]
    pub fn is_solid(&self, id: BlockId) -> bool {
        self.block(id).is_some_and(|b| b.solid)
    }

    /// A block counts as liquid if any of its face materials is a liquid
    /// surface. Instanced-mesh blocks are never liquid.
    #[must_use]
    pub fn is_liquid(&self, id: BlockId) -> bool {
        let Some(block) = self.block(id) else { return false };
        let BlockKind::Faces(faces) = &block.kind else { return false };
        faces.iter().any(|&m| self.material(m).is_some_and(|mat| mat.liquid))
    }

    /// Load a directory of `BlockDef` RON files and register each against
    /// already-registered materials. Individual unparseable files are
    /// skipped (and logged) by [`crate::ron_io::load_ron_files`]; a `BlockDef`
    /// naming a missing material or a duplicate name is a `ConfigError`.
    ///
    /// # Errors
    /// Returns the first `ConfigError` encountered while registering blocks.
    pub fn load_blocks_from_dir(&mut self, dir: &str) -> Result<(), ConfigError> {
        let defs: Vec<BlockDef> = crate::ron_io::load_ron_files(dir);
        for def in defs {
            let names: Vec<&str> = def.materials.iter().map(String::as_str).collect();
            self.add_block(&def.name, &names, def.solid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_stone() -> BlockRegistry {
        let mut reg = BlockRegistry::new();
        reg.add_material_of_color("stone", [0.5, 0.5, 0.5, 1.0], false).unwrap();
        reg.add_material_of_color("glass", [0.8, 0.9, 1.0, 0.4], false).unwrap();
        reg
    }

    #[test]
    fn reserved_ids_are_preregistered() {
        let reg = BlockRegistry::new();
        assert_eq!(reg.block(AIR).unwrap().name, "empty");
        assert_eq!(reg.block(UNKNOWN).unwrap().name, "unknown");
    }

    #[test]
    fn single_entry_shorthand_fills_all_faces() {
        let mut reg = registry_with_stone();
        let id = reg.add_block("stone", &["stone"], true).unwrap();
        let block = reg.block(id).unwrap();
        assert!(block.opaque);
        let BlockKind::Faces(faces) = &block.kind else { panic!("expected face block") };
        assert!(faces.iter().all(|&m| m == reg.material_id("stone").unwrap()));
    }

    #[test]
    fn transparent_material_disables_opacity() {
        let mut reg = registry_with_stone();
        let id = reg.add_block("glass_block", &["glass"], true).unwrap();
        assert!(!reg.is_opaque(id));
    }

    #[test]
    fn duplicate_block_name_is_an_error() {
        let mut reg = registry_with_stone();
        reg.add_block("stone", &["stone"], true).unwrap();
        let err = reg.add_block("stone", &["stone"], true).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBlock(_)));
    }

    #[test]
    fn unknown_material_name_is_an_error() {
        let mut reg = registry_with_stone();
        let err = reg.add_block("mystery", &["nope"], true).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMaterial(_)));
    }

    #[test]
    fn liquid_material_marks_the_block_liquid() {
        let mut reg = registry_with_stone();
        reg.add_material_of_color("water", [0.2, 0.3, 0.8, 0.6], true).unwrap();
        let water = reg.add_block("water", &["water"], false).unwrap();
        let stone = reg.add_block("stone_block", &["stone"], true).unwrap();
        assert!(reg.is_liquid(water));
        assert!(!reg.is_liquid(stone));
    }

    #[test]
    fn bad_face_count_is_an_error() {
        let mut reg = registry_with_stone();
        let err = reg.add_block("weird", &["stone", "stone", "stone", "stone"], true).unwrap_err();
        assert!(matches!(err, ConfigError::BadFaceShorthand(4)));
    }
}
