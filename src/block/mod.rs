//! Block and material definitions, plus a RON-backed loader/watcher pair for
//! hot-reloading registry content during development.

pub mod loader;
pub mod registry;

pub use registry::{
    Block, BlockDef, BlockId, BlockKind, BlockRegistry, Face, InstancedMeshKind, Material, MaterialId,
    TextureRef, AIR, FACES, NO_MATERIAL, UNKNOWN,
};
