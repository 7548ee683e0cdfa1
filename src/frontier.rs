//! LOD pyramid: `kFrontierLevels` concentric circles of coarse tiles, each
//! at half the horizontal resolution of the previous, packed 2x2 into
//! shared multi-meshes, with a 4-bit child-coverage visibility mask and
//! bottom-up dirty propagation.

use crate::block::BlockRegistry;
use crate::chunk::CHUNK_WIDTH;
use crate::circle::Circle;
use crate::column::Column;
use crate::mesher::{ColumnLoader, Mesher};

/// Horizontal tiles-per-base-chunk reduction at the finest frontier level.
pub const FRONTIER_LOD: u32 = 2;
/// Tiles are packed in 2x2 groups sharing one GPU multi-mesh.
pub const MULTI_MESH_SIDE: u32 = 2;
/// Tiles allowed to produce new meshes per level, per frame.
pub const LOD_CHUNKS_TO_MESH_PER_FRAME: usize = 1;

/// One coarse tile: its opaque/water geometry (if meshed) and its 4-bit
/// child-coverage visibility mask.
pub struct Tile<T> {
    pub solid: Option<T>,
    pub water: Option<T>,
    /// Bit `k` set iff child tile `k` (packed 2x2 at level L-1) has a mesh.
    pub mask: u8,
}

impl<T> Tile<T> {
    fn new() -> Self {
        Self { solid: None, water: None, mask: 0 }
    }

    #[must_use]
    pub fn has_mesh(&self) -> bool {
        self.solid.is_some() || self.water.is_some()
    }

    /// A tile is drawn unless every child quadrant is itself meshed (the
    /// finer tiles cover it completely).
    #[must_use]
    pub fn is_drawn(&self) -> bool {
        self.mask != 0b1111
    }
}

struct Level<T> {
    tiles: Circle<Tile<T>>,
    dirty: bool,
}

pub struct Frontier<M: Mesher> {
    levels: Vec<Level<M::Tile>>,
}

impl<M: Mesher> Frontier<M> {
    #[must_use]
    pub fn new(radius: i32, levels: u32) -> Self {
        let levels = (0..levels).map(|_| Level { tiles: Circle::new(radius), dirty: true }).collect();
        Self { levels }
    }

    #[must_use]
    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    #[must_use]
    pub fn is_dirty(&self, level: u32) -> bool {
        self.levels.get(level as usize).is_some_and(|l| l.dirty)
    }

    pub fn mark_level_dirty(&mut self, level: u32) {
        if let Some(l) = self.levels.get_mut(level as usize) {
            l.dirty = true;
        }
    }

    /// Shift every level's circle to `(cx,cz)` scaled by that level's
    /// coordinate reduction (`level+1` right-shifts, since level 0 already
    /// groups chunks 2x2).
    pub fn recenter(&mut self, cx: i32, cz: i32) {
        for (level, l) in self.levels.iter_mut().enumerate() {
            let shift = level as u32 + 1;
            let (tcx, tcz) = (cx >> shift, cz >> shift);
            l.tiles.recenter(tcx, tcz, |_, _, _| {});
        }
    }

    #[must_use]
    pub fn tile_mask(&self, level: u32, cx: i32, cz: i32) -> Option<u8> {
        self.levels.get(level as usize)?.tiles.get(cx, cz).map(|t| t.mask)
    }

    /// Process each dirty level bottom-up: for every tile slot, recompute
    /// its visibility mask from whether its 4 level-below children are
    /// meshed, and (budget permitting) mesh any tile that doesn't have
    /// geometry yet. Creating/destroying a tile's mesh marks the next level
    /// dirty; a level with work left over stays dirty.
    pub fn remesh(&mut self, mesher: &mut M, loader: &mut dyn ColumnLoader, registry: &BlockRegistry) {
        let num_levels = self.levels.len();
        let mut propagate_dirty = vec![false; num_levels];

        for level in 0..num_levels {
            if !self.levels[level].dirty {
                continue;
            }

            let coords = self.disk_coords(level);
            for &(cx, cz) in &coords {
                if self.levels[level].tiles.get(cx, cz).is_none() {
                    self.levels[level].tiles.set(cx, cz, Tile::new());
                }
            }

            let mut budget = LOD_CHUNKS_TO_MESH_PER_FRAME;
            let mut pending = false;

            for (cx, cz) in coords {
                if level > 0 {
                    let mask = self.child_mask(level, cx, cz);
                    if let Some(tile) = self.levels[level].tiles.get_mut(cx, cz) {
                        tile.mask = mask;
                    }
                }

                let Some(tile) = self.levels[level].tiles.get(cx, cz) else { continue };
                if tile.has_mesh() || !tile.is_drawn() {
                    continue;
                }
                if budget == 0 {
                    pending = true;
                    continue;
                }
                budget -= 1;

                let (solid, water) = mesh_tile(mesher, loader, registry, level as u32, cx, cz);
                let created = solid.is_some() || water.is_some();
                if let Some(tile) = self.levels[level].tiles.get_mut(cx, cz) {
                    tile.solid = solid;
                    tile.water = water;
                }
                if created && level + 1 < num_levels {
                    propagate_dirty[level + 1] = true;
                }
            }

            self.levels[level].dirty = pending;
        }

        for (level, dirty) in propagate_dirty.into_iter().enumerate() {
            if dirty {
                self.levels[level].dirty = true;
            }
        }
    }

    /// Every `(cx,cz)` within this level's circle radius of its current
    /// center, nearest-first. Tiles are created lazily here rather than at
    /// construction, since a level's disk only fills in as the world
    /// recenters over it.
    fn disk_coords(&self, level: usize) -> Vec<(i32, i32)> {
        let tiles = &self.levels[level].tiles;
        let (ccx, ccz) = tiles.center();
        let radius = tiles.radius();
        let mut coords = Vec::new();
        for di in -radius..=radius {
            for dj in -radius..=radius {
                if di * di + dj * dj <= radius * radius {
                    coords.push((di, dj));
                }
            }
        }
        coords.sort_by_key(|(di, dj)| di * di + dj * dj);
        coords.into_iter().map(|(di, dj)| (ccx + di, ccz + dj)).collect()
    }

    /// Bit `k` of the returned mask is set iff child tile `k` (the 2x2 pack
    /// of `level-1` tiles this tile's coordinates expand to) has a mesh.
    fn child_mask(&self, level: usize, cx: i32, cz: i32) -> u8 {
        let Some(child_level) = level.checked_sub(1) else { return 0 };
        let mut mask = 0u8;
        for k in 0..4u8 {
            let dx = (k & 1) as i32;
            let dz = (k >> 1) as i32;
            let (ccx, ccz) = (cx * 2 + dx, cz * 2 + dz);
            if self.levels[child_level].tiles.get(ccx, ccz).is_some_and(Tile::has_mesh) {
                mask |= 1 << k;
            }
        }
        mask
    }
}

/// `side = W / FRONTIER_LOD`; a tile's heightmap strip is `(side+2)^2`
/// cells, with a one-cell skirt in each direction.
#[must_use]
pub fn tile_strip_side() -> usize {
    CHUNK_WIDTH / FRONTIER_LOD as usize
}

/// Mesh a tile's four 1-chunk-base-aligned quadrants: for each, sample a
/// `(side+2)^2` heightmap strip from the loader at stride `kFrontierLOD<<L`
/// (tallest solid cell for the opaque pass, tallest liquid cell for the
/// water pass), then call the mesher once per pass. All four quadrants
/// share the tile's `mask_index` (its slot within its multi-mesh pack); a
/// quadrant that doesn't produce a handle for a pass leaves the previous
/// quadrant's handle for that pass in place.
fn mesh_tile<M: Mesher>(
    mesher: &mut M,
    loader: &mut dyn ColumnLoader,
    registry: &BlockRegistry,
    level: u32,
    cx: i32,
    cz: i32,
) -> (Option<M::Tile>, Option<M::Tile>) {
    let shift = level + 1;
    let quadrant_chunks = 1i32 << level;
    let stride = (FRONTIER_LOD << level) as i32;
    let lod = FRONTIER_LOD << level;
    let side = tile_strip_side();
    let n = side + 2;
    let mask_index = ((cx & 1) | ((cz & 1) << 1)) as u8;

    let origin_x = (cx << shift) * CHUNK_WIDTH as i32;
    let origin_z = (cz << shift) * CHUNK_WIDTH as i32;

    let mut solid_result = None;
    let mut water_result = None;
    let mut col = Column::new();

    for qz in 0..2 {
        for qx in 0..2 {
            let px = origin_x + qx * quadrant_chunks * CHUNK_WIDTH as i32;
            let pz = origin_z + qz * quadrant_chunks * CHUNK_WIDTH as i32;

            let mut opaque_strip = vec![0u16; n * n];
            let mut water_strip = vec![0u16; n * n];
            for j in 0..n {
                for i in 0..n {
                    let wx = px + (i as i32 - 1) * stride;
                    let wz = pz + (j as i32 - 1) * stride;
                    col.clear();
                    loader.load(wx, wz, &mut col);
                    opaque_strip[i + j * n] = col.tallest(|b| registry.is_solid(b));
                    water_strip[i + j * n] = col.tallest(|b| registry.is_liquid(b));
                }
            }

            let solid = mesher.mesh_frontier(&opaque_strip, mask_index, px, pz, n as u32, n as u32, lod, None, true);
            if solid.is_some() {
                solid_result = solid;
            }
            let water = mesher.mesh_frontier(&water_strip, mask_index, px, pz, n as u32, n as u32, lod, None, false);
            if water.is_some() {
                water_result = water;
            }
        }
    }

    (solid_result, water_result)
}
