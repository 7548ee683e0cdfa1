//! Top-level coordinator: hosts the chunk circle, the frontier, the
//! registry, the one padded scratch volume the mesher consumes, and the
//! loader callbacks.
//!
//! `World` is generic over the host's concrete [`Mesher`] and
//! [`InstancedMeshHandle`] implementations so this crate never depends on a
//! renderer; it only stores the handles those traits hand back.

use crate::block::{BlockId, BlockRegistry, BlockKind, InstancedMeshKind, AIR};
use crate::chunk::{Chunk, CHUNK_WIDTH, WORLD_HEIGHT};
use crate::circle::Circle;
use crate::column::{Column, ColumnSink};
use crate::error::EngineFault;
use crate::frontier::Frontier;
use crate::mesher::{ChunkMeshInput, ColumnLoader, InstancedMeshHandle, Mesher};
use std::collections::HashMap;

/// Chunks to load per frame during a normal `recenter`.
pub const CHUNKS_TO_LOAD_PER_FRAME: usize = 1;
/// Chunks to remesh per frame, outside the always-allowed 3x3 core.
pub const CHUNKS_TO_MESH_PER_FRAME: usize = 1;
/// The always-brought-current neighborhood around the viewer.
const CORE_EXEMPTION_COUNT: usize = 9;

/// Per-chunk instance handle, tagged with the instanced-mesh kind it was
/// reserved from so it can be released through the right mesh on teardown.
type Instance<IM> = (InstancedMeshKind, <IM as InstancedMeshHandle>::Instance);

type WorldChunk<M, IM> = Chunk<<M as Mesher>::Solid, <M as Mesher>::Water, Instance<IM>>;

fn scratch_index(x: usize, y: usize, z: usize) -> usize {
    let w = CHUNK_WIDTH + 2;
    x + z * w + y * w * w
}

/// The world's single reusable padded scratch volume: chunk interior plus a
/// 1-voxel skirt in X/Z and a 2-voxel skirt in Y (bedrock below, empty
/// above). Consumed only inside [`World::remesh`].
struct ScratchVolume {
    buffer: Vec<BlockId>,
    heightmap: Vec<u16>,
    light_map: Vec<u16>,
    equilevels: Vec<bool>,
}

impl ScratchVolume {
    fn new(bedrock: BlockId) -> Self {
        let w = CHUNK_WIDTH + 2;
        let h = WORLD_HEIGHT + 2;
        let mut buffer = vec![AIR; w * h * w];
        for x in 0..w {
            for z in 0..w {
                buffer[scratch_index(x, 0, z)] = bedrock;
            }
        }
        let mut equilevels = vec![false; h];
        equilevels[0] = true;
        equilevels[h - 1] = true;
        Self { buffer, heightmap: vec![0; w * w], light_map: vec![0; w * w], equilevels }
    }
}

impl ColumnSink for ScratchVolume {
    fn set_voxel(&mut self, x: usize, y: usize, z: usize, block: BlockId) {
        let idx = scratch_index(x, y, z);
        self.buffer[idx] = block;
    }
}

pub struct World<M: Mesher, IM: InstancedMeshHandle> {
    pub registry: BlockRegistry,
    mesher: M,
    chunks: Circle<WorldChunk<M, IM>>,
    frontier: Frontier<M>,
    scratch: ScratchVolume,
    bedrock: BlockId,
    instanced_meshes: HashMap<InstancedMeshKind, IM>,
    load_chunk: Box<dyn ColumnLoader>,
    load_frontier: Box<dyn ColumnLoader>,
}

impl<M: Mesher, IM: InstancedMeshHandle> World<M, IM> {
    pub fn new(
        registry: BlockRegistry,
        mesher: M,
        bedrock: BlockId,
        chunk_radius: i32,
        frontier_radius: i32,
        frontier_levels: u32,
        load_chunk: impl ColumnLoader + 'static,
        load_frontier: impl ColumnLoader + 'static,
    ) -> Self {
        Self {
            registry,
            mesher,
            chunks: Circle::new(chunk_radius),
            frontier: Frontier::new(frontier_radius, frontier_levels),
            scratch: ScratchVolume::new(bedrock),
            bedrock,
            instanced_meshes: HashMap::new(),
            load_chunk: Box::new(load_chunk),
            load_frontier: Box::new(load_frontier),
        }
    }

    pub fn register_instanced_mesh(&mut self, kind: InstancedMeshKind, mesh: IM) {
        self.instanced_meshes.insert(kind, mesh);
    }

    /// Is a chunk loaded at `(cx, cz)`?
    #[must_use]
    pub fn has_chunk(&self, cx: i32, cz: i32) -> bool {
        self.chunks.get(cx, cz).is_some()
    }

    #[must_use]
    pub fn chunk_equilevels(&self, cx: i32, cz: i32) -> Option<&[bool]> {
        self.chunks.get(cx, cz).map(|c| c.equilevels.as_slice())
    }

    #[must_use]
    pub fn chunk_height_at(&self, cx: i32, cz: i32, x: usize, z: usize) -> Option<u16> {
        self.chunks.get(cx, cz).map(|c| c.height_at(x, z))
    }

    #[must_use]
    pub fn chunk_lit_height_at(&self, cx: i32, cz: i32, x: usize, z: usize) -> Option<u16> {
        self.chunks.get(cx, cz).map(|c| c.lit_height_at(x, z))
    }

    #[must_use]
    pub fn chunk_dirty(&self, cx: i32, cz: i32) -> Option<bool> {
        self.chunks.get(cx, cz).map(|c| c.dirty)
    }

    #[must_use]
    pub fn chunk_neighbors(&self, cx: i32, cz: i32) -> Option<u8> {
        self.chunks.get(cx, cz).map(|c| c.neighbors)
    }

    #[must_use]
    pub fn chunk_has_mesh(&self, cx: i32, cz: i32) -> Option<bool> {
        self.chunks.get(cx, cz).map(|c| c.solid_mesh.is_some() || c.water_mesh.is_some())
    }

    #[must_use]
    pub fn frontier_mask(&self, level: u32, cx: i32, cz: i32) -> Option<u8> {
        self.frontier.tile_mask(level, cx, cz)
    }

    #[must_use]
    pub fn frontier_level_count(&self) -> u32 {
        self.frontier.level_count()
    }

    /// World-space query: bedrock below y=0, empty above `WORLD_HEIGHT`,
    /// `UNKNOWN` for a not-yet-loaded chunk, otherwise the stored voxel.
    #[must_use]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        if y < 0 {
            return self.bedrock;
        }
        if y as usize >= WORLD_HEIGHT {
            return AIR;
        }
        let (cx, cz, lx, lz) = Self::split_coords(x, z);
        match self.chunks.get(cx, cz) {
            Some(chunk) => chunk.get_block(lx, y as usize, lz),
            None => crate::block::UNKNOWN,
        }
    }

    /// Set a world-space block, marking the owning chunk (and, if the write
    /// lands on a chunk edge, the edge-adjacent neighbor) dirty.
    ///
    /// Returns `false` if the target chunk isn't loaded or `y` is out of
    /// range.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockId) -> bool {
        if y < 0 || y as usize >= WORLD_HEIGHT {
            return false;
        }
        let (cx, cz, lx, lz) = Self::split_coords(x, z);
        let is_solid = |b: BlockId| self.registry.is_solid(b);
        let changed = match self.chunks.get_mut(cx, cz) {
            Some(chunk) => chunk.set_block(lx, y as usize, lz, block, is_solid),
            None => return false,
        };
        if !changed {
            return false;
        }

        if lx == CHUNK_WIDTH - 1 {
            self.mark_neighbor_dirty(cx + 1, cz);
        } else if lx == 0 {
            self.mark_neighbor_dirty(cx - 1, cz);
        }
        if lz == CHUNK_WIDTH - 1 {
            self.mark_neighbor_dirty(cx, cz + 1);
        } else if lz == 0 {
            self.mark_neighbor_dirty(cx, cz - 1);
        }
        true
    }

    #[must_use]
    pub fn is_block_lit(&self, x: i32, y: i32, z: i32) -> bool {
        if y < 0 {
            return false;
        }
        let (cx, cz, lx, lz) = Self::split_coords(x, z);
        self.chunks.get(cx, cz).is_some_and(|c| c.is_column_lit(lx, lz, y as usize))
    }

    fn mark_neighbor_dirty(&mut self, cx: i32, cz: i32) {
        if let Some(n) = self.chunks.get_mut(cx, cz) {
            n.dirty = true;
        }
    }

    fn split_coords(x: i32, z: i32) -> (i32, i32, usize, usize) {
        let cx = x.div_euclid(CHUNK_WIDTH as i32);
        let cz = z.div_euclid(CHUNK_WIDTH as i32);
        let lx = x.rem_euclid(CHUNK_WIDTH as i32) as usize;
        let lz = z.rem_euclid(CHUNK_WIDTH as i32) as usize;
        (cx, cz, lx, lz)
    }

    /// Recenter the world on the chunk containing world position
    /// `(x, y, z)`: shift the chunk circle (evicting out-of-range chunks
    /// and notifying their neighbors), shift each frontier level at half
    /// the preceding coordinate scale, then load up to
    /// [`CHUNKS_TO_LOAD_PER_FRAME`] new chunks in nearest-first order.
    pub fn recenter(&mut self, x: f32, y: f32, z: f32) {
        let _ = y;
        let cx = (x.floor() as i32) >> 4;
        let cz = (z.floor() as i32) >> 4;

        let mut evicted = Vec::new();
        self.chunks.recenter(cx, cz, |ex, ez, chunk| evicted.push((ex, ez, chunk)));
        for (ex, ez, mut chunk) in evicted {
            self.dispose_chunk(ex, ez, &mut chunk);
        }

        self.frontier.recenter(cx, cz);

        let mut to_load = Vec::new();
        self.each_missing_nearest(cx, cz, CHUNKS_TO_LOAD_PER_FRAME, |ccx, ccz| to_load.push((ccx, ccz)));
        for (lcx, lcz) in to_load {
            self.load_chunk_at(lcx, lcz);
        }
    }

    /// Walk the chunk circle's nearest-first offsets looking for the first
    /// `limit` coordinates that aren't currently occupied.
    fn each_missing_nearest(&self, cx: i32, cz: i32, limit: usize, mut f: impl FnMut(i32, i32)) {
        let mut found = 0;
        let radius = self.chunks.radius();
        for di in -radius..=radius {
            if found >= limit {
                return;
            }
            for dj in -radius..=radius {
                if di * di + dj * dj > radius * radius {
                    continue;
                }
                let (ccx, ccz) = (cx + di, cz + dj);
                if self.chunks.get(ccx, ccz).is_none() {
                    f(ccx, ccz);
                    found += 1;
                    if found >= limit {
                        return;
                    }
                }
            }
        }
    }

    fn load_chunk_at(&mut self, cx: i32, cz: i32) {
        let mut chunk: WorldChunk<M, IM> = Chunk::new(cx, cz);
        let mut col = Column::new();
        for x in 0..CHUNK_WIDTH {
            for z in 0..CHUNK_WIDTH {
                col.clear();
                self.load_chunk.load(cx * CHUNK_WIDTH as i32 + x as i32, cz * CHUNK_WIDTH as i32 + z as i32, &mut col);
                col.fill_chunk(x, z, &mut chunk, x == 0 && z == 0);
            }
        }
        let is_solid = |b: BlockId| self.registry.is_solid(b);
        chunk.recompute_all_heights(is_solid);
        col.fill_equilevels(&mut chunk.equilevels);

        for (dcx, dcz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            if let Some(neighbor) = self.chunks.get_mut(cx + dcx, cz + dcz) {
                neighbor.neighbors += 1;
                chunk.neighbors += 1;
            }
        }

        self.chunks.set(cx, cz, chunk);
    }

    fn dispose_chunk(&mut self, cx: i32, cz: i32, chunk: &mut WorldChunk<M, IM>) {
        let had_mesh = chunk.solid_mesh.is_some() || chunk.water_mesh.is_some();
        if let Some(solid) = chunk.solid_mesh.take() {
            drop_mesh(solid);
        }
        if let Some(water) = chunk.water_mesh.take() {
            drop_mesh(water);
        }

        for (idx, (kind, instance)) in chunk.instances.drain() {
            let _ = idx;
            if let Some(mesh) = self.instanced_meshes.get_mut(&kind) {
                mesh.remove_instance(instance);
            }
        }

        for (dcx, dcz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            if let Some(neighbor) = self.chunks.get_mut(cx + dcx, cz + dcz) {
                neighbor.neighbors = neighbor.neighbors.saturating_sub(1);
                if !neighbor.ready() && (neighbor.solid_mesh.is_some() || neighbor.water_mesh.is_some()) {
                    if let Some(solid) = neighbor.solid_mesh.take() {
                        drop_mesh(solid);
                    }
                    if let Some(water) = neighbor.water_mesh.take() {
                        drop_mesh(water);
                    }
                    neighbor.dirty = true;
                    self.frontier.mark_level_dirty(0);
                }
            }
        }

        if had_mesh {
            self.frontier.mark_level_dirty(0);
        }
    }

    /// Rate-limited remesh: visits the chunk circle nearest-first, always
    /// remeshing the first 9 visits (the 3x3 viewer core), then stops once
    /// [`CHUNKS_TO_MESH_PER_FRAME`] further chunks have been remeshed. Then
    /// remeshes the frontier bottom-up.
    pub fn remesh(&mut self) {
        let mut order = Vec::new();
        self.chunks.each(|cx, cz, _| {
            order.push((cx, cz));
            false
        });

        let mut budget = CHUNKS_TO_MESH_PER_FRAME;
        for (i, (cx, cz)) in order.into_iter().enumerate() {
            let in_core = i < CORE_EXEMPTION_COUNT;
            if !in_core && budget == 0 {
                break;
            }
            let remeshed = self.remesh_chunk(cx, cz);
            if remeshed && !in_core {
                budget -= 1;
            }
        }

        self.frontier.remesh(&mut self.mesher, &mut *self.load_frontier, &self.registry);
    }

    fn remesh_chunk(&mut self, cx: i32, cz: i32) -> bool {
        let needs = self.chunks.get(cx, cz).is_some_and(WorldChunk::<M, IM>::needs_remesh);
        if !needs {
            return false;
        }

        self.fill_scratch(cx, cz);
        self.remesh_instances(cx, cz);

        let input = ChunkMeshInput {
            buffer: &self.scratch.buffer,
            heightmap: &self.scratch.heightmap,
            light_map: &self.scratch.light_map,
            equilevels: &self.scratch.equilevels,
        };

        let Some(chunk) = self.chunks.get_mut(cx, cz) else { return false };
        let old_solid = chunk.solid_mesh.take();
        let old_water = chunk.water_mesh.take();
        let had_mesh_before = old_solid.is_some() || old_water.is_some();

        let (solid, water) = self.mesher.mesh_chunk(input, old_solid, old_water);

        let Some(chunk) = self.chunks.get_mut(cx, cz) else { return false };
        chunk.solid_mesh = solid;
        chunk.water_mesh = water;
        chunk.dirty = false;

        if !had_mesh_before && (chunk.solid_mesh.is_some() || chunk.water_mesh.is_some()) {
            self.frontier.mark_level_dirty(0);
        }
        true
    }

    fn remesh_instances(&mut self, cx: i32, cz: i32) {
        let Some(chunk) = self.chunks.get_mut(cx, cz) else { return };

        for (_, (kind, instance)) in chunk.instances.drain() {
            if let Some(mesh) = self.instanced_meshes.get_mut(&kind) {
                mesh.remove_instance(instance);
            }
        }

        let mut fresh = HashMap::new();
        for y in 0..WORLD_HEIGHT {
            if chunk.equilevels[y] {
                continue;
            }
            for x in 0..CHUNK_WIDTH {
                for z in 0..CHUNK_WIDTH {
                    let block = chunk.get_block(x, y, z);
                    let Some(def) = self.registry.block(block) else { continue };
                    let BlockKind::InstancedMesh(kind) = def.kind else { continue };
                    let Some(mesh) = self.instanced_meshes.get_mut(&kind) else { continue };
                    let wx = (cx * CHUNK_WIDTH as i32) as f32 + x as f32 + 0.5;
                    let wz = (cz * CHUNK_WIDTH as i32) as f32 + z as f32 + 0.5;
                    let instance = mesh.add_instance(wx, y as f32, wz);
                    let idx = x + z * CHUNK_WIDTH + y * CHUNK_WIDTH * CHUNK_WIDTH;
                    fresh.insert(idx, (kind, instance));
                }
            }
        }

        if let Some(chunk) = self.chunks.get_mut(cx, cz) {
            chunk.instances = fresh;
        }
    }

    fn fill_scratch(&mut self, cx: i32, cz: i32) {
        let w = CHUNK_WIDTH + 2;
        let Some(chunk) = self.chunks.get(cx, cz) else { return };

        for x in 0..CHUNK_WIDTH {
            for z in 0..CHUNK_WIDTH {
                for y in 0..WORLD_HEIGHT {
                    self.scratch.buffer[scratch_index(x + 1, y + 1, z + 1)] = chunk.get_block(x, y, z);
                }
                self.scratch.heightmap[(x + 1) + (z + 1) * w] = chunk.height_at(x, z);
                self.scratch.light_map[(x + 1) + (z + 1) * w] = chunk.lit_height_at(x, z);
            }
        }

        for y in 0..WORLD_HEIGHT {
            self.scratch.equilevels[y + 1] = chunk.equilevels[y];
        }

        self.fill_scratch_edge(cx - 1, cz, w, |s, _x, y, z, b| s.buffer[scratch_index(0, y + 1, z + 1)] = b, CHUNK_WIDTH - 1);
        self.fill_scratch_edge(cx + 1, cz, w, |s, _x, y, z, b| s.buffer[scratch_index(CHUNK_WIDTH + 1, y + 1, z + 1)] = b, 0);
        self.fill_scratch_edge_z(cx, cz - 1, w, |s, x, y, _z, b| s.buffer[scratch_index(x + 1, y + 1, 0)] = b, CHUNK_WIDTH - 1);
        self.fill_scratch_edge_z(cx, cz + 1, w, |s, x, y, _z, b| s.buffer[scratch_index(x + 1, y + 1, CHUNK_WIDTH + 1)] = b, 0);
        let _ = w;
    }

    fn fill_scratch_edge(&mut self, ncx: i32, ncz: i32, _w: usize, write: impl Fn(&mut ScratchVolume, usize, usize, usize, BlockId), source_x: usize) {
        match self.chunks.get(ncx, ncz) {
            Some(neighbor) => {
                for z in 0..CHUNK_WIDTH {
                    for y in 0..WORLD_HEIGHT {
                        let b = neighbor.get_block(source_x, y, z);
                        write(&mut self.scratch, source_x, y, z, b);
                    }
                }
            }
            None => {
                for z in 0..CHUNK_WIDTH {
                    for y in 0..WORLD_HEIGHT {
                        write(&mut self.scratch, source_x, y, z, AIR);
                    }
                }
            }
        }
    }

    fn fill_scratch_edge_z(&mut self, ncx: i32, ncz: i32, _w: usize, write: impl Fn(&mut ScratchVolume, usize, usize, usize, BlockId), source_z: usize) {
        match self.chunks.get(ncx, ncz) {
            Some(neighbor) => {
                for x in 0..CHUNK_WIDTH {
                    for y in 0..WORLD_HEIGHT {
                        let b = neighbor.get_block(x, y, source_z);
                        write(&mut self.scratch, x, y, source_z, b);
                    }
                }
            }
            None => {
                for x in 0..CHUNK_WIDTH {
                    for y in 0..WORLD_HEIGHT {
                        write(&mut self.scratch, x, y, source_z, AIR);
                    }
                }
            }
        }
    }

    /// Assert-backed fatal path for invariant checks the caller wants to
    /// surface rather than silently `debug_assert!` away.
    pub fn fault(message: impl Into<String>) -> EngineFault {
        EngineFault::new(message)
    }
}

fn drop_mesh<H: crate::mesher::MeshHandle>(mut handle: H) {
    handle.dispose();
}
