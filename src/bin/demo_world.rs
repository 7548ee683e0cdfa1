//! Demo: a `noise`-based column generator wired to the `World`/`Timing`
//! harness, driven by a synchronous `for` loop standing in for a real
//! client's animation-frame pump. Illustrates the external `ColumnLoader`,
//! `Mesher`, and mesh-handle contracts without touching a renderer.
//!
//! Run with `RUST_LOG=info cargo run --bin demo_world`.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use stratum::block::{BlockRegistry, AIR};
use stratum::column::Column;
use stratum::mesher::{ChunkMeshInput, InstancedMeshHandle, MeshHandle, Mesher};
use stratum::timing::Timing;
use stratum::world::World;

/// No-op mesh handle: the demo has no renderer, so it just counts calls.
#[derive(Default)]
struct LoggingMesh {
    id: u64,
}

impl MeshHandle for LoggingMesh {
    fn set_position(&mut self, x: f32, y: f32, z: f32) {
        log::debug!("mesh {} moved to ({x}, {y}, {z})", self.id);
    }
    fn show(&mut self, mask: u8, shown: bool) {
        log::debug!("mesh {} show(mask={mask}, shown={shown})", self.id);
    }
    fn dispose(&mut self) {
        log::debug!("mesh {} disposed", self.id);
    }
}

struct LoggingInstancedMesh {
    next_id: u64,
}

impl InstancedMeshHandle for LoggingInstancedMesh {
    type Instance = u64;

    fn add_instance(&mut self, x: f32, y: f32, z: f32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        log::debug!("instance {id} reserved at ({x}, {y}, {z})");
        id
    }

    fn remove_instance(&mut self, handle: u64) {
        log::debug!("instance {handle} released");
    }
}

struct DemoMesher {
    next_mesh_id: u64,
}

impl Mesher for DemoMesher {
    type Solid = LoggingMesh;
    type Water = LoggingMesh;
    type Tile = LoggingMesh;

    fn mesh_chunk(
        &mut self,
        input: ChunkMeshInput<'_>,
        _old_solid: Option<Self::Solid>,
        _old_water: Option<Self::Water>,
    ) -> (Option<Self::Solid>, Option<Self::Water>) {
        let quads = input.buffer.iter().filter(|&&b| b != AIR).count();
        log::info!("meshed chunk: {quads} non-empty scratch cells");
        self.next_mesh_id += 1;
        (Some(LoggingMesh { id: self.next_mesh_id }), None)
    }

    fn mesh_frontier(
        &mut self,
        _heightmap_strip: &[u16],
        _mask_index: u8,
        px: i32,
        pz: i32,
        _nx: u32,
        _nz: u32,
        lod: u32,
        _old: Option<Self::Tile>,
        is_solid: bool,
    ) -> Option<Self::Tile> {
        if !is_solid {
            return None;
        }
        self.next_mesh_id += 1;
        log::info!("meshed frontier tile at ({px}, {pz}) lod={lod}");
        Some(LoggingMesh { id: self.next_mesh_id })
    }
}

/// Rolling hills with one ridged-noise pass, matching the teacher crate's
/// terrain generator in spirit but reduced to the `ColumnLoader` contract:
/// push bedrock, then dirt up to the noise height, then cap with grass.
fn terrain_loader(bedrock: u8, dirt: u8, grass: u8) -> impl FnMut(i32, i32, &mut Column) {
    let heightfield: Fbm<Perlin> = Fbm::new(12345).set_octaves(4).set_frequency(0.02).set_persistence(0.5);
    move |ax: i32, az: i32, column: &mut Column| {
        let h = heightfield.get([f64::from(ax), f64::from(az)]) * 12.0 + 24.0;
        let height = h.max(1.0) as u16;
        column.push(bedrock, 1);
        column.push(dirt, height.max(2) - 1);
        column.push(grass, height.max(2));
    }
}

fn build_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    registry.add_material_of_color("bedrock", [0.2, 0.2, 0.2, 1.0], false).expect("bedrock material");
    registry.add_material_of_color("dirt", [0.4, 0.25, 0.1, 1.0], false).expect("dirt material");
    registry.add_material_of_color("grass", [0.2, 0.6, 0.2, 1.0], false).expect("grass material");
    registry.add_block("bedrock", &["bedrock"], true).expect("bedrock block");
    registry.add_block("dirt", &["dirt"], true).expect("dirt block");
    registry.add_block("grass", &["grass"], true).expect("grass block");
    registry
}

fn main() {
    env_logger::init();

    let registry = build_registry();
    let bedrock = registry.block_id("bedrock").expect("bedrock registered");
    let dirt = registry.block_id("dirt").expect("dirt registered");
    let grass = registry.block_id("grass").expect("grass registered");

    let mesher = DemoMesher { next_mesh_id: 0 };
    let mut world: World<DemoMesher, LoggingInstancedMesh> =
        World::new(registry, mesher, bedrock, 4, 3, 3, terrain_loader(bedrock, dirt, grass), terrain_loader(bedrock, dirt, grass));

    world.register_instanced_mesh(0, LoggingInstancedMesh { next_id: 0 });

    // `update` and `remesh` both need mutable access to `world`, but
    // `Timing::pump` takes them as two independent callbacks; they're never
    // called concurrently (this crate is single-threaded by design), so a
    // `RefCell` stands in for the renderer-side borrow an async scheduler
    // would otherwise need.
    let world = std::cell::RefCell::new(world);
    let mut timing = Timing::new(60, 4);
    world.borrow_mut().recenter(0.0, 64.0, 0.0);

    for frame in 0..30 {
        timing.pump(
            1.0 / 60.0,
            |_dt| world.borrow_mut().recenter(0.0, 64.0, 0.0),
            || world.borrow_mut().remesh(),
            || {},
        );
        if frame % 10 == 0 {
            log::info!(
                "frame {frame}: update avg {:.4}ms, remesh avg {:.4}ms",
                timing.update_meter.average() * 1000.0,
                timing.remesh_meter.average() * 1000.0,
            );
        }
    }

    log::info!("block at (0,64,0): {:?}", world.borrow().get_block(0, 64, 0));
}
