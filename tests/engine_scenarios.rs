use std::collections::HashSet;
use std::sync::Arc;

use cgmath::Point3;
use voxel_world::{
    config::{ChunkDimensions, EngineConfig},
    engine_state::{
        rendering::{ChunkRenderer, MeshBuffers, MeshPass, RenderPass},
        voxels::{
            block::{registry::BlockRegistry, BlockState},
            chunk::{ChunkGenerator, FlatGenerator, MeshState, PerlinGenerator},
            palette::BlockPalette,
        },
        EngineState,
    },
    error::PaletteError,
};

fn config(worker_threads: usize) -> EngineConfig {
    EngineConfig {
        chunk_side: 8,
        column_height: 2,
        load_radius: 1,
        unload_radius: 2,
        mesh_jobs_per_tick: 64,
        worker_threads,
        column_loads_per_tick: 16,
        ..EngineConfig::default()
    }
}

fn grassland(config: EngineConfig) -> EngineState {
    voxel_world::init_logger();
    let registry = Arc::new(BlockRegistry::with_defaults());
    let generator = Box::new(FlatGenerator::grassland(&registry));
    EngineState::new(config, registry, generator).unwrap()
}

/// Grassland everywhere except the column at chunk x = 1, which fails to generate.
struct BrokenColumnGenerator {
    inner: FlatGenerator,
    side: i32,
}

impl ChunkGenerator for BrokenColumnGenerator {
    fn generate(
        &self,
        origin: Point3<i32>,
        dims: ChunkDimensions,
        palette: &mut BlockPalette,
    ) -> Result<(), PaletteError> {
        if origin.x == self.side && origin.z == 0 {
            return Err(PaletteError::PositionOutOfRange {
                position: usize::MAX,
                capacity: dims.volume(),
            });
        }
        self.inner.generate(origin, dims, palette)
    }
}

#[derive(Default)]
struct RecordingRenderer {
    uploaded: HashSet<Point3<i32>>,
    uploads: usize,
    releases: usize,
    draws: usize,
}

impl ChunkRenderer for RecordingRenderer {
    fn upload(&mut self, chunk: Point3<i32>, _: &MeshBuffers) {
        self.uploaded.insert(chunk);
        self.uploads += 1;
    }

    fn release(&mut self, chunk: Point3<i32>) {
        assert!(self.uploaded.remove(&chunk), "released {chunk:?} twice");
        self.releases += 1;
    }

    fn draw(&mut self, chunk: Point3<i32>, _: RenderPass, mesh: &MeshPass) {
        assert!(self.uploaded.contains(&chunk));
        assert!(!mesh.is_empty());
        self.draws += 1;
    }
}

#[test]
fn inline_meshing_is_ready_after_two_ticks() {
    let mut engine = grassland(config(0));
    let viewer = Point3::new(4.0, 12.0, 4.0);

    let first = engine.tick(viewer);
    assert_eq!(first.columns_loaded, 5);
    assert_eq!(first.generation_failures, 0);
    assert_eq!(
        engine.chunk(Point3::new(0, 0, 0)).unwrap().mesh_state(),
        MeshState::Meshing
    );

    let second = engine.tick(viewer);
    assert_eq!(second.columns_loaded, 0);
    assert_eq!(second.mesh.completed, 5);
    assert_eq!(second.mesh.discarded, 0);
    for chunk in engine.chunk_manager().chunks() {
        if chunk.rendered_block_count() > 0 {
            assert_eq!(chunk.mesh_state(), MeshState::Ready);
        } else {
            assert_eq!(chunk.mesh_state(), MeshState::Uninitialized);
        }
    }
}

#[test]
fn edit_while_meshing_discards_the_stale_job() {
    let mut engine = grassland(config(0));
    let viewer = Point3::new(4.0, 12.0, 4.0);
    engine.tick(viewer);

    // Interior dirt block of chunk (0, 0, 0); no neighbor samples it.
    let old = engine.set_block(Point3::new(3, 5, 3), BlockState::AIR).unwrap();
    assert_eq!(old, engine.registry().state("dirt"));

    let second = engine.tick(viewer);
    assert_eq!(second.mesh.discarded, 1);
    assert_eq!(second.mesh.completed, 4);
    let chunk = engine.chunk(Point3::new(0, 0, 0)).unwrap();
    assert_eq!(chunk.mesh_state(), MeshState::Meshing);
    assert!(!chunk.is_mesh_ready());

    let third = engine.tick(viewer);
    assert_eq!(third.mesh.completed, 1);
    assert_eq!(
        engine.chunk(Point3::new(0, 0, 0)).unwrap().mesh_state(),
        MeshState::Ready
    );
}

#[test]
fn ungenerated_neighbor_blocks_meshing() {
    voxel_world::init_logger();
    let registry = Arc::new(BlockRegistry::with_defaults());
    let generator = Box::new(BrokenColumnGenerator {
        inner: FlatGenerator::grassland(&registry),
        side: 8,
    });
    let mut engine = EngineState::new(config(0), registry, generator).unwrap();
    let viewer = Point3::new(4.0, 12.0, 4.0);

    let first = engine.tick(viewer);
    assert_eq!(first.generation_failures, 2);
    assert!(!engine.chunk(Point3::new(1, 0, 0)).unwrap().is_generated());

    for _ in 0..5 {
        let report = engine.tick(viewer);
        assert!(report.mesh.deferred >= 3);
        let center = engine.chunk(Point3::new(0, 0, 0)).unwrap();
        assert_eq!(center.mesh_state(), MeshState::WaitingForNeighbors);
        assert!(!center.is_mesh_ready());
    }

    // The west column does not touch the broken one and meshes normally.
    assert_eq!(
        engine.chunk(Point3::new(-1, 0, 0)).unwrap().mesh_state(),
        MeshState::Ready
    );
}

#[test]
fn edits_to_unloaded_positions_are_ignored() {
    let mut engine = grassland(config(0));
    engine.tick(Point3::new(4.0, 12.0, 4.0));
    let stone = engine.registry().state("stone").unwrap();
    assert_eq!(engine.set_block(Point3::new(500, 0, 500), stone).unwrap(), None);
    assert_eq!(engine.get_block(Point3::new(500, 0, 500)).unwrap(), None);
    assert_eq!(engine.set_block(Point3::new(0, -5, 0), stone).unwrap(), None);
}

#[test]
fn worker_threads_mesh_and_unloading_releases() {
    voxel_world::init_logger();
    let registry = Arc::new(BlockRegistry::with_defaults());
    let config = EngineConfig {
        chunk_side: 16,
        column_height: 3,
        load_radius: 2,
        unload_radius: 3,
        mesh_jobs_per_tick: 8,
        worker_threads: 2,
        column_loads_per_tick: 16,
        ..EngineConfig::default()
    };
    let generator = Box::new(PerlinGenerator::with_registry(11, &registry));
    let mut engine = EngineState::new(config, registry, generator).unwrap();
    assert_eq!(engine.mesh_scheduler().worker_count(), 2);
    let viewer = Point3::new(8.0, 24.0, 8.0);

    for _ in 0..64 {
        engine.tick(viewer);
        engine.finish_meshing();
        let pending = engine.chunk_manager().chunks().any(|chunk| chunk.wants_mesh());
        if !pending && engine.mesh_scheduler().is_idle() {
            break;
        }
    }

    let mut renderable = 0;
    for chunk in engine.chunk_manager().chunks() {
        if chunk.rendered_block_count() > 0 {
            assert_eq!(chunk.mesh_state(), MeshState::Ready, "chunk {:?}", chunk.position());
            renderable += 1;
        }
    }
    assert!(renderable > 0);

    let mut renderer = RecordingRenderer::default();
    for pass in RenderPass::all() {
        engine.draw(pass, &mut renderer);
    }
    assert_eq!(renderer.uploads, renderable);
    assert!(renderer.draws > 0);

    // Far away every column unloads, and each uploaded mesh is released once.
    let report = engine.tick(Point3::new(4000.0, 24.0, 4000.0));
    assert_eq!(report.columns_unloaded, 13);
    engine.draw(RenderPass::Opaque, &mut renderer);
    assert_eq!(renderer.releases, renderable);
    assert!(renderer.uploaded.is_empty());
    engine.finish_meshing();
}
