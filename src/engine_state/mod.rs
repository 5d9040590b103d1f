//! # Engine State Module
//!
//! The facade that ties the chunk core together and runs it one tick at a time.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns the chunk manager and the mesh scheduler
//! * `rendering` - Meshing, mesh jobs and the renderer boundary
//! * `task_management` - The worker pool mesh jobs run on
//! * `voxels` - Block storage, chunks, columns and the chunk manager
//!
//! ## Tick Order
//!
//! 1. Unload columns beyond the unload radius, then load missing ones nearest-first
//! 2. Apply finished mesh jobs, dropping stale ones
//! 3. Collect chunks waiting for a mesh and queue them by distance to the viewer
//! 4. Dispatch up to the per-tick job budget
//! 5. Every `trim_interval_ticks` ticks, compact chunk palettes
//!
//! `EngineState` is `!Send`: it has to stay on the thread that created it.

use std::sync::Arc;

use cgmath::Point3;
use web_time::Instant;

use rendering::{
    meshing::{MeshScheduler, MeshStats},
    ChunkRenderer, RenderPass,
};
use voxels::{
    block::{registry::BlockRegistry, BlockState},
    chunk::{Chunk, ChunkGenerator},
    chunk_manager::ChunkManager,
};

use crate::{
    config::{ChunkDimensions, EngineConfig},
    error::{ChunkError, ConfigError},
};

pub mod rendering;
pub mod task_management;
pub mod voxels;

/// Summary of one [`EngineState::tick`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    pub columns_loaded: usize,
    pub columns_unloaded: usize,
    /// Chunks whose generator failed this tick.
    pub generation_failures: usize,
    pub mesh: MeshStats,
    /// Palettes compacted by the periodic trim pass.
    pub palettes_trimmed: usize,
}

/// The main state container of the chunk core.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use cgmath::Point3;
/// use voxel_world::{
///     config::EngineConfig,
///     engine_state::{voxels::{block::registry::BlockRegistry, chunk::FlatGenerator}, EngineState},
/// };
///
/// let registry = Arc::new(BlockRegistry::with_defaults());
/// let config = EngineConfig {
///     chunk_side: 16,
///     column_height: 2,
///     load_radius: 1,
///     unload_radius: 2,
///     worker_threads: 0,
///     ..EngineConfig::default()
/// };
/// let generator = Box::new(FlatGenerator::grassland(&registry));
/// let mut engine = EngineState::new(config, registry, generator).unwrap();
///
/// let report = engine.tick(Point3::new(8.0, 20.0, 8.0));
/// assert_eq!(report.columns_loaded, 4);
/// ```
pub struct EngineState {
    config: EngineConfig,
    registry: Arc<BlockRegistry>,
    chunk_manager: ChunkManager,
    mesh_scheduler: MeshScheduler,
    tick_count: u64,
}

impl EngineState {
    /// Validates `config` and builds the manager and the worker pool.
    pub fn new(
        config: EngineConfig,
        registry: Arc<BlockRegistry>,
        generator: Box<dyn ChunkGenerator>,
    ) -> Result<Self, ConfigError> {
        let chunk_manager = ChunkManager::new(config.clone(), generator)?;
        let mesh_scheduler = MeshScheduler::new(
            config.worker_threads,
            config.mesh_jobs_per_tick,
            Arc::clone(&registry),
            config.dimensions(),
        );

        log::info!(
            "Engine state created: chunk side {}, column height {}, load radius {}, {} mesh workers",
            config.chunk_side,
            config.column_height,
            config.load_radius,
            mesh_scheduler.worker_count()
        );

        Ok(EngineState {
            config,
            registry,
            chunk_manager,
            mesh_scheduler,
            tick_count: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn dimensions(&self) -> ChunkDimensions {
        self.chunk_manager.dimensions()
    }

    pub fn chunk_manager(&self) -> &ChunkManager {
        &self.chunk_manager
    }

    pub fn chunk_manager_mut(&mut self) -> &mut ChunkManager {
        &mut self.chunk_manager
    }

    pub fn mesh_scheduler(&self) -> &MeshScheduler {
        &self.mesh_scheduler
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Resident chunk at a chunk-grid coordinate.
    pub fn chunk(&self, coord: Point3<i32>) -> Option<&Chunk> {
        self.chunk_manager.chunk(coord)
    }

    /// Advances the world by one tick around `viewer`.
    pub fn tick(&mut self, viewer: Point3<f32>) -> TickReport {
        let start = Instant::now();
        self.tick_count += 1;

        let columns = self.chunk_manager.update(viewer);
        let mut mesh = self.mesh_scheduler.process_completed(&mut self.chunk_manager);

        let mut queued = 0;
        for (chunk, priority) in self.chunk_manager.collect_mesh_requests(viewer) {
            if self.mesh_scheduler.request(chunk, priority) {
                queued += 1;
            }
        }
        let dispatch = self.mesh_scheduler.dispatch(&mut self.chunk_manager);
        mesh.dispatched += dispatch.dispatched;
        mesh.deferred += dispatch.deferred;

        let interval = self.config.trim_interval_ticks;
        let palettes_trimmed = if interval > 0 && self.tick_count % interval == 0 {
            self.chunk_manager.trim_palettes()
        } else {
            0
        };

        log::trace!(
            "Tick {} took {:?}: {} new mesh requests, {} dispatched, {} completed",
            self.tick_count,
            start.elapsed(),
            queued,
            mesh.dispatched,
            mesh.completed
        );

        TickReport {
            tick: self.tick_count,
            columns_loaded: columns.loaded,
            columns_unloaded: columns.unloaded,
            generation_failures: columns.failed_chunks,
            mesh,
            palettes_trimmed,
        }
    }

    /// Blocks until every running mesh job has finished and applies the results.
    pub fn finish_meshing(&mut self) -> MeshStats {
        self.mesh_scheduler.wait_for_all(&mut self.chunk_manager)
    }

    /// Draws one pass of every resident chunk.
    ///
    /// Meshes of unloaded chunks are released on the renderer first.
    pub fn draw(&mut self, pass: RenderPass, renderer: &mut dyn ChunkRenderer) {
        for chunk in self.chunk_manager.take_released_meshes() {
            renderer.release(chunk);
        }
        for chunk in self.chunk_manager.chunks_mut() {
            chunk.draw(pass, renderer);
        }
    }

    /// Block at a world position, or `None` if it is not loaded.
    pub fn get_block(&self, world: Point3<i32>) -> Result<Option<BlockState>, ChunkError> {
        self.chunk_manager.get_block(world)
    }

    /// Writes a block at a world position. Returns the replaced state, or `None`
    /// if the position is not loaded.
    pub fn set_block(&mut self, world: Point3<i32>, state: BlockState) -> Result<Option<BlockState>, ChunkError> {
        self.chunk_manager.set_block(world, state)
    }
}
