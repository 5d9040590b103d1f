//! # Chunk Manager
//!
//! Owns every resident [`ChunkColumn`] and decides, once per tick, which columns
//! should be resident around the viewer.
//!
//! ## Loading and unloading
//! Columns farther than `unload_radius` from the viewer's column are unloaded
//! first; then missing columns inside `load_radius` are loaded in [`LoadSpiral`]
//! order, at most `column_loads_per_tick` per tick. The gap between the two radii
//! keeps a viewer pacing along the boundary from loading and unloading the same
//! columns every tick.
//!
//! ## Neighbor-aware lookup
//! [`ChunkManager::fill_neighbor_cache`] copies one chunk plus a one-block border
//! into a [`NeighborCache`], fetching each of the 26 neighbors at most once. A
//! neighbor that is not resident contributes air.

use std::collections::HashMap;

use cgmath::{Point2, Point3, Vector2, Vector3};

use super::{
    block::BlockState,
    chunk::{Chunk, ChunkGenerator},
    column::ChunkColumn,
    neighbor_cache::NeighborCache,
    neighbor_table::NeighborOffsetTable,
    spiral::LoadSpiral,
};
use crate::{
    config::{ChunkDimensions, EngineConfig},
    error::{ChunkError, ConfigError},
};

/// What one [`ChunkManager::update`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ColumnUpdate {
    pub loaded: usize,
    pub unloaded: usize,
    /// Chunks whose generator failed while loading.
    pub failed_chunks: usize,
}

/// For one axis of a neighbor direction: where the border starts in the cache,
/// where it starts in the neighbor, and how many cells it spans.
fn border_span(direction: i32, side: i32) -> (i32, i32, i32) {
    match direction {
        -1 => (-1, side - 1, 1),
        1 => (side, 0, 1),
        _ => (0, 0, side),
    }
}

#[inline]
fn distance_squared(a: Point2<i32>, b: Point2<i32>) -> i64 {
    let dx = i64::from(a.x) - i64::from(b.x);
    let dz = i64::from(a.y) - i64::from(b.y);
    dx * dx + dz * dz
}

pub struct ChunkManager {
    config: EngineConfig,
    dims: ChunkDimensions,
    columns: HashMap<Point2<i32>, ChunkColumn>,
    /// Unloaded columns kept for reuse.
    pool: Vec<ChunkColumn>,
    spiral: LoadSpiral,
    offsets: NeighborOffsetTable,
    generator: Box<dyn ChunkGenerator>,
    center: Option<Point2<i32>>,
    /// Chunks whose uploaded meshes the renderer still has to release.
    released_meshes: Vec<Point3<i32>>,
}

impl ChunkManager {
    /// Creates an empty manager.
    ///
    /// # Arguments
    /// * `config` - Validated before use
    /// * `generator` - Called for every chunk of every loaded column
    pub fn new(config: EngineConfig, generator: Box<dyn ChunkGenerator>) -> Result<Self, ConfigError> {
        config.validate()?;
        let dims = config.dimensions();
        Ok(ChunkManager {
            spiral: LoadSpiral::new(config.load_radius),
            offsets: NeighborOffsetTable::new(dims.side()),
            dims,
            columns: HashMap::new(),
            pool: Vec::with_capacity(config.column_pool_size),
            generator,
            center: None,
            released_meshes: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dimensions(&self) -> ChunkDimensions {
        self.dims
    }

    pub fn spiral(&self) -> &LoadSpiral {
        &self.spiral
    }

    pub fn offsets(&self) -> &NeighborOffsetTable {
        &self.offsets
    }

    /// Column the viewer stood in at the last update.
    pub fn center(&self) -> Option<Point2<i32>> {
        self.center
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn pooled_columns(&self) -> usize {
        self.pool.len()
    }

    pub fn column(&self, position: Point2<i32>) -> Option<&ChunkColumn> {
        self.columns.get(&position)
    }

    pub fn columns(&self) -> impl Iterator<Item = &ChunkColumn> {
        self.columns.values()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.columns.values().flat_map(ChunkColumn::chunks)
    }

    pub fn chunks_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.columns.values_mut().flat_map(ChunkColumn::chunks_mut)
    }

    /// Resident chunk at a chunk-grid coordinate.
    pub fn chunk(&self, coord: Point3<i32>) -> Option<&Chunk> {
        self.columns
            .get(&Point2::new(coord.x, coord.z))
            .and_then(|column| column.chunk(coord.y))
    }

    pub fn chunk_mut(&mut self, coord: Point3<i32>) -> Option<&mut Chunk> {
        self.columns
            .get_mut(&Point2::new(coord.x, coord.z))
            .and_then(|column| column.chunk_mut(coord.y))
    }

    /// Column coordinate containing a world-space position.
    pub fn column_of(&self, viewer: Point3<f32>) -> Point2<i32> {
        Point2::new(
            self.dims.chunk_of(viewer.x.floor() as i32),
            self.dims.chunk_of(viewer.z.floor() as i32),
        )
    }

    /// Unloads far columns, then loads missing near ones.
    pub fn update(&mut self, viewer: Point3<f32>) -> ColumnUpdate {
        let center = self.column_of(viewer);
        self.center = Some(center);

        let unloaded = self.unload_far(center);
        let (loaded, failed_chunks) = self.load_near(center);

        if loaded > 0 || unloaded > 0 {
            log::debug!(
                "Columns around {:?}: loaded {}, unloaded {}, resident {}",
                center,
                loaded,
                unloaded,
                self.columns.len()
            );
        }
        ColumnUpdate {
            loaded,
            unloaded,
            failed_chunks,
        }
    }

    fn unload_far(&mut self, center: Point2<i32>) -> usize {
        let limit = i64::from(self.config.unload_radius) * i64::from(self.config.unload_radius);
        let far: Vec<Point2<i32>> = self
            .columns
            .keys()
            .copied()
            .filter(|position| distance_squared(*position, center) > limit)
            .collect();

        for position in &far {
            if let Some(column) = self.columns.remove(position) {
                self.retire_column(column);
            }
        }
        far.len()
    }

    fn retire_column(&mut self, mut column: ChunkColumn) {
        self.released_meshes.extend(column.release_meshes());
        if self.pool.len() < self.config.column_pool_size {
            self.pool.push(column);
        }
    }

    fn load_near(&mut self, center: Point2<i32>) -> (usize, usize) {
        let candidates: Vec<Point2<i32>> = self
            .spiral
            .iter()
            .map(|offset| center + offset)
            .filter(|position| !self.columns.contains_key(position))
            .take(self.config.column_loads_per_tick)
            .collect();

        let mut failed = 0;
        for position in &candidates {
            failed += self.load_column(*position);
        }
        (candidates.len(), failed)
    }

    /// Loads and generates one column. Returns the number of chunks that failed
    /// to generate.
    pub fn load_column(&mut self, position: Point2<i32>) -> usize {
        if self.columns.contains_key(&position) {
            return 0;
        }

        let mut column = match self.pool.pop() {
            Some(mut column) => {
                self.released_meshes.extend(column.reset_to(position));
                column
            }
            None => ChunkColumn::new(position, self.config.column_height, self.dims),
        };
        let failed = column.generate(self.generator.as_ref());
        self.columns.insert(position, column);

        // Chunks beside the new column sampled air across this border until now.
        for dz in -1..=1 {
            for dx in -1..=1 {
                if (dx, dz) == (0, 0) {
                    continue;
                }
                let Some(neighbor) = self.columns.get_mut(&(position + Vector2::new(dx, dz))) else {
                    continue;
                };
                for chunk in neighbor.chunks_mut() {
                    if chunk.rendered_block_count() == 0 {
                        continue;
                    }
                    if let Err(error) = chunk.mark_neighbor_dirty(Vector3::new(-dx, 0, -dz)) {
                        log::error!("Loading column {:?} could not mark {:?}: {}", position, chunk.position(), error);
                    }
                }
            }
        }
        failed
    }

    /// Whether every resident neighbor of `coord` has been generated.
    ///
    /// Neighbors that are not resident do not block meshing; they are sampled
    /// as air and trigger a remesh when their column loads.
    pub fn neighbors_generated(&self, coord: Point3<i32>) -> bool {
        self.offsets.iter().all(|neighbor| {
            self.chunk(coord + neighbor.direction)
                .map_or(true, Chunk::is_generated)
        })
    }

    /// Copies the chunk at world-space `origin` and its one-block border into `cache`.
    ///
    /// Returns `Ok(false)` without touching the cache if the chunk is not resident
    /// or not generated.
    pub fn fill_neighbor_cache(&self, origin: Point3<i32>, cache: &mut NeighborCache) -> Result<bool, ChunkError> {
        let coord = self.dims.chunk_containing(origin);
        let Some(center) = self.chunk(coord).filter(|chunk| chunk.is_generated()) else {
            return Ok(false);
        };

        cache.reset(origin);
        let side = self.dims.side() as i32;
        for y in 0..side {
            for z in 0..side {
                for x in 0..side {
                    let state = center.get_block(Point3::new(x as usize, y as usize, z as usize))?;
                    cache.set(x, y, z, state);
                }
            }
        }

        for neighbor in self.offsets.iter() {
            let neighbor_coord = self.dims.chunk_containing(origin + neighbor.offset);
            let Some(chunk) = self.chunk(neighbor_coord).filter(|chunk| chunk.is_generated()) else {
                continue;
            };
            let (cx, sx, lx) = border_span(neighbor.direction.x, side);
            let (cy, sy, ly) = border_span(neighbor.direction.y, side);
            let (cz, sz, lz) = border_span(neighbor.direction.z, side);
            for iy in 0..ly {
                for iz in 0..lz {
                    for ix in 0..lx {
                        let source = Point3::new((sx + ix) as usize, (sy + iy) as usize, (sz + iz) as usize);
                        cache.set(cx + ix, cy + iy, cz + iz, chunk.get_block(source)?);
                    }
                }
            }
        }
        Ok(true)
    }

    fn locate(&self, world: Point3<i32>) -> (Point3<i32>, Point3<usize>) {
        let coord = self.dims.chunk_containing(world);
        let local = Point3::new(
            self.dims.local_of(world.x),
            self.dims.local_of(world.y),
            self.dims.local_of(world.z),
        );
        (coord, local)
    }

    /// Block at a world position, or `None` if its chunk is not resident and generated.
    pub fn get_block(&self, world: Point3<i32>) -> Result<Option<BlockState>, ChunkError> {
        let (coord, local) = self.locate(world);
        match self.chunk(coord).filter(|chunk| chunk.is_generated()) {
            Some(chunk) => chunk.get_block(local).map(Some),
            None => Ok(None),
        }
    }

    /// Writes a block at a world position and marks the neighbors that sample it.
    ///
    /// Returns the replaced state, or `None` if the chunk is not resident.
    pub fn set_block(&mut self, world: Point3<i32>, state: BlockState) -> Result<Option<BlockState>, ChunkError> {
        let (coord, local) = self.locate(world);
        let Some(chunk) = self.chunk_mut(coord) else {
            log::debug!("Ignoring write to {:?}: chunk {:?} is not resident", world, coord);
            return Ok(None);
        };

        let change = chunk.set_block(local, state)?;
        for offset in change.neighbors {
            if let Some(neighbor) = self.chunk_mut(coord + offset) {
                neighbor.mark_neighbor_dirty(-offset)?;
            }
        }
        Ok(Some(change.old))
    }

    /// Settles empty waiting chunks and returns the chunks that want a mesh,
    /// each with its squared distance to `viewer` as priority.
    pub fn collect_mesh_requests(&mut self, viewer: Point3<f32>) -> Vec<(Point3<i32>, u64)> {
        let mut waiting = Vec::new();
        for column in self.columns.values_mut() {
            if let Err(error) = column.tick(&mut waiting) {
                log::error!("Column {:?} tick failed: {}", column.position(), error);
            }
        }
        waiting
            .into_iter()
            .map(|coord| (coord, self.mesh_priority(coord, viewer)))
            .collect()
    }

    /// Squared distance from `viewer` to the center of a chunk, in blocks.
    pub fn mesh_priority(&self, coord: Point3<i32>, viewer: Point3<f32>) -> u64 {
        let origin = self.dims.origin_of(coord);
        let half = self.dims.side() as f32 / 2.0;
        let dx = origin.x as f32 + half - viewer.x;
        let dy = origin.y as f32 + half - viewer.y;
        let dz = origin.z as f32 + half - viewer.z;
        (dx * dx + dy * dy + dz * dz) as u64
    }

    /// Compacts every resident palette. Returns how many shrank.
    pub fn trim_palettes(&mut self) -> usize {
        let mut trimmed = 0;
        for chunk in self.chunks_mut() {
            match chunk.trim() {
                Ok(true) => trimmed += 1,
                Ok(false) => {}
                Err(error) => log::error!("{}", error),
            }
        }
        if trimmed > 0 {
            log::debug!("Trimmed {} chunk palettes", trimmed);
        }
        trimmed
    }

    /// Hands over the chunks whose uploaded meshes must be released.
    pub fn take_released_meshes(&mut self) -> Vec<Point3<i32>> {
        std::mem::take(&mut self.released_meshes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::MeshBuffers;
    use crate::engine_state::voxels::block::{block_side::BlockSide, RenderType};
    use crate::engine_state::voxels::chunk::{EmptyGenerator, FlatGenerator, MeshState};

    fn stone() -> BlockState {
        BlockState::new(1, RenderType::Opaque)
    }

    fn small_config() -> EngineConfig {
        EngineConfig {
            chunk_side: 8,
            column_height: 2,
            load_radius: 2,
            unload_radius: 3,
            column_loads_per_tick: 100,
            worker_threads: 0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn update_loads_the_spiral_and_unloads_with_hysteresis() {
        let mut manager = ChunkManager::new(small_config(), Box::new(EmptyGenerator)).unwrap();
        let update = manager.update(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(update.loaded, manager.spiral().len());
        assert_eq!(manager.column_count(), 13);

        // Moving one column keeps everything within the unload radius and
        // loads the new leading edge.
        let update = manager.update(Point3::new(8.5, 0.0, 0.0));
        assert_eq!(update.unloaded, 0);
        assert_eq!(update.loaded, 5);
        let resident = manager.column_count();
        assert_eq!(resident, 18);

        let update = manager.update(Point3::new(80.0, 0.0, 0.0));
        assert_eq!(update.unloaded, resident);
        assert!(manager.column(Point2::new(0, 0)).is_none());
        assert!(manager.column(Point2::new(1, 0)).is_none());
    }

    #[test]
    fn loading_a_column_sends_ready_neighbors_back_to_waiting() {
        let config = EngineConfig {
            column_loads_per_tick: 1,
            ..small_config()
        };
        let mut manager =
            ChunkManager::new(config, Box::new(FlatGenerator::new(vec![(1, stone())]))).unwrap();
        manager.update(Point3::new(4.0, 4.0, 4.0));
        assert_eq!(manager.column_count(), 1);

        let coord = Point3::new(0, 0, 0);
        let chunk = manager.chunk_mut(coord).unwrap();
        let job = chunk.try_begin_meshing(true).unwrap().unwrap();
        assert!(chunk.complete_mesh(job, MeshBuffers::new()).unwrap());
        assert_eq!(chunk.mesh_state(), MeshState::Ready);

        assert_eq!(manager.load_column(Point2::new(1, 0)), 0);
        let chunk = manager.chunk(coord).unwrap();
        assert_eq!(chunk.mesh_state(), MeshState::WaitingForNeighbors);
        assert_eq!(chunk.dirty_neighbor_mask(), 1 << BlockSide::from_axis(0, true) as u8);
        // The empty chunk above has nothing to remesh.
        assert_eq!(
            manager.chunk(Point3::new(0, 1, 0)).unwrap().mesh_state(),
            MeshState::Uninitialized
        );
    }

    #[test]
    fn load_budget_takes_nearest_first() {
        let config = EngineConfig {
            column_loads_per_tick: 1,
            ..small_config()
        };
        let mut manager = ChunkManager::new(config, Box::new(EmptyGenerator)).unwrap();
        manager.update(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(manager.column_count(), 1);
        assert!(manager.column(Point2::new(0, 0)).is_some());
    }

    #[test]
    fn unloaded_columns_are_recycled() {
        let config = EngineConfig {
            column_pool_size: 4,
            ..small_config()
        };
        let mut manager = ChunkManager::new(config, Box::new(EmptyGenerator)).unwrap();
        manager.update(Point3::new(0.0, 0.0, 0.0));
        manager.update(Point3::new(800.0, 0.0, 0.0));
        assert_eq!(manager.column_count(), 13);
        assert_eq!(manager.pooled_columns(), 0);
    }

    #[test]
    fn neighbor_cache_reads_borders_from_neighbors() {
        let mut manager = ChunkManager::new(small_config(), Box::new(EmptyGenerator)).unwrap();
        manager.update(Point3::new(0.0, 0.0, 0.0));
        manager.set_block(Point3::new(-1, 3, 4), stone()).unwrap();
        manager.set_block(Point3::new(8, 8, 8), stone()).unwrap();

        let mut cache = NeighborCache::new(manager.dimensions());
        assert!(manager.fill_neighbor_cache(Point3::new(0, 0, 0), &mut cache).unwrap());
        assert_eq!(cache.get(-1, 3, 4), stone());
        assert_eq!(cache.get(8, 8, 8), stone());
        assert_eq!(cache.get(0, 3, 4), BlockState::AIR);
        // Below the world nothing is resident.
        assert_eq!(cache.get(3, -1, 3), BlockState::AIR);

        assert!(!manager.fill_neighbor_cache(Point3::new(800, 0, 0), &mut cache).unwrap());
    }

    #[test]
    fn world_edits_reach_chunks_and_neighbors() {
        let mut manager = ChunkManager::new(small_config(), Box::new(EmptyGenerator)).unwrap();
        manager.update(Point3::new(0.0, 0.0, 0.0));
        let old = manager.set_block(Point3::new(7, 2, 2), stone()).unwrap();
        assert_eq!(old, Some(BlockState::AIR));
        assert_eq!(manager.get_block(Point3::new(7, 2, 2)).unwrap(), Some(stone()));
        let neighbor = manager.chunk(Point3::new(1, 0, 0)).unwrap();
        assert_eq!(neighbor.mesh_state(), MeshState::WaitingForNeighbors);
        assert_ne!(neighbor.dirty_neighbor_mask(), 0);
        assert_eq!(manager.set_block(Point3::new(0, 100, 0), stone()).unwrap(), None);
    }

    #[test]
    fn mesh_requests_are_prioritized_by_distance() {
        let stone = stone();
        let mut manager =
            ChunkManager::new(small_config(), Box::new(FlatGenerator::new(vec![(1, stone)]))).unwrap();
        manager.update(Point3::new(4.0, 4.0, 4.0));
        let requests = manager.collect_mesh_requests(Point3::new(4.0, 4.0, 4.0));
        assert_eq!(requests.len(), 13);
        let nearest = requests.iter().min_by_key(|(_, priority)| *priority).unwrap();
        assert_eq!(nearest.0, Point3::new(0, 0, 0));
        // Upper chunks are empty and settle back to Uninitialized.
        assert_eq!(
            manager.chunk(Point3::new(0, 1, 0)).unwrap().mesh_state(),
            MeshState::Uninitialized
        );
    }
}
