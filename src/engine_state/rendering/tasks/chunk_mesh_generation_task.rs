//! Task for generating mesh data for chunks in a background thread.
//!
//! The task owns a [`NeighborCache`] snapshot taken on the main thread, so it
//! reads nothing that the main thread may be writing to.

use std::sync::Arc;
use std::time::Duration;

use cgmath::Point3;
use web_time::Instant;

use crate::{
    engine_state::{
        rendering::meshing::mesh::{greedy_mesh, MeshBuffers},
        task_management::task::Task,
        voxels::{block::registry::BlockRegistry, neighbor_cache::NeighborCache},
    },
    error::MeshError,
};

/// A mesh job for one chunk.
pub struct ChunkMeshGenerationTask {
    /// Chunk-grid coordinate of the chunk being meshed
    chunk: Point3<i32>,
    /// Job id the chunk expects back; anything else is stale
    job_id: u64,
    cache: NeighborCache,
    registry: Arc<BlockRegistry>,
}

impl ChunkMeshGenerationTask {
    pub fn new(chunk: Point3<i32>, job_id: u64, cache: NeighborCache, registry: Arc<BlockRegistry>) -> Self {
        ChunkMeshGenerationTask {
            chunk,
            job_id,
            cache,
            registry,
        }
    }
}

/// What a mesh job sends back to the main thread.
#[derive(Debug)]
pub struct ChunkMeshGenerationTaskResult {
    pub chunk: Point3<i32>,
    pub job_id: u64,
    pub mesh: Result<MeshBuffers, MeshError>,
    /// Wall time spent in the mesher
    pub elapsed: Duration,
}

impl Task for ChunkMeshGenerationTask {
    type Output = ChunkMeshGenerationTaskResult;

    fn process(self: Box<Self>) -> ChunkMeshGenerationTaskResult {
        let start = Instant::now();
        let mesh = greedy_mesh(&self.cache, &self.registry);
        let elapsed = start.elapsed();

        if let Ok(buffers) = &mesh {
            log::trace!(
                "Meshed chunk {:?} (job {}) in {:?}: {} faces",
                self.chunk,
                self.job_id,
                elapsed,
                buffers.face_count()
            );
        }

        ChunkMeshGenerationTaskResult {
            chunk: self.chunk,
            job_id: self.job_id,
            mesh,
            elapsed,
        }
    }
}
