//! Mesh scheduling for voxel rendering.
//!
//! Chunks that want a mesh are queued by priority (squared distance to the
//! viewer, nearest first). Requesting a queued chunk again replaces its
//! priority, so a viewer that moved is served from its new position. Each tick the scheduler dequeues a bounded number of
//! requests, promotes the chunks whose neighbors are ready to `Meshing`, copies
//! their [`NeighborCache`] on the main thread, and hands the copy to a worker.
//!
//! # Architecture
//! - `MeshScheduler`: priority queue, dispatch and completion handling
//! - `mesh/`: the greedy mesher and the buffers it produces
//!
//! # Completion
//! Results come back tagged with the job id the chunk handed out. A chunk that
//! was edited, unloaded or recycled in the meantime holds a different id and the
//! result is dropped.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use cgmath::Point3;

pub mod mesh;

use crate::{
    config::ChunkDimensions,
    engine_state::{
        rendering::tasks::{ChunkMeshGenerationTask, ChunkMeshGenerationTaskResult},
        task_management::{task::TaskTicket, Completion, TaskManager},
        voxels::{block::registry::BlockRegistry, chunk_manager::ChunkManager, neighbor_cache::NeighborCache},
    },
    error::{MeshError, TaskError},
};

/// One queued request. Ordered by priority, then by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MeshRequest {
    priority: u64,
    sequence: u64,
    chunk: Point3<i32>,
}

impl Ord for MeshRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

impl PartialOrd for MeshRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Counters for one tick of mesh work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MeshStats {
    /// Jobs handed to the worker pool.
    pub dispatched: usize,
    /// Requests dequeued without starting a job (neighbors not ready, chunk gone).
    pub deferred: usize,
    /// Results applied to their chunk.
    pub completed: usize,
    /// Results dropped because the chunk moved on.
    pub discarded: usize,
    /// Jobs that panicked or produced no mesh.
    pub failed: usize,
}

impl MeshStats {
    fn merge(&mut self, other: MeshStats) {
        self.dispatched += other.dispatched;
        self.deferred += other.deferred;
        self.completed += other.completed;
        self.discarded += other.discarded;
        self.failed += other.failed;
    }
}

pub struct MeshScheduler {
    /// May hold superseded requests; only the one whose sequence matches
    /// `pending` is live.
    queue: BinaryHeap<Reverse<MeshRequest>>,
    /// Live request per queued chunk.
    pending: HashMap<Point3<i32>, MeshRequest>,
    next_sequence: u64,
    jobs_per_tick: usize,
    task_manager: TaskManager<ChunkMeshGenerationTaskResult>,
    registry: Arc<BlockRegistry>,
    /// Chunk and job id per ticket, so a panicked job can still be attributed.
    in_flight: HashMap<TaskTicket, (Point3<i32>, u64)>,
    dims: ChunkDimensions,
}

impl MeshScheduler {
    /// # Arguments
    /// * `worker_threads` - Mesh workers; zero meshes on the calling thread
    /// * `jobs_per_tick` - Requests dequeued per [`MeshScheduler::dispatch`]
    pub fn new(
        worker_threads: usize,
        jobs_per_tick: usize,
        registry: Arc<BlockRegistry>,
        dims: ChunkDimensions,
    ) -> Self {
        MeshScheduler {
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
            next_sequence: 0,
            jobs_per_tick,
            task_manager: TaskManager::new(worker_threads),
            registry,
            in_flight: HashMap::new(),
            dims,
        }
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn worker_count(&self) -> usize {
        self.task_manager.worker_count()
    }

    /// Requests waiting to be dispatched.
    pub fn queued_len(&self) -> usize {
        self.pending.len()
    }

    /// Jobs published whose results have not been processed.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    /// Queues a mesh request. A chunk that is already queued keeps one request
    /// and takes the new priority.
    ///
    /// Returns `true` if the chunk was not queued before.
    pub fn request(&mut self, chunk: Point3<i32>, priority: u64) -> bool {
        let added = match self.pending.get(&chunk) {
            None => true,
            Some(queued) if queued.priority == priority => return false,
            Some(_) => false,
        };

        self.next_sequence += 1;
        let request = MeshRequest {
            priority,
            sequence: self.next_sequence,
            chunk,
        };
        self.pending.insert(chunk, request);
        self.queue.push(Reverse(request));

        if self.queue.len() > 2 * self.pending.len() + self.jobs_per_tick {
            self.queue = self.pending.values().copied().map(Reverse).collect();
        }
        added
    }

    /// Pops the nearest live request, skipping superseded ones.
    fn pop_request(&mut self) -> Option<MeshRequest> {
        while let Some(Reverse(request)) = self.queue.pop() {
            if self.pending.get(&request.chunk) == Some(&request) {
                self.pending.remove(&request.chunk);
                return Some(request);
            }
        }
        None
    }

    /// Drops every queued request. Jobs already running are unaffected.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }

    /// Dequeues up to `jobs_per_tick` requests and starts a job for each chunk
    /// that is ready to mesh.
    ///
    /// Chunks that cannot start stay `WaitingForNeighbors` and are requested
    /// again by the next collection pass.
    pub fn dispatch(&mut self, manager: &mut ChunkManager) -> MeshStats {
        let mut stats = MeshStats::default();

        for _ in 0..self.jobs_per_tick {
            let Some(request) = self.pop_request() else {
                break;
            };

            match self.start_job(manager, request.chunk) {
                Some(ticket) => {
                    log::trace!("Dispatched mesh {:?} for chunk {:?}", ticket, request.chunk);
                    stats.dispatched += 1;
                }
                None => stats.deferred += 1,
            }
        }

        self.task_manager.process_queued_tasks();
        stats
    }

    fn start_job(&mut self, manager: &mut ChunkManager, coord: Point3<i32>) -> Option<TaskTicket> {
        let neighbors_ready = manager.neighbors_generated(coord);
        let chunk = manager.chunk_mut(coord).filter(|chunk| chunk.is_generated())?;
        // Scheduling errors are logged by the chunk.
        let job_id = chunk.try_begin_meshing(neighbors_ready).ok().flatten()?;
        let origin = chunk.origin();

        let mut cache = NeighborCache::new(self.dims);
        match manager.fill_neighbor_cache(origin, &mut cache) {
            Ok(true) => {}
            Ok(false) => {
                log::error!("Chunk {:?} vanished while its neighbor cache was copied", coord);
                // Back to waiting under a fresh job id so the chunk is not stuck in `Meshing`.
                if let Some(Err(error)) = manager.chunk_mut(coord).map(|chunk| chunk.request_remesh()) {
                    log::error!("{}", error);
                }
                return None;
            }
            Err(error) => {
                log::error!("Failed to copy neighbors of chunk {:?}: {}", coord, error);
                if let Some(Err(error)) = manager.chunk_mut(coord).map(|chunk| chunk.fail_mesh(job_id)) {
                    log::error!("{}", error);
                }
                return None;
            }
        }

        let task = ChunkMeshGenerationTask::new(coord, job_id, cache, Arc::clone(&self.registry));
        let ticket = self.task_manager.publish_task(Box::new(task));
        self.in_flight.insert(ticket, (coord, job_id));
        Some(ticket)
    }

    /// Applies every finished job without blocking.
    pub fn process_completed(&mut self, manager: &mut ChunkManager) -> MeshStats {
        let completions = self.task_manager.drain_completed();
        self.apply(completions, manager)
    }

    /// Blocks until every running job has finished and applies the results.
    pub fn wait_for_all(&mut self, manager: &mut ChunkManager) -> MeshStats {
        let completions = self.task_manager.wait_for_all();
        self.apply(completions, manager)
    }

    fn apply(
        &mut self,
        completions: Vec<Completion<ChunkMeshGenerationTaskResult>>,
        manager: &mut ChunkManager,
    ) -> MeshStats {
        let mut stats = MeshStats::default();
        for (ticket, result) in completions {
            let Some((coord, job_id)) = self.in_flight.remove(&ticket) else {
                log::warn!("Received result for unknown mesh job {:?}", ticket);
                continue;
            };
            let mesh = match result {
                Ok(output) => output.mesh,
                Err(TaskError::Panicked(message)) => Err(MeshError::Panicked(message)),
            };
            stats.merge(Self::apply_one(manager, coord, job_id, mesh));
        }
        stats
    }

    fn apply_one(
        manager: &mut ChunkManager,
        coord: Point3<i32>,
        job_id: u64,
        mesh: Result<mesh::MeshBuffers, MeshError>,
    ) -> MeshStats {
        let mut stats = MeshStats::default();
        let Some(chunk) = manager.chunk_mut(coord) else {
            log::debug!("Chunk {:?} unloaded before mesh job {} finished", coord, job_id);
            stats.discarded += 1;
            return stats;
        };

        match mesh {
            Ok(buffers) => match chunk.complete_mesh(job_id, buffers) {
                Ok(true) => stats.completed += 1,
                Ok(false) => stats.discarded += 1,
                Err(_) => stats.failed += 1,
            },
            Err(error) => {
                log::warn!("Mesh job {} for chunk {:?} failed: {}", job_id, coord, error);
                match chunk.fail_mesh(job_id) {
                    Ok(true) => stats.failed += 1,
                    _ => stats.discarded += 1,
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine_state::voxels::{
        block::{BlockState, RenderType},
        chunk::{FlatGenerator, MeshState},
    };

    fn manager() -> ChunkManager {
        let config = EngineConfig {
            chunk_side: 8,
            column_height: 1,
            load_radius: 1,
            unload_radius: 2,
            column_loads_per_tick: 16,
            worker_threads: 0,
            ..EngineConfig::default()
        };
        let stone = BlockState::new(1, RenderType::Opaque);
        ChunkManager::new(config, Box::new(FlatGenerator::new(vec![(2, stone)]))).unwrap()
    }

    fn scheduler(jobs_per_tick: usize) -> MeshScheduler {
        MeshScheduler::new(
            0,
            jobs_per_tick,
            Arc::new(BlockRegistry::with_defaults()),
            ChunkDimensions::new(8),
        )
    }

    #[test]
    fn requests_pop_nearest_first_and_deduplicate() {
        let mut scheduler = scheduler(1);
        assert!(scheduler.request(Point3::new(5, 0, 0), 50));
        assert!(scheduler.request(Point3::new(1, 0, 0), 1));
        assert!(!scheduler.request(Point3::new(1, 0, 0), 1));
        assert_eq!(scheduler.queued_len(), 2);
        assert_eq!(scheduler.pop_request().unwrap().chunk, Point3::new(1, 0, 0));
        assert_eq!(scheduler.pop_request().unwrap().chunk, Point3::new(5, 0, 0));
        assert!(scheduler.pop_request().is_none());
    }

    #[test]
    fn requeued_chunk_takes_its_new_priority() {
        let mut scheduler = scheduler(1);
        scheduler.request(Point3::new(5, 0, 0), 50);
        scheduler.request(Point3::new(1, 0, 0), 10);
        // The viewer moved next to (5, 0, 0).
        assert!(!scheduler.request(Point3::new(5, 0, 0), 2));
        assert!(!scheduler.request(Point3::new(1, 0, 0), 60));
        assert_eq!(scheduler.queued_len(), 2);

        assert_eq!(scheduler.pop_request().unwrap().chunk, Point3::new(5, 0, 0));
        let second = scheduler.pop_request().unwrap();
        assert_eq!((second.chunk, second.priority), (Point3::new(1, 0, 0), 60));
        assert!(scheduler.pop_request().is_none());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn repeated_reprioritizing_keeps_the_heap_bounded() {
        let mut scheduler = scheduler(1);
        for priority in 0..1000 {
            scheduler.request(Point3::new(0, 0, 0), priority);
            scheduler.request(Point3::new(1, 0, 0), 1000 - priority);
        }
        assert_eq!(scheduler.queued_len(), 2);
        assert!(scheduler.queue.len() <= 2 * 2 + 1);
        assert_eq!(scheduler.pop_request().unwrap().chunk, Point3::new(1, 0, 0));
    }

    #[test]
    fn equal_priorities_keep_arrival_order() {
        let mut scheduler = scheduler(1);
        scheduler.request(Point3::new(2, 0, 0), 7);
        scheduler.request(Point3::new(1, 0, 0), 7);
        assert_eq!(scheduler.pop_request().unwrap().chunk, Point3::new(2, 0, 0));
    }

    #[test]
    fn dispatch_respects_budget_and_completes_inline() {
        let mut manager = manager();
        manager.update(Point3::new(0.0, 0.0, 0.0));
        let mut scheduler = scheduler(2);
        for (chunk, priority) in manager.collect_mesh_requests(Point3::new(4.0, 4.0, 4.0)) {
            scheduler.request(chunk, priority);
        }
        assert_eq!(scheduler.queued_len(), 5);

        let stats = scheduler.dispatch(&mut manager);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(scheduler.queued_len(), 3);
        assert_eq!(scheduler.in_flight_len(), 2);

        let stats = scheduler.process_completed(&mut manager);
        assert_eq!(stats.completed, 2);
        assert!(manager.chunk(Point3::new(0, 0, 0)).unwrap().is_mesh_ready());
    }

    #[test]
    fn edit_during_meshing_discards_the_result() {
        let mut manager = manager();
        manager.update(Point3::new(0.0, 0.0, 0.0));
        let mut scheduler = scheduler(1);
        scheduler.request(Point3::new(0, 0, 0), 0);
        assert_eq!(scheduler.dispatch(&mut manager).dispatched, 1);
        assert_eq!(
            manager.chunk(Point3::new(0, 0, 0)).unwrap().mesh_state(),
            MeshState::Meshing
        );

        manager
            .set_block(Point3::new(3, 3, 3), BlockState::new(1, RenderType::Opaque))
            .unwrap();
        let stats = scheduler.process_completed(&mut manager);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.completed, 0);
        let chunk = manager.chunk(Point3::new(0, 0, 0)).unwrap();
        assert_eq!(chunk.mesh_state(), MeshState::WaitingForNeighbors);
        assert!(!chunk.is_mesh_ready());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn failed_job_returns_chunk_for_retry_after_edit() {
        let mut manager = manager();
        manager.update(Point3::new(0.0, 0.0, 0.0));
        let coord = Point3::new(0, 0, 0);
        let mut scheduler = scheduler(1);
        scheduler.request(coord, 0);
        assert_eq!(scheduler.dispatch(&mut manager).dispatched, 1);

        // Swap the finished mesh for a worker panic.
        let completions = scheduler
            .task_manager
            .drain_completed()
            .into_iter()
            .map(|(ticket, _)| (ticket, Err(TaskError::Panicked("mesher blew up".into()))))
            .collect();
        let stats = scheduler.apply(completions, &mut manager);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
        assert!(scheduler.is_idle());

        let chunk = manager.chunk(coord).unwrap();
        assert_eq!(chunk.mesh_state(), MeshState::WaitingForNeighbors);
        assert!(!chunk.wants_mesh());
        let viewer = Point3::new(4.0, 4.0, 4.0);
        assert!(manager
            .collect_mesh_requests(viewer)
            .iter()
            .all(|(chunk, _)| *chunk != coord));

        manager
            .set_block(Point3::new(3, 5, 3), BlockState::new(1, RenderType::Opaque))
            .unwrap();
        let requests = manager.collect_mesh_requests(viewer);
        assert!(requests.iter().any(|(chunk, _)| *chunk == coord));
        scheduler.request(coord, 0);
        assert_eq!(scheduler.dispatch(&mut manager).dispatched, 1);
        assert_eq!(scheduler.process_completed(&mut manager).completed, 1);
        assert_eq!(manager.chunk(coord).unwrap().mesh_state(), MeshState::Ready);
    }
}
