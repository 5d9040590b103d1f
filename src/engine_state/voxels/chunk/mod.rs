//! # Chunk Module
//!
//! A [`Chunk`] is a cube of `side^3` blocks stored in a [`BlockPalette`], plus the
//! bookkeeping that decides when its mesh has to be rebuilt.
//!
//! ## Mesh lifecycle
//! Every render-relevant edit, either to the chunk itself or to a border block of
//! a neighbor, moves the chunk to [`MeshState::WaitingForNeighbors`]. The chunk
//! manager promotes it to [`MeshState::Meshing`] once every resident neighbor is
//! generated and hands a job id to the mesh job. A finished job only makes the
//! chunk [`MeshState::Ready`] if that id is still current; any later edit draws a
//! new id and so turns the in-flight result stale.
//!
//! ## Thread affinity
//! Chunks are `!Send`. They live on the thread that runs the world tick, and only
//! snapshots of their blocks travel to mesh workers.

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::{Point3, Vector3};

pub use chunk_creation::{
    ChunkGenerator, EmptyGenerator, FlatGenerator, PerlinGenerator, ScatterGenerator,
};
pub use mesh_state::MeshState;

use super::{
    block::{block_side::BlockSide, BlockState},
    palette::BlockPalette,
};
use crate::{
    config::ChunkDimensions,
    core::ThreadBound,
    engine_state::rendering::{meshing::mesh::MeshBuffers, ChunkRenderer, RenderPass},
    error::ChunkError,
};

pub mod chunk_creation;
mod mesh_state;

/// Source of job ids. Shared by all chunks so a recycled chunk can never
/// mistake a job issued to its previous occupant for its own.
static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

fn next_job_id() -> u64 {
    NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
}

/// Outcome of [`Chunk::set_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockChange {
    /// The state that was replaced.
    pub old: BlockState,
    /// Whether the edit can change the mesh.
    pub remesh: bool,
    /// Chunk-grid offsets of neighbors whose border sampling includes the edited
    /// block. Empty for interior edits.
    pub neighbors: Vec<Vector3<i32>>,
}

/// Offsets of the chunks that sample `local` as part of their border.
///
/// A face block touches one neighbor, an edge block three and a corner block seven.
pub fn affected_neighbors(local: Point3<usize>, side: usize) -> Vec<Vector3<i32>> {
    let step = |coordinate: usize| -> i32 {
        if coordinate == 0 {
            -1
        } else if coordinate + 1 == side {
            1
        } else {
            0
        }
    };
    let (sx, sy, sz) = (step(local.x), step(local.y), step(local.z));
    let mut offsets = Vec::new();
    for dy in [0, sy] {
        for dz in [0, sz] {
            for dx in [0, sx] {
                let offset = Vector3::new(dx, dy, dz);
                if offset != Vector3::new(0, 0, 0) && !offsets.contains(&offset) {
                    offsets.push(offset);
                }
            }
        }
    }
    offsets
}

/// A cubic block of voxels and its mesh bookkeeping.
pub struct Chunk {
    /// Chunk-grid coordinate (world block position divided by the side).
    position: Point3<i32>,
    dims: ChunkDimensions,
    palette: BlockPalette,
    rendered_block_count: usize,
    translucent_block_count: usize,
    mesh_state: MeshState,
    generated: bool,
    /// Set on the first `Ready` transition; cleared when the mesh is released.
    mesh_ready: bool,
    /// One bit per [`BlockSide`]: neighbors on these sides changed since the last mesh.
    dirty_neighbor_mask: u8,
    job_id: u64,
    /// The last job failed; no automatic retry until the next edit or `request_remesh`.
    mesh_failed: bool,
    mesh: Option<MeshBuffers>,
    mesh_uploaded: bool,
    /// An uploaded mesh was dropped and the renderer has not been told yet.
    release_pending: bool,
    _thread: ThreadBound,
}

impl Chunk {
    /// Creates an ungenerated, all-air chunk.
    ///
    /// # Arguments
    /// * `position` - The chunk coordinates of the new chunk
    /// * `dims` - The chunk geometry shared by the whole world
    pub fn new(position: Point3<i32>, dims: ChunkDimensions) -> Self {
        Chunk {
            position,
            dims,
            palette: BlockPalette::new(dims.volume(), BlockState::AIR),
            rendered_block_count: 0,
            translucent_block_count: 0,
            mesh_state: MeshState::Uninitialized,
            generated: false,
            mesh_ready: false,
            dirty_neighbor_mask: 0,
            job_id: 0,
            mesh_failed: false,
            mesh: None,
            mesh_uploaded: false,
            release_pending: false,
            _thread: ThreadBound::new(),
        }
    }

    pub fn position(&self) -> Point3<i32> {
        self.position
    }

    /// World-space position of local `(0, 0, 0)`.
    pub fn origin(&self) -> Point3<i32> {
        self.dims.origin_of(self.position)
    }

    pub fn dimensions(&self) -> ChunkDimensions {
        self.dims
    }

    pub fn palette(&self) -> &BlockPalette {
        &self.palette
    }

    pub fn rendered_block_count(&self) -> usize {
        self.rendered_block_count
    }

    pub fn translucent_block_count(&self) -> usize {
        self.translucent_block_count
    }

    pub fn mesh_state(&self) -> MeshState {
        self.mesh_state
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn is_mesh_ready(&self) -> bool {
        self.mesh_ready
    }

    pub fn dirty_neighbor_mask(&self) -> u8 {
        self.dirty_neighbor_mask
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn mesh_failed(&self) -> bool {
        self.mesh_failed
    }

    pub fn mesh(&self) -> Option<&MeshBuffers> {
        self.mesh.as_ref()
    }

    /// Whether the scheduler should be asked to mesh this chunk.
    pub fn wants_mesh(&self) -> bool {
        self.generated && self.mesh_state == MeshState::WaitingForNeighbors && !self.mesh_failed
    }

    /// Moves the state machine along one edge.
    ///
    /// # Errors
    /// * [`ChunkError::NotGenerated`] before the chunk has been generated
    /// * [`ChunkError::StateReentry`] when `to` is already active (except `Uninitialized`)
    /// * [`ChunkError::InvalidTransition`] for edges the state machine does not have
    fn transition(&mut self, to: MeshState) -> Result<(), ChunkError> {
        let position = self.position.into();
        let result = if !self.generated {
            Err(ChunkError::NotGenerated { position })
        } else if self.mesh_state == to && to != MeshState::Uninitialized {
            Err(ChunkError::StateReentry {
                position,
                state: to.name(),
            })
        } else if self.mesh_state != to && !self.mesh_state.can_transition_to(to) {
            Err(ChunkError::InvalidTransition {
                position,
                from: self.mesh_state.name(),
                to: to.name(),
            })
        } else {
            Ok(())
        };

        match result {
            Ok(()) => {
                log::trace!("Chunk {:?}: {} -> {}", self.position, self.mesh_state, to);
                self.mesh_state = to;
                Ok(())
            }
            Err(error) => {
                log::error!("{}", error);
                Err(error)
            }
        }
    }

    /// Recomputes the aggregate counts from the palette's live entries.
    fn recount(&mut self) {
        let (rendered, translucent) = self.palette.live_states().fold(
            (0, 0),
            |(rendered, translucent), (state, count)| {
                let render = state.render();
                (
                    rendered + if render.is_rendered() { count } else { 0 },
                    translucent + if render.is_translucent() { count } else { 0 },
                )
            },
        );
        self.rendered_block_count = rendered;
        self.translucent_block_count = translucent;
    }

    /// Fills the chunk with its initial contents.
    ///
    /// A chunk with rendered blocks moves to `WaitingForNeighbors`. On failure the
    /// chunk is left empty and ungenerated.
    pub fn generate_with(&mut self, generator: &dyn ChunkGenerator) -> Result<(), ChunkError> {
        self.reset(self.position);
        let origin = self.origin();
        if let Err(error) = generator.generate(origin, self.dims, &mut self.palette) {
            self.palette.reset(BlockState::AIR);
            return Err(ChunkError::Generation {
                position: self.position.into(),
                reason: error.to_string(),
            });
        }

        self.generated = true;
        self.recount();
        if self.rendered_block_count > 0 {
            self.transition(MeshState::WaitingForNeighbors)?;
        }
        Ok(())
    }

    /// Returns the chunk to the freshly constructed state at a new position.
    ///
    /// Any in-flight job becomes stale.
    pub fn reset(&mut self, position: Point3<i32>) {
        self.position = position;
        self.palette.reset(BlockState::AIR);
        self.rendered_block_count = 0;
        self.translucent_block_count = 0;
        self.mesh_state = MeshState::Uninitialized;
        self.generated = false;
        self.mesh_ready = false;
        self.dirty_neighbor_mask = 0;
        self.job_id = next_job_id();
        self.mesh_failed = false;
        self.mesh = None;
        self.mesh_uploaded = false;
        self.release_pending = false;
    }

    /// Flattens a local coordinate. Every axis must lie in `0..side`, otherwise
    /// one axis would spill into the bits of the next.
    fn local_index(&self, local: Point3<usize>) -> Result<usize, ChunkError> {
        let side = self.dims.side();
        if local.x >= side || local.y >= side || local.z >= side {
            return Err(ChunkError::LocalOutOfRange {
                position: self.position.into(),
                local: local.into(),
                side,
            });
        }
        Ok(self.dims.index(local.x, local.y, local.z))
    }

    /// Reads a block by chunk-local coordinate.
    pub fn get_block(&self, local: Point3<usize>) -> Result<BlockState, ChunkError> {
        let index = self.local_index(local)?;
        self.palette
            .get_block(index)
            .map_err(|source| ChunkError::palette(self.position, source))
    }

    /// Writes a block by chunk-local coordinate.
    ///
    /// Render-relevant edits move the chunk to `WaitingForNeighbors` (or to
    /// `Uninitialized` if nothing rendered is left) and report which neighbors
    /// sample the edited block. Marking those neighbors is up to the caller.
    pub fn set_block(&mut self, local: Point3<usize>, state: BlockState) -> Result<BlockChange, ChunkError> {
        if !self.generated {
            let error = ChunkError::NotGenerated {
                position: self.position.into(),
            };
            log::error!("{}", error);
            return Err(error);
        }

        let index = self.local_index(local).map_err(|error| {
            log::error!("{}", error);
            error
        })?;
        let old = self
            .palette
            .set_block(index, state)
            .map_err(|source| {
                let error = ChunkError::palette(self.position, source);
                log::error!("{}", error);
                error
            })?;

        let (old_render, new_render) = (old.render(), state.render());
        if old_render.is_rendered() {
            self.rendered_block_count -= 1;
        }
        if new_render.is_rendered() {
            self.rendered_block_count += 1;
        }
        if old_render.is_translucent() {
            self.translucent_block_count -= 1;
        }
        if new_render.is_translucent() {
            self.translucent_block_count += 1;
        }

        if old.renders_like(&state) {
            return Ok(BlockChange {
                old,
                remesh: false,
                neighbors: Vec::new(),
            });
        }

        self.contents_changed()?;
        Ok(BlockChange {
            old,
            remesh: true,
            neighbors: affected_neighbors(local, self.dims.side()),
        })
    }

    /// Reacts to a render-relevant change of this chunk's own blocks.
    fn contents_changed(&mut self) -> Result<(), ChunkError> {
        self.mesh_failed = false;
        if self.rendered_block_count == 0 {
            self.job_id = next_job_id();
            self.drop_mesh();
            return self.transition(MeshState::Uninitialized);
        }
        self.invalidate_mesh()
    }

    /// Sends the chunk back to `WaitingForNeighbors`, superseding any job in flight.
    fn invalidate_mesh(&mut self) -> Result<(), ChunkError> {
        match self.mesh_state {
            MeshState::WaitingForNeighbors => Ok(()),
            MeshState::Meshing => {
                self.job_id = next_job_id();
                self.transition(MeshState::WaitingForNeighbors)
            }
            MeshState::Uninitialized | MeshState::Ready => {
                self.transition(MeshState::WaitingForNeighbors)
            }
        }
    }

    /// Records that the neighbor in direction `toward` changed a block this chunk
    /// samples for its border.
    ///
    /// `toward` points from this chunk to the changed neighbor and may be a face,
    /// edge or corner direction. An ungenerated chunk only records the mask.
    pub fn mark_neighbor_dirty(&mut self, toward: Vector3<i32>) -> Result<(), ChunkError> {
        for (axis, component) in [toward.x, toward.y, toward.z].into_iter().enumerate() {
            if component != 0 {
                self.dirty_neighbor_mask |= 1 << BlockSide::from_axis(axis, component > 0) as u8;
            }
        }
        if !self.generated {
            return Ok(());
        }
        self.mesh_failed = false;
        self.invalidate_mesh()
    }

    /// Drops a pending mesh request for a chunk with nothing left to draw.
    ///
    /// Returns `true` if the chunk went back to `Uninitialized`.
    pub fn settle_if_empty(&mut self) -> Result<bool, ChunkError> {
        if !self.generated || self.rendered_block_count > 0 || self.mesh_state != MeshState::WaitingForNeighbors {
            return Ok(false);
        }
        self.dirty_neighbor_mask = 0;
        self.drop_mesh();
        self.transition(MeshState::Uninitialized)?;
        Ok(true)
    }

    /// Promotes a waiting chunk to `Meshing` and returns the id the mesh job must carry.
    ///
    /// Returns `Ok(None)` if the chunk is not waiting, its last job failed, or
    /// `neighbors_ready` is false; these are normal scheduling outcomes.
    pub fn try_begin_meshing(&mut self, neighbors_ready: bool) -> Result<Option<u64>, ChunkError> {
        if !self.generated {
            let error = ChunkError::NotGenerated {
                position: self.position.into(),
            };
            log::error!("{}", error);
            return Err(error);
        }
        if self.mesh_state != MeshState::WaitingForNeighbors || self.mesh_failed {
            return Ok(None);
        }
        if !neighbors_ready {
            log::trace!("Chunk {:?} waits for neighbors", self.position);
            return Ok(None);
        }

        self.transition(MeshState::Meshing)?;
        self.job_id = next_job_id();
        self.dirty_neighbor_mask = 0;
        Ok(Some(self.job_id))
    }

    /// Applies a finished mesh if `job_id` is still current.
    ///
    /// Returns `false` for stale results, which are dropped.
    pub fn complete_mesh(&mut self, job_id: u64, buffers: MeshBuffers) -> Result<bool, ChunkError> {
        if job_id != self.job_id || self.mesh_state != MeshState::Meshing {
            log::debug!(
                "Chunk {:?} dropped stale mesh job {} (current {}, {})",
                self.position,
                job_id,
                self.job_id,
                self.mesh_state
            );
            return Ok(false);
        }
        self.update_mesh(buffers);
        self.transition(MeshState::Ready)?;
        self.mesh_ready = true;
        Ok(true)
    }

    /// Records a failed mesh job. The chunk waits for an edit or [`Chunk::request_remesh`].
    ///
    /// Returns `false` if the job was already stale.
    pub fn fail_mesh(&mut self, job_id: u64) -> Result<bool, ChunkError> {
        if job_id != self.job_id || self.mesh_state != MeshState::Meshing {
            return Ok(false);
        }
        self.transition(MeshState::WaitingForNeighbors)?;
        self.mesh_failed = true;
        Ok(true)
    }

    /// Asks for a new mesh without changing any block.
    pub fn request_remesh(&mut self) -> Result<(), ChunkError> {
        self.mesh_failed = false;
        if !self.generated || self.rendered_block_count == 0 {
            return Ok(());
        }
        self.invalidate_mesh()
    }

    /// Replaces the stored mesh. The renderer receives it on the next draw.
    pub fn update_mesh(&mut self, buffers: MeshBuffers) {
        self.mesh = Some(buffers);
        self.mesh_uploaded = false;
    }

    /// Drops the stored mesh.
    ///
    /// Returns `true` if the renderer holds an uploaded copy that must be released.
    /// The caller takes over that release.
    pub fn release_mesh(&mut self) -> bool {
        let uploaded = self.mesh_uploaded || self.release_pending;
        self.mesh = None;
        self.mesh_uploaded = false;
        self.release_pending = false;
        self.mesh_ready = false;
        uploaded
    }

    /// Drops the stored mesh and leaves the release to the next draw.
    fn drop_mesh(&mut self) {
        if self.release_mesh() {
            self.release_pending = true;
        }
    }

    /// Draws one pass of the chunk.
    ///
    /// Does nothing until the chunk has been `Ready` at least once, and skips the
    /// transparent pass for chunks without translucent blocks. A mesh dropped
    /// since the last draw is released first.
    pub fn draw(&mut self, pass: RenderPass, renderer: &mut dyn ChunkRenderer) {
        if self.release_pending {
            renderer.release(self.position);
            self.release_pending = false;
        }
        if !self.mesh_ready {
            return;
        }
        if pass == RenderPass::Transparent && self.translucent_block_count == 0 {
            return;
        }
        let Some(mesh) = self.mesh.as_ref() else {
            return;
        };
        if !self.mesh_uploaded {
            renderer.upload(self.position, mesh);
            self.mesh_uploaded = true;
        }
        let geometry = mesh.pass(pass);
        if !geometry.is_empty() {
            renderer.draw(self.position, pass, geometry);
        }
    }

    /// Compacts the palette. See [`BlockPalette::trim`].
    pub fn trim(&mut self) -> Result<bool, ChunkError> {
        self.palette
            .trim()
            .map_err(|source| ChunkError::palette(self.position, source))
    }
}
