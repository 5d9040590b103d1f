//! Rendering boundary of the chunk core.
//!
//! Nothing in this module touches a GPU. It produces mesh buffers on worker
//! threads, schedules that work, and hands finished geometry to whatever
//! implements [`ChunkRenderer`].
//!
//! ## Components
//! - [`meshing::MeshScheduler`]: priority queue and worker pool for mesh jobs
//! - [`meshing::mesh`]: greedy mesher and the buffers it produces
//! - [`tasks`]: the background job that runs the mesher
//! - [`Vertex`]: the vertex layout shared with the renderer

use cgmath::Point3;

pub mod meshing;
pub mod tasks;
mod vertex;

pub use meshing::mesh::{MeshBuffers, MeshPass};
pub use vertex::Vertex;

/// The two draw passes a chunk takes part in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderPass {
    /// Opaque and cutout geometry, drawn front to back with depth writes.
    Opaque,
    /// Alpha-blended geometry, drawn after the opaque pass.
    Transparent,
}

impl RenderPass {
    pub fn all() -> [RenderPass; 2] {
        [RenderPass::Opaque, RenderPass::Transparent]
    }
}

/// The external renderer.
///
/// A chunk uploads its mesh the first time it is drawn after a new mesh arrived
/// and asks for a release when the mesh is dropped. `chunk` is the chunk-grid
/// coordinate and doubles as the key for GPU-side resources.
pub trait ChunkRenderer {
    /// Stores new geometry for `chunk`, replacing anything uploaded before.
    fn upload(&mut self, chunk: Point3<i32>, mesh: &MeshBuffers);

    /// Frees the geometry held for `chunk`.
    fn release(&mut self, chunk: Point3<i32>);

    /// Issues the draw for one pass of `chunk`.
    fn draw(&mut self, chunk: Point3<i32>, pass: RenderPass, mesh: &MeshPass);
}
