//! Mesh generation for voxel chunks.
//!
//! Converts a snapshotted [`NeighborCache`](crate::engine_state::voxels::neighbor_cache::NeighborCache)
//! into vertex and index buffers. Coplanar faces that share a texture and a
//! render pass are merged greedily into larger quads.
//!
//! # Architecture
//! - [`MeshBuffers`]: the finished geometry, split into opaque and transparent passes
//! - [`Face`]: one quad with its four corners
//! - [`greedy_mesh`]: the mesher itself, a pure function safe to run on workers

mod face;
mod greedy;
mod mesh;

pub use face::Face;
pub use greedy::greedy_mesh;
pub use mesh::*;
