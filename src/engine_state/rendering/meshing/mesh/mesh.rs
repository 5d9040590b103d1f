//! Mesh buffers handed from the mesher to the renderer.

use super::face::Face;
use crate::engine_state::rendering::{RenderPass, Vertex};

/// Geometry for one render pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshPass {
    /// Four vertices per quad
    pub vertices: Vec<Vertex>,
    /// Six indices per quad, two counter-clockwise triangles
    pub indices: Vec<u32>,
}

impl MeshPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Appends the vertices and indices of one quad.
    pub fn push_face(&mut self, face: &Face) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&face.vertices());
        self.indices.extend(Face::indices(base));
    }
}

/// Complete geometry of one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub opaque: MeshPass,
    pub transparent: MeshPass,
}

impl MeshBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(&self, pass: RenderPass) -> &MeshPass {
        match pass {
            RenderPass::Opaque => &self.opaque,
            RenderPass::Transparent => &self.transparent,
        }
    }

    pub fn pass_mut(&mut self, pass: RenderPass) -> &mut MeshPass {
        match pass {
            RenderPass::Opaque => &mut self.opaque,
            RenderPass::Transparent => &mut self.transparent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.opaque.face_count() + self.transparent.face_count()
    }

    pub fn vertex_count(&self) -> usize {
        self.opaque.vertices.len() + self.transparent.vertices.len()
    }
}
