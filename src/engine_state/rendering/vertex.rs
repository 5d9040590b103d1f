//! Vertex format produced by the mesher.
//!
//! The layout is plain old data so a renderer can hand the vertex slice straight
//! to a GPU buffer with `bytemuck::cast_slice`.

use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;

/// A single corner of a meshed quad.
///
/// # Memory Layout
/// - Position: 3x i32 (12 bytes)
/// - Texture Index: u32 (4 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Face: u32 (4 bytes)
///
/// Total size: 28 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// X coordinate in world space
    pub x: i32,
    /// Y coordinate in world space
    pub y: i32,
    /// Z coordinate in world space
    pub z: i32,
    /// Layer of the texture array
    pub texture_index: u32,
    /// Texture coordinates in blocks, so merged quads repeat their texture
    pub tex_coords: [f32; 2],
    /// [`BlockSide`] discriminant, used for shading
    pub face: u32,
}

impl Vertex {
    pub fn new(position: Point3<i32>, texture_index: u32, u: u32, v: u32, side: BlockSide) -> Self {
        Vertex {
            x: position.x,
            y: position.y,
            z: position.z,
            texture_index,
            tex_coords: [u as f32, v as f32],
            face: side as u32,
        }
    }

    pub fn position(&self) -> Point3<i32> {
        Point3::new(self.x, self.y, self.z)
    }
}
