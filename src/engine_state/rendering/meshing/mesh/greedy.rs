//! Greedy meshing over a neighbor cache.
//!
//! Each of the six sides is swept layer by layer. A layer becomes a 2-D mask of
//! visible faces keyed by texture and render pass; the mask is then covered with
//! as few rectangles as possible by growing each quad first along `u`, then
//! along `v`.

use super::{
    face::{compose, Face},
    mesh::MeshBuffers,
};
use crate::{
    engine_state::{
        rendering::RenderPass,
        voxels::{
            block::{block_side::BlockSide, registry::BlockRegistry, BlockState},
            neighbor_cache::NeighborCache,
        },
    },
    error::MeshError,
};

/// What must match for two neighboring faces to share a quad.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FaceKey {
    texture: u32,
    pass: RenderPass,
}

/// Decides whether `block` shows its face toward `neighbor`.
///
/// Opaque neighbors hide the face. Two transparent blocks of the same type hide
/// the face between them, so a body of water has no inner walls.
fn visible_face(
    block: BlockState,
    neighbor: BlockState,
    side: BlockSide,
    registry: &BlockRegistry,
) -> Option<FaceKey> {
    let render = block.render();
    if !render.is_rendered() || neighbor.render().occludes() {
        return None;
    }
    if render.is_translucent()
        && neighbor.render().is_translucent()
        && neighbor.block_type() == block.block_type()
    {
        return None;
    }
    let pass = if render.is_translucent() {
        RenderPass::Transparent
    } else {
        RenderPass::Opaque
    };
    Some(FaceKey {
        texture: registry.texture(block.block_type(), side),
        pass,
    })
}

/// Builds the mesh for the chunk at the center of `cache`.
///
/// # Arguments
/// * `cache` - Snapshot of the chunk and its one-block border
/// * `registry` - Source of per-face textures
///
/// # Returns
/// World-space geometry for both render passes, or
/// [`MeshError::CacheMismatch`] if the cache is not `(side + 2)^3` cells.
pub fn greedy_mesh(cache: &NeighborCache, registry: &BlockRegistry) -> Result<MeshBuffers, MeshError> {
    let expected = NeighborCache::expected_len(cache.side());
    if cache.len() != expected {
        return Err(MeshError::CacheMismatch {
            expected,
            actual: cache.len(),
        });
    }

    let side_len = cache.side() as i32;
    let mut buffers = MeshBuffers::new();
    let mut mask: Vec<Option<FaceKey>> = vec![None; (side_len * side_len) as usize];
    let cell = |u: i32, v: i32| (u + v * side_len) as usize;

    for side in BlockSide::all() {
        let axis = side.axis();
        let normal = side.normal();

        for layer in 0..side_len {
            for v in 0..side_len {
                for u in 0..side_len {
                    let position = compose(axis, layer, u, v);
                    let block = cache.get_at(position);
                    let neighbor = cache.get_at(position + normal);
                    mask[cell(u, v)] = visible_face(block, neighbor, side, registry);
                }
            }

            let plane = if side.is_positive() { layer + 1 } else { layer };
            for v in 0..side_len {
                let mut u = 0;
                while u < side_len {
                    let Some(key) = mask[cell(u, v)] else {
                        u += 1;
                        continue;
                    };

                    let mut du = 1;
                    while u + du < side_len && mask[cell(u + du, v)] == Some(key) {
                        du += 1;
                    }

                    let mut dv = 1;
                    'grow: while v + dv < side_len {
                        for k in 0..du {
                            if mask[cell(u + k, v + dv)] != Some(key) {
                                break 'grow;
                            }
                        }
                        dv += 1;
                    }

                    for row in v..v + dv {
                        for column in u..u + du {
                            mask[cell(column, row)] = None;
                        }
                    }

                    let face = Face::quad(side, plane, u, v, du, dv, key.texture, cache.origin());
                    buffers.pass_mut(key.pass).push_face(&face);
                    u += du;
                }
            }
        }
    }

    Ok(buffers)
}
