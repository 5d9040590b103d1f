use cgmath::{Point3, Vector3};

use crate::engine_state::{rendering::Vertex, voxels::block::block_side::BlockSide};

/// Builds a point from a coordinate on `axis` and the two in-plane coordinates.
///
/// The in-plane axes are `(axis + 1) % 3` and `(axis + 2) % 3`, which keeps
/// `u x v` pointing along `+axis` for every axis.
#[inline]
pub(crate) fn compose(axis: usize, along: i32, u: i32, v: i32) -> Point3<i32> {
    let mut coords = [0; 3];
    coords[axis] = along;
    coords[(axis + 1) % 3] = u;
    coords[(axis + 2) % 3] = v;
    Point3::from(coords)
}

/// A single quad on one side of a run of blocks.
///
/// Corners are named as seen from outside the block, looking at the face:
/// `ll` lower-left, `lr` lower-right, `ul` upper-left and `ur` upper-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub ll: Point3<i32>,
    pub lr: Point3<i32>,
    pub ul: Point3<i32>,
    pub ur: Point3<i32>,
    /// Extent from `ll` to `lr`, in blocks
    pub width: u32,
    /// Extent from `ll` to `ul`, in blocks
    pub height: u32,
    pub texture: u32,
    pub side: BlockSide,
}

impl Face {
    /// Creates the quad covering `du` by `dv` blocks of a layer.
    ///
    /// # Arguments
    /// * `side` - Which side of the blocks the quad lies on
    /// * `plane` - Coordinate of the quad's plane along the side's axis
    /// * `u`, `v` - In-plane coordinate of the quad's minimum corner
    /// * `du`, `dv` - In-plane extent
    /// * `texture` - Texture array layer
    /// * `origin` - World-space offset added to every corner
    #[allow(clippy::too_many_arguments)]
    pub fn quad(
        side: BlockSide,
        plane: i32,
        u: i32,
        v: i32,
        du: i32,
        dv: i32,
        texture: u32,
        origin: Point3<i32>,
    ) -> Self {
        let axis = side.axis();
        let offset = Vector3::new(origin.x, origin.y, origin.z);
        let corner = |cu: i32, cv: i32| compose(axis, plane, cu, cv) + offset;

        if side.is_positive() {
            Face {
                ll: corner(u, v),
                lr: corner(u + du, v),
                ul: corner(u, v + dv),
                ur: corner(u + du, v + dv),
                width: du as u32,
                height: dv as u32,
                texture,
                side,
            }
        } else {
            // Swapping the in-plane axes flips the winding for the negative side.
            Face {
                ll: corner(u, v),
                lr: corner(u, v + dv),
                ul: corner(u + du, v),
                ur: corner(u + du, v + dv),
                width: dv as u32,
                height: du as u32,
                texture,
                side,
            }
        }
    }

    /// The four corners in `ll`, `lr`, `ul`, `ur` order.
    pub fn vertices(&self) -> [Vertex; 4] {
        [
            Vertex::new(self.ll, self.texture, 0, self.height, self.side),
            Vertex::new(self.lr, self.texture, self.width, self.height, self.side),
            Vertex::new(self.ul, self.texture, 0, 0, self.side),
            Vertex::new(self.ur, self.texture, self.width, 0, self.side),
        ]
    }

    /// Two triangles over the corners written at `base`.
    pub fn indices(base: u32) -> [u32; 6] {
        [base, base + 1, base + 3, base, base + 3, base + 2]
    }

    /// Unnormalized normal from the winding of the first triangle.
    pub fn winding_normal(&self) -> Vector3<i32> {
        let a = self.lr - self.ll;
        let b = self.ur - self.ll;
        Vector3::new(
            a.y * b.z - a.z * b.y,
            a.z * b.x - a.x * b.z,
            a.x * b.y - a.y * b.x,
        )
    }
}
