//! # Neighbor Cache
//!
//! A snapshot of one chunk plus a one-block border taken from its 26 neighbors.
//! The cache is filled on the owning thread and then moved into a mesh job, so
//! the job never touches live chunk data.

use cgmath::Point3;

use super::block::BlockState;
use crate::config::ChunkDimensions;

/// `(side + 2)^3` block states around and including one chunk.
///
/// Coordinates passed to [`NeighborCache::get`] are chunk-local and range over
/// `-1..=side`; `-1` and `side` address the border.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborCache {
    side: usize,
    width: usize,
    origin: Point3<i32>,
    cells: Vec<BlockState>,
}

impl NeighborCache {
    /// Number of cells needed for a chunk of the given side.
    pub fn expected_len(side: usize) -> usize {
        let width = side + 2;
        width * width * width
    }

    /// An all-air cache for chunks of the given dimensions.
    pub fn new(dims: ChunkDimensions) -> Self {
        let side = dims.side();
        NeighborCache {
            side,
            width: side + 2,
            origin: Point3::new(0, 0, 0),
            cells: vec![BlockState::AIR; Self::expected_len(side)],
        }
    }

    /// Fills every cell with air and moves the cache to a new chunk origin.
    pub fn reset(&mut self, origin: Point3<i32>) {
        self.origin = origin;
        self.cells.fill(BlockState::AIR);
    }

    /// World-space position of local `(0, 0, 0)`.
    pub fn origin(&self) -> Point3<i32> {
        self.origin
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    fn index(&self, x: i32, y: i32, z: i32) -> usize {
        let (x, y, z) = ((x + 1) as usize, (y + 1) as usize, (z + 1) as usize);
        x + z * self.width + y * self.width * self.width
    }

    /// # Panics
    /// Panics if a coordinate is outside `-1..=side`.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockState {
        self.cells[self.index(x, y, z)]
    }

    #[inline]
    pub fn get_at(&self, position: Point3<i32>) -> BlockState {
        self.get(position.x, position.y, position.z)
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, z: i32, state: BlockState) {
        let index = self.index(x, y, z);
        self.cells[index] = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::RenderType;

    #[test]
    fn border_cells_are_addressable() {
        let mut cache = NeighborCache::new(ChunkDimensions::new(4));
        assert_eq!(cache.len(), 216);
        let stone = BlockState::new(1, RenderType::Opaque);
        cache.set(-1, -1, -1, stone);
        cache.set(4, 4, 4, stone);
        assert_eq!(cache.get(-1, -1, -1), stone);
        assert_eq!(cache.get(4, 4, 4), stone);
        assert_eq!(cache.get(0, 0, 0), BlockState::AIR);
        cache.reset(Point3::new(4, 0, 0));
        assert_eq!(cache.get(4, 4, 4), BlockState::AIR);
        assert_eq!(cache.origin(), Point3::new(4, 0, 0));
    }
}
