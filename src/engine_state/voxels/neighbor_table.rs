//! # Neighbor Offset Table
//!
//! The 26 chunk-grid directions around a chunk, each paired with the world-space
//! offset from one chunk origin to the neighbor's origin. Built once per manager.

use cgmath::Vector3;

/// One direction of the table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NeighborOffset {
    /// Unit step on the chunk grid, each component in `-1..=1`.
    pub direction: Vector3<i32>,
    /// `direction * side`, in blocks.
    pub offset: Vector3<i32>,
}

impl NeighborOffset {
    /// Number of non-zero components: 1 for faces, 2 for edges, 3 for corners.
    pub fn arity(&self) -> usize {
        [self.direction.x, self.direction.y, self.direction.z]
            .iter()
            .filter(|component| **component != 0)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborOffsetTable {
    entries: Vec<NeighborOffset>,
}

impl NeighborOffsetTable {
    pub const LEN: usize = 26;

    /// Builds the table for chunks of `side` blocks, ordered y, then z, then x.
    pub fn new(side: usize) -> Self {
        let side = side as i32;
        let mut entries = Vec::with_capacity(Self::LEN);
        for dy in -1..=1 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    if (dx, dy, dz) == (0, 0, 0) {
                        continue;
                    }
                    let direction = Vector3::new(dx, dy, dz);
                    entries.push(NeighborOffset {
                        direction,
                        offset: direction * side,
                    });
                }
            }
        }
        NeighborOffsetTable { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborOffset> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a unit direction.
    pub fn get(&self, direction: Vector3<i32>) -> Option<&NeighborOffset> {
        self.entries.iter().find(|entry| entry.direction == direction)
    }
}
