//! # Block Module
//!
//! This module provides the per-block value types stored in chunk palettes: the
//! immutable [`BlockState`], its [`RenderType`] classification and the packed
//! [`NeighborFlags`] byte. Block-type metadata (names, textures) lives in the
//! [`registry`] and is looked up through an explicit [`registry::BlockRegistry`].

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use block_side::BlockSide;

pub mod block_side;
pub mod registry;

/// The underlying integer type used to identify block types.
pub type BlockTypeSize = u16;

/// How a block takes part in rendering.
///
/// `Opaque` and `Cutout` blocks are drawn in the opaque pass; only `Opaque` blocks
/// hide the faces of their neighbors. `Transparent` blocks are drawn in the
/// transparent pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, FromPrimitive)]
#[repr(u8)]
pub enum RenderType {
    /// Not rendered at all (air).
    #[default]
    None = 0,
    /// Fully solid.
    Opaque = 1,
    /// Alpha-tested (leaves, grates).
    Cutout = 2,
    /// Alpha-blended (glass, water).
    Transparent = 3,
}

impl RenderType {
    /// Converts a stored byte back into a render type.
    pub fn from_byte(byte: u8) -> Option<Self> {
        RenderType::from_u8(byte)
    }

    #[inline]
    pub fn is_rendered(self) -> bool {
        self != RenderType::None
    }

    #[inline]
    pub fn is_translucent(self) -> bool {
        self == RenderType::Transparent
    }

    #[inline]
    pub fn occludes(self) -> bool {
        self == RenderType::Opaque
    }
}

/// Cached "has a solid neighbor" flags (low 6 bits, one per [`BlockSide`]) plus a
/// 2-bit rotation (high 2 bits), packed into one byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct NeighborFlags(u8);

impl NeighborFlags {
    pub const FRONT: u8 = 1 << BlockSide::FRONT as u8;
    pub const BACK: u8 = 1 << BlockSide::BACK as u8;
    pub const BOTTOM: u8 = 1 << BlockSide::BOTTOM as u8;
    pub const TOP: u8 = 1 << BlockSide::TOP as u8;
    pub const LEFT: u8 = 1 << BlockSide::LEFT as u8;
    pub const RIGHT: u8 = 1 << BlockSide::RIGHT as u8;

    /// All six face bits.
    pub const FACE_MASK: u8 = 0b0011_1111;
    /// Bit position of the rotation field.
    pub const ROTATION_SHIFT: u8 = 6;

    pub const fn from_bits(bits: u8) -> Self {
        NeighborFlags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether a solid neighbor is cached for `side`.
    pub fn has_solid_neighbor(self, side: BlockSide) -> bool {
        self.0 & (1 << side as u8) != 0
    }

    /// Returns a copy with the flag for `side` set or cleared.
    #[must_use]
    pub fn with_solid_neighbor(self, side: BlockSide, solid: bool) -> Self {
        let bit = 1 << side as u8;
        if solid {
            NeighborFlags(self.0 | bit)
        } else {
            NeighborFlags(self.0 & !bit)
        }
    }

    /// Rotation in quarter turns, 0..=3.
    pub fn rotation(self) -> u8 {
        self.0 >> Self::ROTATION_SHIFT
    }

    /// Returns a copy with the rotation replaced; only the low two bits are kept.
    #[must_use]
    pub fn with_rotation(self, rotation: u8) -> Self {
        NeighborFlags((self.0 & Self::FACE_MASK) | ((rotation & 0b11) << Self::ROTATION_SHIFT))
    }

    /// Face bits only.
    pub fn faces(self) -> u8 {
        self.0 & Self::FACE_MASK
    }
}

/// Immutable per-block value stored in palettes.
///
/// Two states are equal iff block id, render type, data byte and the packed
/// neighbor/rotation byte all match. "Changing" a state means building a new value
/// with one of the `with_*` methods and storing that.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct BlockState {
    block_type: BlockTypeSize,
    render: RenderType,
    data: u8,
    neighbors: NeighborFlags,
}

impl BlockState {
    /// The empty block.
    pub const AIR: BlockState = BlockState {
        block_type: 0,
        render: RenderType::None,
        data: 0,
        neighbors: NeighborFlags(0),
    };

    pub const fn new(block_type: BlockTypeSize, render: RenderType) -> Self {
        BlockState {
            block_type,
            render,
            data: 0,
            neighbors: NeighborFlags(0),
        }
    }

    #[inline]
    pub fn block_type(&self) -> BlockTypeSize {
        self.block_type
    }

    #[inline]
    pub fn render(&self) -> RenderType {
        self.render
    }

    #[inline]
    pub fn data(&self) -> u8 {
        self.data
    }

    #[inline]
    pub fn neighbors(&self) -> NeighborFlags {
        self.neighbors
    }

    #[inline]
    pub fn rotation(&self) -> u8 {
        self.neighbors.rotation()
    }

    #[must_use]
    pub fn with_data(self, data: u8) -> Self {
        BlockState { data, ..self }
    }

    #[must_use]
    pub fn with_neighbors(self, neighbors: NeighborFlags) -> Self {
        BlockState { neighbors, ..self }
    }

    #[must_use]
    pub fn with_rotation(self, rotation: u8) -> Self {
        BlockState {
            neighbors: self.neighbors.with_rotation(rotation),
            ..self
        }
    }

    /// Whether swapping `self` for `other` can change the generated mesh.
    ///
    /// Cached neighbor flags are derived data and do not count.
    pub fn renders_like(&self, other: &BlockState) -> bool {
        self.block_type == other.block_type
            && self.render == other.render
            && self.data == other.data
            && self.rotation() == other.rotation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_covers_every_field() {
        let stone = BlockState::new(1, RenderType::Opaque);
        assert_eq!(stone, BlockState::new(1, RenderType::Opaque));
        assert_ne!(stone, stone.with_data(3));
        assert_ne!(stone, stone.with_rotation(1));
        assert_ne!(
            stone,
            stone.with_neighbors(NeighborFlags::from_bits(NeighborFlags::TOP))
        );
        assert_ne!(stone, BlockState::new(1, RenderType::Cutout));
    }

    #[test]
    fn rotation_and_faces_share_one_byte() {
        let flags = NeighborFlags::default()
            .with_solid_neighbor(BlockSide::TOP, true)
            .with_solid_neighbor(BlockSide::LEFT, true)
            .with_rotation(3);
        assert_eq!(flags.rotation(), 3);
        assert_eq!(flags.faces(), NeighborFlags::TOP | NeighborFlags::LEFT);
        assert!(flags.has_solid_neighbor(BlockSide::TOP));
        assert!(!flags.has_solid_neighbor(BlockSide::BOTTOM));
        assert_eq!(flags.with_rotation(5).rotation(), 1);
    }

    #[test]
    fn neighbor_flags_do_not_affect_rendering() {
        let glass = BlockState::new(7, RenderType::Transparent);
        let flagged = glass.with_neighbors(NeighborFlags::from_bits(NeighborFlags::FACE_MASK));
        assert!(glass.renders_like(&flagged));
        assert!(!glass.renders_like(&glass.with_rotation(2)));
    }

    #[test]
    fn render_type_from_byte() {
        assert_eq!(RenderType::from_byte(3), Some(RenderType::Transparent));
        assert_eq!(RenderType::from_byte(9), None);
    }
}
