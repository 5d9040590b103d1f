//! # Block Registry Module
//!
//! Block-type metadata (name, render classification, per-face textures) is owned by
//! an explicit [`BlockRegistry`] that is built once at startup and handed to every
//! component that needs it. Mesh workers receive it as an `Arc<BlockRegistry>`; it
//! is never mutated after construction.

use std::collections::HashMap;

use super::{block_side::BlockSide, BlockState, BlockTypeSize, RenderType};

/// Built-in block types: name -> (id, render type, texture per face).
///
/// Texture order follows [`BlockSide::all`]: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT].
static DEFAULT_BLOCK_TYPES: phf::Map<&'static str, (BlockTypeSize, RenderType, [u32; 6])> = phf::phf_map! {
    "air" => (0, RenderType::None, [0, 0, 0, 0, 0, 0]),
    "stone" => (1, RenderType::Opaque, [5, 5, 5, 5, 5, 5]),
    "dirt" => (2, RenderType::Opaque, [1, 1, 1, 1, 1, 1]),
    "grass" => (3, RenderType::Opaque, [2, 2, 1, 3, 2, 2]),
    "wood" => (4, RenderType::Opaque, [0, 0, 0, 0, 0, 0]),
    "leaves" => (5, RenderType::Cutout, [6, 6, 6, 6, 6, 6]),
    "glass" => (6, RenderType::Transparent, [7, 7, 7, 7, 7, 7]),
    "water" => (7, RenderType::Transparent, [8, 8, 8, 8, 8, 8]),
};

/// Metadata for one block type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockType {
    pub id: BlockTypeSize,
    pub name: String,
    pub render: RenderType,
    /// Texture array layer per face, in [`BlockSide`] order.
    pub textures: [u32; 6],
}

impl BlockType {
    /// The default state of this type (no data, no rotation, no cached neighbors).
    pub fn default_state(&self) -> BlockState {
        BlockState::new(self.id, self.render)
    }
}

/// Lookup table from block ids and names to [`BlockType`]s.
#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    types: Vec<Option<BlockType>>,
    by_name: HashMap<String, BlockTypeSize>,
}

impl BlockRegistry {
    /// An empty registry. Only useful together with [`BlockRegistry::register`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in block types.
    pub fn with_defaults() -> Self {
        let mut registry = BlockRegistry::new();
        for (name, (id, render, textures)) in DEFAULT_BLOCK_TYPES.entries() {
            registry.register(BlockType {
                id: *id,
                name: (*name).to_string(),
                render: *render,
                textures: *textures,
            });
        }
        registry
    }

    /// Adds or replaces a block type.
    pub fn register(&mut self, block_type: BlockType) {
        let slot = block_type.id as usize;
        if self.types.len() <= slot {
            self.types.resize(slot + 1, None);
        }
        if let Some(previous) = self.types[slot].take() {
            log::warn!(
                "Block id {} re-registered: '{}' replaces '{}'",
                block_type.id,
                block_type.name,
                previous.name
            );
            self.by_name.remove(&previous.name);
        }
        self.by_name.insert(block_type.name.clone(), block_type.id);
        self.types[slot] = Some(block_type);
    }

    pub fn get(&self, id: BlockTypeSize) -> Option<&BlockType> {
        self.types.get(id as usize).and_then(Option::as_ref)
    }

    pub fn by_name(&self, name: &str) -> Option<&BlockType> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// Default state of the named block type.
    pub fn state(&self, name: &str) -> Option<BlockState> {
        self.by_name(name).map(BlockType::default_state)
    }

    /// Default state of the block type with the given id.
    pub fn state_by_id(&self, id: BlockTypeSize) -> Option<BlockState> {
        self.get(id).map(BlockType::default_state)
    }

    /// Texture layer for one face of a block type; unknown ids map to layer 0.
    pub fn texture(&self, id: BlockTypeSize, side: BlockSide) -> u32 {
        self.get(id).map_or(0, |block_type| block_type.textures[side as usize])
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
