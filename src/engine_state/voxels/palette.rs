//! # Block Palette
//!
//! Maps every block position of a chunk to a small integer index into a table of
//! unique [`BlockState`]s. Indices are bit-packed into a [`BitBuffer`] whose field
//! width grows on demand, so a chunk made of a handful of block types costs a few
//! bits per block instead of a full state.
//!
//! ## Invariants
//! 1. Every block position resolves to a non-empty entry.
//! 2. Reference counts over all entries sum to `capacity`.
//! 3. The entry table never holds more than `capacity` slots.
//! 4. At most one live entry exists per distinct state.
//!
//! ## Growth and trimming
//! When a new state arrives and no empty entry is left, the index width doubles
//! (capped at the width that addresses `capacity` entries) and every index is
//! re-encoded. [`BlockPalette::trim`] does the reverse as a maintenance pass.

use std::collections::HashMap;

use super::bit_buffer::BitBuffer;
use super::block::BlockState;
use crate::error::PaletteError;

/// One slot of the palette table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PaletteEntry {
    pub reference_count: i32,
    pub block_state: Option<BlockState>,
}

impl PaletteEntry {
    /// Empty entries may be reused for a new state.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.block_state.is_none() || self.reference_count <= 0
    }

    /// The state if the entry is live.
    #[inline]
    pub fn live_state(&self) -> Option<BlockState> {
        if self.reference_count > 0 {
            self.block_state
        } else {
            None
        }
    }
}

/// Bits needed to give each of `count` entries a distinct index (at least one).
fn bits_to_address(count: usize) -> usize {
    if count <= 2 {
        1
    } else {
        (usize::BITS - (count - 1).leading_zeros()) as usize
    }
}

/// Deduplicating, bit-packed block storage for one chunk.
#[derive(Clone, Debug)]
pub struct BlockPalette {
    capacity: usize,
    index_bit_width: usize,
    entries: Vec<PaletteEntry>,
    indices: BitBuffer,
    lookup: HashMap<BlockState, usize>,
}

impl BlockPalette {
    /// A palette of `capacity` blocks, all set to `fill`.
    pub fn new(capacity: usize, fill: BlockState) -> Self {
        let mut palette = BlockPalette {
            capacity,
            index_bit_width: 1,
            entries: Vec::new(),
            indices: BitBuffer::new(capacity),
            lookup: HashMap::new(),
        };
        palette.reset(fill);
        palette
    }

    /// Drops every entry and sets all positions to `fill`, shrinking the index
    /// width back to one bit.
    pub fn reset(&mut self, fill: BlockState) {
        self.index_bit_width = 1;
        self.entries.clear();
        self.entries.resize(self.table_len_for(1), PaletteEntry::default());
        self.entries[0] = PaletteEntry {
            reference_count: self.capacity as i32,
            block_state: Some(fill),
        };
        if self.indices.capacity() == self.capacity {
            self.indices.clear();
        } else {
            self.indices = BitBuffer::new(self.capacity);
        }
        self.lookup.clear();
        self.lookup.insert(fill, 0);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn index_bit_width(&self) -> usize {
        self.index_bit_width
    }

    /// Widest index this palette may ever use.
    #[inline]
    pub fn max_index_bit_width(&self) -> usize {
        bits_to_address(self.capacity)
    }

    /// Slots in the entry table, live or empty.
    #[inline]
    pub fn table_len(&self) -> usize {
        self.entries.len()
    }

    /// Number of live entries.
    pub fn unique_entries(&self) -> usize {
        self.lookup.len()
    }

    /// The raw entry table, for inspection.
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Sum of all positive reference counts. Equals `capacity` whenever the
    /// palette is consistent.
    pub fn total_references(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.is_empty())
            .map(|entry| entry.reference_count as usize)
            .sum()
    }

    /// Number of positions currently holding `state`.
    pub fn count_of(&self, state: &BlockState) -> usize {
        self.lookup
            .get(state)
            .map_or(0, |index| self.entries[*index].reference_count as usize)
    }

    /// Live states with their reference counts, in table order.
    pub fn live_states(&self) -> impl Iterator<Item = (BlockState, usize)> + '_ {
        self.entries.iter().filter_map(|entry| {
            entry
                .live_state()
                .map(|state| (state, entry.reference_count as usize))
        })
    }

    /// Approximate heap footprint in bytes.
    pub fn heap_bytes(&self) -> usize {
        self.indices.heap_bytes() + self.entries.capacity() * std::mem::size_of::<PaletteEntry>()
    }

    fn table_len_for(&self, width: usize) -> usize {
        (1usize << width).min(self.capacity.max(1))
    }

    fn check_position(&self, position: usize) -> Result<(), PaletteError> {
        if position < self.capacity {
            Ok(())
        } else {
            Err(PaletteError::PositionOutOfRange {
                position,
                capacity: self.capacity,
            })
        }
    }

    #[inline]
    fn read_index(&self, position: usize) -> Result<usize, PaletteError> {
        let width = self.index_bit_width;
        Ok(self.indices.get(position * width, width)? as usize)
    }

    #[inline]
    fn write_index(&mut self, position: usize, index: usize) -> Result<(), PaletteError> {
        let width = self.index_bit_width;
        self.indices.set(position * width, width, index as u64)?;
        Ok(())
    }

    fn empty_entry_error(&self, position: usize, index: usize) -> PaletteError {
        PaletteError::EmptyEntry {
            position,
            index,
            width: self.index_bit_width,
            unique: self.unique_entries(),
        }
    }

    /// Returns the state stored at `position`.
    pub fn get_block(&self, position: usize) -> Result<BlockState, PaletteError> {
        self.check_position(position)?;
        let index = self.read_index(position)?;
        self.entries
            .get(index)
            .and_then(PaletteEntry::live_state)
            .ok_or_else(|| self.empty_entry_error(position, index))
    }

    /// Stores `new_state` at `position` and returns the state it replaced.
    ///
    /// The returned state lets callers keep aggregate counts up to date without
    /// rescanning the chunk.
    pub fn set_block(&mut self, position: usize, new_state: BlockState) -> Result<BlockState, PaletteError> {
        self.check_position(position)?;
        let old_index = self.read_index(position)?;
        let old_state = self
            .entries
            .get(old_index)
            .and_then(PaletteEntry::live_state)
            .ok_or_else(|| self.empty_entry_error(position, old_index))?;

        if old_state == new_state {
            return Ok(old_state);
        }

        let old_entry = &mut self.entries[old_index];
        old_entry.reference_count -= 1;
        if old_entry.reference_count <= 0 {
            self.lookup.remove(&old_state);
        }

        let new_index = match self.lookup.get(&new_state) {
            Some(index) => {
                self.entries[*index].reference_count += 1;
                *index
            }
            None => {
                let index = match self.entries.iter().position(PaletteEntry::is_empty) {
                    Some(index) => index,
                    None => self.grow()?,
                };
                self.entries[index] = PaletteEntry {
                    reference_count: 1,
                    block_state: Some(new_state),
                };
                self.lookup.insert(new_state, index);
                index
            }
        };

        self.write_index(position, new_index)?;
        Ok(old_state)
    }

    /// Sets every position to `state`. Equivalent to `reset`, kept for symmetry
    /// with generator code that fills before carving.
    pub fn fill(&mut self, state: BlockState) {
        self.reset(state);
    }

    /// Doubles the index width and returns the first newly available slot.
    fn grow(&mut self) -> Result<usize, PaletteError> {
        let old_width = self.index_bit_width;
        let new_width = (old_width * 2).min(self.max_index_bit_width());
        if new_width <= old_width {
            return Err(PaletteError::CapacityExceeded {
                width: old_width,
                capacity: self.capacity,
            });
        }

        let first_new_slot = self.entries.len();
        let new_len = self.table_len_for(new_width);
        self.entries.resize(new_len, PaletteEntry::default());
        self.reencode(new_width, |index| index)?;

        log::trace!(
            "Palette grew from {} to {} bits ({} slots)",
            old_width,
            new_width,
            new_len
        );
        Ok(first_new_slot)
    }

    /// Rewrites every index at `new_width`, passing each through `remap`.
    fn reencode(&mut self, new_width: usize, remap: impl Fn(usize) -> usize) -> Result<(), PaletteError> {
        let old_width = self.index_bit_width;
        let mut indices = BitBuffer::new(self.capacity * new_width);
        for position in 0..self.capacity {
            let index = self.indices.get(position * old_width, old_width)? as usize;
            indices.set(position * new_width, new_width, remap(index) as u64)?;
        }
        self.indices = indices;
        self.index_bit_width = new_width;
        Ok(())
    }

    /// Shrinks the index width when live entries fit in half the table or less.
    ///
    /// Live entries are packed to the front of the table in their current order.
    /// Returns `true` if anything was compacted.
    pub fn trim(&mut self) -> Result<bool, PaletteError> {
        let unique = self.unique_entries();
        if self.index_bit_width <= 1 || unique * 2 >= self.entries.len() {
            return Ok(false);
        }

        let mut new_width = self.index_bit_width;
        while new_width > 1 && self.table_len_for(new_width / 2) >= unique {
            new_width /= 2;
        }
        if new_width == self.index_bit_width {
            return Ok(false);
        }

        let mut remap = vec![0usize; self.entries.len()];
        let mut packed = Vec::with_capacity(self.table_len_for(new_width));
        for (old_index, entry) in self.entries.iter().enumerate() {
            if !entry.is_empty() {
                remap[old_index] = packed.len();
                packed.push(*entry);
            }
        }
        packed.resize(self.table_len_for(new_width), PaletteEntry::default());

        let old_width = self.index_bit_width;
        self.reencode(new_width, |index| remap[index])?;
        self.entries = packed;
        self.lookup = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.live_state().map(|state| (state, index)))
            .collect();

        log::debug!(
            "Palette trimmed from {} to {} bits ({} live entries)",
            old_width,
            new_width,
            unique
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::RenderType;

    fn state(id: u16) -> BlockState {
        BlockState::new(id, RenderType::Opaque)
    }

    #[test]
    fn starts_with_one_entry_covering_everything() {
        let palette = BlockPalette::new(64, BlockState::AIR);
        assert_eq!(palette.unique_entries(), 1);
        assert_eq!(palette.count_of(&BlockState::AIR), 64);
        assert_eq!(palette.get_block(63).unwrap(), BlockState::AIR);
    }

    #[test]
    fn set_returns_previous_state() {
        let mut palette = BlockPalette::new(64, BlockState::AIR);
        assert_eq!(palette.set_block(5, state(1)).unwrap(), BlockState::AIR);
        assert_eq!(palette.set_block(5, state(2)).unwrap(), state(1));
        assert_eq!(palette.get_block(5).unwrap(), state(2));
        assert_eq!(palette.count_of(&state(1)), 0);
        assert_eq!(palette.total_references(), 64);
    }

    #[test]
    fn growth_preserves_existing_blocks() {
        let mut palette = BlockPalette::new(64, BlockState::AIR);
        palette.set_block(0, state(1)).unwrap();
        assert_eq!(palette.index_bit_width(), 1);
        palette.set_block(1, state(2)).unwrap();
        assert_eq!(palette.index_bit_width(), 2);
        palette.set_block(2, state(3)).unwrap();
        palette.set_block(3, state(4)).unwrap();
        assert_eq!(palette.index_bit_width(), 4);
        for (position, id) in [(0, 1), (1, 2), (2, 3), (3, 4)] {
            assert_eq!(palette.get_block(position).unwrap(), state(id));
        }
        assert_eq!(palette.get_block(4).unwrap(), BlockState::AIR);
    }

    #[test]
    fn growth_is_capped_by_capacity() {
        let mut palette = BlockPalette::new(8, BlockState::AIR);
        for position in 0..8 {
            palette.set_block(position, state(position as u16 + 1)).unwrap();
        }
        assert_eq!(palette.index_bit_width(), 3);
        assert_eq!(palette.table_len(), 8);
        assert_eq!(palette.unique_entries(), 8);
        // Every slot is live, yet overwriting still works because the old entry
        // is released before a slot is searched for.
        palette.set_block(0, state(100)).unwrap();
        assert_eq!(palette.get_block(0).unwrap(), state(100));
    }

    #[test]
    fn emptied_entries_are_reused_before_growing() {
        let mut palette = BlockPalette::new(16, BlockState::AIR);
        palette.set_block(0, state(1)).unwrap();
        palette.set_block(0, state(2)).unwrap();
        assert_eq!(palette.index_bit_width(), 1);
        assert_eq!(palette.unique_entries(), 2);
    }

    #[test]
    fn trim_packs_live_entries() {
        let mut palette = BlockPalette::new(256, BlockState::AIR);
        for position in 0..20 {
            palette.set_block(position, state(position as u16 + 1)).unwrap();
        }
        assert_eq!(palette.index_bit_width(), 8);
        for position in 0..18 {
            palette.set_block(position, BlockState::AIR).unwrap();
        }
        assert_eq!(palette.unique_entries(), 3);
        assert!(palette.trim().unwrap());
        assert_eq!(palette.index_bit_width(), 2);
        assert_eq!(palette.get_block(18).unwrap(), state(19));
        assert_eq!(palette.get_block(19).unwrap(), state(20));
        assert_eq!(palette.get_block(0).unwrap(), BlockState::AIR);
        assert_eq!(palette.total_references(), 256);
        assert!(!palette.trim().unwrap());
        palette.set_block(0, state(50)).unwrap();
        palette.set_block(1, state(51)).unwrap();
        assert_eq!(palette.get_block(1).unwrap(), state(51));
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        let mut palette = BlockPalette::new(8, BlockState::AIR);
        assert!(matches!(
            palette.set_block(8, state(1)),
            Err(PaletteError::PositionOutOfRange { .. })
        ));
        assert!(palette.get_block(100).is_err());
    }
}
