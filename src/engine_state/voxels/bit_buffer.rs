//! # Bit Buffer
//!
//! A fixed-capacity run of bits with arbitrary-width reads and writes at arbitrary
//! bit offsets. Backing storage is a `bitvec` vector of `u64` words; a value may
//! straddle two words, in which case only the bits inside the requested range of
//! each word are touched.

use bitvec::field::BitField;
use bitvec::prelude::{BitVec, Lsb0};

use crate::error::BitBufferError;

/// Widest value a single read or write can carry.
pub const MAX_FIELD_BITS: usize = u64::BITS as usize;

/// A raw fixed-capacity bit array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitBuffer {
    bits: BitVec<u64, Lsb0>,
}

impl BitBuffer {
    /// Creates a zeroed buffer holding `capacity` bits.
    pub fn new(capacity: usize) -> Self {
        BitBuffer {
            bits: BitVec::repeat(false, capacity),
        }
    }

    /// Total number of addressable bits.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    fn check(&self, bit_offset: usize, bit_length: usize) -> Result<(), BitBufferError> {
        let in_range = bit_length > 0
            && bit_length <= MAX_FIELD_BITS
            && bit_offset
                .checked_add(bit_length)
                .is_some_and(|end| end <= self.bits.len());
        if in_range {
            Ok(())
        } else {
            Err(BitBufferError::OutOfRange {
                offset: bit_offset,
                length: bit_length,
                capacity: self.bits.len(),
            })
        }
    }

    /// Writes the low `bit_length` bits of `value` starting at `bit_offset`.
    ///
    /// Bits of `value` above `bit_length` are ignored.
    pub fn set(&mut self, bit_offset: usize, bit_length: usize, value: u64) -> Result<(), BitBufferError> {
        self.check(bit_offset, bit_length)?;
        self.bits[bit_offset..bit_offset + bit_length].store_le(value);
        Ok(())
    }

    /// Reads `bit_length` bits starting at `bit_offset`.
    pub fn get(&self, bit_offset: usize, bit_length: usize) -> Result<u64, BitBufferError> {
        self.check(bit_offset, bit_length)?;
        Ok(self.bits[bit_offset..bit_offset + bit_length].load_le::<u64>())
    }

    /// Zeroes every bit without reallocating.
    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    /// Heap bytes held by the backing store.
    pub fn heap_bytes(&self) -> usize {
        self.bits.as_raw_slice().len() * std::mem::size_of::<u64>()
    }
}
