//! # Load Spiral
//!
//! Column offsets around the viewer in the order they should be loaded. The
//! sequence walks a square spiral ring by ring, keeps the offsets inside the
//! load circle and is then stable-sorted by squared distance, so ties keep
//! their spiral order and nearer columns always come first.

use cgmath::Vector2;

/// Packs an offset into one word: `x` in the high half, `z` in the low half.
#[inline]
fn pack(x: i32, z: i32) -> u32 {
    ((x as i16 as u16 as u32) << 16) | (z as i16 as u16 as u32)
}

#[inline]
fn unpack(entry: u32) -> Vector2<i32> {
    Vector2::new((entry >> 16) as u16 as i16 as i32, (entry & 0xFFFF) as u16 as i16 as i32)
}

/// Immutable, nearest-first list of column offsets within a radius.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSpiral {
    radius: u32,
    entries: Vec<u32>,
}

impl LoadSpiral {
    /// Largest radius whose offsets still fit the packed `i16` halves.
    pub const MAX_RADIUS: u32 = i16::MAX as u32;

    /// Builds the spiral for `radius` columns.
    ///
    /// `EngineConfig::validate` rejects radii above [`LoadSpiral::MAX_RADIUS`];
    /// a larger value passed here directly is clamped.
    pub fn new(radius: u32) -> Self {
        let radius = radius.min(Self::MAX_RADIUS);
        let r = radius as i32;
        let limit = i64::from(r) * i64::from(r);
        let within = |x: i32, z: i32| i64::from(x) * i64::from(x) + i64::from(z) * i64::from(z) <= limit;

        let mut entries = vec![pack(0, 0)];
        for ring in 1..=r {
            // Right edge going +z, top edge going -x, left edge going -z,
            // bottom edge going +x. Each edge skips its first corner.
            let right = (-ring + 1..=ring).map(|z| (ring, z));
            let top = (-ring..ring).rev().map(|x| (x, ring));
            let left = (-ring..ring).rev().map(|z| (-ring, z));
            let bottom = (-ring + 1..=ring).map(|x| (x, -ring));
            entries.extend(
                right
                    .chain(top)
                    .chain(left)
                    .chain(bottom)
                    .filter(|(x, z)| within(*x, *z))
                    .map(|(x, z)| pack(x, z)),
            );
        }

        entries.sort_by_key(|entry| {
            let offset = unpack(*entry);
            i64::from(offset.x) * i64::from(offset.x) + i64::from(offset.y) * i64::from(offset.y)
        });

        LoadSpiral { radius, entries }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offsets nearest-first; `y` holds the `z` offset.
    pub fn iter(&self) -> impl Iterator<Item = Vector2<i32>> + '_ {
        self.entries.iter().map(|entry| unpack(*entry))
    }
}
