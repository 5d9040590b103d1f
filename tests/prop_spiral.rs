use std::collections::HashSet;

use proptest::prelude::*;
use voxel_world::engine_state::voxels::spiral::LoadSpiral;

proptest! {
    // offsets come out nearest-first and never repeat
    #[test]
    fn spiral_is_sorted_and_unique(radius in 0u32..=40) {
        let spiral = LoadSpiral::new(radius);
        let offsets: Vec<_> = spiral.iter().collect();

        let distances: Vec<i64> = offsets
            .iter()
            .map(|offset| i64::from(offset.x).pow(2) + i64::from(offset.y).pow(2))
            .collect();
        prop_assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));

        let unique: HashSet<(i32, i32)> = offsets.iter().map(|offset| (offset.x, offset.y)).collect();
        prop_assert_eq!(unique.len(), offsets.len());
    }

    // every offset lies inside the load circle and the circle is covered
    #[test]
    fn spiral_covers_exactly_the_circle(radius in 0u32..=24) {
        let spiral = LoadSpiral::new(radius);
        let r = radius as i32;
        let limit = i64::from(r).pow(2);
        prop_assert!(spiral
            .iter()
            .all(|offset| i64::from(offset.x).pow(2) + i64::from(offset.y).pow(2) <= limit));

        let expected = (-r..=r)
            .flat_map(|x| (-r..=r).map(move |z| (x, z)))
            .filter(|(x, z)| i64::from(*x).pow(2) + i64::from(*z).pow(2) <= limit)
            .count();
        prop_assert_eq!(spiral.len(), expected);
    }
}
