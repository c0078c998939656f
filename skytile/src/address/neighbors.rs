//! Hierarchical and planar neighbors of a tile.
//!
//! The HiPS pyramid is a quadtree: tile `p` at order `n` has children
//! `4p..=4p+3` at order `n+1` and parent `p / 4` at order `n-1`.
//!
//! Same-order neighbors are approximated with fixed offsets in the linear
//! pixel numbering. This is not true HEALPix adjacency: it misses real
//! neighbors across index-space discontinuities and sometimes picks tiles
//! that are far apart on the sky. It is cheap and good enough for warming
//! a cache.

use super::TileAddress;

/// Deepest order for which children are generated.
pub const DEFAULT_MAX_ORDER: u32 = 15;

/// Pixel-index offsets used as same-order neighbors.
pub const PLANAR_OFFSETS: [i64; 6] = [-2, -1, 1, 2, -16, 16];

/// Compute the neighbors of a tile.
///
/// Output order is planar offsets, then children, then the parent, with
/// duplicates removed. The seed itself never appears.
///
/// # Arguments
///
/// * `seed` - The tile whose neighbors are wanted
/// * `max_order` - No children are produced at or beyond this order
///
/// # Examples
///
/// ```
/// use skytile::address::{neighbors, TileAddress, TileExtension};
///
/// let seed = TileAddress::new("https://example.org/hips", 5, 40, TileExtension::Jpg);
/// let around = neighbors(&seed, 15);
/// assert!(around.contains(&seed.with_position(4, 10)));
/// assert!(around.contains(&seed.with_position(6, 163)));
/// assert!(!around.contains(&seed));
/// ```
pub fn neighbors(seed: &TileAddress, max_order: u32) -> Vec<TileAddress> {
    let order = seed.order();
    let pixel = seed.pixel();

    let mut candidates: Vec<TileAddress> = Vec::with_capacity(PLANAR_OFFSETS.len() + 5);
    let mut push = |tile: TileAddress| {
        if tile != *seed && !candidates.contains(&tile) {
            candidates.push(tile);
        }
    };

    for offset in PLANAR_OFFSETS {
        if let Some(neighbor) = pixel.checked_add_signed(offset) {
            push(seed.with_position(order, neighbor));
        }
    }

    if order < max_order {
        if let Some(child_base) = pixel.checked_mul(4) {
            for i in 0..4 {
                if let Some(child) = child_base.checked_add(i) {
                    push(seed.with_position(order + 1, child));
                }
            }
        }
    }

    if order > 0 {
        push(seed.with_position(order - 1, pixel / 4));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::TileExtension;
    use proptest::prelude::*;

    fn tile(order: u32, pixel: u64) -> TileAddress {
        TileAddress::new("https://example.org/hips", order, pixel, TileExtension::Jpg)
    }

    fn positions(tiles: &[TileAddress]) -> Vec<(u32, u64)> {
        tiles.iter().map(|t| (t.order(), t.pixel())).collect()
    }

    #[test]
    fn test_children_and_parent() {
        let around = neighbors(&tile(5, 40), DEFAULT_MAX_ORDER);
        let pos = positions(&around);

        for child in 160..=163 {
            assert!(pos.contains(&(6, child)), "missing child {}", child);
        }
        assert!(pos.contains(&(4, 10)));
    }

    #[test]
    fn test_planar_offsets() {
        let around = neighbors(&tile(5, 40), DEFAULT_MAX_ORDER);
        let pos = positions(&around);

        for pixel in [38, 39, 41, 42, 24, 56] {
            assert!(pos.contains(&(5, pixel)), "missing planar {}", pixel);
        }
        assert_eq!(around.len(), 6 + 4 + 1);
    }

    #[test]
    fn test_order_zero_has_no_parent() {
        let around = neighbors(&tile(0, 5), DEFAULT_MAX_ORDER);
        assert_eq!(around.iter().filter(|t| t.order() == 0).count(), 5);
        assert_eq!(around.iter().filter(|t| t.order() == 1).count(), 4);
        assert_eq!(around.len(), 9);
    }

    #[test]
    fn test_max_order_has_no_children() {
        let around = neighbors(&tile(DEFAULT_MAX_ORDER, 1000), DEFAULT_MAX_ORDER);
        assert!(around.iter().all(|t| t.order() <= DEFAULT_MAX_ORDER));
        assert!(around.iter().any(|t| t.order() == DEFAULT_MAX_ORDER - 1));
    }

    #[test]
    fn test_negative_offsets_are_clamped() {
        let around = neighbors(&tile(3, 1), DEFAULT_MAX_ORDER);
        let planar: Vec<u64> = around
            .iter()
            .filter(|t| t.order() == 3)
            .map(|t| t.pixel())
            .collect();
        // -2 and -16 fall below zero, -1 lands on 0
        assert_eq!(planar, vec![0, 2, 3, 17]);
    }

    #[test]
    fn test_seed_zero_at_order_zero() {
        // Child 0 of pixel 0 is at a different order, so it is kept
        let around = neighbors(&tile(0, 0), DEFAULT_MAX_ORDER);
        assert_eq!(
            positions(&around),
            vec![(0, 1), (0, 2), (0, 16), (1, 0), (1, 1), (1, 2), (1, 3)]
        );
    }

    #[test]
    fn test_output_order_is_planar_children_parent() {
        let around = neighbors(&tile(2, 20), DEFAULT_MAX_ORDER);
        assert_eq!(
            positions(&around),
            vec![
                (2, 18),
                (2, 19),
                (2, 21),
                (2, 22),
                (2, 4),
                (2, 36),
                (3, 80),
                (3, 81),
                (3, 82),
                (3, 83),
                (1, 5),
            ]
        );
    }

    #[test]
    fn test_neighbors_keep_survey_and_format() {
        let seed = TileAddress::new("https://other.example/x", 4, 9, TileExtension::Fits);
        for n in neighbors(&seed, DEFAULT_MAX_ORDER) {
            assert_eq!(n.prefix(), "https://other.example/x");
            assert_eq!(n.extension(), TileExtension::Fits);
        }
    }

    proptest! {
        #[test]
        fn prop_seed_never_in_own_neighbors(order in 0u32..20, pixel in 0u64..1_000_000) {
            let seed = tile(order, pixel);
            prop_assert!(!neighbors(&seed, DEFAULT_MAX_ORDER).contains(&seed));
        }

        #[test]
        fn prop_neighbors_are_unique(order in 0u32..20, pixel in 0u64..1_000_000) {
            let around = neighbors(&tile(order, pixel), DEFAULT_MAX_ORDER);
            for (i, a) in around.iter().enumerate() {
                prop_assert!(!around[i + 1..].contains(a));
            }
        }

        #[test]
        fn prop_parent_of_child_is_seed(order in 0u32..14, pixel in 0u64..1_000_000) {
            let seed = tile(order, pixel);
            for child in neighbors(&seed, DEFAULT_MAX_ORDER).iter().filter(|t| t.order() == order + 1) {
                prop_assert!(neighbors(child, DEFAULT_MAX_ORDER).contains(&seed));
            }
        }
    }
}
