//! Property tests for the grid and the SAT queries.
//!
//! The grid tests replay random sequences of bounding boxes for a handful of
//! handles and check every cell after each step. The SAT tests compare a
//! collider pair queried in both directions.

use proptest::prelude::*;
use riptide_engine::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Boxes that may hang off any edge of a 128x128 world, or miss it entirely.
fn bbox_strategy() -> impl Strategy<Value = Rect> {
    (-40i32..170, -40i32..170, 0i32..60, 0i32..60).prop_map(|(x, y, w, h)| {
        Rect::from_size(x as f32 * 0.5 + 0.25, y as f32, w as f32, h as f32 * 0.75)
    })
}

fn collider_strategy() -> impl Strategy<Value = Collider> {
    let rotation = prop_oneof![
        Just(0.0f32),
        Just(std::f32::consts::FRAC_PI_4),
        (0u32..628).prop_map(|r| r as f32 * 0.01),
    ];
    (-20i32..20, -20i32..20, 1i32..16, 1i32..16, rotation).prop_map(|(x, y, hw, hh, rot)| {
        let bounds = Rect::centered(Vec2::new(hw as f32, hh as f32)).translate(Vec2::new(x as f32, y as f32));
        Collider::new(bounds).with_rotation(rot)
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CELL: f32 = 16.0;

fn check_membership(grid: &SpatialGrid, handle: Handle, bbox: &Rect, range: CellRange) {
    assert_eq!(range, grid.cell_range(bbox));
    for y in 0..grid.height() as i32 {
        for x in 0..grid.width() as i32 {
            let cell = grid.cell(x, y).unwrap_or_default();
            let count = cell.iter().filter(|&&h| h == handle).count();
            assert!(count <= 1, "{handle} filed twice in ({x}, {y})");

            let in_range = range.contains(IVec2::new(x, y));
            assert_eq!(count == 1, in_range, "{handle} membership wrong in ({x}, {y})");
            if in_range {
                let cell_rect = Rect::from_size(x as f32 * CELL, y as f32 * CELL, CELL, CELL);
                assert!(cell_rect.overlaps(bbox), "({x}, {y}) does not touch {bbox:?}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn membership_tracks_the_latest_box(
        moves in prop::collection::vec((0usize..4, bbox_strategy()), 1..40)
    ) {
        let mut grid = SpatialGrid::new(8, 8, 4);
        let handles: Vec<Handle> = (0..4).map(|i| Handle::new(i, 0)).collect();
        let mut state: Vec<Option<(CellRange, Rect)>> = vec![None; handles.len()];

        for (who, bbox) in moves {
            let previous = state[who].map(|(range, _)| range);
            let range = grid.update_membership(handles[who], previous, &bbox);
            state[who] = Some((range, bbox));

            for (i, entry) in state.iter().enumerate() {
                if let Some((range, bbox)) = entry {
                    check_membership(&grid, handles[i], bbox, *range);
                }
            }
        }

        let expected: usize = state
            .iter()
            .flatten()
            .map(|(range, _)| range.cells().filter(|&c| grid.in_bounds(c)).count())
            .sum();
        prop_assert_eq!(grid.occupancy(), expected);

        for (i, entry) in state.iter().enumerate() {
            if let Some((range, _)) = entry {
                grid.remove_all(handles[i], *range);
            }
        }
        prop_assert_eq!(grid.occupancy(), 0);
    }

    #[test]
    fn membership_update_is_idempotent(bbox in bbox_strategy(), first in bbox_strategy()) {
        let mut grid = SpatialGrid::new(8, 8, 4);
        let h = Handle::new(3, 1);
        let start = grid.update_membership(h, None, &first);
        let once = grid.update_membership(h, Some(start), &bbox);
        let snapshot: Vec<Vec<Handle>> = grid.occupied_cells().map(|(_, c)| c.to_vec()).collect();

        let twice = grid.update_membership(h, Some(once), &bbox);
        prop_assert_eq!(once, twice);
        let again: Vec<Vec<Handle>> = grid.occupied_cells().map(|(_, c)| c.to_vec()).collect();
        prop_assert_eq!(snapshot, again);
    }
}

// ---------------------------------------------------------------------------
// SAT
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig { cases: 2000, max_global_rejects: 16384, ..ProptestConfig::default() })]

    #[test]
    fn push_out_is_antisymmetric_in_magnitude(a in collider_strategy(), b in collider_strategy()) {
        let ab = a.push_out(&b).length();
        let ba = b.push_out(&a).length();
        prop_assert!(
            (ab - ba).abs() <= 1e-3 * (1.0 + ab.max(ba)),
            "|a->b| = {}, |b->a| = {}", ab, ba
        );
    }

    #[test]
    fn applying_the_push_separates_the_pair(a in collider_strategy(), b in collider_strategy()) {
        let push = a.push_out(&b);
        prop_assume!(push != Vec2::ZERO);
        let moved = Collider::new(a.bounds().translate(push)).with_rotation(a.rotation());
        prop_assert!(moved.distance(&b) >= -1e-3, "still overlapping by {}", -moved.distance(&b));
    }

    #[test]
    fn axis_aligned_overlap_depth_is_exact(
        x in -50i32..50, y in -50i32..50, depth in 1i32..8, side in 0u8..4
    ) {
        // Two 16x16 squares overlapping by `depth` along one axis only.
        let a = Collider::new(Rect::from_size(x as f32, y as f32, 16.0, 16.0));
        let offset = 16.0 - depth as f32;
        let shift = match side {
            0 => Vec2::new(offset, 0.0),
            1 => Vec2::new(-offset, 0.0),
            2 => Vec2::new(0.0, offset),
            _ => Vec2::new(0.0, -offset),
        };
        let b = Collider::new(a.bounds().translate(shift));
        let push = a.push_out(&b);
        prop_assert_eq!(push.length(), depth as f32);
        prop_assert!(push.dot(shift) < 0.0, "push {:?} should point away from {:?}", push, shift);
    }

    #[test]
    fn separated_axis_aligned_boxes_never_push(
        x in -50i32..50, y in -50i32..50, gap in 1i32..20, vertical in any::<bool>()
    ) {
        let a = Collider::new(Rect::from_size(x as f32, y as f32, 10.0, 6.0));
        let shift = if vertical {
            Vec2::new(3.0, 6.0 + gap as f32)
        } else {
            Vec2::new(10.0 + gap as f32, -2.0)
        };
        let b = Collider::new(Rect::from_size(x as f32, y as f32, 10.0, 6.0).translate(shift));
        prop_assert_eq!(a.push_out(&b), Vec2::ZERO);
        prop_assert!(!a.overlaps(&b));
        prop_assert_eq!(a.distance(&b), gap as f32);
    }
}
