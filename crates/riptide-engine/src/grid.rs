//! Uniform spatial hash used as the collision broad phase.
//!
//! The world is cut into square cells of `1 << cell_shift` units. Each cell
//! holds the [`Handle`]s of entities whose collider bounding box touches it.
//! Membership is updated incrementally: moving a collider only touches the
//! cells that entered or left its covered range.
//!
//! Cells outside the grid are ignored everywhere, so colliders may hang off
//! the edge of the map (or sit entirely outside it) without corrupting the
//! index; the off-grid part simply never collides.

use glam::IVec2;
use riptide_ecs::entity::Handle;
use serde::{Deserialize, Serialize};

use crate::shape::Rect;

// ---------------------------------------------------------------------------
// CellRange
// ---------------------------------------------------------------------------

/// Inclusive rectangle of cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub min: IVec2,
    pub max: IVec2,
}

impl CellRange {
    pub fn new(min: IVec2, max: IVec2) -> Self {
        Self { min, max }
    }

    /// Whether `cell` lies within the range, borders included.
    pub fn contains(&self, cell: IVec2) -> bool {
        cell.x >= self.min.x && cell.x <= self.max.x && cell.y >= self.min.y && cell.y <= self.max.y
    }

    /// Every cell of the range, row by row from the bottom.
    pub fn cells(&self) -> impl Iterator<Item = IVec2> {
        let (min, max) = (self.min, self.max);
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| IVec2::new(x, y)))
    }

    /// Number of cells covered, counting off-grid cells.
    pub fn area(&self) -> usize {
        let w = (self.max.x - self.min.x + 1).max(0) as usize;
        let h = (self.max.y - self.min.y + 1).max(0) as usize;
        w * h
    }
}

// ---------------------------------------------------------------------------
// SpatialGrid
// ---------------------------------------------------------------------------

/// Dense grid of handle buckets.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    width: i32,
    height: i32,
    cell_shift: u32,
    cells: Vec<Vec<Handle>>,
}

impl SpatialGrid {
    /// Create a grid of `width x height` cells, each `1 << cell_shift` units
    /// across.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero or the shift is 16 or more.
    pub fn new(width: u32, height: u32, cell_shift: u32) -> Self {
        assert!(
            width > 0 && height > 0,
            "spatial grid needs at least one cell, got {width}x{height}"
        );
        assert!(cell_shift < 16, "cell shift {cell_shift} is too large");
        let count = width as usize * height as usize;
        Self {
            width: width as i32,
            height: height as i32,
            cell_shift,
            cells: vec![Vec::new(); count],
        }
    }

    /// Grid large enough to cover a world of the given size in world units.
    pub fn for_world(world_width: f32, world_height: f32, cell_shift: u32) -> Self {
        let size = (1u32 << cell_shift.min(15)) as f32;
        let w = (world_width / size).ceil().max(1.0) as u32;
        let h = (world_height / size).ceil().max(1.0) as u32;
        Self::new(w, h, cell_shift)
    }

    /// Width in cells.
    pub fn width(&self) -> u32 {
        self.width as u32
    }

    /// Height in cells.
    pub fn height(&self) -> u32 {
        self.height as u32
    }

    /// Side length of one cell in world units.
    pub fn cell_size(&self) -> f32 {
        (1u32 << self.cell_shift) as f32
    }

    /// Cell containing a world position. Coordinates are floored first, so
    /// anything left of or below the origin lands in a negative cell.
    pub fn cell_of(&self, pos: glam::Vec2) -> IVec2 {
        IVec2::new(
            (pos.x.floor() as i32) >> self.cell_shift,
            (pos.y.floor() as i32) >> self.cell_shift,
        )
    }

    /// Inclusive cell range covering a bounding box.
    pub fn cell_range(&self, bbox: &Rect) -> CellRange {
        CellRange::new(self.cell_of(bbox.bl), self.cell_of(bbox.tr))
    }

    pub fn in_bounds(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }

    fn slot(&self, cell: IVec2) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| (cell.y * self.width + cell.x) as usize)
    }

    /// Append `handle` to a cell. Off-grid cells are ignored.
    pub fn add(&mut self, handle: Handle, cell: IVec2) {
        if let Some(i) = self.slot(cell) {
            self.cells[i].push(handle);
        }
    }

    /// Remove `handle` from a cell by swapping it with the last entry.
    /// Off-grid cells and absent handles are ignored.
    pub fn remove(&mut self, handle: Handle, cell: IVec2) {
        let Some(i) = self.slot(cell) else {
            return;
        };
        let bucket = &mut self.cells[i];
        if let Some(pos) = bucket.iter().position(|h| *h == handle) {
            bucket.swap_remove(pos);
        }
    }

    /// Move `handle` from the `previous` range to the range covering `bbox`,
    /// touching only cells whose membership changes. Returns the new range,
    /// which the caller stores and passes back as `previous` next time.
    pub fn update_membership(
        &mut self,
        handle: Handle,
        previous: Option<CellRange>,
        bbox: &Rect,
    ) -> CellRange {
        let next = self.cell_range(bbox);
        match previous {
            Some(prev) if prev == next => {}
            Some(prev) => {
                for cell in prev.cells() {
                    if !next.contains(cell) {
                        self.remove(handle, cell);
                    }
                }
                for cell in next.cells() {
                    if !prev.contains(cell) {
                        self.add(handle, cell);
                    }
                }
            }
            None => {
                for cell in next.cells() {
                    self.add(handle, cell);
                }
            }
        }
        next
    }

    /// Drop `handle` from every cell of `range`.
    pub fn remove_all(&mut self, handle: Handle, range: CellRange) {
        for cell in range.cells() {
            self.remove(handle, cell);
        }
    }

    /// Contents of one cell, or `None` when it is off the grid.
    pub fn cell(&self, x: i32, y: i32) -> Option<&[Handle]> {
        self.slot(IVec2::new(x, y)).map(|i| self.cells[i].as_slice())
    }

    /// Append every handle stored in the in-bounds cells of `range` to `out`.
    /// A handle present in several cells is appended once per cell.
    pub fn candidates(&self, range: CellRange, out: &mut Vec<Handle>) {
        let min = range.min.max(IVec2::ZERO);
        let max = range.max.min(IVec2::new(self.width - 1, self.height - 1));
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                out.extend_from_slice(&self.cells[(y * self.width + x) as usize]);
            }
        }
    }

    /// Total number of handle entries across all cells.
    pub fn occupancy(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    /// Iterate over non-empty cells with their coordinates.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (IVec2, &[Handle])> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(move |(i, bucket)| {
                let i = i as i32;
                (IVec2::new(i % width, i / width), bucket.as_slice())
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn h(i: u16) -> Handle {
        Handle::new(i, 0)
    }

    fn members(grid: &SpatialGrid, handle: Handle) -> Vec<IVec2> {
        grid.occupied_cells()
            .filter(|(_, bucket)| bucket.contains(&handle))
            .map(|(cell, _)| cell)
            .collect()
    }

    #[test]
    fn for_world_rounds_up() {
        let grid = SpatialGrid::for_world(100.0, 33.0, 4);
        assert_eq!(grid.width(), 7);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.cell_size(), 16.0);
    }

    #[test]
    fn cell_of_floors_then_shifts() {
        let grid = SpatialGrid::new(8, 8, 4);
        assert_eq!(grid.cell_of(Vec2::new(0.0, 15.9)), IVec2::new(0, 0));
        assert_eq!(grid.cell_of(Vec2::new(16.0, 31.0)), IVec2::new(1, 1));
        assert_eq!(grid.cell_of(Vec2::new(-0.5, -16.0)), IVec2::new(-1, -1));
        assert_eq!(grid.cell_of(Vec2::new(-16.5, 0.0)), IVec2::new(-2, 0));
    }

    #[test]
    fn cell_range_is_inclusive() {
        let grid = SpatialGrid::new(8, 8, 4);
        let range = grid.cell_range(&Rect::from_size(10.0, 10.0, 20.0, 4.0));
        assert_eq!(range, CellRange::new(IVec2::new(0, 0), IVec2::new(1, 0)));
        assert_eq!(range.area(), 2);
        assert_eq!(range.cells().count(), 2);
    }

    #[test]
    fn remove_swaps_with_last() {
        let mut grid = SpatialGrid::new(2, 2, 4);
        let cell = IVec2::new(1, 1);
        for i in 0..4 {
            grid.add(h(i), cell);
        }
        grid.remove(h(1), cell);
        assert_eq!(grid.cell(1, 1).unwrap(), &[h(0), h(3), h(2)]);
    }

    #[test]
    fn removing_absent_handle_keeps_cell_intact() {
        let mut grid = SpatialGrid::new(2, 2, 4);
        grid.add(h(0), IVec2::ZERO);
        grid.remove(h(9), IVec2::ZERO);
        assert_eq!(grid.cell(0, 0).unwrap(), &[h(0)]);
    }

    #[test]
    fn off_grid_cells_are_ignored() {
        let mut grid = SpatialGrid::new(2, 2, 4);
        grid.add(h(0), IVec2::new(-1, 0));
        grid.add(h(0), IVec2::new(2, 0));
        grid.remove(h(0), IVec2::new(5, 5));
        assert_eq!(grid.occupancy(), 0);
        assert!(grid.cell(-1, 0).is_none());
    }

    #[test]
    fn membership_diff_touches_only_changed_cells() {
        let mut grid = SpatialGrid::new(8, 8, 4);
        let a = h(1);
        let r0 = grid.update_membership(a, None, &Rect::from_size(4.0, 4.0, 20.0, 8.0));
        assert_eq!(members(&grid, a), vec![IVec2::new(0, 0), IVec2::new(1, 0)]);

        let r1 = grid.update_membership(a, Some(r0), &Rect::from_size(20.0, 4.0, 20.0, 20.0));
        let mut cells = members(&grid, a);
        cells.sort_by_key(|c| (c.y, c.x));
        assert_eq!(
            cells,
            vec![
                IVec2::new(1, 0),
                IVec2::new(2, 0),
                IVec2::new(1, 1),
                IVec2::new(2, 1)
            ]
        );
        assert_eq!(grid.occupancy(), 4);

        // Unmoved: same range, no duplicates.
        let r2 = grid.update_membership(a, Some(r1), &Rect::from_size(20.0, 4.0, 20.0, 20.0));
        assert_eq!(r1, r2);
        assert_eq!(grid.occupancy(), 4);

        grid.remove_all(a, r2);
        assert_eq!(grid.occupancy(), 0);
    }

    #[test]
    fn candidates_clip_to_grid() {
        let mut grid = SpatialGrid::new(2, 2, 4);
        grid.add(h(0), IVec2::new(0, 0));
        grid.add(h(1), IVec2::new(1, 1));
        let mut out = Vec::new();
        grid.candidates(CellRange::new(IVec2::new(-3, -3), IVec2::new(0, 0)), &mut out);
        assert_eq!(out, vec![h(0)]);
        out.clear();
        grid.candidates(CellRange::new(IVec2::new(-3, -3), IVec2::new(9, 9)), &mut out);
        assert_eq!(out, vec![h(0), h(1)]);
    }
}
