//! Rotated-rectangle colliders with a lazily refreshed geometry cache.
//!
//! A [`Collider`] describes a rectangle in its owner's local space plus a
//! rotation. World-space geometry (quad, SAT axes, bounding box) is derived
//! on demand and cached until the bounds, rotation or owner position change.
//!
//! Collision categories are plain bitmasks: `mask` says what the collider
//! *is*, `collides_with` what it *reacts to*. Bit meanings are up to the
//! caller.

use std::cell::Cell;
use std::fmt;

use glam::Vec2;
use riptide_ecs::entity::Handle;

use crate::grid::CellRange;
use crate::shape::{Quad, Rect};
use crate::world::World;

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// A resolved overlap as seen from one side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Entity whose callback is running.
    pub this: Handle,
    /// Entity it collided with.
    pub other: Handle,
    /// Unit direction that pushes `this` out of `other`.
    pub normal: Vec2,
}

/// Collision callback. Returning `true` marks the contact as absorbed by this
/// side, which then receives no positional or velocity correction for it.
pub type CollideFn = Box<dyn FnMut(&mut World, Contact) -> bool>;

/// Callback storage. `Running` marks a callback lent out to the resolver;
/// clearing or replacing it meanwhile wins over the hand-back.
enum CallbackSlot {
    Empty,
    Ready(CollideFn),
    Running,
}

// ---------------------------------------------------------------------------
// Geometry cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Geometry {
    quad: Quad,
    axes: [Vec2; 2],
    bbox: Rect,
}

impl Geometry {
    fn compute(bounds: Rect, rotation: f32, origin: Vec2) -> Self {
        let quad = Quad::from_rect(bounds, rotation).translated(origin);
        Self {
            quad,
            axes: quad.axes(),
            bbox: quad.bounding_box(),
        }
    }
}

// ---------------------------------------------------------------------------
// Collider
// ---------------------------------------------------------------------------

/// Collision shape attached to an entity.
pub struct Collider {
    /// Category bits of this collider.
    pub mask: u32,
    /// Category bits this collider reacts to.
    pub collides_with: u32,
    /// Inactive colliders are skipped by resolution and queries.
    pub active: bool,
    /// Trigger colliders report overlaps but are never pushed apart.
    pub trigger_only: bool,

    bounds: Rect,
    rotation: f32,
    dynamic: bool,
    origin: Vec2,
    on_collide: CallbackSlot,

    cache: Cell<Geometry>,
    dirty: Cell<bool>,
    cells: Option<CellRange>,
}

impl Collider {
    /// A dynamic, active, solid collider with no category bits.
    pub fn new(bounds: Rect) -> Self {
        Self {
            mask: 0,
            collides_with: 0,
            active: true,
            trigger_only: false,
            bounds,
            rotation: 0.0,
            dynamic: true,
            origin: Vec2::ZERO,
            on_collide: CallbackSlot::Empty,
            cache: Cell::new(Geometry::default()),
            dirty: Cell::new(true),
            cells: None,
        }
    }

    // -- builder ------------------------------------------------------------

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self.dirty.set(true);
        self
    }

    /// Bucketed once and only re-bucketed when moved or reshaped.
    pub fn static_body(mut self) -> Self {
        self.dynamic = false;
        self
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    pub fn colliding_with(mut self, mask: u32) -> Self {
        self.collides_with = mask;
        self
    }

    pub fn trigger(mut self) -> Self {
        self.trigger_only = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn on_collide(mut self, callback: impl FnMut(&mut World, Contact) -> bool + 'static) -> Self {
        self.on_collide = CallbackSlot::Ready(Box::new(callback));
        self
    }

    // -- shape --------------------------------------------------------------

    /// Local-space bounds, relative to the owner's position.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.dirty.set(true);
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
        self.dirty.set(true);
    }

    pub fn rotate(&mut self, amount: f32) {
        self.rotation += amount;
        self.dirty.set(true);
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    /// Owner position the cached geometry is relative to.
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: Vec2) {
        if self.origin != origin {
            self.origin = origin;
            self.dirty.set(true);
        }
    }

    /// Whether the next geometry read will recompute the cache.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    // -- cached geometry ----------------------------------------------------

    fn geometry(&self) -> Geometry {
        if self.dirty.get() {
            let fresh = Geometry::compute(self.bounds, self.rotation, self.origin);
            self.cache.set(fresh);
            self.dirty.set(false);
            fresh
        } else {
            self.cache.get()
        }
    }

    /// World-space corners.
    pub fn quad(&self) -> Quad {
        self.geometry().quad
    }

    /// World-space axis-aligned bounding box.
    pub fn bbox(&self) -> Rect {
        self.geometry().bbox
    }

    /// Unit directions of the quad's bottom and left edges.
    pub fn axes(&self) -> [Vec2; 2] {
        self.geometry().axes
    }

    /// Grid cells this collider is currently filed under, if bucketed.
    pub fn cells(&self) -> Option<CellRange> {
        self.cells
    }

    pub(crate) fn set_cells(&mut self, cells: Option<CellRange>) {
        self.cells = cells;
    }

    // -- SAT queries --------------------------------------------------------

    /// Axes to test against `other`: own axes first, then the other's. When
    /// both share a rotation their axes are parallel and one set suffices.
    fn sat_axes(&self, mine: &Geometry, theirs: &Geometry, other: &Collider) -> ([Vec2; 4], usize) {
        let count = if self.rotation == other.rotation { 2 } else { 4 };
        (
            [mine.axes[0], mine.axes[1], theirs.axes[0], theirs.axes[1]],
            count,
        )
    }

    /// Minimum translation that moves `self` out of `other`, or zero when
    /// they do not overlap. Among the tested axes the first one with the
    /// strictly smallest push wins.
    pub fn push_out(&self, other: &Collider) -> Vec2 {
        let mine = self.geometry();
        let theirs = other.geometry();
        let (axes, count) = self.sat_axes(&mine, &theirs, other);

        let mut min_push = f32::MAX;
        let mut push_dir = Vec2::ZERO;
        for &axis in &axes[..count] {
            let own = mine.quad.project(axis);
            let foreign = theirs.quad.project(axis);
            if own.is_separated(&foreign) {
                return Vec2::ZERO;
            }

            let push = own.push_out(&foreign);
            if push.abs() < min_push.abs() {
                min_push = push;
                push_dir = axis;
            }
        }
        push_dir * min_push
    }

    /// Whether the shapes overlap with positive depth.
    pub fn overlaps(&self, other: &Collider) -> bool {
        self.push_out(other) != Vec2::ZERO
    }

    /// Largest per-axis gap between the shapes: positive when apart, zero
    /// when touching, negative when overlapping.
    pub fn distance(&self, other: &Collider) -> f32 {
        let mine = self.geometry();
        let theirs = other.geometry();
        let (axes, count) = self.sat_axes(&mine, &theirs, other);

        axes[..count]
            .iter()
            .map(|&axis| mine.quad.project(axis).gap(&theirs.quad.project(axis)))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    // -- callback plumbing --------------------------------------------------

    /// Whether a callback is installed, including one that is running now.
    pub fn has_callback(&self) -> bool {
        !matches!(self.on_collide, CallbackSlot::Empty)
    }

    /// Install a callback. Called from inside the running callback, the
    /// replacement takes effect from the next contact.
    pub fn set_on_collide(&mut self, callback: impl FnMut(&mut World, Contact) -> bool + 'static) {
        self.on_collide = CallbackSlot::Ready(Box::new(callback));
    }

    /// Remove the callback. Also works from inside the callback itself.
    pub fn clear_on_collide(&mut self) {
        self.on_collide = CallbackSlot::Empty;
    }

    pub(crate) fn take_callback(&mut self) -> Option<CollideFn> {
        match std::mem::replace(&mut self.on_collide, CallbackSlot::Running) {
            CallbackSlot::Ready(callback) => Some(callback),
            other => {
                self.on_collide = other;
                None
            }
        }
    }

    /// Hand a callback back after it ran. Dropped if the slot was cleared or
    /// replaced meanwhile.
    pub(crate) fn restore_callback(&mut self, callback: CollideFn) {
        if matches!(self.on_collide, CallbackSlot::Running) {
            self.on_collide = CallbackSlot::Ready(callback);
        }
    }
}

impl fmt::Debug for Collider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collider")
            .field("bounds", &self.bounds)
            .field("rotation", &self.rotation)
            .field("dynamic", &self.dynamic)
            .field("mask", &self.mask)
            .field("collides_with", &self.collides_with)
            .field("active", &self.active)
            .field("trigger_only", &self.trigger_only)
            .field("origin", &self.origin)
            .field("cells", &self.cells)
            .field("on_collide", &self.has_callback())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn square_at(pos: Vec2, half: f32) -> Collider {
        let mut c = Collider::new(Rect::centered(Vec2::splat(half)));
        c.set_origin(pos);
        c
    }

    #[test]
    fn cache_follows_origin() {
        let mut c = square_at(Vec2::ZERO, 2.0);
        assert_eq!(c.bbox(), Rect::new(Vec2::splat(-2.0), Vec2::splat(2.0)));
        assert!(!c.is_dirty());

        c.set_origin(Vec2::new(10.0, 0.0));
        assert!(c.is_dirty());
        assert_eq!(c.bbox().bl, Vec2::new(8.0, -2.0));
        assert!(!c.is_dirty());

        c.set_origin(Vec2::new(10.0, 0.0));
        assert!(!c.is_dirty(), "unchanged origin keeps the cache");
    }

    #[test]
    fn separated_squares_do_not_push() {
        let a = square_at(Vec2::ZERO, 4.0);
        let b = square_at(Vec2::new(9.0, 0.0), 4.0);
        assert_eq!(a.push_out(&b), Vec2::ZERO);
        assert!(!a.overlaps(&b));
        assert_eq!(a.distance(&b), 1.0);
    }

    #[test]
    fn touching_squares_do_not_push() {
        let a = square_at(Vec2::ZERO, 4.0);
        let b = square_at(Vec2::new(8.0, 0.0), 4.0);
        assert_eq!(a.push_out(&b), Vec2::ZERO);
        assert_eq!(a.distance(&b), 0.0);
    }

    #[test]
    fn overlap_along_x_pushes_along_x() {
        let a = square_at(Vec2::ZERO, 4.0);
        let b = square_at(Vec2::new(6.0, 0.0), 4.0);
        assert_eq!(a.push_out(&b), Vec2::new(-2.0, 0.0));
        assert_eq!(b.push_out(&a), Vec2::new(2.0, 0.0));
        assert!(a.overlaps(&b));
        assert_eq!(a.distance(&b), -2.0);
    }

    #[test]
    fn shallower_axis_wins() {
        let a = square_at(Vec2::ZERO, 4.0);
        let b = square_at(Vec2::new(5.0, 7.0), 4.0);
        // x overlap 3, y overlap 1.
        assert_eq!(a.push_out(&b), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn rotated_pair_uses_both_axis_sets() {
        let a = square_at(Vec2::ZERO, 4.0);
        let b = square_at(Vec2::new(9.0, 0.0), 4.0).with_rotation(FRAC_PI_4);
        // The diamond's left tip reaches 9 - 4 * sqrt(2) ~= 3.34, inside a.
        let push = a.push_out(&b);
        assert!(push.x < 0.0);
        assert!((push.length() - (4.0 - (9.0 - 4.0 * 2f32.sqrt()))).abs() < 1e-4);
        assert!((b.push_out(&a).length() - push.length()).abs() < 1e-4);
    }

    #[test]
    fn rotated_gap_is_detected_on_foreign_axis() {
        // Axis-aligned tests alone would report an overlap for these.
        let a = square_at(Vec2::ZERO, 4.0);
        let b = square_at(Vec2::new(8.5, 8.5), 4.0).with_rotation(FRAC_PI_4);
        assert!(a.bbox().overlaps(&b.bbox()));
        assert_eq!(a.push_out(&b), Vec2::ZERO);
        assert!(a.distance(&b) > 0.0);
    }

    #[test]
    fn callbacks_can_be_swapped() {
        let mut c = Collider::new(Rect::centered(Vec2::ONE)).on_collide(|_, _| true);
        assert!(c.has_callback());
        let cb = c.take_callback().unwrap();
        assert!(c.has_callback(), "running counts as installed");
        assert!(c.take_callback().is_none(), "already lent out");
        c.set_on_collide(|_, _| false);
        c.restore_callback(cb);
        assert!(c.has_callback());
        c.clear_on_collide();
        assert!(!c.has_callback());
    }

    #[test]
    fn clearing_while_running_drops_the_callback() {
        let mut c = Collider::new(Rect::centered(Vec2::ONE)).on_collide(|_, _| true);
        let cb = c.take_callback().unwrap();
        c.clear_on_collide();
        c.restore_callback(cb);
        assert!(!c.has_callback());
        assert!(c.take_callback().is_none());
    }

    #[test]
    fn builder_sets_flags() {
        let c = Collider::new(Rect::centered(Vec2::ONE))
            .static_body()
            .with_mask(0b01)
            .colliding_with(0b10)
            .trigger()
            .inactive();
        assert!(!c.is_dynamic());
        assert_eq!((c.mask, c.collides_with), (1, 2));
        assert!(c.trigger_only);
        assert!(!c.active);
    }
}
