//! Rectangles, rotated quads and the scalar helpers the collider and
//! steering code are built on.
//!
//! A [`Quad`] is a rectangle after rotation about its own centre. Because
//! opposite edges stay parallel, two axes are enough for separating-axis
//! tests, which is what [`Quad::axes`] returns.
//!
//! ```
//! use glam::Vec2;
//! use riptide_engine::shape::{Quad, Rect};
//!
//! let rect = Rect::new(Vec2::new(-4.0, -4.0), Vec2::new(4.0, 4.0));
//! let quad = Quad::from_rect(rect, 0.0).translated(Vec2::new(10.0, 0.0));
//! let span = quad.project(Vec2::X);
//! assert_eq!((span.start, span.end), (6.0, 14.0));
//! ```

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle given by its bottom-left and top-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Bottom-left corner.
    pub bl: Vec2,
    /// Top-right corner.
    pub tr: Vec2,
}

impl Rect {
    /// Rectangle spanning `bl` to `tr`.
    pub const fn new(bl: Vec2, tr: Vec2) -> Self {
        Self { bl, tr }
    }

    /// Rectangle of the given size whose bottom-left corner is at `(x, y)`.
    pub fn from_size(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(Vec2::new(x, y), Vec2::new(x + width, y + height))
    }

    /// Rectangle centred on the origin with the given half extents.
    pub fn centered(half_extents: Vec2) -> Self {
        Self::new(-half_extents, half_extents)
    }

    pub fn center(&self) -> Vec2 {
        (self.bl + self.tr) * 0.5
    }

    pub fn width(&self) -> f32 {
        self.tr.x - self.bl.x
    }

    pub fn height(&self) -> f32 {
        self.tr.y - self.bl.y
    }

    pub fn size(&self) -> Vec2 {
        self.tr - self.bl
    }

    /// The same rectangle moved by `offset`.
    pub fn translate(&self, offset: Vec2) -> Self {
        Self::new(self.bl + offset, self.tr + offset)
    }

    /// Whether `point` lies inside or on the border.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.bl.x && point.x <= self.tr.x && point.y >= self.bl.y && point.y <= self.tr.y
    }

    /// Whether the two rectangles share any point, borders included.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.bl.x <= other.tr.x
            && other.bl.x <= self.tr.x
            && self.bl.y <= other.tr.y
            && other.bl.y <= self.tr.y
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Interval covered by a shape projected onto an axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub start: f32,
    pub end: f32,
}

impl Projection {
    /// Signed gap between two intervals: positive when separated, zero when
    /// touching, negative by the overlap depth otherwise.
    pub fn gap(&self, other: &Projection) -> f32 {
        self.start.max(other.start) - self.end.min(other.end)
    }

    /// Whether the intervals are separated by a strictly positive gap.
    pub fn is_separated(&self, other: &Projection) -> bool {
        self.end.min(other.end) < self.start.max(other.start)
    }

    /// Smaller-magnitude displacement along the axis that moves `self` out of
    /// `other`. The positive direction wins only when strictly smaller.
    pub fn push_out(&self, other: &Projection) -> f32 {
        let forward = other.end - self.start;
        let backward = other.start - self.end;
        if forward.abs() < backward.abs() {
            forward
        } else {
            backward
        }
    }
}

// ---------------------------------------------------------------------------
// Quad
// ---------------------------------------------------------------------------

/// Four corners of a possibly rotated rectangle.
///
/// Before rotation `a` is bottom-left, `b` top-left, `c` top-right and `d`
/// bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quad {
    pub a: Vec2,
    pub b: Vec2,
    pub c: Vec2,
    pub d: Vec2,
}

impl Quad {
    /// Rotate the corners of `rect` counter-clockwise by `rotation` radians
    /// about the rect centre. A rotation of exactly zero skips the
    /// trigonometry so axis-aligned shapes keep exact coordinates.
    pub fn from_rect(rect: Rect, rotation: f32) -> Self {
        let quad = Self {
            a: rect.bl,
            b: Vec2::new(rect.bl.x, rect.tr.y),
            c: rect.tr,
            d: Vec2::new(rect.tr.x, rect.bl.y),
        };
        if rotation == 0.0 {
            return quad;
        }

        let center = rect.center();
        let turn = Vec2::from_angle(rotation);
        let spin = |p: Vec2| center + turn.rotate(p - center);
        Self {
            a: spin(quad.a),
            b: spin(quad.b),
            c: spin(quad.c),
            d: spin(quad.d),
        }
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// The quad moved by `offset`.
    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            a: self.a + offset,
            b: self.b + offset,
            c: self.c + offset,
            d: self.d + offset,
        }
    }

    /// Unit directions of the bottom and left edges.
    pub fn axes(&self) -> [Vec2; 2] {
        [
            normalize_or_zero(self.d - self.a),
            normalize_or_zero(self.b - self.a),
        ]
    }

    /// Min/max dot product of the corners with `axis`.
    pub fn project(&self, axis: Vec2) -> Projection {
        let [a, b, c, d] = self.corners().map(|p| p.dot(axis));
        Projection {
            start: a.min(b).min(c).min(d),
            end: a.max(b).max(c).max(d),
        }
    }

    /// Smallest axis-aligned rectangle containing every corner.
    pub fn bounding_box(&self) -> Rect {
        let [a, b, c, d] = self.corners();
        Rect::new(a.min(b).min(c).min(d), a.max(b).max(c).max(d))
    }
}

// ---------------------------------------------------------------------------
// Scalar helpers
// ---------------------------------------------------------------------------

/// Unit vector in the direction of `v`, or zero when `v` has no usable length.
#[inline]
pub fn normalize_or_zero(v: Vec2) -> Vec2 {
    v.normalize_or_zero()
}

/// Move `value` toward `target` by at most `amount`, never overshooting.
pub fn approach(value: f32, target: f32, amount: f32) -> f32 {
    if value < target {
        (value + amount).min(target)
    } else {
        (value - amount).max(target)
    }
}

/// Move `value` toward `target` along the straight line between them by at
/// most `amount`.
pub fn approach_vec(value: Vec2, target: Vec2, amount: f32) -> Vec2 {
    let delta = target - value;
    let length = delta.length();
    if length <= amount || length == 0.0 {
        target
    } else {
        value + delta / length * amount
    }
}

/// Turn the angle `current` toward `target` by at most `amount` radians,
/// going whichever way round is shorter. The result is wrapped to `[0, TAU)`.
pub fn shortest_rotation_approach(current: f32, target: f32, amount: f32) -> f32 {
    let current = current.rem_euclid(TAU);
    let target = target.rem_euclid(TAU);

    let mut diff = target - current;
    if diff > PI {
        diff -= TAU;
    } else if diff < -PI {
        diff += TAU;
    }

    let step = diff.clamp(-amount, amount);
    (current + step).rem_euclid(TAU)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
