//! Drawing surface abstraction used by the render passes.
//!
//! The simulation never talks to a GPU. Render passes hand quads to a
//! [`Surface`]; a host application implements it on top of its renderer,
//! and headless code can record into a [`DrawList`] instead.

use serde::{Deserialize, Serialize};

use crate::shape::Quad;

/// Red outline used for collider shapes in debug mode.
pub const COLOR_COLLIDER: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// Translucent fill used for occupied grid cells in debug mode.
pub const COLOR_BUCKET: [f32; 4] = [0.2, 0.6, 1.0, 0.25];

/// Target of render and HUD passes.
pub trait Surface {
    /// Draw a filled quad.
    fn quad(&mut self, quad: &Quad, color: [f32; 4]);

    /// Draw the edges of a quad.
    fn outline(&mut self, quad: &Quad, color: [f32; 4]);
}

// ---------------------------------------------------------------------------
// DrawList
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawKind {
    Fill,
    Outline,
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawCommand {
    pub kind: DrawKind,
    pub quad: Quad,
    /// RGBA color (each channel 0.0..1.0).
    pub color: [f32; 4],
}

/// A [`Surface`] that records draw calls in submission order.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of recorded calls of the given kind.
    pub fn count(&self, kind: DrawKind) -> usize {
        self.commands.iter().filter(|c| c.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Surface for DrawList {
    fn quad(&mut self, quad: &Quad, color: [f32; 4]) {
        self.commands.push(DrawCommand {
            kind: DrawKind::Fill,
            quad: *quad,
            color,
        });
    }

    fn outline(&mut self, quad: &Quad, color: [f32; 4]) {
        self.commands.push(DrawCommand {
            kind: DrawKind::Outline,
            quad: *quad,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Rect;
    use glam::Vec2;

    #[test]
    fn records_in_submission_order() {
        let mut list = DrawList::new();
        let quad = Quad::from_rect(Rect::centered(Vec2::ONE), 0.0);
        list.outline(&quad, COLOR_COLLIDER);
        list.quad(&quad.translated(Vec2::X), COLOR_BUCKET);

        assert_eq!(list.len(), 2);
        assert_eq!(list.count(DrawKind::Outline), 1);
        assert_eq!(list.commands[0].kind, DrawKind::Outline);
        assert_eq!(list.commands[1].quad.a, Vec2::new(0.0, -1.0));

        list.clear();
        assert!(list.is_empty());
    }
}
