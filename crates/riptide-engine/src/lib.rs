//! Riptide Engine -- 2D scene simulation with grid-accelerated SAT collision.
//!
//! This crate builds on [`riptide_ecs`] to provide the simulation itself:
//! entities with an inline [`Collider`](collider::Collider) and
//! [`Mover`](mover::Mover) plus any number of boxed
//! [`Component`](component::Component)s, a bucketed [`SpatialGrid`](grid::SpatialGrid)
//! broad phase, separating-axis narrow phase on rotated rectangles, and an
//! iterative [`Resolver`](resolver::Resolver) that pushes overlapping bodies
//! apart and fires collision callbacks.
//!
//! # Quick Start
//!
//! ```
//! use riptide_engine::prelude::*;
//!
//! let mut scene = Scene::new(SceneConfig::default());
//! let world = scene.world_mut();
//!
//! let wall = world.spawn(Vec2::new(20.0, 40.0));
//! world
//!     .attach_collider(wall, Collider::new(Rect::centered(Vec2::splat(4.0))).static_body().with_mask(2))
//!     .unwrap();
//!
//! let ball = world.spawn(Vec2::new(13.0, 40.0));
//! world
//!     .attach_collider(ball, Collider::new(Rect::centered(Vec2::splat(4.0))).with_mask(1).colliding_with(2))
//!     .unwrap();
//! world.attach_mover(ball, Mover::with_velocity(Vec2::new(10.0, 0.0))).unwrap();
//!
//! // The ball moves to x = 14, overlaps the wall by 2 and is pushed back.
//! let report = scene.update(0.1);
//! assert_eq!(report.resolve.contacts, 1);
//! let x = scene.world().position(ball).unwrap().x;
//! assert!((x - 12.0).abs() < 1e-4);
//! assert_eq!(scene.world().mover(ball).unwrap().vel.x, 0.0);
//! ```

#![deny(unsafe_code)]

pub mod collider;
pub mod component;
pub mod config;
pub mod grid;
pub mod mover;
pub mod render;
pub mod resolver;
pub mod scene;
pub mod shape;
pub mod snapshot;
pub mod tick;
pub mod world;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use riptide_ecs;

/// Re-export the vector types used throughout the public API.
pub use glam::{IVec2, Vec2};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while loading a [`SceneConfig`](config::SceneConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid JSON or has fields of the wrong type.
    #[error("invalid scene configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field parsed but is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use riptide_ecs::prelude::*;

    pub use crate::collider::{CollideFn, Collider, Contact};
    pub use crate::component::Component;
    pub use crate::config::SceneConfig;
    pub use crate::grid::{CellRange, SpatialGrid};
    pub use crate::mover::Mover;
    pub use crate::render::{DrawCommand, DrawKind, DrawList, Surface};
    pub use crate::resolver::{ResolveReport, Resolver};
    pub use crate::scene::{FrameDiagnostics, FrameReport, Scene};
    pub use crate::shape::{Projection, Quad, Rect};
    pub use crate::snapshot::SceneSnapshot;
    pub use crate::tick::{TickConfig, TickLoop};
    pub use crate::world::{Entity, MaintainReport, World};
    pub use crate::ConfigError;
    pub use glam::{IVec2, Vec2};
}
