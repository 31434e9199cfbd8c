//! Fixed-timestep tick loop.
//!
//! The [`TickLoop`] steps a [`Scene`] by a constant `fixed_dt` per tick.
//! Simulated time is derived from the tick count rather than accumulated, so
//! it never drifts.
//!
//! # Example
//!
//! ```
//! use riptide_engine::prelude::*;
//! use riptide_engine::tick::{TickConfig, TickLoop};
//!
//! let scene = Scene::new(SceneConfig::default());
//! let mut tick_loop = TickLoop::new(scene, TickConfig { fixed_dt: 0.5 });
//!
//! let ball = tick_loop.scene_mut().world_mut().spawn(Vec2::ZERO);
//! tick_loop
//!     .scene_mut()
//!     .world_mut()
//!     .attach_mover(ball, Mover::with_velocity(Vec2::new(2.0, 0.0)))
//!     .unwrap();
//!
//! tick_loop.run_ticks(4);
//! assert_eq!(tick_loop.tick_count(), 4);
//! assert_eq!(tick_loop.sim_time(), 2.0);
//! assert_eq!(tick_loop.scene().world().position(ball), Some(Vec2::new(4.0, 0.0)));
//! ```

use tracing::trace;

use crate::scene::{FrameReport, Scene};

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for TickConfig {
    /// Defaults to 60 Hz.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// Drives a scene forward one fixed step at a time.
pub struct TickLoop {
    scene: Scene,
    fixed_dt: f64,
    tick_counter: u64,
    last_report: FrameReport,
}

impl TickLoop {
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(scene: Scene, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            scene,
            fixed_dt: config.fixed_dt,
            tick_counter: 0,
            last_report: FrameReport::default(),
        }
    }

    /// Run a single tick and return its report.
    pub fn tick(&mut self) -> &FrameReport {
        self.last_report = self.scene.update(self.fixed_dt as f32);
        self.tick_counter += 1;
        trace!(
            tick = self.tick_counter,
            frozen = self.last_report.frozen,
            contacts = self.last_report.resolve.contacts,
            total_us = self.last_report.diagnostics.total_time.as_micros() as u64,
            "tick"
        );
        &self.last_report
    }

    /// Run `n` ticks back to back.
    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Ticks executed so far, frozen ones included.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulated seconds, `tick_count * fixed_dt`.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Report of the most recent tick; empty before the first.
    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }

    /// Give the scene back.
    pub fn into_scene(self) -> Scene {
        self.scene
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
