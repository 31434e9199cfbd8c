//! Velocity integration for moving entities.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::shape::approach_vec;

/// Velocity state stepped during the update pass.
///
/// With `accel > 0` the velocity is steered toward `facing * target_speed`
/// before the owner is moved; with `accel == 0` the velocity is left alone
/// and only integrated.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Mover {
    pub vel: Vec2,
    pub facing: Vec2,
    pub accel: f32,
    pub target_speed: f32,
}

impl Mover {
    /// A mover coasting at `vel`.
    pub fn with_velocity(vel: Vec2) -> Self {
        Self {
            vel,
            ..Default::default()
        }
    }

    /// A mover that accelerates along `facing` up to `target_speed`.
    pub fn steering(facing: Vec2, target_speed: f32, accel: f32) -> Self {
        Self {
            vel: Vec2::ZERO,
            facing,
            accel,
            target_speed,
        }
    }

    /// Advance the velocity by `dt` and return the displacement to apply to
    /// the owner.
    pub fn step(&mut self, dt: f32) -> Vec2 {
        if self.accel > 0.0 {
            self.vel = approach_vec(self.vel, self.facing * self.target_speed, self.accel * dt);
        }
        self.vel * dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coasting_mover_keeps_velocity() {
        let mut m = Mover::with_velocity(Vec2::new(10.0, -5.0));
        assert_eq!(m.step(0.5), Vec2::new(5.0, -2.5));
        assert_eq!(m.vel, Vec2::new(10.0, -5.0));
    }

    #[test]
    fn steering_mover_approaches_target_speed() {
        let mut m = Mover::steering(Vec2::X, 10.0, 40.0);
        let first = m.step(0.1);
        assert_eq!(m.vel, Vec2::new(4.0, 0.0));
        assert!((first - Vec2::new(0.4, 0.0)).length() < 1e-6);

        for _ in 0..10 {
            m.step(0.1);
        }
        assert_eq!(m.vel, Vec2::new(10.0, 0.0), "never overshoots");
    }
}
