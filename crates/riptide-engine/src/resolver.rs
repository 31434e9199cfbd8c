//! Iterative collision resolution over the spatial grid.
//!
//! Each pass first re-files every active dynamic collider in the grid, then
//! runs a fixed number of iterations. In every iteration each active dynamic
//! collider `A` gathers the colliders sharing one of its cells, and every
//! candidate `B` whose categories interest either side is tested with SAT.
//! For an overlapping pair, in order:
//!
//! 1. `A`'s callback runs if `A` reacts to `B`; `B`'s runs (with the normal
//!    flipped) if `B` reacts to `A` and is still alive.
//! 2. Unless either side is a trigger, the pair is pushed apart: half each
//!    when `B` is dynamic, all on `A` otherwise. Velocities lose their
//!    approaching normal component.
//!
//! A side whose callback returned `true` (absorbed) or that was destroyed by
//! a callback receives no correction. A destroyed `A` stops its scan; a
//! destroyed `B` is never visited again in the pass.

use std::collections::HashSet;

use glam::Vec2;
use riptide_ecs::entity::Handle;
use tracing::trace;

use crate::shape::normalize_or_zero;
use crate::world::World;

/// Counters from one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Overlapping pairs found.
    pub contacts: usize,
    /// Pairs that received positional correction on at least one side.
    pub corrections: usize,
    /// Collision callbacks invoked.
    pub callbacks: usize,
}

/// Collision resolver state. Scratch buffers are kept between passes.
#[derive(Debug)]
pub struct Resolver {
    iterations: u32,
    elasticity: f32,
    dedup_pairs: bool,
    pairs: HashSet<(u32, u32)>,
    order: Vec<Handle>,
    candidates: Vec<Handle>,
}

impl Resolver {
    pub fn new(iterations: u32, elasticity: f32, dedup_pairs: bool) -> Self {
        Self {
            iterations,
            elasticity,
            dedup_pairs,
            pairs: HashSet::new(),
            order: Vec::new(),
            candidates: Vec::new(),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn elasticity(&self) -> f32 {
        self.elasticity
    }

    /// Whether an unordered pair is resolved at most once per iteration.
    pub fn dedup_pairs(&self) -> bool {
        self.dedup_pairs
    }

    /// Run one full resolution pass.
    pub fn resolve(&mut self, world: &mut World) -> ResolveReport {
        let mut report = ResolveReport::default();
        world.update_all_buckets();

        for _ in 0..self.iterations {
            self.pairs.clear();
            self.order.clear();
            self.order.extend_from_slice(world.dynamic_colliders());

            for i in 0..self.order.len() {
                let a = self.order[i];
                self.resolve_collider(world, a, &mut report);
            }
        }
        report
    }

    fn resolve_collider(&mut self, world: &mut World, a: Handle, report: &mut ResolveReport) {
        if !world.is_alive(a) {
            return;
        }
        let Some(range) = world
            .collider(a)
            .filter(|c| c.active && c.is_dynamic())
            .and_then(|c| c.cells())
        else {
            return;
        };

        self.candidates.clear();
        world.grid().candidates(range, &mut self.candidates);
        self.candidates.sort_unstable();
        self.candidates.dedup();

        for j in 0..self.candidates.len() {
            if !world.is_alive(a) {
                break;
            }
            let b = self.candidates[j];
            if b == a || !world.is_alive(b) {
                continue;
            }
            self.resolve_pair(world, a, b, report);
        }
    }

    fn resolve_pair(&mut self, world: &mut World, a: Handle, b: Handle, report: &mut ResolveReport) {
        let (Some(ca), Some(cb)) = (world.collider(a), world.collider(b)) else {
            return;
        };
        if !ca.active || !cb.active {
            return;
        }
        let a_reacts = ca.collides_with & cb.mask != 0;
        let b_reacts = cb.collides_with & ca.mask != 0;
        if !(a_reacts || b_reacts) {
            return;
        }
        let key = (a.to_raw().min(b.to_raw()), a.to_raw().max(b.to_raw()));
        if self.dedup_pairs && self.pairs.contains(&key) {
            return;
        }

        let push = ca.push_out(cb);
        if push == Vec2::ZERO {
            return;
        }
        // Only overlapping pairs count as resolved; a later correction may
        // still push a separated pair together.
        if self.dedup_pairs {
            self.pairs.insert(key);
        }
        let normal = normalize_or_zero(push);
        let trigger = ca.trigger_only || cb.trigger_only;
        let b_dynamic = cb.is_dynamic();
        report.contacts += 1;
        trace!(a = %a, b = %b, push_x = push.x, push_y = push.y, trigger, "contact");

        let mut a_absorbed = false;
        let mut b_absorbed = false;
        if a_reacts {
            if let Some(absorbed) = world.fire_collide(a, b, normal) {
                a_absorbed = absorbed;
                report.callbacks += 1;
            }
        }
        if b_reacts && world.is_alive(b) {
            if let Some(absorbed) = world.fire_collide(b, a, -normal) {
                b_absorbed = absorbed;
                report.callbacks += 1;
            }
        }
        if trigger {
            return;
        }

        let move_a = !a_absorbed && world.is_alive(a);
        let move_b = b_dynamic && !b_absorbed && world.is_alive(b);
        if !(move_a || move_b) {
            return;
        }
        report.corrections += 1;

        if b_dynamic {
            if move_a {
                world.nudge(a, push * 0.5);
            }
            if move_b {
                world.nudge(b, -push * 0.5);
            }
            if let Some((ma, mb)) = world.mover_pair_mut(a, b) {
                let p = normal.dot(ma.vel - mb.vel);
                if p < 0.0 {
                    let impulse = normal * p * self.elasticity;
                    if move_a {
                        ma.vel -= impulse;
                    }
                    if move_b {
                        mb.vel += impulse;
                    }
                }
            }
        } else {
            world.nudge(a, push);
            if let Some(mover) = world.mover_mut(a) {
                let p = normal.dot(mover.vel);
                if p < 0.0 {
                    mover.vel -= normal * p;
                }
            }
        }
    }
}

impl Default for Resolver {
    /// One iteration, elasticity 0.01, pair de-duplication on.
    fn default() -> Self {
        Self::new(1, 0.01, true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
