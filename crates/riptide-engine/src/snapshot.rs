//! Scene state capture with BLAKE3 hashing.
//!
//! A [`SceneSnapshot`] records the simulation-relevant state of every entity
//! in slot order, together with a BLAKE3 digest of that record. Two runs fed
//! the same inputs must produce the same digest frame for frame, which is
//! what the determinism tests check.
//!
//! # What Is NOT Captured
//!
//! - **Boxed components** -- only their count per entity; their state is
//!   opaque to the engine.
//! - **Collision callbacks** -- closures are not serializable.
//! - **Cached collider geometry** -- derived from the captured fields.

use glam::Vec2;
use riptide_ecs::entity::Handle;
use serde::{Deserialize, Serialize};

use crate::collider::Collider;
use crate::grid::CellRange;
use crate::mover::Mover;
use crate::shape::Rect;
use crate::world::World;

/// Captured collider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderState {
    pub bounds: Rect,
    pub rotation: f32,
    pub dynamic: bool,
    pub mask: u32,
    pub collides_with: u32,
    pub active: bool,
    pub trigger_only: bool,
    pub cells: Option<CellRange>,
}

impl From<&Collider> for ColliderState {
    fn from(c: &Collider) -> Self {
        Self {
            bounds: c.bounds(),
            rotation: c.rotation(),
            dynamic: c.is_dynamic(),
            mask: c.mask,
            collides_with: c.collides_with,
            active: c.active,
            trigger_only: c.trigger_only,
            cells: c.cells(),
        }
    }
}

/// Captured state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub handle: Handle,
    pub pos: Vec2,
    pub alive: bool,
    pub visible: bool,
    pub collider: Option<ColliderState>,
    pub mover: Option<Mover>,
    pub components: usize,
}

/// Snapshot of every occupied entity slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Frames simulated when the snapshot was taken.
    pub frame: u64,
    /// Entities in slot order.
    pub entities: Vec<EntityState>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of `frame` and `entities`.
    pub hash: String,
}

impl SceneSnapshot {
    pub fn capture(world: &World, frame: u64) -> Self {
        let entities: Vec<EntityState> = world
            .iter()
            .map(|(handle, e)| EntityState {
                handle,
                pos: e.position(),
                alive: e.is_alive(),
                visible: e.visible,
                collider: e.collider().map(ColliderState::from),
                mover: e.mover().copied(),
                components: e.component_count(),
            })
            .collect();
        let hash = compute_hash(frame, &entities);
        Self {
            frame,
            entities,
            hash,
        }
    }

    /// Whether `hash` still matches the captured state.
    pub fn verify(&self) -> bool {
        compute_hash(self.frame, &self.entities) == self.hash
    }
}

fn compute_hash(frame: u64, entities: &[EntityState]) -> String {
    #[derive(Serialize)]
    struct HashableState<'a> {
        frame: u64,
        entities: &'a [EntityState],
    }

    let mut hasher = blake3::Hasher::new();
    if let Err(err) = serde_json::to_writer(&mut hasher, &HashableState { frame, entities }) {
        tracing::warn!(%err, "scene state could not be serialized for hashing");
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SpatialGrid;

    fn populated() -> World {
        let mut w = World::new(SpatialGrid::new(8, 8, 4), 16);
        let a = w.spawn(Vec2::new(10.0, 10.0));
        w.attach_collider(a, Collider::new(Rect::centered(Vec2::ONE)).with_mask(3)).unwrap();
        w.attach_mover(a, Mover::with_velocity(Vec2::X)).unwrap();
        w.spawn(Vec2::new(30.0, 5.0));
        w.maintain();
        w
    }

    #[test]
    fn capture_is_in_slot_order() {
        let snap = SceneSnapshot::capture(&populated(), 3);
        assert_eq!(snap.frame, 3);
        assert_eq!(snap.entities.len(), 2);
        assert_eq!(snap.entities[0].handle.index(), 0);
        assert_eq!(snap.entities[0].collider.as_ref().map(|c| c.mask), Some(3));
        assert!(snap.entities[1].collider.is_none());
        assert_eq!(snap.hash.len(), 64);
        assert!(snap.verify());
    }

    #[test]
    fn identical_worlds_hash_identically() {
        let a = SceneSnapshot::capture(&populated(), 1);
        let b = SceneSnapshot::capture(&populated(), 1);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn any_change_moves_the_hash() {
        let mut w = populated();
        let before = SceneSnapshot::capture(&w, 1);
        let first = w.live_entities()[0];
        w.translate(first, Vec2::new(0.5, 0.0)).unwrap();
        let after = SceneSnapshot::capture(&w, 1);
        assert_ne!(before.hash, after.hash);

        let mut tampered = after.clone();
        tampered.entities[0].visible = false;
        assert!(!tampered.verify());
    }
}
