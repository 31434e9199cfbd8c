//! Entity storage and the deferred entity/component lifecycle.
//!
//! Structural changes never happen while something is iterating:
//!
//! - [`World::spawn`] allocates a slot and returns a live [`Handle`] at once,
//!   but the entity only joins the update order at the next
//!   [`World::maintain`].
//! - [`World::destroy`] only marks the entity dead. It keeps resolving until
//!   the next `maintain` sweeps it, after which the slot generation has moved
//!   on and every outstanding handle reads as empty.
//! - Attaching or detaching a component queues the change on the entity; the
//!   queue is applied during `maintain`.
//!
//! Colliders and movers are stored inline on the entity because the resolver
//! reads them for every contact. Everything else is a boxed [`Component`].

use std::any::type_name;

use glam::Vec2;
use riptide_ecs::component::{ComponentRegistry, ComponentTypeId, Property};
use riptide_ecs::entity::{Handle, SlotTable};
use riptide_ecs::EcsError;
use tracing::{debug, warn};

use crate::collider::{Collider, Contact};
use crate::component::{downcast_mut, downcast_ref, Component};
use crate::grid::SpatialGrid;
use crate::mover::Mover;
use crate::render::Surface;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

struct Attached {
    type_id: ComponentTypeId,
    alive: bool,
    /// `None` while the component's own hook is running.
    slot: Option<Box<dyn Component>>,
}

enum Queued {
    Collider(Collider),
    Mover(Mover),
    Boxed(ComponentTypeId, Box<dyn Component>),
}

/// A simulation object: a position plus attached components.
pub struct Entity {
    /// Invisible entities are skipped by render passes.
    pub visible: bool,
    pos: Vec2,
    alive: bool,
    collider: Option<Collider>,
    mover: Option<Mover>,
    components: Vec<Attached>,
    queued: Vec<Queued>,
    drop_collider: bool,
    drop_mover: bool,
    in_maintenance: bool,
}

impl Entity {
    fn new(pos: Vec2) -> Self {
        Self {
            visible: true,
            pos,
            alive: true,
            collider: None,
            mover: None,
            components: Vec::new(),
            queued: Vec::new(),
            drop_collider: false,
            drop_mover: false,
            in_maintenance: false,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.pos
    }

    /// `false` once destroyed, even before the sweep.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn collider(&self) -> Option<&Collider> {
        self.collider.as_ref()
    }

    pub fn mover(&self) -> Option<&Mover> {
        self.mover.as_ref()
    }

    /// Number of attached boxed components, pending detaches included.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    fn has_type(&self, id: ComponentTypeId) -> bool {
        self.components.iter().any(|c| c.alive && c.type_id == id)
            || self
                .queued
                .iter()
                .any(|q| matches!(q, Queued::Boxed(t, _) if *t == id))
    }

    fn attached(&self, id: ComponentTypeId) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.alive && c.type_id == id)
            .and_then(|c| c.slot.as_deref())
    }

    fn attached_mut(&mut self, id: ComponentTypeId) -> Option<&mut dyn Component> {
        self.components
            .iter_mut()
            .find(|c| c.alive && c.type_id == id)
            .and_then(|c| c.slot.as_deref_mut())
    }
}

// ---------------------------------------------------------------------------
// MaintainReport
// ---------------------------------------------------------------------------

/// What a [`World::maintain`] pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintainReport {
    /// Dead entities removed and their slots freed.
    pub swept: usize,
    /// Spawned entities moved into the update order.
    pub promoted: usize,
    /// Components (collider and mover included) attached.
    pub attached: usize,
    /// Components (collider and mover included) detached from live entities.
    pub detached: usize,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Owner of all entities, their components and the collision grid.
pub struct World {
    entities: SlotTable<Entity>,
    /// Entities in update order.
    live: Vec<Handle>,
    /// Spawned since the last maintenance pass.
    spawned: Vec<Handle>,
    /// Entities with queued attaches or detaches.
    maintenance: Vec<Handle>,
    registry: ComponentRegistry,
    /// Owners of each component type, in attach order. Indexed by type id.
    buckets: Vec<Vec<Handle>>,
    grid: SpatialGrid,
    /// Dynamic colliders in registration order.
    dynamic: Vec<Handle>,
    /// Bucketed static colliders whose shape changed since they were filed.
    stale_statics: Vec<Handle>,
    collider_type: ComponentTypeId,
    mover_type: ComponentTypeId,
    scratch: Vec<Handle>,
}

impl World {
    /// Create a world holding at most `max_entities` entities at a time.
    ///
    /// # Panics
    ///
    /// Panics if `max_entities` is zero or above 65536.
    pub fn new(grid: SpatialGrid, max_entities: usize) -> Self {
        let mut registry = ComponentRegistry::new();
        let collider_type = registry.register::<Collider>(Property::NONE);
        let mover_type = registry.register::<Mover>(Property::UPDATE);
        let buckets = vec![Vec::new(); registry.len()];
        Self {
            entities: SlotTable::with_capacity(max_entities),
            live: Vec::new(),
            spawned: Vec::new(),
            maintenance: Vec::new(),
            registry,
            buckets,
            grid,
            dynamic: Vec::new(),
            stale_statics: Vec::new(),
            collider_type,
            mover_type,
            scratch: Vec::new(),
        }
    }

    // -- registration -------------------------------------------------------

    /// Associate a component type with the passes it takes part in. Types
    /// are numbered in registration order, which is also the order of the
    /// update and render passes.
    ///
    /// # Panics
    ///
    /// Panics if `T` was registered before with different properties, or
    /// if the type table is full.
    pub fn register_component<T: Component>(&mut self, properties: Property) -> ComponentTypeId {
        let id = self.registry.register::<T>(properties);
        self.sync_buckets();
        id
    }

    fn sync_buckets(&mut self) {
        if self.buckets.len() < self.registry.len() {
            self.buckets.resize_with(self.registry.len(), Vec::new);
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn collider_type(&self) -> ComponentTypeId {
        self.collider_type
    }

    pub fn mover_type(&self) -> ComponentTypeId {
        self.mover_type
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Spawn an entity at `pos`.
    ///
    /// # Panics
    ///
    /// Panics when every entity slot is in use.
    pub fn spawn(&mut self, pos: Vec2) -> Handle {
        match self.try_spawn(pos) {
            Ok(handle) => handle,
            Err(err) => panic!("cannot spawn entity at {pos}: {err}"),
        }
    }

    /// Spawn an entity at `pos`, reporting capacity exhaustion as an error.
    pub fn try_spawn(&mut self, pos: Vec2) -> Result<Handle, EcsError> {
        let handle = self.entities.insert(Entity::new(pos))?;
        self.spawned.push(handle);
        Ok(handle)
    }

    /// Mark an entity dead. It is swept by the next [`maintain`](Self::maintain).
    /// Destroying an entity that is already dead but not yet swept is a no-op.
    pub fn destroy(&mut self, handle: Handle) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get_mut(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        entity.alive = false;
        Ok(())
    }

    /// The entity behind `handle`, including one destroyed this frame.
    pub fn resolve(&self, handle: Handle) -> Option<&Entity> {
        self.entities.get(handle)
    }

    pub fn resolve_mut(&mut self, handle: Handle) -> Option<&mut Entity> {
        self.entities.get_mut(handle)
    }

    /// Whether `handle` resolves to an entity that has not been destroyed.
    pub fn is_alive(&self, handle: Handle) -> bool {
        self.entities.get(handle).is_some_and(|e| e.alive)
    }

    /// Entities in update order. Entities spawned since the last
    /// maintenance pass are not included.
    pub fn live_entities(&self) -> &[Handle] {
        &self.live
    }

    /// Number of occupied entity slots, pending and dead-but-unswept included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &Entity)> {
        self.entities.iter()
    }

    // -- position -----------------------------------------------------------

    pub fn position(&self, handle: Handle) -> Option<Vec2> {
        self.entities.get(handle).map(|e| e.pos)
    }

    /// Move an entity, invalidating its collider's cached geometry.
    pub fn set_position(&mut self, handle: Handle, pos: Vec2) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get_mut(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        place(&mut self.grid, handle, entity, pos);
        Ok(())
    }

    pub fn translate(&mut self, handle: Handle, delta: Vec2) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get_mut(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        let pos = entity.pos + delta;
        place(&mut self.grid, handle, entity, pos);
        Ok(())
    }

    /// Translate an entity the caller already knows to be in its slot.
    /// Stale handles are ignored.
    pub(crate) fn nudge(&mut self, handle: Handle, delta: Vec2) {
        if let Some(entity) = self.entities.get_mut(handle) {
            let pos = entity.pos + delta;
            place(&mut self.grid, handle, entity, pos);
        }
    }

    // -- components ---------------------------------------------------------

    fn queue(&mut self, handle: Handle, item: Queued) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get_mut(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        entity.queued.push(item);
        if !entity.in_maintenance {
            entity.in_maintenance = true;
            self.maintenance.push(handle);
        }
        Ok(())
    }

    fn mark_for_maintenance(&mut self, handle: Handle) {
        if let Some(entity) = self.entities.get_mut(handle) {
            if !entity.in_maintenance {
                entity.in_maintenance = true;
                self.maintenance.push(handle);
            }
        }
    }

    /// Queue `component` for attachment at the next maintenance pass.
    ///
    /// # Panics
    ///
    /// Panics if the entity already has (or is about to get) a component of
    /// type `T`.
    pub fn attach<T: Component>(&mut self, handle: Handle, component: T) -> Result<(), EcsError> {
        let id = self.registry.ensure::<T>();
        self.sync_buckets();
        let entity = self
            .entities
            .get(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        assert!(
            !entity.has_type(id),
            "entity {handle} already has a '{}' component",
            type_name::<T>()
        );
        self.queue(handle, Queued::Boxed(id, Box::new(component)))
    }

    /// Queue a collider for attachment. It is bucketed, and registered for
    /// resolution if dynamic, at the next maintenance pass.
    ///
    /// # Panics
    ///
    /// Panics if the entity already has or is about to get a collider.
    pub fn attach_collider(&mut self, handle: Handle, collider: Collider) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        let queued = entity.queued.iter().any(|q| matches!(q, Queued::Collider(_)));
        assert!(
            !queued && (entity.collider.is_none() || entity.drop_collider),
            "entity {handle} already has a collider"
        );
        self.queue(handle, Queued::Collider(collider))
    }

    /// Queue a mover for attachment at the next maintenance pass.
    ///
    /// # Panics
    ///
    /// Panics if the entity already has or is about to get a mover.
    pub fn attach_mover(&mut self, handle: Handle, mover: Mover) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        let queued = entity.queued.iter().any(|q| matches!(q, Queued::Mover(_)));
        assert!(
            !queued && (entity.mover.is_none() || entity.drop_mover),
            "entity {handle} already has a mover"
        );
        self.queue(handle, Queued::Mover(mover))
    }

    /// Detach the `T` component at the next maintenance pass. A component
    /// still waiting to be attached is dropped without running any hook.
    pub fn detach<T: Component>(&mut self, handle: Handle) -> Result<(), EcsError> {
        let not_found = EcsError::ComponentNotFound {
            handle,
            name: type_name::<T>(),
        };
        let Some(id) = self.registry.lookup::<T>() else {
            return Err(not_found);
        };
        let entity = self
            .entities
            .get_mut(handle)
            .ok_or(EcsError::StaleHandle { handle })?;

        let before = entity.queued.len();
        entity
            .queued
            .retain(|q| !matches!(q, Queued::Boxed(t, _) if *t == id));
        if entity.queued.len() != before {
            return Ok(());
        }

        let attached = entity
            .components
            .iter_mut()
            .find(|c| c.alive && c.type_id == id)
            .ok_or(not_found)?;
        attached.alive = false;
        self.mark_for_maintenance(handle);
        Ok(())
    }

    /// Detach the collider at the next maintenance pass.
    pub fn detach_collider(&mut self, handle: Handle) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get_mut(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        let before = entity.queued.len();
        entity.queued.retain(|q| !matches!(q, Queued::Collider(_)));
        if entity.queued.len() != before {
            return Ok(());
        }
        if entity.collider.is_none() || entity.drop_collider {
            return Err(EcsError::ComponentNotFound {
                handle,
                name: type_name::<Collider>(),
            });
        }
        entity.drop_collider = true;
        self.mark_for_maintenance(handle);
        Ok(())
    }

    /// Detach the mover at the next maintenance pass.
    pub fn detach_mover(&mut self, handle: Handle) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get_mut(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        let before = entity.queued.len();
        entity.queued.retain(|q| !matches!(q, Queued::Mover(_)));
        if entity.queued.len() != before {
            return Ok(());
        }
        if entity.mover.is_none() || entity.drop_mover {
            return Err(EcsError::ComponentNotFound {
                handle,
                name: type_name::<Mover>(),
            });
        }
        entity.drop_mover = true;
        self.mark_for_maintenance(handle);
        Ok(())
    }

    /// Borrow an attached component.
    pub fn component<T: Component>(&self, handle: Handle) -> Option<&T> {
        let id = self.registry.lookup::<T>()?;
        downcast_ref(self.entities.get(handle)?.attached(id)?)
    }

    pub fn component_mut<T: Component>(&mut self, handle: Handle) -> Option<&mut T> {
        let id = self.registry.lookup::<T>()?;
        downcast_mut(self.entities.get_mut(handle)?.attached_mut(id)?)
    }

    /// Run `f` with an attached component and the world at the same time.
    ///
    /// The component is taken out of its entity for the duration of the
    /// call, so `f` cannot reach it through `world`. Returns `None` if the
    /// entity or component is missing.
    pub fn with_component<T: Component, R>(
        &mut self,
        handle: Handle,
        f: impl FnOnce(&mut T, &mut World) -> R,
    ) -> Option<R> {
        let id = self.registry.lookup::<T>()?;
        let mut boxed = self.take_component(handle, id)?;
        let result = downcast_mut::<T>(&mut *boxed).map(|component| f(component, self));
        self.restore_component(handle, id, boxed);
        result
    }

    fn take_component(&mut self, handle: Handle, id: ComponentTypeId) -> Option<Box<dyn Component>> {
        self.entities
            .get_mut(handle)?
            .components
            .iter_mut()
            .find(|c| c.alive && c.type_id == id)?
            .slot
            .take()
    }

    fn restore_component(&mut self, handle: Handle, id: ComponentTypeId, component: Box<dyn Component>) {
        let slot = self.entities.get_mut(handle).and_then(|e| {
            e.components
                .iter_mut()
                .find(|c| c.type_id == id && c.slot.is_none())
        });
        match slot {
            Some(attached) => attached.slot = Some(component),
            None => debug!(entity = %handle, "component owner vanished while its hook ran"),
        }
    }

    pub fn collider(&self, handle: Handle) -> Option<&Collider> {
        self.entities.get(handle)?.collider.as_ref()
    }

    /// Mutable collider access. A bucketed static collider is re-filed in the
    /// grid before the next collision pass or query.
    pub fn collider_mut(&mut self, handle: Handle) -> Option<&mut Collider> {
        let collider = self.entities.get_mut(handle)?.collider.as_mut()?;
        if !collider.is_dynamic() && collider.cells().is_some() && !self.stale_statics.contains(&handle) {
            self.stale_statics.push(handle);
        }
        Some(collider)
    }

    pub fn mover(&self, handle: Handle) -> Option<&Mover> {
        self.entities.get(handle)?.mover.as_ref()
    }

    pub fn mover_mut(&mut self, handle: Handle) -> Option<&mut Mover> {
        self.entities.get_mut(handle)?.mover.as_mut()
    }

    /// Switch a collider between dynamic (re-bucketed every frame and
    /// resolved) and static (bucketed on change only).
    pub fn set_collider_dynamic(&mut self, handle: Handle, dynamic: bool) -> Result<(), EcsError> {
        let entity = self
            .entities
            .get_mut(handle)
            .ok_or(EcsError::StaleHandle { handle })?;
        let collider = entity.collider.as_mut().ok_or(EcsError::ComponentNotFound {
            handle,
            name: type_name::<Collider>(),
        })?;
        if collider.is_dynamic() == dynamic {
            return Ok(());
        }
        collider.set_dynamic(dynamic);
        let bucketed = collider.cells().is_some();

        if bucketed {
            if dynamic {
                self.dynamic.push(handle);
            } else {
                self.dynamic.retain(|h| *h != handle);
                self.stale_statics.push(handle);
            }
        }
        Ok(())
    }

    // -- collision queries --------------------------------------------------

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Dynamic colliders in resolution order.
    pub fn dynamic_colliders(&self) -> &[Handle] {
        &self.dynamic
    }

    /// Re-file every stale static collider and every active dynamic one.
    pub fn update_all_buckets(&mut self) {
        self.flush_stale_statics();
        for i in 0..self.dynamic.len() {
            let handle = self.dynamic[i];
            if self.collider(handle).is_some_and(|c| c.active) {
                self.refile(handle);
            }
        }
    }

    fn flush_stale_statics(&mut self) {
        let stale = std::mem::take(&mut self.stale_statics);
        for handle in stale {
            self.refile(handle);
        }
    }

    /// Update one collider's grid membership from its current bounding box.
    fn refile(&mut self, handle: Handle) {
        let Some(collider) = self
            .entities
            .get_mut(handle)
            .and_then(|e| e.collider.as_mut())
        else {
            return;
        };
        let Some(previous) = collider.cells() else {
            return;
        };
        let bbox = collider.bbox();
        let cells = self.grid.update_membership(handle, Some(previous), &bbox);
        collider.set_cells(Some(cells));
    }

    /// Sorted, de-duplicated handles sharing a grid cell with `handle`.
    fn neighbours(&mut self, handle: Handle) -> Vec<Handle> {
        let mut out = std::mem::take(&mut self.scratch);
        out.clear();
        if let Some(range) = self.collider(handle).and_then(|c| c.cells()) {
            self.grid.candidates(range, &mut out);
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn query_candidates(&mut self, handle: Handle) -> Vec<Handle> {
        self.flush_stale_statics();
        if self.collider(handle).is_some_and(|c| c.is_dynamic() && c.active) {
            self.refile(handle);
        }
        self.neighbours(handle)
    }

    fn query_hit(&self, handle: Handle, other: Handle, mask: u32) -> bool {
        if other == handle || !self.is_alive(other) {
            return false;
        }
        match (self.collider(handle), self.collider(other)) {
            (Some(own), Some(theirs)) => theirs.active && mask & theirs.mask != 0 && own.overlaps(theirs),
            _ => false,
        }
    }

    /// First live collider overlapping `handle`'s collider whose category
    /// intersects `mask`, in handle order.
    pub fn check(&mut self, handle: Handle, mask: u32) -> Option<Handle> {
        let candidates = self.query_candidates(handle);
        let hit = candidates
            .iter()
            .copied()
            .find(|&other| self.query_hit(handle, other, mask));
        self.scratch = candidates;
        hit
    }

    /// Append every live collider overlapping `handle`'s collider whose
    /// category intersects `mask` to `out`, in handle order.
    pub fn check_all(&mut self, handle: Handle, mask: u32, out: &mut Vec<Handle>) {
        let candidates = self.query_candidates(handle);
        out.extend(
            candidates
                .iter()
                .copied()
                .filter(|&other| self.query_hit(handle, other, mask)),
        );
        self.scratch = candidates;
    }

    /// Minimum translation moving `a`'s collider out of `b`'s.
    pub fn push_out(&self, a: Handle, b: Handle) -> Option<Vec2> {
        Some(self.collider(a)?.push_out(self.collider(b)?))
    }

    pub fn overlaps(&self, a: Handle, b: Handle) -> bool {
        self.push_out(a, b).is_some_and(|push| push != Vec2::ZERO)
    }

    /// SAT separation between two colliders, negative when overlapping.
    pub fn distance(&self, a: Handle, b: Handle) -> Option<f32> {
        Some(self.collider(a)?.distance(self.collider(b)?))
    }

    /// Run `this`'s collision callback. Returns `None` when it has none.
    pub(crate) fn fire_collide(&mut self, this: Handle, other: Handle, normal: Vec2) -> Option<bool> {
        let mut callback = self
            .entities
            .get_mut(this)?
            .collider
            .as_mut()?
            .take_callback()?;
        let absorbed = callback(self, Contact { this, other, normal });
        if let Some(collider) = self.entities.get_mut(this).and_then(|e| e.collider.as_mut()) {
            collider.restore_callback(callback);
        }
        Some(absorbed)
    }

    /// Both movers of a pair, when both entities have one.
    pub(crate) fn mover_pair_mut(&mut self, a: Handle, b: Handle) -> Option<(&mut Mover, &mut Mover)> {
        let (ea, eb) = self.entities.get_pair_mut(a, b)?;
        Some((ea.mover.as_mut()?, eb.mover.as_mut()?))
    }

    // -- passes -------------------------------------------------------------

    /// Run the update hook of every live component of type `id`.
    pub(crate) fn update_type(&mut self, id: ComponentTypeId, dt: f32) -> usize {
        let Some(owners) = self.buckets.get(id.index()) else {
            return 0;
        };
        let owners = owners.clone();
        let mut ran = 0;
        for handle in owners {
            if !self.is_alive(handle) {
                continue;
            }
            if id == self.mover_type {
                let Some(delta) = self.mover_mut(handle).map(|m| m.step(dt)) else {
                    continue;
                };
                if delta != Vec2::ZERO {
                    self.nudge(handle, delta);
                }
            } else if id == self.collider_type {
                continue;
            } else {
                let Some(mut component) = self.take_component(handle, id) else {
                    continue;
                };
                component.update(self, handle, dt);
                self.restore_component(handle, id, component);
            }
            ran += 1;
        }
        ran
    }

    /// Run the render hook of every visible component of type `id` on a
    /// visible entity.
    pub(crate) fn render_type(&self, id: ComponentTypeId, surface: &mut dyn Surface) {
        let Some(owners) = self.buckets.get(id.index()) else {
            return;
        };
        for &handle in owners {
            let Some(entity) = self.entities.get(handle) else {
                continue;
            };
            if !entity.visible {
                continue;
            }
            if let Some(component) = entity.attached(id).filter(|c| c.visible()) {
                component.render(self, handle, surface);
            }
        }
    }

    // -- maintenance --------------------------------------------------------

    /// Apply deferred structural changes:
    ///
    /// 1. Sweep dead entities: detach hooks run, grid and list entries are
    ///    dropped and the slot generation is bumped.
    /// 2. Move newly spawned entities into the update order.
    /// 3. Apply queued detaches, then queued attaches, then run the attach
    ///    hooks of everything attached in this pass.
    ///
    /// Entities spawned by hooks running here are promoted next time.
    /// Components they queue land next time too, unless their entity is
    /// already waiting in this pass's queue.
    pub fn maintain(&mut self) -> MaintainReport {
        let mut report = MaintainReport::default();

        let live = std::mem::take(&mut self.live);
        let spawned = std::mem::take(&mut self.spawned);
        let queue = std::mem::take(&mut self.maintenance);
        let mut kept = Vec::with_capacity(live.len());
        for handle in live {
            if self.is_alive(handle) {
                kept.push(handle);
            } else {
                self.sweep(handle);
                report.swept += 1;
            }
        }

        for handle in spawned {
            if self.is_alive(handle) {
                kept.push(handle);
                report.promoted += 1;
            } else {
                self.sweep(handle);
                report.swept += 1;
            }
        }
        self.live = kept;

        let mut woken: Vec<(Handle, Vec<ComponentTypeId>)> = Vec::new();
        for handle in queue {
            let Some(entity) = self.entities.get_mut(handle) else {
                continue;
            };
            entity.in_maintenance = false;
            if !entity.alive {
                continue;
            }
            report.detached += self.apply_detaches(handle);
            let attached = self.apply_attaches(handle);
            report.attached += attached.len();
            if !attached.is_empty() {
                woken.push((handle, attached));
            }
        }

        for (handle, ids) in woken {
            for id in ids {
                self.wake(handle, id);
            }
        }

        if report != MaintainReport::default() {
            debug!(
                swept = report.swept,
                promoted = report.promoted,
                attached = report.attached,
                detached = report.detached,
                "world maintained"
            );
        }
        report
    }

    fn sweep(&mut self, handle: Handle) {
        let Some(entity) = self.entities.get_mut(handle) else {
            return;
        };
        let mut components = std::mem::take(&mut entity.components);
        entity.queued.clear();

        for attached in &mut components {
            if let Some(component) = attached.slot.as_mut() {
                if attached.alive {
                    component.on_detach(self, handle);
                }
            }
            self.unbucket(attached.type_id, handle);
        }
        self.drop_collider(handle);
        self.unbucket(self.mover_type, handle);
        self.entities.remove(handle);
    }

    fn unbucket(&mut self, id: ComponentTypeId, handle: Handle) {
        if let Some(owners) = self.buckets.get_mut(id.index()) {
            if let Some(pos) = owners.iter().position(|h| *h == handle) {
                owners.remove(pos);
            }
        }
    }

    /// Remove the entity's collider from the grid and resolution list.
    fn drop_collider(&mut self, handle: Handle) -> Option<Collider> {
        let collider = self.entities.get_mut(handle)?.collider.take()?;
        if let Some(range) = collider.cells() {
            self.grid.remove_all(handle, range);
        }
        if collider.is_dynamic() {
            self.dynamic.retain(|h| *h != handle);
        }
        self.stale_statics.retain(|h| *h != handle);
        self.unbucket(self.collider_type, handle);
        Some(collider)
    }

    fn apply_detaches(&mut self, handle: Handle) -> usize {
        let mut detached = 0;
        let Some(entity) = self.entities.get_mut(handle) else {
            return 0;
        };

        let (drop_collider, drop_mover) = (entity.drop_collider, entity.drop_mover);
        entity.drop_collider = false;
        entity.drop_mover = false;
        let (dead, kept): (Vec<Attached>, Vec<Attached>) = std::mem::take(&mut entity.components)
            .into_iter()
            .partition(|c| !c.alive);
        entity.components = kept;

        if drop_collider && self.drop_collider(handle).is_some() {
            detached += 1;
        }
        if drop_mover {
            if let Some(entity) = self.entities.get_mut(handle) {
                if entity.mover.take().is_some() {
                    detached += 1;
                }
            }
            self.unbucket(self.mover_type, handle);
        }

        for mut attached in dead {
            self.unbucket(attached.type_id, handle);
            if let Some(component) = attached.slot.as_mut() {
                component.on_detach(self, handle);
            }
            detached += 1;
        }
        detached
    }

    /// Move queued components into place. Returns the types attached.
    fn apply_attaches(&mut self, handle: Handle) -> Vec<ComponentTypeId> {
        let Some(entity) = self.entities.get_mut(handle) else {
            return Vec::new();
        };
        let queued = std::mem::take(&mut entity.queued);
        let mut attached = Vec::with_capacity(queued.len());

        for item in queued {
            let Some(entity) = self.entities.get_mut(handle) else {
                break;
            };
            let id = match item {
                Queued::Collider(mut collider) => {
                    collider.set_origin(entity.pos);
                    entity.collider = Some(collider);
                    self.collider_type
                }
                Queued::Mover(mover) => {
                    entity.mover = Some(mover);
                    self.mover_type
                }
                Queued::Boxed(id, component) => {
                    entity.components.push(Attached {
                        type_id: id,
                        alive: true,
                        slot: Some(component),
                    });
                    id
                }
            };
            self.buckets[id.index()].push(handle);
            attached.push(id);
        }
        attached
    }

    /// Attach-time hook for one component type.
    fn wake(&mut self, handle: Handle, id: ComponentTypeId) {
        if id == self.mover_type {
            return;
        }
        if id == self.collider_type {
            self.wake_collider(handle);
            return;
        }
        if let Some(mut component) = self.take_component(handle, id) {
            component.on_attach(self, handle);
            self.restore_component(handle, id, component);
        }
    }

    /// File a freshly attached collider in the grid and, if dynamic, in the
    /// resolution order.
    fn wake_collider(&mut self, handle: Handle) {
        let Some(collider) = self
            .entities
            .get_mut(handle)
            .and_then(|e| e.collider.as_mut())
        else {
            return;
        };
        if collider.cells().is_some() {
            return;
        }

        let bbox = collider.bbox();
        let cells = self.grid.update_membership(handle, None, &bbox);
        collider.set_cells(Some(cells));
        let dynamic = collider.is_dynamic();

        let on_grid = cells.cells().any(|cell| self.grid.in_bounds(cell));
        if !on_grid {
            warn!(
                entity = %handle,
                bl_x = bbox.bl.x,
                bl_y = bbox.bl.y,
                tr_x = bbox.tr.x,
                tr_y = bbox.tr.y,
                "collider lies entirely outside the grid and will never collide"
            );
        }
        if dynamic {
            self.dynamic.push(handle);
        }
    }
}

/// Set `entity`'s position and refresh its collider. Static colliders are
/// re-filed here since the resolver only re-files dynamic ones.
fn place(grid: &mut SpatialGrid, handle: Handle, entity: &mut Entity, pos: Vec2) {
    entity.pos = pos;
    let Some(collider) = entity.collider.as_mut() else {
        return;
    };
    collider.set_origin(pos);
    if !collider.is_dynamic() && collider.cells().is_some() {
        let bbox = collider.bbox();
        let cells = grid.update_membership(handle, collider.cells(), &bbox);
        collider.set_cells(Some(cells));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
