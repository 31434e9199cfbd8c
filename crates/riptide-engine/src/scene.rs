//! Frame orchestration.
//!
//! A [`Scene`] owns the [`World`] and the [`Resolver`] and runs one frame at
//! a time:
//!
//! 1. If frozen, count the freeze timer down and stop.
//! 2. Apply deferred structural changes ([`World::maintain`]).
//! 3. Run the update hook of every component type flagged
//!    [`Property::UPDATE`], type by type in registration order.
//! 4. Resolve collisions.
//!
//! Rendering is separate and read-only: [`Scene::render`] walks types flagged
//! [`Property::RENDER`], [`Scene::render_hud`] those flagged
//! [`Property::HUD`].

use std::time::{Duration, Instant};

use riptide_ecs::component::Property;
use tracing::debug;

use crate::config::SceneConfig;
use crate::grid::SpatialGrid;
use crate::render::{Surface, COLOR_BUCKET, COLOR_COLLIDER};
use crate::resolver::{ResolveReport, Resolver};
use crate::shape::{Quad, Rect};
use crate::snapshot::SceneSnapshot;
use crate::world::{MaintainReport, World};
use crate::ConfigError;

// ---------------------------------------------------------------------------
// FrameReport
// ---------------------------------------------------------------------------

/// Timing diagnostics for one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Wall-clock time per updated component type, in execution order.
    pub update_times: Vec<(&'static str, Duration)>,
    pub maintain_time: Duration,
    pub collision_time: Duration,
    pub total_time: Duration,
}

/// What one call to [`Scene::update`] did.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// The frame was consumed by the freeze timer.
    pub frozen: bool,
    pub maintain: MaintainReport,
    /// Update hooks run, movers included.
    pub updated: usize,
    pub resolve: ResolveReport,
    pub diagnostics: FrameDiagnostics,
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// A world plus the machinery that steps it.
pub struct Scene {
    world: World,
    resolver: Resolver,
    config: SceneConfig,
    freeze_timer: f32,
    debug: bool,
    frame: u64,
}

impl Scene {
    /// Build a scene from a configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration does not validate.
    pub fn new(config: SceneConfig) -> Self {
        match Self::try_new(config) {
            Ok(scene) => scene,
            Err(err) => panic!("invalid scene configuration: {err}"),
        }
    }

    /// Build a scene, reporting an invalid configuration as an error.
    pub fn try_new(config: SceneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = SpatialGrid::for_world(config.world_width, config.world_height, config.cell_shift);
        debug!(
            grid_width = grid.width(),
            grid_height = grid.height(),
            cell_size = grid.cell_size(),
            max_entities = config.max_entities,
            "scene created"
        );
        Ok(Self {
            world: World::new(grid, config.max_entities),
            resolver: Resolver::new(
                config.collision_iterations,
                config.elasticity,
                config.dedup_pairs,
            ),
            config,
            freeze_timer: 0.0,
            debug: false,
            frame: 0,
        })
    }

    // -- accessors ----------------------------------------------------------

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Frames simulated so far; frozen frames are not counted.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // -- freeze and debug ---------------------------------------------------

    /// Suspend simulation for `seconds` more seconds. Freezes stack.
    pub fn freeze(&mut self, seconds: f32) {
        self.freeze_timer += seconds.max(0.0);
    }

    pub fn freeze_remaining(&self) -> f32 {
        self.freeze_timer
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_timer > 0.0
    }

    /// Switch collider and grid overlays on or off.
    pub fn toggle_debug(&mut self) {
        self.debug = !self.debug;
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    // -- stepping -----------------------------------------------------------

    /// Apply deferred structural changes without running a frame.
    pub fn maintain(&mut self) -> MaintainReport {
        self.world.maintain()
    }

    /// Advance the simulation by `dt` seconds.
    pub fn update(&mut self, dt: f32) -> FrameReport {
        let frame_start = Instant::now();
        let mut report = FrameReport::default();

        if self.freeze_timer > 0.0 {
            self.freeze_timer = (self.freeze_timer - dt).max(0.0);
            report.frozen = true;
            report.diagnostics.total_time = frame_start.elapsed();
            return report;
        }

        let maintain_start = Instant::now();
        report.maintain = self.world.maintain();
        report.diagnostics.maintain_time = maintain_start.elapsed();

        let updatable: Vec<_> = self.world.registry().ids_with(Property::UPDATE).collect();
        for id in updatable {
            let type_start = Instant::now();
            report.updated += self.world.update_type(id, dt);
            let name = self
                .world
                .registry()
                .get_info(id)
                .map_or("unknown", |info| info.name);
            report.diagnostics.update_times.push((name, type_start.elapsed()));
        }

        let collision_start = Instant::now();
        report.resolve = self.resolver.resolve(&mut self.world);
        report.diagnostics.collision_time = collision_start.elapsed();

        self.frame += 1;
        report.diagnostics.total_time = frame_start.elapsed();
        report
    }

    // -- rendering ----------------------------------------------------------

    /// World pass: occupied grid cells (debug), renderable components, then
    /// collider outlines (debug).
    pub fn render(&self, surface: &mut dyn Surface) {
        if self.debug {
            self.render_buckets(surface);
        }
        for id in self.world.registry().ids_with(Property::RENDER) {
            self.world.render_type(id, surface);
        }
        if self.debug {
            self.render_collider_outlines(surface);
        }
    }

    /// HUD pass over components flagged [`Property::HUD`].
    pub fn render_hud(&self, surface: &mut dyn Surface) {
        for id in self.world.registry().ids_with(Property::HUD) {
            self.world.render_type(id, surface);
        }
    }

    fn render_buckets(&self, surface: &mut dyn Surface) {
        let grid = self.world.grid();
        let size = grid.cell_size();
        for (cell, _) in grid.occupied_cells() {
            let bl = cell.as_vec2() * size;
            let quad = Quad::from_rect(Rect::new(bl, bl + size), 0.0);
            surface.quad(&quad, COLOR_BUCKET);
        }
    }

    fn render_collider_outlines(&self, surface: &mut dyn Surface) {
        for (_, entity) in self.world.iter() {
            if let Some(collider) = entity.collider() {
                surface.outline(&collider.quad(), COLOR_COLLIDER);
            }
        }
    }

    // -- state capture ------------------------------------------------------

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot::capture(&self.world, self.frame)
    }

    /// BLAKE3 hex digest of the current entity state.
    pub fn digest(&self) -> String {
        self.snapshot().hash
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::Collider;
    use crate::component::Component;
    use crate::mover::Mover;
    use crate::render::{DrawKind, DrawList};
    use glam::Vec2;
    use riptide_ecs::entity::Handle;

    struct Sprite;
    impl Component for Sprite {
        fn render(&self, world: &World, entity: Handle, surface: &mut dyn Surface) {
            if let Some(pos) = world.position(entity) {
                let quad = Quad::from_rect(Rect::centered(Vec2::ONE), 0.0).translated(pos);
                surface.quad(&quad, [1.0; 4]);
            }
        }
    }

    struct Blip {
        lit: bool,
    }
    impl Component for Blip {
        fn render(&self, _world: &World, _entity: Handle, surface: &mut dyn Surface) {
            surface.quad(&Quad::default(), [1.0; 4]);
        }

        fn visible(&self) -> bool {
            self.lit
        }
    }

    struct Gauge;
    impl Component for Gauge {
        fn render(&self, _world: &World, _entity: Handle, surface: &mut dyn Surface) {
            surface.outline(&Quad::default(), [1.0; 4]);
        }
    }

    #[test]
    fn frozen_scene_only_counts_down() {
        let mut scene = Scene::new(SceneConfig::default());
        let e = scene.world_mut().spawn(Vec2::ZERO);
        scene.world_mut().attach_mover(e, Mover::with_velocity(Vec2::X)).unwrap();

        scene.freeze(0.25);
        let report = scene.update(0.1);
        assert!(report.frozen);
        assert!(scene.world().live_entities().is_empty(), "no maintenance while frozen");
        scene.update(0.1);
        scene.update(0.1);
        assert!(!scene.is_frozen());
        assert_eq!(scene.frame(), 0);

        let report = scene.update(0.5);
        assert!(!report.frozen);
        assert_eq!(report.updated, 1);
        assert_eq!(scene.world().position(e), Some(Vec2::new(0.5, 0.0)));
        assert_eq!(scene.frame(), 1);
    }

    #[test]
    fn render_respects_properties_and_visibility() {
        let mut scene = Scene::new(SceneConfig::default());
        scene.world_mut().register_component::<Sprite>(Property::RENDER);
        scene.world_mut().register_component::<Gauge>(Property::HUD);
        let shown = scene.world_mut().spawn(Vec2::new(5.0, 5.0));
        let hidden = scene.world_mut().spawn(Vec2::new(9.0, 5.0));
        scene.world_mut().attach(shown, Sprite).unwrap();
        scene.world_mut().attach(shown, Gauge).unwrap();
        scene.world_mut().attach(hidden, Sprite).unwrap();
        scene.update(0.0);
        scene.world_mut().resolve_mut(hidden).unwrap().visible = false;

        let mut world_pass = DrawList::new();
        scene.render(&mut world_pass);
        assert_eq!(world_pass.count(DrawKind::Fill), 1);
        assert_eq!(world_pass.count(DrawKind::Outline), 0);

        let mut hud_pass = DrawList::new();
        scene.render_hud(&mut hud_pass);
        assert_eq!(hud_pass.count(DrawKind::Outline), 1);
    }

    #[test]
    fn hidden_component_is_skipped_on_a_visible_entity() {
        let mut scene = Scene::new(SceneConfig::default());
        scene.world_mut().register_component::<Blip>(Property::RENDER);
        scene.world_mut().register_component::<Sprite>(Property::RENDER);
        let e = scene.world_mut().spawn(Vec2::new(5.0, 5.0));
        scene.world_mut().attach(e, Blip { lit: false }).unwrap();
        scene.world_mut().attach(e, Sprite).unwrap();
        scene.update(0.0);

        let mut dark = DrawList::new();
        scene.render(&mut dark);
        assert_eq!(dark.count(DrawKind::Fill), 1, "only the sprite");

        scene.world_mut().component_mut::<Blip>(e).unwrap().lit = true;
        let mut lit = DrawList::new();
        scene.render(&mut lit);
        assert_eq!(lit.count(DrawKind::Fill), 2);
    }

    #[test]
    fn debug_mode_draws_buckets_and_outlines() {
        let mut scene = Scene::new(SceneConfig::default());
        let e = scene.world_mut().spawn(Vec2::new(16.0, 8.0));
        scene
            .world_mut()
            .attach_collider(e, Collider::new(Rect::centered(Vec2::splat(4.0))))
            .unwrap();
        scene.update(0.0);

        let mut plain = DrawList::new();
        scene.render(&mut plain);
        assert!(plain.is_empty());

        scene.toggle_debug();
        let mut debug = DrawList::new();
        scene.render(&mut debug);
        // Box spans x 12..20, so cells (0, 0) and (1, 0).
        assert_eq!(debug.count(DrawKind::Fill), 2);
        assert_eq!(debug.count(DrawKind::Outline), 1);
        assert_eq!(debug.commands.last().map(|c| c.color), Some(COLOR_COLLIDER));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SceneConfig {
            max_entities: 0,
            ..Default::default()
        };
        assert!(Scene::try_new(config).is_err());
    }

    #[test]
    fn update_pass_follows_registration_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Named(&'static str, Rc<RefCell<Vec<&'static str>>>);
        impl Component for Named {
            fn update(&mut self, _world: &mut World, _entity: Handle, _dt: f32) {
                self.1.borrow_mut().push(self.0);
            }
        }
        struct Other(Rc<RefCell<Vec<&'static str>>>);
        impl Component for Other {
            fn update(&mut self, _world: &mut World, _entity: Handle, _dt: f32) {
                self.0.borrow_mut().push("other");
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scene = Scene::new(SceneConfig::default());
        scene.world_mut().register_component::<Other>(Property::UPDATE);
        scene.world_mut().register_component::<Named>(Property::UPDATE);
        let a = scene.world_mut().spawn(Vec2::ZERO);
        let b = scene.world_mut().spawn(Vec2::ZERO);
        scene.world_mut().attach(a, Named("a", log.clone())).unwrap();
        scene.world_mut().attach(b, Named("b", log.clone())).unwrap();
        scene.world_mut().attach(b, Other(log.clone())).unwrap();
        let report = scene.update(0.1);

        assert_eq!(report.updated, 3);
        assert_eq!(*log.borrow(), vec!["other", "a", "b"]);
        let names: Vec<_> = report.diagnostics.update_times.iter().map(|(n, _)| *n).collect();
        assert_eq!(names.len(), 3, "mover, other, named");
    }
}
