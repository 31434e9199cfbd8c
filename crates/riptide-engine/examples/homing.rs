//! Headless homing-rocket demo.
//!
//! Each rocket drags a wide, non-solid "tracker" collider ahead of itself.
//! While it has no target it asks the grid for every enemy overlapping the
//! tracker and locks onto the closest one. Targets are held as handles, so a
//! target destroyed by another rocket simply stops resolving and the rocket
//! goes back to searching.
//!
//! Run with `RUST_LOG=homing=debug,riptide_engine=debug` for more detail.

use anyhow::{Context, Result};
use riptide_engine::prelude::*;
use riptide_engine::shape::shortest_rotation_approach;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const ENEMY: u32 = 1 << 0;
const ROCKET: u32 = 1 << 1;

const ROCKET_HALF: Vec2 = Vec2::new(4.0, 2.0);
const TRACKER_HALF: Vec2 = Vec2::new(36.0, 16.0);
const ROCKET_LIFE: f32 = 3.0;
const ROCKET_ACCEL: f32 = 80.0;
const TURN_RATE: f32 = 3.0;

const CONFIG: &str = r#"{
    "world_width": 512,
    "world_height": 256,
    "cell_shift": 5,
    "max_entities": 256
}"#;

// ---------------------------------------------------------------------------
// Rocket
// ---------------------------------------------------------------------------

struct Rocket {
    tracker: Handle,
    target: Option<Handle>,
    life: f32,
    max_speed: f32,
    in_range: Vec<Handle>,
}

impl Rocket {
    fn spawn(world: &mut World, pos: Vec2, vel: Vec2) -> Result<Handle> {
        let rocket = world.try_spawn(pos)?;
        let tracker = world.try_spawn(pos)?;
        let rotation = vel.y.atan2(vel.x);

        world.attach_collider(
            tracker,
            Collider::new(Rect::centered(TRACKER_HALF)).with_rotation(rotation),
        )?;
        world.attach_collider(
            rocket,
            Collider::new(Rect::centered(ROCKET_HALF))
                .with_rotation(rotation)
                .with_mask(ROCKET)
                .colliding_with(ENEMY)
                .on_collide(move |world, contact| {
                    info!(rocket = %contact.this, enemy = %contact.other, "hit");
                    let _ = world.destroy(contact.other);
                    let _ = world.destroy(contact.this);
                    let _ = world.destroy(tracker);
                    true
                }),
        )?;
        world.attach_mover(rocket, Mover::steering(vel.normalize_or_zero(), vel.length(), ROCKET_ACCEL))?;
        world.attach(
            rocket,
            Rocket {
                tracker,
                target: None,
                life: ROCKET_LIFE,
                max_speed: vel.length(),
                in_range: Vec::new(),
            },
        )?;
        Ok(rocket)
    }

    fn acquire(&mut self, world: &mut World, me: Handle) {
        let Some(rotation) = world.collider(me).map(|c| c.rotation()) else {
            return;
        };
        let Some(pos) = world.position(me) else {
            return;
        };
        let ahead = Vec2::from_angle(rotation) * (TRACKER_HALF.x - ROCKET_HALF.x);
        let _ = world.set_position(self.tracker, pos + ahead);
        if let Some(tracker) = world.collider_mut(self.tracker) {
            tracker.set_rotation(rotation);
        }

        self.in_range.clear();
        world.check_all(self.tracker, ENEMY, &mut self.in_range);
        self.target = self
            .in_range
            .iter()
            .filter_map(|&enemy| world.distance(me, enemy).map(|d| (enemy, d)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(enemy, _)| enemy);
        if let Some(target) = self.target {
            debug!(rocket = %me, %target, "locked on");
        }
    }
}

impl Component for Rocket {
    fn update(&mut self, world: &mut World, me: Handle, dt: f32) {
        self.life -= dt;
        if self.life <= 0.0 {
            debug!(rocket = %me, "fizzled");
            let _ = world.destroy(self.tracker);
            let _ = world.destroy(me);
            return;
        }

        if self.target.is_some_and(|t| !world.is_alive(t)) {
            self.target = None;
        }
        if self.target.is_none() {
            self.acquire(world, me);
        }

        let (Some(pos), Some(target_pos)) = (
            world.position(me),
            self.target.and_then(|t| world.position(t)),
        ) else {
            return;
        };
        let to_target = target_pos - pos;
        let Some(collider) = world.collider_mut(me) else {
            return;
        };
        let wanted = to_target.y.atan2(to_target.x);
        let rotation = shortest_rotation_approach(collider.rotation(), wanted, TURN_RATE * dt);
        collider.set_rotation(rotation);
        if let Some(mover) = world.mover_mut(me) {
            mover.facing = Vec2::from_angle(rotation);
            mover.target_speed = self.max_speed;
        }
    }

    fn render(&self, world: &World, me: Handle, surface: &mut dyn Surface) {
        if let Some(collider) = world.collider(me) {
            surface.quad(&collider.quad(), [1.0, 1.0, 1.0, 1.0]);
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("homing=info")))
        .init();

    let config = SceneConfig::from_json(CONFIG).context("loading scene configuration")?;
    let mut scene = Scene::try_new(config)?;
    let world = scene.world_mut();
    world.register_component::<Rocket>(Property::UPDATE | Property::RENDER);

    let mut enemies = Vec::new();
    for (i, y) in [40.0, 100.0, 160.0, 220.0].into_iter().enumerate() {
        let enemy = world.try_spawn(Vec2::new(400.0 + 20.0 * i as f32, y))?;
        world.attach_collider(enemy, Collider::new(Rect::centered(Vec2::splat(8.0))).with_mask(ENEMY))?;
        world.attach_mover(enemy, Mover::with_velocity(Vec2::new(0.0, if i % 2 == 0 { 15.0 } else { -15.0 })))?;
        enemies.push(enemy);
    }
    for y in [60.0, 128.0, 200.0] {
        Rocket::spawn(world, Vec2::new(32.0, y), Vec2::new(160.0, 0.0))?;
    }

    let mut tick_loop = TickLoop::new(scene, TickConfig::default());
    let mut frame = DrawList::new();
    for _ in 0..(60.0 * ROCKET_LIFE) as u64 + 2 {
        let report = tick_loop.tick();
        if report.resolve.contacts > 0 {
            debug!(contacts = report.resolve.contacts, callbacks = report.resolve.callbacks, "collisions");
        }
        frame.clear();
        tick_loop.scene().render(&mut frame);
    }

    let scene = tick_loop.scene();
    let survivors = enemies.iter().filter(|&&e| scene.world().is_alive(e)).count();
    info!(
        ticks = tick_loop.tick_count(),
        sim_time = tick_loop.sim_time(),
        survivors,
        entities = scene.world().entity_count(),
        digest = %scene.digest(),
        "done"
    );
    Ok(())
}
