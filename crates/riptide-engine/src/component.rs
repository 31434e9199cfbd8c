//! Behaviour components attached to entities.
//!
//! A [`Component`] implements whichever hooks it needs; every hook defaults
//! to doing nothing. Hooks receive the [`World`] mutably, so a component is
//! taken out of its entity while its hook runs and put back afterwards. As a
//! consequence a component cannot look itself up through the world from
//! inside its own hook; it already has `&mut self`.
//!
//! ```
//! use glam::Vec2;
//! use riptide_engine::prelude::*;
//!
//! struct Lifetime(f32);
//!
//! impl Component for Lifetime {
//!     fn update(&mut self, world: &mut World, entity: Handle, dt: f32) {
//!         self.0 -= dt;
//!         if self.0 <= 0.0 {
//!             let _ = world.destroy(entity);
//!         }
//!     }
//! }
//!
//! let mut scene = Scene::new(SceneConfig::default());
//! scene.world_mut().register_component::<Lifetime>(Property::UPDATE);
//! let e = scene.world_mut().spawn(Vec2::ZERO);
//! scene.world_mut().attach(e, Lifetime(0.05)).unwrap();
//!
//! scene.update(0.1); // attached, then updated: marked dead
//! assert!(scene.world().resolve(e).is_some());
//! scene.update(0.1); // swept
//! assert!(scene.world().resolve(e).is_none());
//! ```

use std::any::Any;

use riptide_ecs::entity::Handle;

use crate::render::Surface;
use crate::world::World;

/// Upcast helper so `dyn Component` can be downcast to its concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behaviour attached to an entity.
#[allow(unused_variables)]
pub trait Component: AsAny + 'static {
    /// Runs during list maintenance, after every component queued for the
    /// entity in the same frame has been attached.
    fn on_attach(&mut self, world: &mut World, entity: Handle) {}

    /// Runs when the component is detached or its entity is swept.
    fn on_detach(&mut self, world: &mut World, entity: Handle) {}

    /// Runs once per frame for types registered with `Property::UPDATE`.
    fn update(&mut self, world: &mut World, entity: Handle, dt: f32) {}

    /// Runs for types registered with `Property::RENDER` or `Property::HUD`.
    fn render(&self, world: &World, entity: Handle, surface: &mut dyn Surface) {}

    /// Render passes skip the component while this is `false`.
    fn visible(&self) -> bool {
        true
    }
}

pub(crate) fn downcast_ref<T: Component>(component: &dyn Component) -> Option<&T> {
    component.as_any().downcast_ref::<T>()
}

pub(crate) fn downcast_mut<T: Component>(component: &mut dyn Component) -> Option<&mut T> {
    component.as_any_mut().downcast_mut::<T>()
}
