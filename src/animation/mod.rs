//! Time driven updates, split between a background thread and the render
//! thread.
//!
//! An `Animation` opts into either or both halves: `animate` runs on the
//! `AnimationManager`'s own thread without a GL context, and `gl_animate`
//! runs on the render thread from `AnimationManager::update_graphics`. Both
//! halves of one animation lock the same mutex, so they never overlap.

pub mod manager;

pub use self::manager::AnimationManager;

use std::sync::{Arc, Mutex};

use crate::errors::*;
use crate::video::RenderState;

impl_handle!(AnimationHandle);

pub trait Animation: Send {
    /// Advances the animation by `dt` milliseconds on the animation thread.
    fn animate(&mut self, _dt: f64) {}

    /// Advances the GL side of the animation on the render thread.
    fn gl_animate(&mut self, _rs: &mut RenderState, _dt: f64) -> Result<()> {
        Ok(())
    }

    fn use_animation(&self) -> bool {
        true
    }

    fn use_gl_animation(&self) -> bool {
        false
    }
}

/// An animation shared between the registering code and the manager.
pub type SharedAnimation = Arc<Mutex<dyn Animation>>;

/// Wraps `animation` for registration.
pub fn shared<A: Animation + 'static>(animation: A) -> SharedAnimation {
    Arc::new(Mutex::new(animation))
}

pub mod prelude {
    pub use super::{shared, Animation, AnimationHandle, AnimationManager, SharedAnimation};
}
