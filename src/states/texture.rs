use std::cell::Cell;
use std::rc::Rc;

use crate::errors::*;
use crate::shader::config::{StateConfig, TextureBinding};
use crate::video::types::{ObjectName, TextureBind, TextureTarget};
use crate::video::{GLObject, RenderState};

use super::state::{State, StateEffect};

/// Binds a texture to a channel reserved for as long as the state is enabled,
/// and declares it to the shader under `name`.
///
/// The shader sees `TEX_NAME<id>`, `TEX_SAMPLER_TYPE<id>` and `HAS_<name>`,
/// with `<id>` being the id of the owning state, and the `TEX_ID<n>` and
/// `NUM_TEXTURES` macros that enumerate all textures of a program.
#[derive(Debug)]
pub struct TextureState {
    name: String,
    bind: TextureBind,
    channel: Rc<Cell<Option<u32>>>,
}

impl TextureState {
    pub fn new<T: Into<String>>(name: T, target: TextureTarget, texture: ObjectName) -> Self {
        TextureState {
            name: name.into(),
            bind: TextureBind { target, texture },
            channel: Rc::new(Cell::new(None)),
        }
    }

    /// Binds the active object of `texture`.
    pub fn from_object<T: Into<String>>(name: T, target: TextureTarget, texture: &GLObject) -> Self {
        TextureState::new(name, target, texture.id())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn bind(&self) -> TextureBind {
        self.bind
    }

    /// The channel the texture is bound to, while enabled.
    #[inline]
    pub fn channel(&self) -> Option<u32> {
        self.channel.get()
    }
}

impl StateEffect for TextureState {
    fn enable(&self, rs: &mut RenderState) -> Result<()> {
        let channel = rs.reserve_texture_channel();
        if let Err(err) = rs.texture(channel).push(self.bind) {
            rs.release_texture_channel();
            return Err(err);
        }

        self.channel.set(Some(channel));
        Ok(())
    }

    fn disable(&self, rs: &mut RenderState) -> Result<()> {
        match self.channel.replace(None) {
            Some(channel) => {
                let result = rs.texture(channel).pop();
                rs.release_texture_channel();
                result
            }
            None => Ok(()),
        }
    }

    fn configure(&self, state: &State, cfg: &mut StateConfig) {
        let id = state.id();
        cfg.define(format!("TEX_NAME{}", id), &self.name);
        cfg.define(format!("TEX_SAMPLER_TYPE{}", id), self.bind.target.sampler_type());
        cfg.define(format!("HAS_{}", self.name), "TRUE");
        cfg.add_texture(TextureBinding {
            name: self.name.clone(),
            state: id,
            channel: self.channel.clone(),
        });
    }
}
