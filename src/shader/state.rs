use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::errors::*;
use crate::shader::config::StateConfig;
use crate::shader::glsl::{Includer, PreProcessor};
use crate::shader::program::Shader;
use crate::states::{State, StateEffect};
use crate::video::types::{ObjectName, Stage};
use crate::video::RenderState;

/// Uses a generated program while enabled.
///
/// The program is (re)built with `create_shader` from a configuration that
/// is usually collected from the node the state is attached to. A failed
/// build keeps the previous program, so a broken edit to an effect file does
/// not take down a running scene.
#[derive(Debug, Default)]
pub struct ShaderState {
    key: RefCell<String>,
    shader: RefCell<Option<Shader>>,
    overrides: RefCell<BTreeMap<Stage, String>>,
    version: Cell<u32>,
    pushed: Cell<usize>,
}

impl ShaderState {
    pub fn new() -> Self {
        ShaderState::default()
    }

    /// The lowest GLSL version of generated programs.
    pub fn set_min_version(&self, version: u32) {
        self.version.set(version);
    }

    /// Replaces the source of `stage` with an include key or GLSL code.
    pub fn set_stage_source<T: Into<String>>(&self, stage: Stage, source: T) {
        self.overrides.borrow_mut().insert(stage, source.into());
    }

    pub fn clear_stage_sources(&self) {
        self.overrides.borrow_mut().clear();
    }

    /// The effect key of the last successful build.
    pub fn key(&self) -> String {
        self.key.borrow().clone()
    }

    #[inline]
    pub fn has_shader(&self) -> bool {
        self.shader.borrow().is_some()
    }

    /// The program in use, if a build succeeded.
    pub fn program(&self) -> Option<ObjectName> {
        self.shader.borrow().as_ref().and_then(|v| v.id())
    }

    /// Runs `func` with the current shader.
    pub fn with_shader<F, R>(&self, func: F) -> Option<R>
    where
        F: FnOnce(&mut Shader) -> R,
    {
        self.shader.borrow_mut().as_mut().map(func)
    }

    /// Generates, compiles and links the program of effect `key`.
    ///
    /// Returns `Ok(false)` if compiling or linking failed. Missing required
    /// stages are reported as errors.
    pub fn create_shader(
        &self,
        rs: &mut RenderState,
        includer: &mut Includer,
        cfg: &StateConfig,
        key: &str,
    ) -> Result<bool> {
        let sources = {
            let overrides = self.overrides.borrow();
            let mut preprocessor = PreProcessor::new(includer, self.version.get());
            preprocessor.process(key, cfg, &overrides)?
        };

        let mut shader = Shader::new(key, sources);
        let built = match shader.build(rs, cfg) {
            Ok(v) => v,
            Err(err) => {
                if let Err(v) = shader.release(rs) {
                    warn!("Failed to release shader '{}'. {}", key, v);
                }

                return Err(err);
            }
        };

        if !built {
            shader.release(rs)?;
            return Ok(false);
        }

        info!("Created shader '{}' with {} uniforms.", key, shader.num_uniforms());

        *self.key.borrow_mut() = key.to_owned();
        let previous = self.shader.replace(Some(shader));
        if let Some(mut v) = previous {
            v.release(rs)?;
        }

        Ok(true)
    }

    /// Rebuilds the current effect, reading files from disk again.
    pub fn reload(
        &self,
        rs: &mut RenderState,
        includer: &mut Includer,
        cfg: &StateConfig,
    ) -> Result<bool> {
        let key = self.key();
        if key.is_empty() {
            bail!("Can not reload a shader state that was never created.");
        }

        includer.clear_cache();
        self.create_shader(rs, includer, cfg, &key)
    }

    /// Deletes the program.
    pub fn release(&self, rs: &mut RenderState) -> Result<()> {
        if let Some(mut v) = self.shader.replace(None) {
            v.release(rs)?;
        }

        Ok(())
    }
}

impl StateEffect for ShaderState {
    fn enable(&self, rs: &mut RenderState) -> Result<()> {
        let mut shader = self.shader.borrow_mut();
        let shader = match shader.as_mut() {
            Some(v) => v,
            None => return Ok(()),
        };

        let program = match shader.id() {
            Some(v) => v,
            None => return Ok(()),
        };

        rs.program().push(program)?;
        if let Err(err) = shader.enable(rs) {
            rs.program().pop()?;
            return Err(err);
        }

        self.pushed.set(self.pushed.get() + 1);
        Ok(())
    }

    fn disable(&self, rs: &mut RenderState) -> Result<()> {
        if self.pushed.get() == 0 {
            return Ok(());
        }

        self.pushed.set(self.pushed.get() - 1);
        rs.program().pop()
    }

    fn joined_enabled(&self, rs: &mut RenderState) -> Result<()> {
        if self.pushed.get() == 0 {
            return Ok(());
        }

        let top = *rs.program().top();
        let mut shader = self.shader.borrow_mut();
        match shader.as_mut() {
            Some(v) if v.id() == Some(top) => v.upload_textures(rs),
            _ => Ok(()),
        }
    }

    fn configure(&self, _: &State, cfg: &mut StateConfig) {
        cfg.set_version(self.version.get());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::RenderParams;

    const EFFECT: &str = "
-- vs
uniform float u_scale;
in vec3 in_pos;
void main() { gl_Position = vec4(in_pos * u_scale, 1.0); }
-- fs
out vec4 color;
void main() { color = vec4(1.0); }
";

    #[test]
    fn keep_previous_on_failure() {
        let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
        let mut includer = Includer::new();
        includer.add_source("plain", EFFECT);

        let shader = ShaderState::new();
        let cfg = StateConfig::new();
        assert!(shader
            .create_shader(&mut rs, &mut includer, &cfg, "plain")
            .unwrap());

        let program = shader.program().unwrap();

        probe.fail_compile(Stage::Fragment);
        assert!(!shader.reload(&mut rs, &mut includer, &cfg).unwrap());
        assert_eq!(shader.program(), Some(program));
        assert!(probe.is_linked(program));
        assert_eq!(probe.live_programs(), 1);

        shader.release(&mut rs).unwrap();
        assert_eq!(probe.live_programs(), 0);
        assert_eq!(probe.live_stages(), 0);
    }

    #[test]
    fn backend_errors_release_the_build() {
        let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
        let mut includer = Includer::new();
        includer.add_source("plain", EFFECT);

        probe.fail_queries();
        let shader = ShaderState::new();
        assert!(shader
            .create_shader(&mut rs, &mut includer, &StateConfig::new(), "plain")
            .is_err());

        assert!(!shader.has_shader());
        assert_eq!(probe.live_programs(), 0);
        assert_eq!(probe.live_stages(), 0);
    }

    #[test]
    fn binds_program() {
        let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
        let mut includer = Includer::new();
        includer.add_source("plain", EFFECT);

        let shader = ShaderState::new();
        assert!(shader
            .create_shader(&mut rs, &mut includer, &StateConfig::new(), "plain")
            .unwrap());

        let program = shader.program().unwrap();
        shader.enable(&mut rs).unwrap();
        assert_eq!(*rs.program().top(), program);
        shader.disable(&mut rs).unwrap();
        assert_eq!(*rs.program().top(), 0);
    }
}
