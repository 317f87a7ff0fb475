//! The merged shader-facing contribution of a chain of states.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::shader::input::{NamedInput, ShaderInput};
use crate::states::{Composition, State, StateId, StateNode};
use crate::video::types::{FeedbackMode, Stage};

/// The GLSL version a configuration starts with.
pub const DEFAULT_GLSL_VERSION: u32 = 330;

/// A texture declared to the shader. The channel is filled in by the texture
/// state while it is enabled.
#[derive(Debug, Clone)]
pub struct TextureBinding {
    pub name: String,
    pub state: StateId,
    pub channel: Rc<Cell<Option<u32>>>,
}

/// Everything needed to generate one shader program: defines, function
/// snippets, declared inputs, textures and transform feedback setup.
///
/// Contributions are merged in the order they are added and later ones win,
/// except for the version which only grows.
#[derive(Debug, Clone)]
pub struct StateConfig {
    defines: BTreeMap<String, String>,
    functions: BTreeMap<String, String>,
    inputs: BTreeMap<String, Arc<ShaderInput>>,
    textures: Vec<TextureBinding>,
    feedback_attributes: Vec<String>,
    feedback_mode: FeedbackMode,
    feedback_stage: Stage,
    version: u32,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            defines: BTreeMap::new(),
            functions: BTreeMap::new(),
            inputs: BTreeMap::new(),
            textures: Vec::new(),
            feedback_attributes: Vec::new(),
            feedback_mode: FeedbackMode::Separate,
            feedback_stage: Stage::Vertex,
            version: DEFAULT_GLSL_VERSION,
        }
    }
}

impl StateConfig {
    pub fn new() -> Self {
        StateConfig::default()
    }

    /// Collects the configuration of `node` and all its ancestors.
    pub fn from_node(node: &StateNode) -> Self {
        let mut cfg = StateConfig::new();
        cfg.add_node(node);
        cfg
    }

    /// Collects the configuration of `state` and its joined states.
    pub fn from_state(state: &State) -> Self {
        let mut cfg = StateConfig::new();
        cfg.add_state(state);
        cfg
    }

    pub fn add_node(&mut self, node: &StateNode) {
        node.configure_shader(self);
    }

    /// Merges `state`, then its joined states in order. Sequences contribute
    /// their global state only. Hidden states are skipped.
    pub fn add_state(&mut self, state: &State) {
        if state.is_hidden() {
            return;
        }

        for v in state.shader_inputs() {
            self.add_input(v);
        }

        state.configure(self);

        self.set_version(state.shader_version());
        self.defines.extend(state.shader_defines());
        self.functions.extend(state.shader_functions());

        match state.composition() {
            Composition::Sequence => {
                if let Some(global) = state.global_state() {
                    self.add_state(&global);
                }
            }
            Composition::Nested => {
                for v in state.joined_states() {
                    self.add_state(&v);
                }
            }
        }
    }

    /// Declares an input. Defines `HAS_<name>`, and `HAS_INSTANCES` if the
    /// input feeds more than one instance.
    pub fn add_input(&mut self, named: NamedInput) {
        self.define(format!("HAS_{}", named.input.name()), "TRUE");
        if named.input.num_instances() > 1 {
            self.define("HAS_INSTANCES", "TRUE");
        }

        self.inputs.insert(named.name, named.input);
    }

    /// Declares a texture, defining `TEX_ID<n>` and `NUM_TEXTURES`.
    pub fn add_texture(&mut self, binding: TextureBinding) {
        let index = self.textures.len();
        self.define(format!("TEX_ID{}", index), binding.state);
        self.define("NUM_TEXTURES", index + 1);
        self.textures.push(binding);
    }

    pub fn define<N: Into<String>, V: ToString>(&mut self, name: N, value: V) {
        self.defines.insert(name.into(), value.to_string());
    }

    pub fn undefine(&mut self, name: &str) {
        self.defines.remove(name);
    }

    #[inline]
    pub fn define_value(&self, name: &str) -> Option<&str> {
        self.defines.get(name).map(|v| v.as_str())
    }

    #[inline]
    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }

    pub fn add_function<N: Into<String>, V: Into<String>>(&mut self, name: N, code: V) {
        self.functions.insert(name.into(), code.into());
    }

    #[inline]
    pub fn functions(&self) -> &BTreeMap<String, String> {
        &self.functions
    }

    #[inline]
    pub fn inputs(&self) -> &BTreeMap<String, Arc<ShaderInput>> {
        &self.inputs
    }

    #[inline]
    pub fn textures(&self) -> &[TextureBinding] {
        &self.textures
    }

    pub fn add_feedback_attribute<T: Into<String>>(&mut self, name: T) {
        self.feedback_attributes.push(name.into());
    }

    #[inline]
    pub fn feedback_attributes(&self) -> &[String] {
        &self.feedback_attributes
    }

    #[inline]
    pub fn feedback_mode(&self) -> FeedbackMode {
        self.feedback_mode
    }

    #[inline]
    pub fn set_feedback_mode(&mut self, mode: FeedbackMode) {
        self.feedback_mode = mode;
    }

    /// The stage whose outputs are captured.
    #[inline]
    pub fn feedback_stage(&self) -> Stage {
        self.feedback_stage
    }

    #[inline]
    pub fn set_feedback_stage(&mut self, stage: Stage) {
        self.feedback_stage = stage;
    }

    /// Raises the GLSL version. Lower versions are ignored.
    #[inline]
    pub fn set_version(&mut self, version: u32) {
        self.version = self.version.max(version);
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn closer_wins() {
        let root = StateNode::empty("root");
        let mid = StateNode::empty("mid");
        let leaf = StateNode::empty("leaf");
        root.add_child(&mid).unwrap();
        mid.add_child(&leaf).unwrap();

        root.state().shader_define("FOO", 1);
        root.state().shader_define("BAR", "x");
        leaf.state().shader_define("FOO", 2);

        let cfg = StateConfig::from_node(&leaf);
        assert_eq!(cfg.define_value("FOO"), Some("2"));
        assert_eq!(cfg.define_value("BAR"), Some("x"));

        let cfg = StateConfig::from_node(&mid);
        assert_eq!(cfg.define_value("FOO"), Some("1"));
    }

    #[test]
    fn inputs() {
        let s = State::new("s");
        s.join_shader_input(ShaderInput::uniform("color", [1.0f32, 0.0, 0.0]), None);
        s.join_shader_input(
            ShaderInput::instanced("offset", &[[0.0f32, 1.0], [1.0, 0.0]], 1),
            Some("instanceOffset"),
        );

        let hidden = State::new("hidden");
        hidden.shader_define("HIDDEN", "TRUE");
        hidden.set_hidden(true);
        s.join_states(&hidden);

        let cfg = StateConfig::from_state(&s);
        assert_eq!(cfg.define_value("HAS_color"), Some("TRUE"));
        assert_eq!(cfg.define_value("HAS_offset"), Some("TRUE"));
        assert_eq!(cfg.define_value("HAS_INSTANCES"), Some("TRUE"));
        assert!(cfg.inputs().contains_key("instanceOffset"));
        assert!(cfg.define_value("HIDDEN").is_none());
    }

    #[test]
    fn sequences() {
        let global = State::new("global");
        global.shader_define("GLOBAL", "TRUE");
        let pass = State::new("pass");
        pass.shader_define("PASS", "TRUE");

        let seq = State::sequence("seq", Some(global));
        seq.join_states(&pass);
        seq.set_shader_version(400);

        let cfg = StateConfig::from_state(&seq);
        assert_eq!(cfg.define_value("GLOBAL"), Some("TRUE"));
        assert!(cfg.define_value("PASS").is_none());
        assert_eq!(cfg.version(), 400);
    }
}
