//! Building state trees from scene descriptions.
//!
//! A description is a tree of `SceneInput` nodes, each with a category, a
//! name, string attributes and children. The `ProcessorRegistry` dispatches
//! every node to the processor registered for its category. Node processors
//! create `StateNode`s, state processors add to the `State` of their parent.
//! Processors only use the public state API.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use cgmath::Vector3;
use serde::de::DeserializeOwned;

use crate::errors::*;
use crate::shader::input::ShaderInput;
use crate::states::{blend_state, cull_state, depth_state, BlendMode, State, StateNode};
use crate::video::types::{Comparison, CullFace, FrontFaceOrder};

/// One node of a scene description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneInput {
    pub category: String,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<SceneInput>,
}

impl fmt::Display for SceneInput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} name='{}'>", self.category, self.name)
    }
}

impl SceneInput {
    pub fn new<C: Into<String>, N: Into<String>>(category: C, name: N) -> Self {
        SceneInput {
            category: category.into(),
            name: name.into(),
            ..SceneInput::default()
        }
    }

    /// Parses a description from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        let input = ::serde_json::from_str(text).map_err(Error::from)?;
        Ok(input)
    }

    pub fn with_attribute<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    pub fn with_child(mut self, child: SceneInput) -> Self {
        self.children.push(child);
        self
    }

    #[inline]
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|v| v.as_str())
    }

    /// Children of `category`.
    pub fn children_of<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a SceneInput> + 'a {
        self.children.iter().filter(move |v| v.category == category)
    }

    /// Parses attribute `key`, falling back to `default` if it is absent.
    pub fn get_value<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|err| format_err!("{}: attribute '{}' = '{}': {}", self, key, v, err)),
            None => Ok(default),
        }
    }

    #[inline]
    pub fn get_f32(&self, key: &str, default: f32) -> Result<f32> {
        self.get_value(key, default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|v| v.trim()) {
            None => Ok(default),
            Some("1") | Some("true") | Some("TRUE") => Ok(true),
            Some("0") | Some("false") | Some("FALSE") => Ok(false),
            Some(v) => bail!("{}: attribute '{}' = '{}' is not a boolean.", self, key, v),
        }
    }

    /// Parses a vector written as `x,y,z`.
    pub fn get_vec3(&self, key: &str, default: Vector3<f32>) -> Result<Vector3<f32>> {
        let text = match self.get(key) {
            Some(v) => v,
            None => return Ok(default),
        };

        let values = text
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<::std::result::Result<Vec<_>, _>>()
            .map_err(|err| format_err!("{}: attribute '{}' = '{}': {}", self, key, text, err))?;

        match values.len() {
            1 => Ok(Vector3::new(values[0], values[0], values[0])),
            3 => Ok(Vector3::new(values[0], values[1], values[2])),
            n => bail!("{}: attribute '{}' has {} components.", self, key, n),
        }
    }

    /// Parses an enumeration by its variant name.
    pub fn get_enum<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Some(v) => ::serde_json::from_value(::serde_json::Value::String(v.trim().to_owned()))
                .map_err(|err| format_err!("{}: attribute '{}' = '{}': {}", self, key, v, err)),
            None => Ok(default),
        }
    }
}

/// Adds to the state of the enclosing node.
pub trait StateProcessor {
    fn category(&self) -> &str;

    fn process(
        &self,
        registry: &ProcessorRegistry,
        input: &SceneInput,
        parent: &Rc<State>,
    ) -> Result<()>;
}

/// Adds nodes below the enclosing node.
pub trait NodeProcessor {
    fn category(&self) -> &str;

    fn process(
        &self,
        registry: &ProcessorRegistry,
        input: &SceneInput,
        parent: &Rc<StateNode>,
    ) -> Result<()>;
}

#[derive(Default)]
pub struct ProcessorRegistry {
    states: HashMap<String, Box<dyn StateProcessor>>,
    nodes: HashMap<String, Box<dyn NodeProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        ProcessorRegistry::default()
    }

    /// A registry with processors for nodes, defines, uniforms and the
    /// common fixed-function states.
    pub fn with_defaults() -> Self {
        let mut registry = ProcessorRegistry::new();
        registry.add_node_processor(SceneNodeProcessor);
        registry.add_state_processor(NestedStateProcessor);
        registry.add_state_processor(DefineProcessor);
        registry.add_state_processor(UniformProcessor);
        registry.add_state_processor(DepthProcessor);
        registry.add_state_processor(BlendProcessor);
        registry.add_state_processor(CullProcessor);
        registry
    }

    /// Registers `processor`, replacing the one of the same category.
    pub fn add_state_processor<P: StateProcessor + 'static>(&mut self, processor: P) {
        self.states
            .insert(processor.category().to_owned(), Box::new(processor));
    }

    pub fn add_node_processor<P: NodeProcessor + 'static>(&mut self, processor: P) {
        self.nodes
            .insert(processor.category().to_owned(), Box::new(processor));
    }

    #[inline]
    pub fn has_processor(&self, category: &str) -> bool {
        self.states.contains_key(category) || self.nodes.contains_key(category)
    }

    /// Processes `input` below `parent`. Node processors take precedence over
    /// state processors. Inputs nobody processes are skipped with a warning.
    pub fn process_node(&self, input: &SceneInput, parent: &Rc<StateNode>) -> Result<()> {
        if let Some(v) = self.nodes.get(&input.category) {
            return v.process(self, input, parent);
        }

        self.process_state(input, parent.state())
    }

    pub fn process_state(&self, input: &SceneInput, parent: &Rc<State>) -> Result<()> {
        match self.states.get(&input.category) {
            Some(v) => v.process(self, input, parent),
            None => {
                warn!("No processor registered for {}.", input);
                Ok(())
            }
        }
    }

    /// Builds a tree from a root description. The children of `input` are
    /// processed below a node named after it.
    pub fn load(&self, input: &SceneInput) -> Result<Rc<StateNode>> {
        let root = StateNode::empty(input.name.clone());
        for v in &input.children {
            self.process_node(v, &root)?;
        }

        Ok(root)
    }
}

/// `node`: a child node. Attributes: `hidden`, `iterations`.
pub struct SceneNodeProcessor;

impl NodeProcessor for SceneNodeProcessor {
    fn category(&self) -> &str {
        "node"
    }

    fn process(
        &self,
        registry: &ProcessorRegistry,
        input: &SceneInput,
        parent: &Rc<StateNode>,
    ) -> Result<()> {
        let node = StateNode::empty(input.name.clone());
        node.set_hidden(input.get_bool("hidden", false)?);
        node.set_iterations(input.get_value("iterations", 1u32)?);
        parent.add_child(&node)?;

        for v in &input.children {
            registry.process_node(v, &node)?;
        }

        Ok(())
    }
}

/// `state`: a joined state holding its children.
pub struct NestedStateProcessor;

impl StateProcessor for NestedStateProcessor {
    fn category(&self) -> &str {
        "state"
    }

    fn process(
        &self,
        registry: &ProcessorRegistry,
        input: &SceneInput,
        parent: &Rc<State>,
    ) -> Result<()> {
        let state = State::new(input.name.clone());
        for v in &input.children {
            registry.process_state(v, &state)?;
        }

        parent.join_states(&state);
        Ok(())
    }
}

/// `define`: a shader define. Attributes: `key`, `value` (defaults to `TRUE`).
pub struct DefineProcessor;

impl StateProcessor for DefineProcessor {
    fn category(&self) -> &str {
        "define"
    }

    fn process(&self, _: &ProcessorRegistry, input: &SceneInput, parent: &Rc<State>) -> Result<()> {
        let key = match input.get("key") {
            Some(v) => v,
            None => bail!("{}: missing attribute 'key'.", input),
        };

        parent.shader_define(key, input.get("value").unwrap_or("TRUE"));
        Ok(())
    }
}

/// `uniform`: a float uniform input named after the node. Attributes:
/// `type` (`float` or `vec3`), `value`, `constant`.
pub struct UniformProcessor;

impl StateProcessor for UniformProcessor {
    fn category(&self) -> &str {
        "uniform"
    }

    fn process(&self, _: &ProcessorRegistry, input: &SceneInput, parent: &Rc<State>) -> Result<()> {
        let uniform = match input.get("type").unwrap_or("float") {
            "float" => ShaderInput::uniform(input.name.clone(), input.get_f32("value", 0.0)?),
            "vec3" => ShaderInput::uniform(
                input.name.clone(),
                input.get_vec3("value", Vector3::new(0.0, 0.0, 0.0))?,
            ),
            v => bail!("{}: unsupported uniform type '{}'.", input, v),
        };

        uniform.set_constant(input.get_bool("constant", false)?);
        parent.join_shader_input(uniform, None);
        Ok(())
    }
}

/// `depth`: attributes `test` (a `Comparison`) and `write`.
pub struct DepthProcessor;

impl StateProcessor for DepthProcessor {
    fn category(&self) -> &str {
        "depth"
    }

    fn process(&self, _: &ProcessorRegistry, input: &SceneInput, parent: &Rc<State>) -> Result<()> {
        let func = input.get_enum("test", Comparison::LessOrEqual)?;
        let write = input.get_bool("write", true)?;
        parent.join_states(&depth_state(func, write));
        Ok(())
    }
}

/// `blend`: attribute `mode` (a `BlendMode`).
pub struct BlendProcessor;

impl StateProcessor for BlendProcessor {
    fn category(&self) -> &str {
        "blend"
    }

    fn process(&self, _: &ProcessorRegistry, input: &SceneInput, parent: &Rc<State>) -> Result<()> {
        let mode: BlendMode = match input.get("mode") {
            Some(v) => v.trim().parse()?,
            None => BlendMode::Src,
        };

        parent.join_states(&blend_state(mode));
        Ok(())
    }
}

/// `cull`: attributes `face` and `order`.
pub struct CullProcessor;

impl StateProcessor for CullProcessor {
    fn category(&self) -> &str {
        "cull"
    }

    fn process(&self, _: &ProcessorRegistry, input: &SceneInput, parent: &Rc<State>) -> Result<()> {
        let face = input.get_enum("face", CullFace::Back)?;
        let order = input.get_enum("order", FrontFaceOrder::CounterClockwise)?;
        parent.join_states(&cull_state(face, order));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attributes() {
        let input = SceneInput::new("test", "a")
            .with_attribute("f", "1.5")
            .with_attribute("b", "true")
            .with_attribute("v", "1, 2,3")
            .with_attribute("s", "2")
            .with_attribute("e", "Greater")
            .with_attribute("bad", "x");

        assert_eq!(input.get_f32("f", 0.0).unwrap(), 1.5);
        assert_eq!(input.get_f32("missing", 4.0).unwrap(), 4.0);
        assert!(input.get_bool("b", false).unwrap());

        let zero = Vector3::new(0.0, 0.0, 0.0);
        assert_eq!(input.get_vec3("v", zero).unwrap(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(input.get_vec3("s", zero).unwrap(), Vector3::new(2.0, 2.0, 2.0));
        assert_eq!(input.get_enum("e", Comparison::Less).unwrap(), Comparison::Greater);
        assert!(input.get_f32("bad", 0.0).is_err());
        assert!(input.get_bool("bad", false).is_err());
        assert!(input.get_enum("bad", Comparison::Less).is_err());
    }

    #[test]
    fn load() {
        let description = r#"{
            "category": "scene", "name": "root",
            "children": [
                { "category": "node", "name": "opaque",
                  "attributes": { "iterations": "2" },
                  "children": [
                    { "category": "depth", "attributes": { "test": "Less", "write": "false" } },
                    { "category": "define", "attributes": { "key": "LIGHTS", "value": "3" } },
                    { "category": "uniform", "name": "exposure", "attributes": { "value": "0.5" } },
                    { "category": "unknown" },
                    { "category": "node", "name": "inner", "attributes": { "hidden": "1" } }
                  ] }
            ]
        }"#;

        let registry = ProcessorRegistry::with_defaults();
        let input = SceneInput::from_json(description).unwrap();
        let root = registry.load(&input).unwrap();

        let opaque = root.find_node_with_name("opaque").unwrap();
        assert_eq!(opaque.iterations(), 2);
        assert_eq!(opaque.state().joined_states().len(), 2);
        assert_eq!(opaque.state().shader_defines()["LIGHTS"], "3");
        assert!(opaque.state().find_shader_input("exposure").is_some());

        let inner = root.find_node_with_name("inner").unwrap();
        assert!(inner.is_hidden());
    }
}
