//! Compiled and linked GL programs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use byteorder::{ByteOrder, NativeEndian};

use crate::errors::*;
use crate::shader::config::{StateConfig, TextureBinding};
use crate::shader::input::{InputFormat, NamedInput, ScalarKind, ShaderInput};
use crate::video::types::{ActiveVariable, FeedbackMode, ObjectName, Stage};
use crate::video::RenderState;

const UNIFORM_PREFIXES: [&str; 2] = ["u_", "in_"];
const ATTRIBUTE_PREFIXES: [&str; 3] = ["a_", "in_", "vs_"];

#[derive(Debug, Clone)]
struct UniformSlot {
    name: String,
    input: Arc<ShaderInput>,
    location: i32,
    uploaded: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AttributeSlot {
    pub name: String,
    pub input: Arc<ShaderInput>,
    pub location: i32,
}

#[derive(Debug, Clone)]
struct TextureSlot {
    binding: TextureBinding,
    location: i32,
    uploaded: Option<u32>,
}

/// A GL program built from per-stage sources.
///
/// Building runs strictly in the order compile, transform feedback setup,
/// link, validate and location resolution. A failed compile or link leaves
/// the shader without a program, so `id` is either `None` or a fully linked
/// program.
///
/// GL names are owned by the shader and must be returned with `release`
/// on the render thread.
#[derive(Debug)]
pub struct Shader {
    effect: String,
    sources: BTreeMap<Stage, String>,
    stages: BTreeMap<Stage, ObjectName>,
    program: Option<ObjectName>,

    feedback: Vec<String>,
    feedback_mode: FeedbackMode,
    feedback_stage: Stage,

    uniform_locations: HashMap<String, i32>,
    attribute_locations: HashMap<String, i32>,
    sampler_locations: HashMap<String, i32>,

    uniforms: Vec<UniformSlot>,
    attributes: Vec<AttributeSlot>,
    textures: Vec<TextureSlot>,
}

impl Shader {
    pub fn new<T: Into<String>>(effect: T, sources: BTreeMap<Stage, String>) -> Self {
        Shader {
            effect: effect.into(),
            sources,
            stages: BTreeMap::new(),
            program: None,
            feedback: Vec::new(),
            feedback_mode: FeedbackMode::Separate,
            feedback_stage: Stage::Vertex,
            uniform_locations: HashMap::new(),
            attribute_locations: HashMap::new(),
            sampler_locations: HashMap::new(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            textures: Vec::new(),
        }
    }

    #[inline]
    pub fn effect(&self) -> &str {
        &self.effect
    }

    #[inline]
    pub fn sources(&self) -> &BTreeMap<Stage, String> {
        &self.sources
    }

    #[inline]
    pub fn has_stage(&self, stage: Stage) -> bool {
        self.sources.contains_key(&stage)
    }

    /// The linked program, if any.
    #[inline]
    pub fn id(&self) -> Option<ObjectName> {
        self.program
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.program.is_some()
    }

    /// Declares the outputs captured with transform feedback.
    pub fn set_transform_feedback<I, T>(&mut self, attributes: I, mode: FeedbackMode, stage: Stage)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.feedback = attributes.into_iter().map(|v| v.into()).collect();
        self.feedback_mode = mode;
        self.feedback_stage = stage;
    }

    /// Runs the whole build and binds the inputs and textures of `cfg`.
    pub fn build(&mut self, rs: &mut RenderState, cfg: &StateConfig) -> Result<bool> {
        self.set_transform_feedback(
            cfg.feedback_attributes().iter().cloned(),
            cfg.feedback_mode(),
            cfg.feedback_stage(),
        );

        if !self.compile(rs)? || !self.link(rs)? {
            return Ok(false);
        }

        self.validate(rs)?;
        self.resolve_locations(rs)?;

        for (name, input) in cfg.inputs() {
            self.set_input(NamedInput {
                name: name.clone(),
                input: input.clone(),
            });
        }

        for v in cfg.textures() {
            self.set_texture(v.clone());
        }

        Ok(true)
    }

    /// Compiles every stage. On failure all stages compiled so far are
    /// deleted and `false` is returned.
    pub fn compile(&mut self, rs: &mut RenderState) -> Result<bool> {
        self.delete_stages(rs)?;

        let mut failed = false;
        for (&stage, source) in &self.sources {
            let (name, log) = unsafe { rs.visitor().compile_stage(stage, source)? };
            self.stages.insert(stage, name);

            if !log.success {
                error!(
                    "Failed to compile {} stage of '{}'.\n{}",
                    stage, self.effect, log.message
                );

                failed = true;
                break;
            }
        }

        if failed {
            self.delete_stages(rs)?;
        }

        Ok(!failed)
    }

    /// The names passed to the transform feedback setup. `Position` maps to
    /// `gl_Position`, everything else is prefixed with the stage that
    /// consumes the captured stage's outputs.
    pub fn feedback_varyings(&self) -> Vec<String> {
        let prefix = Stage::ALL
            .iter()
            .skip_while(|&&v| v != self.feedback_stage)
            .skip(1)
            .find(|&&v| v != Stage::Compute && self.sources.contains_key(&v))
            .map(|v| v.prefix())
            .unwrap_or("out");

        let mut varyings: Vec<String> = Vec::new();
        for name in &self.feedback {
            let varying = if name == "Position" {
                "gl_Position".to_owned()
            } else {
                format!("{}_{}", prefix, strip_stage_prefix(name))
            };

            if !varyings.contains(&varying) {
                varyings.push(varying);
            }
        }

        varyings
    }

    /// Creates the program, declares the feedback varyings and links. On
    /// failure the program is deleted and `false` is returned.
    pub fn link(&mut self, rs: &mut RenderState) -> Result<bool> {
        self.delete_program(rs)?;

        if self.stages.is_empty() {
            error!("Can not link '{}' without compiled stages.", self.effect);
            return Ok(false);
        }

        let stages: Vec<ObjectName> = self.stages.values().cloned().collect();
        let program = unsafe { rs.visitor().create_program(&stages)? };

        let varyings = self.feedback_varyings();
        if !varyings.is_empty() {
            unsafe {
                rs.visitor()
                    .set_feedback_varyings(program, &varyings, self.feedback_mode)?;
            }
        }

        let log = unsafe { rs.visitor().link_program(program)? };
        if !log.success {
            error!("Failed to link '{}'.\n{}", self.effect, log.message);
            unsafe { rs.visitor().delete_program(program)? };
            return Ok(false);
        }

        self.program = Some(program);
        Ok(true)
    }

    /// Validates the linked program. Failures are only reported.
    pub fn validate(&self, rs: &mut RenderState) -> Result<bool> {
        let program = match self.program {
            Some(v) => v,
            None => return Ok(false),
        };

        let log = unsafe { rs.visitor().validate_program(program)? };
        if !log.success {
            warn!("Validation of '{}' failed.\n{}", self.effect, log.message);
        }

        Ok(log.success)
    }

    /// Queries the active uniforms and attributes and fills the location
    /// tables.
    pub fn resolve_locations(&mut self, rs: &mut RenderState) -> Result<()> {
        self.uniform_locations.clear();
        self.attribute_locations.clear();
        self.sampler_locations.clear();

        let program = match self.program {
            Some(v) => v,
            None => return Ok(()),
        };

        let uniforms = unsafe { rs.visitor().active_uniforms(program)? };
        for v in uniforms.iter().filter(|v| !v.name.starts_with("gl_")) {
            let name = base_name(v, &UNIFORM_PREFIXES);
            let name = name.trim_start_matches("instances_");

            let table = if v.is_sampler {
                &mut self.sampler_locations
            } else {
                &mut self.uniform_locations
            };

            register(table, name, &UNIFORM_PREFIXES, v.location);
        }

        let attributes = unsafe { rs.visitor().active_attributes(program)? };
        for v in attributes.iter().filter(|v| !v.name.starts_with("gl_")) {
            let name = base_name(v, &ATTRIBUTE_PREFIXES);
            register(
                &mut self.attribute_locations,
                &name,
                &ATTRIBUTE_PREFIXES,
                v.location,
            );
        }

        Ok(())
    }

    #[inline]
    pub fn uniform_location(&self, name: &str) -> Option<i32> {
        self.uniform_locations.get(name).cloned()
    }

    #[inline]
    pub fn attribute_location(&self, name: &str) -> Option<i32> {
        self.attribute_locations.get(name).cloned()
    }

    #[inline]
    pub fn sampler_location(&self, name: &str) -> Option<i32> {
        self.sampler_locations.get(name).cloned()
    }

    /// Binds an input to its location. Returns `false` if the program has no
    /// matching uniform or attribute, which is not an error since unused
    /// variables are removed by the compiler.
    pub fn set_input(&mut self, named: NamedInput) -> bool {
        let NamedInput { name, input } = named;

        if input.is_vertex_attribute() {
            let location = match self.attribute_location(&name) {
                Some(v) => v,
                None => {
                    trace!("'{}' has no attribute named '{}'.", self.effect, name);
                    return false;
                }
            };

            self.attributes.retain(|v| v.name != name);
            self.attributes.push(AttributeSlot {
                name,
                input,
                location,
            });
        } else {
            let location = match self.uniform_location(&name) {
                Some(v) => v,
                None => {
                    trace!("'{}' has no uniform named '{}'.", self.effect, name);
                    return false;
                }
            };

            self.uniforms.retain(|v| v.name != name);
            self.uniforms.push(UniformSlot {
                name,
                input,
                location,
                uploaded: None,
            });
        }

        true
    }

    /// Binds a texture to its sampler. Returns `false` if there is no sampler
    /// with the binding's name.
    pub fn set_texture(&mut self, binding: TextureBinding) -> bool {
        let location = match self.sampler_location(&binding.name) {
            Some(v) => v,
            None => {
                trace!("'{}' has no sampler named '{}'.", self.effect, binding.name);
                return false;
            }
        };

        self.textures.retain(|v| v.binding.name != binding.name);
        self.textures.push(TextureSlot {
            binding,
            location,
            uploaded: None,
        });

        true
    }

    /// Vertex attributes bound to this shader, for the vertex array setup.
    #[inline]
    pub fn attributes(&self) -> &[AttributeSlot] {
        &self.attributes
    }

    #[inline]
    pub fn num_uniforms(&self) -> usize {
        self.uniforms.len()
    }

    #[inline]
    pub fn num_textures(&self) -> usize {
        self.textures.len()
    }

    /// Uploads uniforms that changed since they were last uploaded, and the
    /// current channel of every bound texture. The program must be in use.
    pub fn enable(&mut self, rs: &mut RenderState) -> Result<()> {
        if self.program.is_none() {
            return Ok(());
        }

        for v in &mut self.uniforms {
            if v.uploaded == Some(v.input.stamp()) {
                continue;
            }

            let format = v.input.format();
            let count = v.input.len();
            let location = v.location;
            let stamp = v.input.with_bytes(|bytes, stamp| -> Result<usize> {
                unsafe { rs.visitor().upload_uniform(location, format, count, bytes)? };
                Ok(stamp)
            })?;

            v.uploaded = Some(stamp);
        }

        self.upload_textures(rs)
    }

    /// Uploads the channels of bound textures that moved since they were last
    /// uploaded. Textures that are not bound yet are skipped. The program must
    /// be in use.
    pub fn upload_textures(&mut self, rs: &mut RenderState) -> Result<()> {
        if self.program.is_none() {
            return Ok(());
        }

        for v in &mut self.textures {
            let channel = match v.binding.channel.get() {
                Some(channel) => channel,
                None => continue,
            };

            if v.uploaded == Some(channel) {
                continue;
            }

            let mut bytes = [0; 4];
            NativeEndian::write_i32(&mut bytes, channel as i32);

            let format = InputFormat::Vector(ScalarKind::Int, 1);
            unsafe { rs.visitor().upload_uniform(v.location, format, 1, &bytes)? };
            v.uploaded = Some(channel);
        }

        Ok(())
    }

    /// Forces every uniform and texture to be uploaded again by the next
    /// `enable`.
    pub fn invalidate(&mut self) {
        for v in &mut self.uniforms {
            v.uploaded = None;
        }

        for v in &mut self.textures {
            v.uploaded = None;
        }
    }

    /// Deletes the program and its stages.
    pub fn release(&mut self, rs: &mut RenderState) -> Result<()> {
        self.delete_program(rs)?;
        self.delete_stages(rs)?;
        self.uniforms.clear();
        self.attributes.clear();
        self.textures.clear();
        Ok(())
    }

    fn delete_program(&mut self, rs: &mut RenderState) -> Result<()> {
        if let Some(program) = self.program.take() {
            unsafe { rs.visitor().delete_program(program)? };
        }

        Ok(())
    }

    fn delete_stages(&mut self, rs: &mut RenderState) -> Result<()> {
        let stages = ::std::mem::replace(&mut self.stages, BTreeMap::new());
        for (_, v) in stages {
            unsafe { rs.visitor().delete_stage(v)? };
        }

        Ok(())
    }
}

fn strip_stage_prefix(name: &str) -> &str {
    if let Some(pos) = name.find('_') {
        let prefix = &name[..pos];
        if prefix == "in" || prefix == "out" || Stage::from_prefix(prefix).is_some() {
            return &name[pos + 1..];
        }
    }

    name
}

fn base_name(variable: &ActiveVariable, prefixes: &[&str]) -> String {
    let name = variable.name.trim_end_matches("[0]");
    let name = prefixes
        .iter()
        .find(|v| name.starts_with(*v))
        .map(|v| &name[v.len()..])
        .unwrap_or(name);

    name.to_owned()
}

fn register(table: &mut HashMap<String, i32>, name: &str, prefixes: &[&str], location: i32) {
    table.insert(name.to_owned(), location);
    for v in prefixes {
        table.insert(format!("{}{}", v, name), location);
    }
}
