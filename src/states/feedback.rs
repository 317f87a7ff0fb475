use std::cell::RefCell;
use std::sync::Arc;

use crate::errors::*;
use crate::shader::config::StateConfig;
use crate::shader::input::ShaderInput;
use crate::video::types::{BufferTarget, FeedbackMode, FeedbackPrimitive, ObjectName, Stage};
use crate::video::RenderState;

use super::state::{State, StateEffect};

/// Captures outputs of a shader stage into a buffer with transform feedback.
///
/// Configuring a program with this state declares the captured attributes,
/// and enabling it binds the feedback buffer and begins capturing until it is
/// disabled again.
#[derive(Debug)]
pub struct FeedbackState {
    primitive: FeedbackPrimitive,
    mode: FeedbackMode,
    stage: Stage,
    buffer: Option<ObjectName>,
    attributes: RefCell<Vec<Arc<ShaderInput>>>,
}

impl FeedbackState {
    pub fn new(primitive: FeedbackPrimitive) -> Self {
        FeedbackState {
            primitive,
            mode: FeedbackMode::Separate,
            stage: Stage::Vertex,
            buffer: None,
            attributes: RefCell::new(Vec::new()),
        }
    }

    pub fn with_mode(mut self, mode: FeedbackMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the stage whose outputs are captured.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Sets the buffer bound to the feedback target while enabled.
    pub fn with_buffer(mut self, buffer: ObjectName) -> Self {
        self.buffer = Some(buffer);
        self
    }

    #[inline]
    pub fn primitive(&self) -> FeedbackPrimitive {
        self.primitive
    }

    #[inline]
    pub fn mode(&self) -> FeedbackMode {
        self.mode
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Captures the output named like `input`. An attribute with the same name
    /// is replaced.
    pub fn add_feedback(&self, input: Arc<ShaderInput>) {
        let mut attributes = self.attributes.borrow_mut();
        attributes.retain(|v| v.name() != input.name());
        attributes.push(input);
    }

    pub fn remove_feedback(&self, name: &str) {
        self.attributes.borrow_mut().retain(|v| v.name() != name);
    }

    pub fn has_feedback(&self, name: &str) -> bool {
        self.attributes.borrow().iter().any(|v| v.name() == name)
    }

    pub fn feedback(&self, name: &str) -> Option<Arc<ShaderInput>> {
        self.attributes
            .borrow()
            .iter()
            .find(|v| v.name() == name)
            .cloned()
    }

    /// Bytes needed to capture every attribute.
    pub fn required_buffer_size(&self) -> usize {
        self.attributes
            .borrow()
            .iter()
            .map(|v| v.len() * v.format().size())
            .sum()
    }
}

impl StateEffect for FeedbackState {
    fn enable(&self, rs: &mut RenderState) -> Result<()> {
        if let Some(buffer) = self.buffer {
            rs.buffer(BufferTarget::TransformFeedback).push(buffer)?;
        }

        if let Err(err) = rs.begin_feedback(self.primitive) {
            if self.buffer.is_some() {
                rs.buffer(BufferTarget::TransformFeedback).pop()?;
            }

            return Err(err);
        }

        Ok(())
    }

    fn disable(&self, rs: &mut RenderState) -> Result<()> {
        let result = rs.end_feedback();
        if self.buffer.is_some() {
            rs.buffer(BufferTarget::TransformFeedback).pop()?;
        }

        result
    }

    fn configure(&self, _: &State, cfg: &mut StateConfig) {
        cfg.set_feedback_mode(self.mode);
        cfg.set_feedback_stage(self.stage);
        for v in self.attributes.borrow().iter() {
            cfg.add_feedback_attribute(v.name());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::RenderParams;
    use std::rc::Rc;

    #[test]
    fn nesting() {
        let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();

        let outer = Rc::new(FeedbackState::new(FeedbackPrimitive::Points).with_buffer(3));
        outer.add_feedback(ShaderInput::vertex("pos", &[[0.0f32; 3]; 4]));
        outer.add_feedback(ShaderInput::vertex("pos", &[[0.0f32; 4]; 4]));
        assert_eq!(outer.required_buffer_size(), 64);

        let state = State::with_effect("outer", outer.clone());
        state.join_states(&State::with_effect(
            "inner",
            FeedbackState::new(FeedbackPrimitive::Points),
        ));

        state.activate(&mut rs).unwrap();
        assert!(rs.is_feedback_active());
        assert_eq!(probe.snapshot().feedback, Some(FeedbackPrimitive::Points));
        assert_eq!(probe.snapshot().buffers[&BufferTarget::TransformFeedback], 3);

        state.deactivate(&mut rs).unwrap();
        assert!(!rs.is_feedback_active());
        assert_eq!(probe.snapshot().feedback, None);
        assert_eq!(probe.snapshot().buffers[&BufferTarget::TransformFeedback], 0);

        let begins = probe.calls().iter().filter(|v| v.starts_with("begin_feedback")).count();
        assert_eq!(begins, 1);

        let cfg = StateConfig::from_state(&state);
        assert_eq!(cfg.feedback_attributes(), &["pos".to_owned()]);
    }
}
