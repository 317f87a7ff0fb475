//! The coupling point to a rigid body simulation.
//!
//! The simulation only sees `MotionState`: it reads the initial transform of
//! a body and writes back every transform it computes. The renderer reads the
//! same transform through the model matrix input of the body's state.

use std::sync::Arc;

use cgmath::prelude::*;
use cgmath::Matrix4;

use crate::errors::*;
use crate::shader::input::ShaderInput;

pub trait MotionState {
    fn world_transform(&self) -> Result<Matrix4<f32>>;
    fn set_world_transform(&mut self, transform: Matrix4<f32>) -> Result<()>;
}

/// Stores transforms in a `Mat4` shader input, either in a uniform or in one
/// slot of an instanced attribute.
#[derive(Debug, Clone)]
pub struct ModelMatrixMotionState {
    model: Arc<ShaderInput>,
    index: usize,
}

impl ModelMatrixMotionState {
    /// Writes to element `index` of `model`. Fails if `model` does not hold
    /// `Mat4` values or has no such element.
    pub fn new(model: Arc<ShaderInput>, index: usize) -> Result<Self> {
        let _: Matrix4<f32> = model.element(index)?;
        Ok(ModelMatrixMotionState { model, index })
    }

    /// Creates a motion state backed by a fresh `modelMatrix` uniform.
    pub fn uniform(transform: Matrix4<f32>) -> Self {
        ModelMatrixMotionState {
            model: ShaderInput::uniform("modelMatrix", transform),
            index: 0,
        }
    }

    #[inline]
    pub fn model(&self) -> &Arc<ShaderInput> {
        &self.model
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Default for ModelMatrixMotionState {
    fn default() -> Self {
        ModelMatrixMotionState::uniform(Matrix4::identity())
    }
}

impl MotionState for ModelMatrixMotionState {
    fn world_transform(&self) -> Result<Matrix4<f32>> {
        self.model.element(self.index)
    }

    fn set_world_transform(&mut self, transform: Matrix4<f32>) -> Result<()> {
        self.model.set_element(self.index, transform)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cgmath::Vector3;

    #[test]
    fn instanced_slot() {
        let identity = Matrix4::<f32>::identity();
        let model = ShaderInput::instanced("modelMatrix", &[identity; 3], 1);

        let mut motion = ModelMatrixMotionState::new(model.clone(), 2).unwrap();
        let stamp = model.stamp();

        let moved = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        motion.set_world_transform(moved).unwrap();

        assert!(model.stamp() > stamp);
        assert_eq!(motion.world_transform().unwrap(), moved);
        assert_eq!(model.element::<Matrix4<f32>>(0).unwrap(), identity);

        assert!(ModelMatrixMotionState::new(model.clone(), 3).is_err());
        assert!(ModelMatrixMotionState::new(ShaderInput::uniform("x", 1.0f32), 0).is_err());
    }
}
