pub use crate::errors::{Error, Result};
pub use crate::settings::{AnimationParams, GlslParams, RenderParams, Settings, Synchronization};

pub use crate::video::prelude::*;
pub use crate::shader::prelude::*;
pub use crate::states::prelude::*;
pub use crate::animation::prelude::*;

pub use crate::camera::{Camera, Projection};
pub use crate::loader::{NodeProcessor, ProcessorRegistry, SceneInput, StateProcessor};
pub use crate::physics::{ModelMatrixMotionState, MotionState};
pub use crate::utils::prelude::*;

pub use cgmath;
pub use cgmath::{Deg, Matrix4, Point3, Rad, Vector3};
