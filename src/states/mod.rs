//! Composable states and the scene tree that drives them.
//!
//! A `State` bundles GL state changes with the shader contributions they
//! imply. States are composed by joining them, and `StateNode`s arrange them
//! into a tree that is traversed depth first once per frame:
//!
//! ```rust,ignore
//! let root = StateNode::new(depth_state(Comparison::LessOrEqual, true));
//! root.add_child(&StateNode::new(blend_state(BlendMode::Alpha)))?;
//! root.traverse(&mut rs)?;
//! ```

pub mod atomic;
pub mod feedback;
pub mod node;
pub mod state;
pub mod texture;

pub use self::atomic::{blend_state, cull_state, depth_state, BlendMode};
pub use self::feedback::FeedbackState;
pub use self::node::StateNode;
pub use self::state::{Composition, State, StateEffect, StateId};
pub use self::texture::TextureState;

pub mod prelude {
    pub use super::atomic::*;
    pub use super::{Composition, FeedbackState, State, StateEffect, StateId, StateNode};
    pub use super::TextureState;
}
