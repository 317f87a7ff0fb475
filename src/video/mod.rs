//! Everything that talks to the GL context.
//!
//! The `backends` carry out the actual calls, `RenderState` keeps the pipeline
//! state of one context as a set of value stacks, and `GLObject` owns native
//! objects until the render state collects them.

pub mod backends;
pub mod objects;
pub mod render_state;
pub mod types;

pub use self::objects::{GLObject, GLObjectHandle};
pub use self::render_state::{RenderState, StackRef};
pub use self::types::*;

pub mod prelude {
    pub use super::backends::headless::{GLSnapshot, HeadlessProbe, HeadlessVisitor};
    pub use super::backends::Visitor;
    pub use super::objects::{GLObject, GLObjectHandle};
    pub use super::render_state::RenderState;
    pub use super::types::*;
}
