//! Strata composes the OpenGL state of a renderer out of small, reusable
//! states.
//!
//! A scene is a tree of `StateNode`s. Every node carries a `State`, which
//! changes a slice of the GL pipeline when it is enabled and contributes
//! shader inputs, defines and functions to the program generated for the
//! nodes below it. The pipeline state itself lives in the `RenderState` of
//! one context as a set of value stacks, so that disabling a state restores
//! whatever the enclosing states had set.
//!
//! ```rust,ignore
//! let (mut rs, _) = RenderState::headless(&settings.render)?;
//! let root = loader.load(&SceneInput::from_json(text)?)?;
//! root.traverse(&mut rs)?;
//! ```

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate lazy_static;

#[cfg(not(target_arch = "wasm32"))]
extern crate gl;

extern crate byteorder;
pub extern crate cgmath;
extern crate regex;
extern crate serde_json;
extern crate smallvec;

#[macro_use]
pub mod utils;
pub mod errors;
pub mod settings;

pub mod video;
pub mod shader;
pub mod states;

pub mod animation;
pub mod camera;
pub mod loader;
pub mod physics;

pub mod prelude;
