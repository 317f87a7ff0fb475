//! Shader inputs, configuration and program generation.
//!
//! The pieces fit together like this: states declare `ShaderInput`s, defines
//! and functions; a `StateConfig` merges them along a node chain; the GLSL
//! `PreProcessor` turns an effect key and the config into stage sources;
//! a `Shader` compiles, links and binds them; and a `ShaderState` puts the
//! program into the state tree.

pub mod config;
pub mod glsl;
pub mod input;
pub mod program;
pub mod state;

pub use self::config::{StateConfig, TextureBinding};
pub use self::glsl::{DirectiveProcessor, Includer, PreProcessor};
pub use self::input::{Cardinality, InputFormat, InputValue, NamedInput, ScalarKind, ShaderInput};
pub use self::program::Shader;
pub use self::state::ShaderState;

pub mod prelude {
    pub use super::{
        Includer, InputFormat, NamedInput, Shader, ShaderInput, ShaderState, StateConfig,
    };
}
