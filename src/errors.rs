use std::path::PathBuf;

use crate::video::Stage;

pub type Result<T> = ::std::result::Result<T, ::failure::Error>;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "OpenGL implementation doesn't support {}.", _0)]
    ExtensionUnsupported(String),
    #[fail(
        display = "Invalid frustum, the near plane {} must be closer than the far plane {}.",
        near, far
    )]
    InvalidFrustum { near: f32, far: f32 },
    #[fail(display = "Invalid projection, {}.", _0)]
    InvalidProjection(String),
    #[fail(display = "File {:?} not found.", _0)]
    FileNotFound(PathBuf),
    #[fail(display = "IO: {}", _0)]
    Io(String),
    #[fail(display = "[GL] {}", _0)]
    Backend(String),
    #[fail(display = "Can not resolve include key '{}'.", _0)]
    IncludeUnresolved(String),
    #[fail(display = "Effect '{}' has no usable {} stage.", effect, stage)]
    MissingStage { effect: String, stage: Stage },
    #[fail(
        display = "Shader input '{}' holds {} values, but {} was requested.",
        name, expected, found
    )]
    InputMismatch {
        name: String,
        expected: String,
        found: String,
    },
    #[fail(
        display = "Element {} is out of bounds of shader input '{}' with {} elements.",
        index, name, len
    )]
    InputOutOfBounds {
        name: String,
        index: usize,
        len: usize,
    },
    #[fail(display = "State '{}' is already enabled in this traversal.", _0)]
    StateAlreadyEnabled(String),
    #[fail(display = "{} is invalid.", _0)]
    HandleInvalid(String),
    #[fail(display = "Settings: {}", _0)]
    Settings(String),
}

impl From<::std::io::Error> for Error {
    fn from(err: ::std::io::Error) -> Error {
        Error::Io(format!("{}", err))
    }
}

impl From<::serde_json::Error> for Error {
    fn from(err: ::serde_json::Error) -> Error {
        Error::Settings(format!("{}", err))
    }
}
