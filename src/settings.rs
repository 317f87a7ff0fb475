//! Functions for loading engine settings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::*;

/// A structure containing configuration data for the engine core. Every
/// subsystem consumes its own group of parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub glsl: GlslParams,
    pub render: RenderParams,
    pub animation: AnimationParams,
}

impl Settings {
    /// Parses settings from a JSON document. Missing fields fall back to their
    /// defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let settings = ::serde_json::from_str(text).map_err(Error::from)?;
        Ok(settings)
    }

    /// Loads settings from a JSON file on disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_owned()).into());
        }

        let text = fs::read_to_string(path).map_err(Error::from)?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlslParams {
    /// Directories searched, in order, when resolving include keys.
    pub include_paths: Vec<PathBuf>,
    /// The minimum GLSL version of generated programs.
    pub version: u32,
}

impl Default for GlslParams {
    fn default() -> Self {
        GlslParams {
            include_paths: Vec::new(),
            version: 330,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Number of texture units that could be bound at once.
    pub max_texture_units: u32,
    /// The initial size of the default framebuffer.
    pub dimensions: (u32, u32),
}

impl Default for RenderParams {
    fn default() -> Self {
        RenderParams {
            max_texture_units: 16,
            dimensions: (640, 480),
        }
    }
}

/// How the background animation thread is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Synchronization {
    /// Every animation step waits for a rendered frame, and every rendered frame
    /// waits for the step it triggered.
    Lockstep,
    /// The animation thread runs at its own cadence.
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationParams {
    pub synchronization: Synchronization,
    /// The cadence of free running animations, in milliseconds.
    pub step_interval_ms: u64,
    /// How long the thread sleeps between polls while idle or paused.
    pub idle_sleep_ms: u64,
    pub start_paused: bool,
}

impl AnimationParams {
    #[inline]
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    #[inline]
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

impl Default for AnimationParams {
    fn default() -> Self {
        AnimationParams {
            synchronization: Synchronization::Free,
            step_interval_ms: 16,
            idle_sleep_ms: 10,
            start_paused: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_json() {
        let settings = Settings::from_json(
            r#"{ "glsl": { "include_paths": ["shaders"] },
                 "animation": { "synchronization": "Lockstep" } }"#,
        )
        .unwrap();

        assert_eq!(settings.glsl.include_paths, vec![PathBuf::from("shaders")]);
        assert_eq!(settings.glsl.version, 330);
        assert_eq!(settings.animation.synchronization, Synchronization::Lockstep);
        assert_eq!(settings.render, RenderParams::default());
    }

    #[test]
    fn malformed() {
        let err = Settings::from_json("{ glsl: 1").unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::Settings(_)) => {}
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn missing_file() {
        let err = Settings::load("/definitely/not/here.json").unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::FileNotFound(_)) => {}
            other => panic!("unexpected error {:?}", other),
        }
    }
}
