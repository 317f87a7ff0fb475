//! Generation of per-stage GLSL sources from an effect key and a
//! `StateConfig`.
//!
//! For every stage the generator builds a small prelude of `#define` lines
//! from the configuration, appends either `#include <effect>.<prefix>` or an
//! explicitly supplied source, and runs the result through the
//! `DirectiveProcessor`. Stages that do not resolve, or that end up without a
//! `main` function, are dropped. All surviving stages share one `#version`,
//! the highest one requested by the configuration or the sources.

pub mod directives;
pub mod expression;
pub mod includer;

pub use self::directives::DirectiveProcessor;
pub use self::includer::Includer;

use std::collections::BTreeMap;

use regex::Regex;

use crate::errors::*;
use crate::shader::config::StateConfig;
use crate::video::types::Stage;

lazy_static! {
    static ref MAIN: Regex = Regex::new(r"\bvoid\s+main\s*\(").unwrap();
}

/// Renders defines as pre-processor lines. `TRUE` becomes a bare define and
/// `FALSE` a commented out `#undef`.
pub fn define_header<'a, I>(defines: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut header = String::new();
    for (name, value) in defines {
        match value.as_str() {
            "TRUE" => header.push_str(&format!("#define {}\n", name)),
            "FALSE" => header.push_str(&format!("// #undef {}\n", name)),
            _ => header.push_str(&format!("#define {} {}\n", name, value)),
        }
    }

    header
}

/// The define that removes `stage` from generated programs.
pub fn ignore_define(stage: Stage) -> String {
    format!("IGNORE_{}", stage.prefix().to_uppercase())
}

pub struct PreProcessor<'a> {
    includer: &'a mut Includer,
    version: u32,
}

impl<'a> PreProcessor<'a> {
    /// Creates a generator whose output never goes below `version`.
    pub fn new(includer: &'a mut Includer, version: u32) -> Self {
        PreProcessor { includer, version }
    }

    /// Generates the stage sources of `effect`.
    ///
    /// `overrides` replaces the source of individual stages. An override is
    /// treated as an include key if it resolves, and as GLSL code otherwise.
    ///
    /// Fails with `MissingStage` if the vertex or fragment stage is missing.
    /// The fragment stage may be absent if the configuration captures
    /// transform feedback, and both are optional for compute programs.
    pub fn process(
        &mut self,
        effect: &str,
        cfg: &StateConfig,
        overrides: &BTreeMap<Stage, String>,
    ) -> Result<BTreeMap<Stage, String>> {
        let header = define_header(cfg.defines());
        let mut version = self.version.max(cfg.version());
        let mut stages = BTreeMap::new();

        for &stage in Stage::ALL.iter() {
            match cfg.define_value(&ignore_define(stage)) {
                None | Some("0") | Some("FALSE") => {}
                Some(_) => {
                    debug!("Ignoring {} stage of '{}'.", stage, effect);
                    continue;
                }
            }

            let body = match overrides.get(&stage) {
                Some(v) if self.includer.is_key_valid(v) => format!("#include {}", v),
                Some(v) => v.clone(),
                None => {
                    let key = format!("{}.{}", effect, stage.prefix());
                    if !self.includer.is_key_valid(&key) {
                        continue;
                    }

                    format!("#include {}", key)
                }
            };

            let source = format!(
                "#define SHADER_STAGE {}\n{}{}\n",
                stage.prefix(),
                header,
                body
            );

            let mut processor = DirectiveProcessor::new(&mut *self.includer, cfg.functions());
            let code = processor.process(&source);
            version = version.max(processor.version());

            if !MAIN.is_match(&code) {
                debug!("Dropping {} stage of '{}' without main.", stage, effect);
                continue;
            }

            stages.insert(stage, code);
        }

        if !stages.contains_key(&Stage::Compute) {
            if !stages.contains_key(&Stage::Vertex) {
                return Err(Error::MissingStage {
                    effect: effect.to_owned(),
                    stage: Stage::Vertex,
                }
                .into());
            }

            if !stages.contains_key(&Stage::Fragment) && cfg.feedback_attributes().is_empty() {
                return Err(Error::MissingStage {
                    effect: effect.to_owned(),
                    stage: Stage::Fragment,
                }
                .into());
            }
        }

        for v in stages.values_mut() {
            v.insert_str(0, &format!("#version {}\n", version));
        }

        Ok(stages)
    }
}
