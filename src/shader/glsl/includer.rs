//! Resolves dotted include keys to sections of GLSL files.
//!
//! A key like `lighting.phong.vs` is split into a file key and a section
//! name. The file key is looked up in the in-memory sources first, then in
//! every include path in order, descending one directory per token until a
//! `<token>.glsl` file is found. Files are divided into sections by header
//! lines of the form `-- name`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::errors::*;
use crate::settings::GlslParams;

lazy_static! {
    static ref SECTION: Regex =
        Regex::new(r"(?m)^[ \t]*-- ([a-zA-Z][a-zA-Z0-9_\-\.]*)[ \t]*\r?$").unwrap();
}

#[derive(Debug, Default)]
pub struct Includer {
    include_paths: Vec<PathBuf>,
    sources: HashMap<String, String>,
    sections: HashMap<String, String>,
}

impl Includer {
    pub fn new() -> Self {
        Includer::default()
    }

    pub fn from_params(params: &GlslParams) -> Result<Self> {
        let mut includer = Includer::new();
        for v in &params.include_paths {
            includer.add_include_path(v)?;
        }

        Ok(includer)
    }

    /// Appends a directory to the search list.
    pub fn add_include_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::FileNotFound(path.to_owned()).into());
        }

        if !self.include_paths.iter().any(|v| v == path) {
            self.include_paths.push(path.to_owned());
        }

        Ok(())
    }

    #[inline]
    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    /// Registers an in-memory file. Its sections become available as
    /// `<file_key>.<section>` and shadow files on disk.
    pub fn add_source<K: Into<String>, S: Into<String>>(&mut self, file_key: K, content: S) {
        let file_key = file_key.into();
        let prefix = format!("{}.", file_key);
        self.sections.retain(|k, _| !k.starts_with(&prefix));
        self.sources.insert(file_key, content.into());
    }

    /// Forgets every section loaded so far, so files on disk are read again.
    pub fn clear_cache(&mut self) {
        self.sections.clear();
    }

    /// Checks if `key` looks like an include key and resolves.
    pub fn is_key_valid(&mut self, key: &str) -> bool {
        if key.contains('\n') || key.contains('#') || !key.contains('.') {
            return false;
        }

        self.include(key).is_ok()
    }

    /// Returns the content of the section named by `key`.
    pub fn include(&mut self, key: &str) -> Result<String> {
        if let Some(v) = self.sections.get(key) {
            return Ok(v.clone());
        }

        let tokens: Vec<&str> = key.split('.').collect();
        if tokens.len() < 2 || tokens.iter().any(|v| v.is_empty()) {
            return Err(Error::IncludeUnresolved(key.to_owned()).into());
        }

        if let Some(file_key) = self.find_source(&tokens) {
            let content = self.sources[&file_key].clone();
            self.load_sections(&file_key, &content);
        } else if let Some((file_key, path)) = self.find_file(&tokens) {
            let content = fs::read_to_string(&path).map_err(Error::from)?;
            debug!("Loaded GLSL file {:?} as '{}'.", path, file_key);
            self.load_sections(&file_key, &content);
        }

        match self.sections.get(key) {
            Some(v) => Ok(v.clone()),
            None => Err(Error::IncludeUnresolved(key.to_owned()).into()),
        }
    }

    fn find_source(&self, tokens: &[&str]) -> Option<String> {
        (1..tokens.len())
            .rev()
            .map(|n| tokens[..n].join("."))
            .find(|v| self.sources.contains_key(v))
    }

    fn find_file(&self, tokens: &[&str]) -> Option<(String, PathBuf)> {
        for root in &self.include_paths {
            let mut dir = root.clone();

            // The last token always names a section.
            for (i, token) in tokens[..tokens.len() - 1].iter().enumerate() {
                let file = dir.join(format!("{}.glsl", token));
                if file.is_file() {
                    return Some((tokens[..=i].join("."), file));
                }

                let next = dir.join(token);
                if !next.is_dir() {
                    break;
                }

                dir = next;
            }
        }

        None
    }

    fn load_sections(&mut self, file_key: &str, content: &str) {
        let headers: Vec<_> = SECTION
            .captures_iter(content)
            .filter_map(|v| match (v.get(0), v.get(1)) {
                (Some(all), Some(name)) => Some((all.start(), all.end(), name.as_str())),
                _ => None,
            })
            .collect();

        for (i, &(_, end, name)) in headers.iter().enumerate() {
            let stop = headers
                .get(i + 1)
                .map(|v| v.0)
                .unwrap_or_else(|| content.len());

            let body = content[end..stop].trim_start_matches(|c| c == '\r' || c == '\n');
            self.sections
                .insert(format!("{}.{}", file_key, name), body.to_owned());
        }
    }
}
