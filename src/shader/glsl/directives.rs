//! Line based evaluation of pre-processor directives.
//!
//! The GLSL compiler only understands a subset of what effect files use, so
//! conditionals, loops, includes and `${NAME}` substitutions are resolved
//! here. Plain `#define`/`#undef` lines are tracked and kept in the output so
//! the compiler sees the same macros.

use std::collections::BTreeMap;

use super::expression;
use super::includer::Includer;

/// Bounds nested includes, which would otherwise recurse forever on cycles.
pub const MAX_INCLUDE_DEPTH: usize = 32;

const MAX_SUBSTITUTIONS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Branch {
    enclosing: bool,
    taken: bool,
    active: bool,
}

pub struct DirectiveProcessor<'a> {
    includer: &'a mut Includer,
    functions: &'a BTreeMap<String, String>,
    defines: BTreeMap<String, String>,
    branches: Vec<Branch>,
    output: Vec<String>,
    was_empty: bool,
    version: u32,
    depth: usize,
}

impl<'a> DirectiveProcessor<'a> {
    pub fn new(includer: &'a mut Includer, functions: &'a BTreeMap<String, String>) -> Self {
        DirectiveProcessor {
            includer,
            functions,
            defines: BTreeMap::new(),
            branches: Vec::new(),
            output: Vec::new(),
            was_empty: true,
            version: 0,
            depth: 0,
        }
    }

    /// The highest `#version` seen so far, or 0.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Macros defined at the end of the last processed source.
    #[inline]
    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }

    /// Expands `source`. Defines and the version carry over between calls,
    /// branches and empty-line tracking do not.
    pub fn process(&mut self, source: &str) -> String {
        self.branches.clear();
        self.output.clear();
        self.was_empty = true;

        let lines = join_continued(source);
        self.process_lines(&lines);

        if !self.branches.is_empty() {
            warn!("{} unterminated #if blocks.", self.branches.len());
            self.branches.clear();
        }

        let mut text = self.output.join("\n");
        text.push('\n');
        text
    }

    fn is_active(&self) -> bool {
        self.branches.last().map(|v| v.active).unwrap_or(true)
    }

    fn emit(&mut self, line: String) {
        let empty = line.trim().is_empty();
        if empty && self.was_empty {
            return;
        }

        self.was_empty = empty;
        self.output.push(line);
    }

    fn process_lines(&mut self, lines: &[String]) {
        let mut cursor = 0;
        while cursor < lines.len() {
            let line = &lines[cursor];
            cursor += 1;

            let (directive, args) = match split_directive(line) {
                Some(v) => v,
                None => {
                    if self.is_active() {
                        let line = self.substitute(line);
                        self.emit(line);
                    }
                    continue;
                }
            };

            match directive {
                "for" => {
                    let end = find_endfor(lines, cursor);
                    if self.is_active() {
                        let args = self.substitute(args);
                        self.expand_for(&args, &lines[cursor..end]);
                    }

                    cursor = (end + 1).min(lines.len());
                }
                "endfor" => warn!("#endfor without a matching #for."),
                "if" | "ifdef" | "ifndef" => {
                    let enclosing = self.is_active();
                    let active = enclosing && {
                        let args = self.substitute(args);
                        let v = expression::evaluate(&args, &self.defines);
                        if directive == "ifndef" {
                            !v
                        } else {
                            v
                        }
                    };

                    self.branches.push(Branch {
                        enclosing,
                        taken: active,
                        active,
                    });
                }
                "elif" => match self.branches.last().cloned() {
                    Some(branch) => {
                        let active = branch.enclosing
                            && !branch.taken
                            && expression::evaluate(&self.substitute(args), &self.defines);

                        if let Some(v) = self.branches.last_mut() {
                            v.active = active;
                            v.taken |= active;
                        }
                    }
                    None => warn!("#elif without a matching #if."),
                },
                "else" => match self.branches.last_mut() {
                    Some(v) => {
                        v.active = v.enclosing && !v.taken;
                        v.taken = true;
                    }
                    None => warn!("#else without a matching #if."),
                },
                "endif" => {
                    if self.branches.pop().is_none() {
                        warn!("#endif without a matching #if.");
                    }
                }
                _ if !self.is_active() => {}
                "include" => self.include(args),
                "define" => {
                    let line = self.substitute(line);
                    if let Some((_, args)) = split_directive(&line) {
                        let (name, value) = split_define(args);
                        self.defines.insert(name, value);
                    }

                    self.emit(line);
                }
                "undef" => {
                    self.defines.remove(args.trim());
                    self.emit(line.clone());
                }
                "version" => {
                    let v = args
                        .split_whitespace()
                        .next()
                        .and_then(|v| v.parse::<u32>().ok());

                    match v {
                        Some(v) => self.version = self.version.max(v),
                        None => warn!("Malformed #version directive '{}'.", args),
                    }
                }
                "line" => {}
                _ => {
                    let line = self.substitute(line);
                    self.emit(line);
                }
            }
        }
    }

    fn expand_for(&mut self, args: &str, body: &[String]) {
        let mut tokens = args.split_whitespace();
        let (variable, count) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(variable), Some("to"), Some(count)) => (variable.to_owned(), count),
            _ => {
                self.emit(format!("#error malformed #for {}", args));
                return;
            }
        };

        let count = self.resolve(count);
        let count = match count.parse::<usize>() {
            Ok(v) => v,
            Err(_) => {
                self.emit(format!("#error {} is not a number", count));
                return;
            }
        };

        let previous = self.defines.get(&variable).cloned();
        for i in 0..count {
            self.defines.insert(variable.clone(), i.to_string());
            self.process_lines(body);
        }

        match previous {
            Some(v) => self.defines.insert(variable, v),
            None => self.defines.remove(&variable),
        };
    }

    fn include(&mut self, args: &str) {
        let key = self.substitute(args);
        let key = key.trim().trim_matches(|c| c == '"' || c == '<' || c == '>');

        if self.depth >= MAX_INCLUDE_DEPTH {
            warn!("Include depth exceeded while including '{}'.", key);
            self.emit(format!("// #warning include depth exceeded for {}", key));
            return;
        }

        let text = match self.functions.get(key) {
            Some(v) => v.clone(),
            None => match self.includer.include(key) {
                Ok(v) => v,
                Err(err) => {
                    warn!("{}", err);
                    self.emit(format!("// #warning unable to include {}", key));
                    return;
                }
            },
        };

        self.depth += 1;
        let lines = join_continued(&text);
        self.process_lines(&lines);
        self.depth -= 1;
    }

    /// Follows defines naming other defines.
    fn resolve(&self, name: &str) -> String {
        let mut current = name.to_owned();
        for _ in 0..MAX_SUBSTITUTIONS {
            match self.defines.get(&current) {
                Some(next) if *next != current => current = next.clone(),
                _ => break,
            }
        }
        current
    }

    /// Replaces `${NAME}` with the value of `NAME`. Substituted values are
    /// scanned again, unknown names are left in place.
    fn substitute(&self, line: &str) -> String {
        let mut text = line.to_owned();

        for _ in 0..MAX_SUBSTITUTIONS {
            let mut changed = false;
            let mut result = String::with_capacity(text.len());
            let mut rest = text.as_str();

            while let Some(start) = rest.find("${") {
                let end = match rest[start..].find('}') {
                    Some(v) => start + v,
                    None => break,
                };

                result.push_str(&rest[..start]);
                let name = &rest[start + 2..end];
                match self.defines.get(name) {
                    Some(v) => {
                        result.push_str(v);
                        changed = true;
                    }
                    None => result.push_str(&rest[start..=end]),
                }

                rest = &rest[end + 1..];
            }

            result.push_str(rest);
            text = result;

            if !changed {
                break;
            }
        }

        text
    }
}

/// Merges lines ending with `\` into their successor, keeping the break.
fn join_continued(source: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut continued = String::new();

    for line in source.lines() {
        if line.trim_end().ends_with('\\') {
            continued.push_str(line);
            continued.push('\n');
            continue;
        }

        if continued.is_empty() {
            lines.push(line.to_owned());
        } else {
            continued.push_str(line);
            lines.push(::std::mem::replace(&mut continued, String::new()));
        }
    }

    if !continued.is_empty() {
        lines.push(continued);
    }

    lines
}

fn split_directive(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if !line.starts_with('#') {
        return None;
    }

    let line = line[1..].trim_start();
    let end = line
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or_else(|| line.len());

    Some((&line[..end], line[end..].trim()))
}

fn split_define(args: &str) -> (String, String) {
    let end = args
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or_else(|| args.len());

    let value = args[end..].trim();
    let value = if value.is_empty() || value.starts_with('(') {
        "1"
    } else {
        value
    };

    (args[..end].to_owned(), value.to_owned())
}

fn find_endfor(lines: &[String], from: usize) -> usize {
    let mut depth = 0;
    for (i, line) in lines.iter().enumerate().skip(from) {
        match split_directive(line) {
            Some(("for", _)) => depth += 1,
            Some(("endfor", _)) if depth == 0 => return i,
            Some(("endfor", _)) => depth -= 1,
            _ => {}
        }
    }

    warn!("#for without a matching #endfor.");
    lines.len()
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(includer: &mut Includer, source: &str) -> String {
        let functions = BTreeMap::new();
        let mut processor = DirectiveProcessor::new(includer, &functions);
        processor.process(source)
    }

    fn lines(text: &str) -> Vec<&str> {
        text.lines().map(|v| v.trim()).collect()
    }

    #[test]
    fn conditionals() {
        let mut includer = Includer::new();
        let source = "
#define LIGHTS 2
#if LIGHTS > 1
many
#elif LIGHTS == 1
one
#else
none
#endif
#ifdef SHADOWS
shadows
#else
no_shadows
#endif
#ifndef SHADOWS
#if 0
hidden
#endif
plain
#endif
";

        let out = run(&mut includer, source);
        assert_eq!(
            lines(&out),
            vec!["#define LIGHTS 2", "many", "no_shadows", "plain"]
        );
    }

    #[test]
    fn nested_inactive() {
        let mut includer = Includer::new();
        let source = "
#if 0
#if 1
a
#else
b
#endif
#define X 1
#else
c
#endif
#ifdef X
d
#endif
";

        let out = run(&mut includer, source);
        assert_eq!(lines(&out), vec!["c"]);
    }

    #[test]
    fn loops() {
        let mut includer = Includer::new();
        let source = "
#define NUM_LIGHTS 3
#for I to NUM_LIGHTS
light${I}();
#endfor
#for J to BROKEN
x
#endfor
";

        let out = run(&mut includer, source);
        assert_eq!(
            lines(&out),
            vec![
                "#define NUM_LIGHTS 3",
                "light0();",
                "light1();",
                "light2();",
                "#error BROKEN is not a number",
            ]
        );
    }

    #[test]
    fn nested_loops() {
        let mut includer = Includer::new();
        let source = "
#for I to 2
#for J to 2
m${I}${J}
#endfor
#endfor
";

        let out = run(&mut includer, source);
        assert_eq!(lines(&out), vec!["m00", "m01", "m10", "m11"]);
    }

    #[test]
    fn includes() {
        let mut includer = Includer::new();
        includer.add_source("lib", "-- a\nfrom_a\n#include lib.b\n-- b\nfrom_b\n");

        let mut functions = BTreeMap::new();
        functions.insert("fn.custom".to_owned(), "custom()".to_owned());

        let out = {
            let mut processor = DirectiveProcessor::new(&mut includer, &functions);
            processor.process("#include lib.a\n#include fn.custom\n#include lib.missing\n")
        };

        assert_eq!(
            lines(&out),
            vec![
                "from_a",
                "from_b",
                "custom()",
                "// #warning unable to include lib.missing",
            ]
        );
    }

    #[test]
    fn recursive_include() {
        let mut includer = Includer::new();
        includer.add_source("loop", "-- a\n#include loop.a\n");

        let out = run(&mut includer, "#include loop.a\n");
        assert!(out.contains("include depth exceeded"));
    }

    #[test]
    fn text() {
        let mut includer = Includer::new();
        let source = "


#version 150
#line 12
#define NAME value
#define MACRO(a) \\
  (a * 2)
${NAME}


x
#version 400 core
";

        let functions = BTreeMap::new();
        let mut processor = DirectiveProcessor::new(&mut includer, &functions);
        let out = processor.process(source);

        assert_eq!(processor.version(), 400);
        assert_eq!(
            out,
            "#define NAME value\n#define MACRO(a) \\\n  (a * 2)\nvalue\n\nx\n"
        );
        assert_eq!(processor.defines()["MACRO"], "1");
    }
}
