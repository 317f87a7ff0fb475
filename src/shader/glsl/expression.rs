//! Evaluation of `#if` conditions against a set of defines.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Atom(String),
    Op(&'static str),
    Open,
    Close,
}

const OPERATORS: [&str; 9] = ["==", "!=", "<=", ">=", "&&", "||", "<", ">", "!"];

fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = expr.trim();

    'outer: while !rest.is_empty() {
        let c = rest.chars().next().unwrap_or(' ');

        if c.is_whitespace() {
            rest = rest.trim_start();
            continue;
        }

        if c == '(' {
            tokens.push(Token::Open);
            rest = &rest[1..];
            continue;
        }

        if c == ')' {
            tokens.push(Token::Close);
            rest = &rest[1..];
            continue;
        }

        for op in OPERATORS.iter() {
            if rest.starts_with(op) {
                tokens.push(Token::Op(op));
                rest = &rest[op.len()..];
                continue 'outer;
            }
        }

        let end = rest
            .find(|c: char| c.is_whitespace() || "()=!<>&|".contains(c))
            .unwrap_or_else(|| rest.len());
        // A lone '=', '&' or '|' is not an operator we know of.
        let end = if end == 0 { 1 } else { end };
        tokens.push(Token::Atom(rest[..end].to_owned()));
        rest = &rest[end..];
    }

    tokens
}

#[derive(Debug, Clone)]
enum Value {
    Atom(String),
    Bool(bool),
}

struct Parser<'a> {
    tokens: Vec<Token>,
    cursor: usize,
    defines: &'a BTreeMap<String, String>,
}

/// Bounds the lookup of defines that name other defines.
const MAX_RESOLVE_DEPTH: usize = 16;

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<Token> {
        let v = self.tokens.get(self.cursor).cloned();
        self.cursor += 1;
        v
    }

    fn or(&mut self) -> bool {
        let mut v = self.and();
        while self.peek() == Some(&Token::Op("||")) {
            self.cursor += 1;
            let rhs = self.and();
            v = v || rhs;
        }
        v
    }

    fn and(&mut self) -> bool {
        let mut v = self.unary();
        while self.peek() == Some(&Token::Op("&&")) {
            self.cursor += 1;
            let rhs = self.unary();
            v = v && rhs;
        }
        v
    }

    fn unary(&mut self) -> bool {
        if self.peek() == Some(&Token::Op("!")) {
            self.cursor += 1;
            return !self.unary();
        }

        self.comparison()
    }

    fn comparison(&mut self) -> bool {
        let lhs = self.operand();

        let op = match self.peek() {
            Some(Token::Op(op)) if ["==", "!=", "<", "<=", ">", ">="].contains(op) => *op,
            _ => return self.truth(&lhs),
        };

        self.cursor += 1;
        let rhs = self.operand();

        let lhs = self.resolve(&lhs);
        let rhs = self.resolve(&rhs);

        match op {
            "==" => lhs == rhs,
            "!=" => lhs != rhs,
            _ => match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
                (Ok(a), Ok(b)) => match op {
                    "<" => a < b,
                    "<=" => a <= b,
                    ">" => a > b,
                    _ => a >= b,
                },
                _ => false,
            },
        }
    }

    fn operand(&mut self) -> Value {
        match self.next() {
            Some(Token::Open) => {
                let v = self.or();
                if self.peek() == Some(&Token::Close) {
                    self.cursor += 1;
                }
                Value::Bool(v)
            }
            Some(Token::Atom(ref v)) if v == "defined" => self.defined(),
            Some(Token::Atom(v)) => Value::Atom(v),
            _ => Value::Bool(false),
        }
    }

    fn defined(&mut self) -> Value {
        let bracketed = self.peek() == Some(&Token::Open);
        if bracketed {
            self.cursor += 1;
        }

        let v = match self.next() {
            Some(Token::Atom(name)) => self.defines.contains_key(&name),
            _ => false,
        };

        if bracketed && self.peek() == Some(&Token::Close) {
            self.cursor += 1;
        }

        Value::Bool(v)
    }

    /// Follows defines naming other defines until a literal is reached.
    fn resolve(&self, value: &Value) -> String {
        match *value {
            Value::Bool(v) => if v { "1" } else { "0" }.to_owned(),
            Value::Atom(ref v) => {
                let mut current = v.clone();
                for _ in 0..MAX_RESOLVE_DEPTH {
                    match self.defines.get(&current) {
                        Some(next) if *next != current => current = next.clone(),
                        _ => break,
                    }
                }
                current
            }
        }
    }

    fn truth(&self, value: &Value) -> bool {
        match *value {
            Value::Bool(v) => v,
            Value::Atom(ref v) => {
                if is_number(v) {
                    return is_true(v);
                }

                if !self.defines.contains_key(v) {
                    return false;
                }

                is_true(&self.resolve(value))
            }
        }
    }
}

fn is_number(v: &str) -> bool {
    v.parse::<f64>().is_ok()
}

fn is_true(v: &str) -> bool {
    match v.parse::<f64>() {
        Ok(n) => n != 0.0,
        Err(_) => !(v == "false" || v == "FALSE"),
    }
}

/// Evaluates a pre-processor condition. Undefined names and `0` are false,
/// `==` and `!=` compare the resolved text, the ordering operators compare
/// numerically and are false for anything that is not a number.
pub fn evaluate(expr: &str, defines: &BTreeMap<String, String>) -> bool {
    let mut parser = Parser {
        tokens: tokenize(expr),
        cursor: 0,
        defines,
    };

    parser.or()
}

#[cfg(test)]
mod test {
    use super::*;

    fn defines() -> BTreeMap<String, String> {
        let mut v = BTreeMap::new();
        v.insert("ONE".to_owned(), "1".to_owned());
        v.insert("ZERO".to_owned(), "0".to_owned());
        v.insert("NUM".to_owned(), "4".to_owned());
        v.insert("ALIAS".to_owned(), "NUM".to_owned());
        v.insert("MODE".to_owned(), "phong".to_owned());
        v.insert("OFF".to_owned(), "FALSE".to_owned());
        v
    }

    #[test]
    fn atoms() {
        let defines = defines();
        assert!(evaluate("ONE", &defines));
        assert!(!evaluate("ZERO", &defines));
        assert!(!evaluate("MISSING", &defines));
        assert!(!evaluate("OFF", &defines));
        assert!(evaluate("MODE", &defines));
        assert!(evaluate("2", &defines));
        assert!(!evaluate("0", &defines));
    }

    #[test]
    fn comparisons() {
        let defines = defines();
        assert!(evaluate("NUM == 4", &defines));
        assert!(evaluate("ALIAS == 4", &defines));
        assert!(evaluate("MODE == phong", &defines));
        assert!(evaluate("MODE != gouraud", &defines));
        assert!(evaluate("NUM>3", &defines));
        assert!(evaluate("NUM <= 4", &defines));
        assert!(!evaluate("NUM < 4", &defines));
        assert!(!evaluate("MODE < 4", &defines));
    }

    #[test]
    fn logic() {
        let defines = defines();
        assert!(evaluate("ONE && NUM >= 2", &defines));
        assert!(evaluate("ZERO || ONE", &defines));
        assert!(!evaluate("!ONE", &defines));
        assert!(evaluate("!(ZERO || MISSING) && (NUM == 4)", &defines));
        assert!(evaluate("defined(ZERO) && !defined MISSING", &defines));
    }
}
