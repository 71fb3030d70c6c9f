//! Conditional expressions: the `if="…"` mini-language.
//!
//! A dedicated tokenizer and recursive-descent parser; the host language's
//! evaluator is never involved. The grammar is deliberately closed: literals,
//! dot paths, comparisons, `in`, `and`/`or`/`not`, parentheses. No calls, no
//! arithmetic, no indexing. A dot path that misses resolves to `null`;
//! ordering comparisons demand numbers on both sides (F703).

use serde_json::Value as Json;

use crate::error::{Code, Diagnostic, Pos};

/// Evaluate a conditional expression against the variable scope. An empty
/// expression is vacuously true.
pub fn eval_if(
    expr: &str,
    env: &serde_json::Map<String, Json>,
    pos: Pos,
) -> Result<bool, Diagnostic> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Ok(true);
    }
    let tokens = tokenize(trimmed, pos)?;
    let mut parser = ExprParser {
        toks: &tokens,
        i: 0,
        pos,
    };
    let ast = parser.parse_or()?;
    if parser.i != tokens.len() {
        return Err(Diagnostic::new(
            Code::F705,
            "trailing tokens in conditional expression",
            pos,
        ));
    }
    Ok(truthy(&eval(&ast, env, pos)?))
}

#[derive(Debug, Clone, PartialEq)]
enum ETok {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Path(String),
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Debug)]
enum Expr {
    Lit(Json),
    Path(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
}

fn tokenize(src: &str, pos: Pos) -> Result<Vec<ETok>, Diagnostic> {
    let chars: Vec<char> = src.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                toks.push(ETok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(ETok::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(Diagnostic::new(
                            Code::F705,
                            "unterminated string in conditional expression",
                            pos,
                        ));
                    };
                    if ch == quote {
                        i += 1;
                        break;
                    }
                    if ch == '\\' {
                        i += 1;
                        match chars.get(i) {
                            Some(&e) if e == quote || e == '\\' => {
                                s.push(e);
                                i += 1;
                            }
                            _ => {
                                return Err(Diagnostic::new(
                                    Code::F705,
                                    "invalid escape in conditional expression",
                                    pos,
                                ));
                            }
                        }
                        continue;
                    }
                    s.push(ch);
                    i += 1;
                }
                toks.push(ETok::Str(s));
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                toks.push(ETok::Eq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                toks.push(ETok::Ne);
                i += 2;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(ETok::Le);
                    i += 2;
                } else {
                    toks.push(ETok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(ETok::Ge);
                    i += 2;
                } else {
                    toks.push(ETok::Gt);
                    i += 1;
                }
            }
            '+' | '-' if chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) => {
                let start = i;
                i += 1;
                while chars.get(i).is_some_and(|c| c.is_ascii_digit() || *c == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text.parse().map_err(|_| {
                    Diagnostic::new(Code::F705, format!("invalid number '{}'", text), pos)
                })?;
                toks.push(ETok::Num(n));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|c| c.is_ascii_digit() || matches!(*c, '.' | 'e' | 'E' | '+' | '-'))
                {
                    // Sign characters are only valid directly after an exponent.
                    if matches!(chars[i], '+' | '-')
                        && !matches!(chars.get(i - 1), Some('e') | Some('E'))
                    {
                        break;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text.parse().map_err(|_| {
                    Diagnostic::new(Code::F705, format!("invalid number '{}'", text), pos)
                })?;
                toks.push(ETok::Num(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(*c, '_' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                toks.push(match word.as_str() {
                    "and" => ETok::And,
                    "or" => ETok::Or,
                    "not" => ETok::Not,
                    "in" => ETok::In,
                    "true" => ETok::Bool(true),
                    "false" => ETok::Bool(false),
                    "null" => ETok::Null,
                    _ => ETok::Path(word),
                });
            }
            c => {
                return Err(Diagnostic::new(
                    Code::F705,
                    format!("invalid character '{}' in conditional expression", c),
                    pos,
                ));
            }
        }
    }
    Ok(toks)
}

struct ExprParser<'a> {
    toks: &'a [ETok],
    i: usize,
    pos: Pos,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&ETok> {
        self.toks.get(self.i)
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&ETok::Or) {
            self.i += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_cmp()?;
        while self.peek() == Some(&ETok::And) {
            self.i += 1;
            let right = self.parse_cmp()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> Result<Expr, Diagnostic> {
        let left = self.parse_primary()?;
        let op = match self.peek() {
            Some(ETok::Eq) => CmpOp::Eq,
            Some(ETok::Ne) => CmpOp::Ne,
            Some(ETok::Lt) => CmpOp::Lt,
            Some(ETok::Le) => CmpOp::Le,
            Some(ETok::Gt) => CmpOp::Gt,
            Some(ETok::Ge) => CmpOp::Ge,
            Some(ETok::In) => CmpOp::In,
            _ => return Ok(left),
        };
        self.i += 1;
        let right = self.parse_primary()?;
        Ok(Expr::Cmp(op, Box::new(left), Box::new(right)))
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        match self.peek() {
            Some(ETok::LParen) => {
                self.i += 1;
                let inner = self.parse_or()?;
                if self.peek() != Some(&ETok::RParen) {
                    return Err(Diagnostic::new(
                        Code::F705,
                        "missing closing ')' in conditional expression",
                        self.pos,
                    ));
                }
                self.i += 1;
                Ok(inner)
            }
            Some(ETok::Not) => {
                self.i += 1;
                Ok(Expr::Not(Box::new(self.parse_primary()?)))
            }
            Some(ETok::Str(s)) => {
                let s = s.clone();
                self.i += 1;
                Ok(Expr::Lit(Json::String(s)))
            }
            Some(ETok::Num(n)) => {
                let n = *n;
                self.i += 1;
                Ok(Expr::Lit(json_num(n)))
            }
            Some(ETok::Bool(b)) => {
                let b = *b;
                self.i += 1;
                Ok(Expr::Lit(Json::Bool(b)))
            }
            Some(ETok::Null) => {
                self.i += 1;
                Ok(Expr::Lit(Json::Null))
            }
            Some(ETok::Path(p)) => {
                let p = p.clone();
                self.i += 1;
                Ok(Expr::Path(p))
            }
            _ => Err(Diagnostic::new(
                Code::F705,
                "expected a value in conditional expression",
                self.pos,
            )),
        }
    }
}

fn json_num(n: f64) -> Json {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Json::from(n as i64)
    } else {
        Json::from(n)
    }
}

fn eval(
    expr: &Expr,
    env: &serde_json::Map<String, Json>,
    pos: Pos,
) -> Result<Json, Diagnostic> {
    match expr {
        Expr::Lit(v) => Ok(v.clone()),
        Expr::Path(path) => Ok(resolve_path(env, path)),
        Expr::Not(inner) => Ok(Json::Bool(!truthy(&eval(inner, env, pos)?))),
        Expr::And(a, b) => {
            if !truthy(&eval(a, env, pos)?) {
                return Ok(Json::Bool(false));
            }
            Ok(Json::Bool(truthy(&eval(b, env, pos)?)))
        }
        Expr::Or(a, b) => {
            if truthy(&eval(a, env, pos)?) {
                return Ok(Json::Bool(true));
            }
            Ok(Json::Bool(truthy(&eval(b, env, pos)?)))
        }
        Expr::Cmp(op, a, b) => {
            let left = eval(a, env, pos)?;
            let right = eval(b, env, pos)?;
            compare(*op, &left, &right, pos).map(Json::Bool)
        }
    }
}

/// Resolve a dot path against the scope. A miss anywhere yields `null`.
fn resolve_path(env: &serde_json::Map<String, Json>, path: &str) -> Json {
    let mut parts = path.split('.');
    let first = parts.next().unwrap_or_default();
    let Some(mut cur) = env.get(first) else {
        return Json::Null;
    };
    for part in parts {
        match cur.get(part) {
            Some(next) => cur = next,
            None => return Json::Null,
        }
    }
    cur.clone()
}

fn compare(op: CmpOp, left: &Json, right: &Json, pos: Pos) -> Result<bool, Diagnostic> {
    match op {
        CmpOp::Eq => Ok(json_eq(left, right)),
        CmpOp::Ne => Ok(!json_eq(left, right)),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(Diagnostic::new(
                    Code::F703,
                    "ordering comparison requires numbers on both sides",
                    pos,
                ));
            };
            Ok(match op {
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                _ => unreachable!(),
            })
        }
        CmpOp::In => match right {
            Json::Array(items) => Ok(items.iter().any(|v| json_eq(left, v))),
            Json::String(haystack) => match left {
                Json::String(needle) => Ok(haystack.contains(needle.as_str())),
                _ => Err(Diagnostic::new(
                    Code::F703,
                    "'in' on a string requires a string left operand",
                    pos,
                )),
            },
            _ => Err(Diagnostic::new(
                Code::F703,
                "right operand of 'in' must be a list or string",
                pos,
            )),
        },
    }
}

/// Structural equality with numeric normalization (1 == 1.0).
fn json_eq(a: &Json, b: &Json) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn truthy(v: &Json) -> bool {
    match v {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(a) => !a.is_empty(),
        Json::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(v: Json) -> serde_json::Map<String, Json> {
        v.as_object().unwrap().clone()
    }

    fn run(expr: &str, scope: Json) -> Result<bool, Diagnostic> {
        eval_if(expr, &env(scope), Pos::start())
    }

    #[test]
    fn comparisons_and_logic() {
        let scope = json!({"mode": "expert", "retries": 3});
        assert!(run("mode == 'expert'", scope.clone()).unwrap());
        assert!(run("mode != 'user'", scope.clone()).unwrap());
        assert!(run("retries >= 3 and mode == 'expert'", scope.clone()).unwrap());
        assert!(run("retries > 5 or mode == 'expert'", scope.clone()).unwrap());
        assert!(run("not (retries > 5)", scope).unwrap());
    }

    #[test]
    fn dot_paths_and_missing_paths() {
        let scope = json!({"user": {"role": "admin"}});
        assert!(run("user.role == 'admin'", scope.clone()).unwrap());
        // A miss yields null, which is falsy and equal only to null.
        assert!(!run("user.missing", scope.clone()).unwrap());
        assert!(run("user.missing == null", scope.clone()).unwrap());
        assert!(run("ghost == null", scope).unwrap());
    }

    #[test]
    fn membership() {
        let scope = json!({"tags": ["a", "b"], "name": "alpha"});
        assert!(run("'a' in tags", scope.clone()).unwrap());
        assert!(!run("'c' in tags", scope.clone()).unwrap());
        assert!(run("'alp' in name", scope).unwrap());
    }

    #[test]
    fn mixed_ordering_is_f703() {
        let scope = json!({"name": "x"});
        assert_eq!(run("name > 3", scope).unwrap_err().code, Code::F703);
    }

    #[test]
    fn parse_errors_are_f705() {
        let scope = json!({});
        assert_eq!(run("a ==", scope.clone()).unwrap_err().code, Code::F705);
        assert_eq!(run("(a == 1", scope.clone()).unwrap_err().code, Code::F705);
        assert_eq!(run("a ? b", scope).unwrap_err().code, Code::F705);
    }

    #[test]
    fn short_circuit_skips_type_errors() {
        let scope = json!({"name": "x"});
        // RHS would be F703, but the LHS already decides the result.
        assert!(!run("false and name > 3", scope.clone()).unwrap());
        assert!(run("true or name > 3", scope).unwrap());
    }

    #[test]
    fn numeric_equality_normalizes_int_and_float() {
        let scope = json!({"x": 1});
        assert!(run("x == 1.0", scope).unwrap());
    }

    #[test]
    fn empty_expression_is_true() {
        assert!(run("", json!({})).unwrap());
    }

    #[test]
    fn truthiness_of_bare_values() {
        let scope = json!({"items": [], "name": "x", "zero": 0});
        assert!(!run("items", scope.clone()).unwrap());
        assert!(run("name", scope.clone()).unwrap());
        assert!(!run("zero", scope).unwrap());
    }
}
