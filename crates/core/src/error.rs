//! Structured diagnostics.
//!
//! Errors are values, not panics: every stage of the pipeline reports
//! failures as [`Diagnostic`] records carrying a fixed code from the FACET
//! taxonomy, a message, and a source position. The wire shape
//! (`{code, message, line, column, hint?}` plus an optional caret snippet)
//! is part of the external contract.

use std::fmt;

use serde::Serialize;

/// A 1-based source position in the post-normalization text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Pos { line, col }
    }

    /// Position used for document-level diagnostics with no better anchor.
    pub fn start() -> Self {
        Pos { line: 1, col: 1 }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Fixed diagnostic codes. The set and spelling are part of the external
/// contract and must not change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Code {
    /// Lexical error.
    F001,
    /// Indentation error (tabs, odd width, malformed dedent).
    F002,
    /// Unterminated string or fence.
    F003,
    /// Value type error (NaN/Infinity, malformed literal, shape mismatch).
    F101,
    /// Lens input type mismatch.
    F102,
    /// Undefined anchor alias or anchor cycle.
    F201,
    /// Anchor redefinition.
    F202,
    /// Malformed attribute value.
    F301,
    /// Interpolation or substitution marker inside an attribute.
    F304,
    /// Disallowed list-item attribute (only `if` is permitted).
    F305,
    /// Invalid embedded schema in `@var_types`.
    F401,
    /// Missing interpolation path.
    F402A,
    /// Malformed interpolation marker (unclosed or empty).
    F402B,
    /// Missing substitution path.
    F404,
    /// Variable type violation.
    F451,
    /// Variable constraint violation.
    F452,
    /// Invalid import path.
    F601,
    /// Import cycle, depth or count ceiling.
    F602,
    /// Strict-merge shape mismatch.
    F605,
    /// Comparison on mixed types in an `if` expression.
    F703,
    /// Unquoted conditional expression.
    F704,
    /// Parse error in an `if` expression.
    F705,
    /// Lens argument error (type or arity).
    F801,
    /// Unknown lens.
    F802,
    /// Regex compile failure.
    F803,
    /// Missing required seed for a deterministic lens.
    F804,
    /// Pipeline length exceeded.
    F805,
    /// Internal error or resource ceiling.
    F999,
}

impl Code {
    pub fn as_str(self) -> &'static str {
        match self {
            Code::F001 => "F001",
            Code::F002 => "F002",
            Code::F003 => "F003",
            Code::F101 => "F101",
            Code::F102 => "F102",
            Code::F201 => "F201",
            Code::F202 => "F202",
            Code::F301 => "F301",
            Code::F304 => "F304",
            Code::F305 => "F305",
            Code::F401 => "F401",
            Code::F402A => "F402A",
            Code::F402B => "F402B",
            Code::F404 => "F404",
            Code::F451 => "F451",
            Code::F452 => "F452",
            Code::F601 => "F601",
            Code::F602 => "F602",
            Code::F605 => "F605",
            Code::F703 => "F703",
            Code::F704 => "F704",
            Code::F705 => "F705",
            Code::F801 => "F801",
            Code::F802 => "F802",
            Code::F803 => "F803",
            Code::F804 => "F804",
            Code::F805 => "F805",
            Code::F999 => "F999",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single compile diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: Code,
    pub message: String,
    pub line: u32,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Diagnostic {
    pub fn new(code: Code, message: impl Into<String>, pos: Pos) -> Self {
        Diagnostic {
            code,
            message: message.into(),
            line: pos.line,
            column: pos.col,
            hint: None,
            snippet: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    /// Attach a caret snippet built from the (normalized) source text.
    ///
    /// The snippet is the offending source line followed by a line with a
    /// `^` marker under the column. Positions that fall outside the given
    /// text (e.g. after import merging) leave the snippet absent.
    pub fn attach_snippet(&mut self, source: &str) {
        if self.snippet.is_some() || self.line == 0 {
            return;
        }
        let Some(line_text) = source.lines().nth(self.line as usize - 1) else {
            return;
        };
        let col = (self.column.max(1) as usize - 1).min(line_text.chars().count());
        let mut caret = String::with_capacity(col + 1);
        for _ in 0..col {
            caret.push(' ');
        }
        caret.push('^');
        self.snippet = Some(format!("{}\n{}", line_text, caret));
    }

    /// Serialize to the wire shape, always including `hint` (null when
    /// absent) so consumers get a stable record layout.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code.as_str(),
            "message": self.message,
            "line": self.line,
            "column": self.column,
            "hint": self.hint,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}:{}: {}",
            self.code, self.line, self.column, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_position() {
        let d = Diagnostic::new(Code::F002, "tabs are not allowed", Pos::new(3, 5));
        assert_eq!(d.to_string(), "F002 at 3:5: tabs are not allowed");
    }

    #[test]
    fn snippet_puts_caret_under_column() {
        let src = "@user\n  message: x y\n";
        let mut d = Diagnostic::new(Code::F001, "bad", Pos::new(2, 14));
        d.attach_snippet(src);
        let snippet = d.snippet.unwrap();
        let mut lines = snippet.lines();
        assert_eq!(lines.next().unwrap(), "  message: x y");
        assert_eq!(lines.next().unwrap(), "             ^");
    }

    #[test]
    fn snippet_skipped_for_out_of_range_line() {
        let mut d = Diagnostic::new(Code::F001, "x", Pos::new(99, 1));
        d.attach_snippet("one line\n");
        assert!(d.snippet.is_none());
    }

    #[test]
    fn wire_shape_has_stable_fields() {
        let d = Diagnostic::new(Code::F404, "missing path 'a.b'", Pos::new(1, 2));
        let v = d.to_json_value();
        assert_eq!(v["code"], "F404");
        assert_eq!(v["line"], 1);
        assert_eq!(v["column"], 2);
        assert!(v["hint"].is_null());
    }
}
