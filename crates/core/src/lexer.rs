//! Lexer: normalized text to a token stream with indentation structure.
//!
//! Normalization runs first: BOM strip, line endings to LF, trailing spaces
//! stripped per line. Tokenization then maintains an indent stack over
//! 2-space levels and emits `Indent`/`Dedent` pairs, captures strings,
//! fences and extended-scalar literals, and rejects tabs outright (F002).
//! The first lexical error aborts the stream; nothing downstream can make
//! sense of a broken token sequence.

use crate::ast::ExtKind;
use crate::error::{Code, Diagnostic, Pos};
use crate::limits;
use crate::scalars;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    At,
    Ident(String),
    /// Quoted or triple-quoted string, escapes resolved. Also carries raw
    /// `$name` / `${a.b}` scalar-variable lexemes, substituted later.
    Str(String),
    /// Numeric literal, kept as its lexeme until the parser converts it.
    Number(String),
    Bool(bool),
    Null,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Colon,
    Amp,
    Star,
    Equal,
    Dash,
    /// The `|>` bigram.
    Pipe,
    Newline,
    Indent,
    Dedent,
    Fence {
        lang: Option<String>,
        body: String,
    },
    Ext {
        kind: ExtKind,
        text: String,
    },
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Tok,
    pub pos: Pos,
}

/// Decode and normalize raw source text: strip a leading BOM, normalize
/// `\r\n` and bare `\r` to `\n`, and strip trailing spaces from every line.
pub fn normalize(source: &str) -> String {
    let source = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    let unified = source.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    for (i, line) in unified.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.trim_end_matches(' '));
    }
    out
}

/// Tokenize normalized source text. Returns the token stream or the first
/// lexical diagnostic.
pub fn lex(src: &str) -> Result<Vec<Spanned>, Diagnostic> {
    Lexer::new(src).run()
}

struct Lexer {
    chars: Vec<char>,
    i: usize,
    line: u32,
    col: u32,
    bol: bool,
    /// Leading-space count of the current line, for fence-closer matching.
    line_indent: usize,
    indent_stack: Vec<usize>,
    tokens: Vec<Spanned>,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            i: 0,
            line: 1,
            col: 1,
            bol: true,
            line_indent: 0,
            indent_stack: vec![0],
            tokens: Vec::new(),
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.i + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.i += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn emit(&mut self, tok: Tok, pos: Pos) {
        self.tokens.push(Spanned { tok, pos });
    }

    fn err(&self, code: Code, msg: impl Into<String>, pos: Pos) -> Diagnostic {
        Diagnostic::new(code, msg, pos)
    }

    fn run(mut self) -> Result<Vec<Spanned>, Diagnostic> {
        while self.i < self.chars.len() {
            if self.bol {
                self.handle_indent()?;
                continue;
            }
            let pos = self.pos();
            let Some(ch) = self.peek() else { break };
            match ch {
                '#' => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                '\t' => {
                    return Err(self.err(Code::F002, "tabs are not allowed", pos));
                }
                ' ' => {
                    self.advance();
                }
                '\n' => {
                    self.emit(Tok::Newline, pos);
                    self.advance();
                    self.bol = true;
                }
                '@' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.timestamp(pos)?;
                    } else {
                        self.emit(Tok::At, pos);
                        self.advance();
                    }
                }
                '(' => self.punct(Tok::LParen, pos),
                ')' => self.punct(Tok::RParen, pos),
                '{' => self.punct(Tok::LBrace, pos),
                '}' => self.punct(Tok::RBrace, pos),
                '[' => self.punct(Tok::LBracket, pos),
                ']' => self.punct(Tok::RBracket, pos),
                ',' => self.punct(Tok::Comma, pos),
                ':' => self.punct(Tok::Colon, pos),
                '&' => self.punct(Tok::Amp, pos),
                '*' => self.punct(Tok::Star, pos),
                '=' => self.punct(Tok::Equal, pos),
                '"' => self.string(pos)?,
                '`' => {
                    if self.peek_at(1) == Some('`') && self.peek_at(2) == Some('`') {
                        self.fence(pos)?;
                    } else {
                        return Err(self.err(Code::F001, "invalid character '`'", pos));
                    }
                }
                '|' => {
                    if self.peek_at(1) == Some('>') {
                        self.advance();
                        self.advance();
                        self.emit(Tok::Pipe, pos);
                    } else {
                        return Err(self.err(Code::F001, "invalid character '|'", pos));
                    }
                }
                '$' => self.scalar_var(pos)?,
                '/' => self.regex_literal(pos)?,
                '-' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.number(pos)?;
                    } else {
                        self.punct(Tok::Dash, pos);
                    }
                }
                '+' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.number(pos)?;
                    } else {
                        return Err(self.err(Code::F001, "invalid character '+'", pos));
                    }
                }
                c if c.is_ascii_digit() => self.number(pos)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.ident(pos),
                c => {
                    return Err(self.err(Code::F001, format!("invalid character '{}'", c), pos));
                }
            }
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            let pos = self.pos();
            self.emit(Tok::Dedent, pos);
        }
        let pos = self.pos();
        self.emit(Tok::Eof, pos);
        Ok(self.tokens)
    }

    fn punct(&mut self, tok: Tok, pos: Pos) {
        self.advance();
        self.emit(tok, pos);
    }

    /// Count leading spaces at the beginning of a line and emit
    /// `Indent`/`Dedent` transitions. Blank and comment-only lines leave the
    /// indent stack untouched.
    fn handle_indent(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos();
        let mut count = 0usize;
        while self.peek() == Some(' ') {
            count += 1;
            self.advance();
        }
        if self.peek() == Some('\t') {
            return Err(self
                .err(Code::F002, "tabs are not allowed in indentation", self.pos())
                .with_hint("indent with 2 spaces per level"));
        }
        self.bol = false;
        self.line_indent = count;
        match self.peek() {
            None => return Ok(()),
            Some('\n') => {
                let pos = self.pos();
                self.emit(Tok::Newline, pos);
                self.advance();
                self.bol = true;
                return Ok(());
            }
            Some('#') => {
                // Comment-only line: discard without affecting indentation.
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
                if self.peek() == Some('\n') {
                    let pos = self.pos();
                    self.emit(Tok::Newline, pos);
                    self.advance();
                    self.bol = true;
                }
                return Ok(());
            }
            _ => {}
        }
        if count % 2 != 0 {
            return Err(self.err(
                Code::F002,
                "indentation must be a multiple of 2 spaces",
                start,
            ));
        }
        let level = count / 2;
        if level > limits::MAX_INDENT_DEPTH {
            return Err(self.err(Code::F002, "indentation too deep", start));
        }
        let cur = *self.indent_stack.last().unwrap();
        if level == cur {
            return Ok(());
        }
        if level == cur + 1 {
            self.indent_stack.push(level);
            self.emit(Tok::Indent, start);
            return Ok(());
        }
        if level < cur {
            while self.indent_stack.len() > 1 && *self.indent_stack.last().unwrap() > level {
                self.indent_stack.pop();
                self.emit(Tok::Dedent, start);
            }
            if *self.indent_stack.last().unwrap() != level {
                return Err(self.err(Code::F002, "malformed dedent", start));
            }
            return Ok(());
        }
        Err(self.err(
            Code::F002,
            "indentation increased by more than one level",
            start,
        ))
    }

    fn string(&mut self, start: Pos) -> Result<(), Diagnostic> {
        if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
            return self.triple_string(start);
        }
        self.advance(); // opening quote
        let mut buf = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(self.err(Code::F003, "unterminated string", start));
            };
            match ch {
                '"' => {
                    self.advance();
                    break;
                }
                '\n' => {
                    return Err(self.err(Code::F003, "unterminated string", start));
                }
                '\\' => {
                    let esc_pos = self.pos();
                    self.advance();
                    let Some(esc) = self.advance() else {
                        return Err(self.err(Code::F003, "unterminated string", start));
                    };
                    match esc {
                        'n' => buf.push('\n'),
                        't' => buf.push('\t'),
                        'r' => buf.push('\r'),
                        '"' => buf.push('"'),
                        '\\' => buf.push('\\'),
                        '/' => buf.push('/'),
                        'u' => {
                            let mut code = 0u32;
                            for _ in 0..4 {
                                let Some(h) = self.advance().and_then(|c| c.to_digit(16)) else {
                                    return Err(self.err(
                                        Code::F001,
                                        "\\u escape requires 4 hex digits",
                                        esc_pos,
                                    ));
                                };
                                code = code * 16 + h;
                            }
                            let Some(c) = char::from_u32(code) else {
                                return Err(self.err(
                                    Code::F001,
                                    format!("\\u{:04X} is not a valid scalar value", code),
                                    esc_pos,
                                ));
                            };
                            buf.push(c);
                        }
                        other => {
                            return Err(self.err(
                                Code::F001,
                                format!("invalid escape '\\{}'", other),
                                esc_pos,
                            ));
                        }
                    }
                }
                _ => {
                    buf.push(ch);
                    self.advance();
                }
            }
        }
        self.emit(Tok::Str(buf), start);
        Ok(())
    }

    /// Triple-quoted string: newlines preserved verbatim, no escapes.
    fn triple_string(&mut self, start: Pos) -> Result<(), Diagnostic> {
        self.advance();
        self.advance();
        self.advance();
        let mut buf = String::new();
        loop {
            if self.peek().is_none() {
                return Err(self.err(Code::F003, "unterminated triple-quoted string", start));
            }
            if self.peek() == Some('"') && self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"')
            {
                self.advance();
                self.advance();
                self.advance();
                break;
            }
            buf.push(self.advance().unwrap());
        }
        self.emit(Tok::Str(buf), start);
        Ok(())
    }

    /// Fenced block: opening backticks with an optional language tag, body
    /// captured verbatim up to a closing ``` on its own line whose leading
    /// indentation matches the opener's line.
    fn fence(&mut self, start: Pos) -> Result<(), Diagnostic> {
        let open_indent = self.line_indent;
        self.advance();
        self.advance();
        self.advance();
        let mut tag = String::new();
        while !matches!(self.peek(), None | Some('\n')) {
            tag.push(self.advance().unwrap());
        }
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(self.err(Code::F001, "invalid fence language tag", start));
        }
        if self.peek().is_none() {
            return Err(self.err(Code::F003, "unterminated fenced block", start));
        }
        self.advance(); // newline ending the opening line

        let mut body = String::new();
        let mut bytes = 0usize;
        loop {
            if self.peek().is_none() {
                return Err(self.err(Code::F003, "unterminated fenced block", start));
            }
            // Examine the upcoming line without consuming it.
            let mut j = self.i;
            let mut spaces = 0usize;
            while self.chars.get(j) == Some(&' ') {
                spaces += 1;
                j += 1;
            }
            let closes = spaces == open_indent
                && self.chars.get(j) == Some(&'`')
                && self.chars.get(j + 1) == Some(&'`')
                && self.chars.get(j + 2) == Some(&'`')
                && matches!(self.chars.get(j + 3), None | Some(&'\n') | Some(&' '));
            if closes {
                while self.i < j + 3 {
                    self.advance();
                }
                break;
            }
            // Consume the line into the body, newline included.
            loop {
                match self.peek() {
                    None => break,
                    Some('\n') => {
                        body.push('\n');
                        bytes += 1;
                        self.advance();
                        break;
                    }
                    Some(c) => {
                        body.push(c);
                        bytes += c.len_utf8();
                        self.advance();
                    }
                }
            }
            if bytes > limits::MAX_FENCE_BYTES {
                return Err(self.err(Code::F999, "fenced block exceeds MAX_FENCE_BYTES", start));
            }
        }
        if body.ends_with('\n') {
            body.pop();
        }
        let lang = if tag.is_empty() { None } else { Some(tag) };
        self.emit(Tok::Fence { lang, body }, start);
        Ok(())
    }

    /// `$name` or `${a.b}`, emitted as a raw string lexeme for the
    /// substitution stage.
    fn scalar_var(&mut self, start: Pos) -> Result<(), Diagnostic> {
        self.advance(); // '$'
        let mut buf = String::from("$");
        if self.peek() == Some('{') {
            buf.push('{');
            self.advance();
            loop {
                match self.peek() {
                    None | Some('\n') => {
                        return Err(self.err(
                            Code::F402B,
                            "unclosed scalar variable '${...}'",
                            start,
                        ));
                    }
                    Some('}') => {
                        buf.push('}');
                        self.advance();
                        break;
                    }
                    Some(c) => {
                        buf.push(c);
                        self.advance();
                    }
                }
            }
        } else {
            if !self
                .peek()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            {
                return Err(self.err(Code::F001, "invalid scalar variable name", start));
            }
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            {
                buf.push(self.advance().unwrap());
            }
        }
        self.emit(Tok::Str(buf), start);
        Ok(())
    }

    /// `@YYYY-MM-DDThh:mm:ss…` timestamp literal (the leading `@` has
    /// already been seen by the caller).
    fn timestamp(&mut self, start: Pos) -> Result<(), Diagnostic> {
        let mut text = String::new();
        text.push(self.advance().unwrap()); // '@'
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '.' | '+'))
        {
            text.push(self.advance().unwrap());
        }
        if !scalars::is_timestamp(&text) {
            return Err(self.err(
                Code::F101,
                format!("invalid timestamp literal '{}'", text),
                start,
            ));
        }
        self.emit(
            Tok::Ext {
                kind: ExtKind::Timestamp,
                text,
            },
            start,
        );
        Ok(())
    }

    /// `/pattern/flags` regex literal. `\/` escapes a slash inside the
    /// pattern; the literal is stored as written.
    fn regex_literal(&mut self, start: Pos) -> Result<(), Diagnostic> {
        let mut text = String::new();
        text.push(self.advance().unwrap()); // '/'
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.err(Code::F001, "unterminated regex literal", start));
                }
                Some('\\') => {
                    text.push(self.advance().unwrap());
                    if let Some(c) = self.advance() {
                        text.push(c);
                    }
                }
                Some('/') => {
                    text.push(self.advance().unwrap());
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            text.push(self.advance().unwrap());
        }
        self.emit(
            Tok::Ext {
                kind: ExtKind::Regex,
                text,
            },
            start,
        );
        Ok(())
    }

    fn number(&mut self, start: Pos) -> Result<(), Diagnostic> {
        let mut lexeme = String::new();
        let mut pure_digits = true;
        if matches!(self.peek(), Some('+') | Some('-')) {
            pure_digits = false;
            lexeme.push(self.advance().unwrap());
        }
        let int_start = lexeme.len();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            lexeme.push(self.advance().unwrap());
        }
        let int_len = lexeme.len() - int_start;
        if int_len > 1 && lexeme[int_start..].starts_with('0') {
            return Err(self.err(
                Code::F001,
                "leading zero is only permitted for the literal 0",
                start,
            ));
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            pure_digits = false;
            lexeme.push(self.advance().unwrap());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                lexeme.push(self.advance().unwrap());
            }
        }
        if matches!(self.peek(), Some('e') | Some('E'))
            && (self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek_at(1), Some('+') | Some('-'))
                    && self.peek_at(2).is_some_and(|c| c.is_ascii_digit())))
        {
            pure_digits = false;
            lexeme.push(self.advance().unwrap());
            if matches!(self.peek(), Some('+') | Some('-')) {
                lexeme.push(self.advance().unwrap());
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                lexeme.push(self.advance().unwrap());
            }
        }
        // A unit suffix turns a bare digit run into a duration or size.
        if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            let mut suffix = String::new();
            while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                suffix.push(self.advance().unwrap());
            }
            let text = format!("{}{}", lexeme, suffix);
            if pure_digits {
                if scalars::is_duration(&text) {
                    self.emit(
                        Tok::Ext {
                            kind: ExtKind::Duration,
                            text,
                        },
                        start,
                    );
                    return Ok(());
                }
                if scalars::is_size(&text) {
                    self.emit(
                        Tok::Ext {
                            kind: ExtKind::Size,
                            text,
                        },
                        start,
                    );
                    return Ok(());
                }
            }
            return Err(self.err(
                Code::F001,
                format!("invalid literal '{}'", text),
                start,
            ));
        }
        self.emit(Tok::Number(lexeme), start);
        Ok(())
    }

    fn ident(&mut self, start: Pos) {
        let mut lexeme = String::new();
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            lexeme.push(self.advance().unwrap());
        }
        let tok = match lexeme.as_str() {
            "true" => Tok::Bool(true),
            "false" => Tok::Bool(false),
            "null" => Tok::Null,
            _ => Tok::Ident(lexeme),
        };
        self.emit(tok, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        lex(&normalize(src)).unwrap().into_iter().map(|s| s.tok).collect()
    }

    #[test]
    fn normalize_handles_bom_crlf_and_trailing_spaces() {
        let src = "\u{FEFF}@a  \r\n  b: 1 \r";
        assert_eq!(normalize(src), "@a\n  b: 1\n");
    }

    #[test]
    fn simple_facet_tokens() {
        let toks = kinds("@user\n  message: \"hi\"\n");
        assert_eq!(
            toks,
            vec![
                Tok::At,
                Tok::Ident("user".into()),
                Tok::Newline,
                Tok::Indent,
                Tok::Ident("message".into()),
                Tok::Colon,
                Tok::Str("hi".into()),
                Tok::Newline,
                Tok::Dedent,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn tab_in_indentation_is_f002() {
        let err = lex("@a\n\tb: 1\n").unwrap_err();
        assert_eq!(err.code, Code::F002);
    }

    #[test]
    fn odd_indent_is_f002() {
        let err = lex("@a\n   b: 1\n").unwrap_err();
        assert_eq!(err.code, Code::F002);
    }

    #[test]
    fn two_level_jump_is_f002() {
        let err = lex("@a\n    b: 1\n").unwrap_err();
        assert_eq!(err.code, Code::F002);
    }

    #[test]
    fn comment_only_line_does_not_touch_indent() {
        let toks = kinds("@a\n  x: 1\n      # deep comment\n  y: 2\n");
        // Exactly one Indent/Dedent pair despite the deep comment line.
        let indents = toks.iter().filter(|t| matches!(t, Tok::Indent)).count();
        let dedents = toks.iter().filter(|t| matches!(t, Tok::Dedent)).count();
        assert_eq!((indents, dedents), (1, 1));
    }

    #[test]
    fn string_escapes_are_resolved() {
        let toks = kinds(r#"@a
  s: "a\nb\t\"\\\/\u0041"
"#);
        assert!(toks.contains(&Tok::Str("a\nb\t\"\\/A".into())));
    }

    #[test]
    fn invalid_escape_is_f001() {
        let err = lex("@a\n  s: \"\\q\"\n").unwrap_err();
        assert_eq!(err.code, Code::F001);
    }

    #[test]
    fn unterminated_string_is_f003() {
        let err = lex("@a\n  s: \"oops\n").unwrap_err();
        assert_eq!(err.code, Code::F003);
    }

    #[test]
    fn triple_string_preserves_newlines() {
        let toks = kinds("@a\n  s: \"\"\"x\ny\"\"\"\n");
        assert!(toks.contains(&Tok::Str("x\ny".into())));
    }

    #[test]
    fn pipe_bigram_and_lone_pipe() {
        let toks = kinds("@a\n  s: \"x\" |> trim\n");
        assert!(toks.contains(&Tok::Pipe));
        assert_eq!(lex("@a\n  s: \"x\" | trim\n").unwrap_err().code, Code::F001);
    }

    #[test]
    fn fence_with_language_tag() {
        let src = "@a\n  code:\n    ```python\nprint(1)\nprint(2)\n    ```\n";
        let toks = kinds(src);
        assert!(toks.contains(&Tok::Fence {
            lang: Some("python".into()),
            body: "print(1)\nprint(2)".into(),
        }));
    }

    #[test]
    fn unterminated_fence_is_f003() {
        let err = lex("@a\n  code:\n    ```\nbody\n").unwrap_err();
        assert_eq!(err.code, Code::F003);
    }

    #[test]
    fn numbers_and_leading_zero() {
        let toks = kinds("@a\n  n: -1\n  x: 2.5\n  e: 1e3\n  z: 0\n");
        assert!(toks.contains(&Tok::Number("-1".into())));
        assert!(toks.contains(&Tok::Number("2.5".into())));
        assert!(toks.contains(&Tok::Number("1e3".into())));
        assert!(toks.contains(&Tok::Number("0".into())));
        assert_eq!(lex("@a\n  n: 042\n").unwrap_err().code, Code::F001);
    }

    #[test]
    fn duration_size_and_regex_literals() {
        let toks = kinds("@a\n  d: 500ms\n  s: 2GB\n  r: /a\\/b/gi\n");
        assert!(toks.contains(&Tok::Ext {
            kind: ExtKind::Duration,
            text: "500ms".into()
        }));
        assert!(toks.contains(&Tok::Ext {
            kind: ExtKind::Size,
            text: "2GB".into()
        }));
        assert!(toks.contains(&Tok::Ext {
            kind: ExtKind::Regex,
            text: "/a\\/b/gi".into()
        }));
    }

    #[test]
    fn timestamp_literal() {
        let toks = kinds("@a\n  t: @2024-01-15T10:30:00Z\n");
        assert!(toks.contains(&Tok::Ext {
            kind: ExtKind::Timestamp,
            text: "@2024-01-15T10:30:00Z".into()
        }));
    }

    #[test]
    fn bad_unit_suffix_is_f001() {
        assert_eq!(lex("@a\n  d: 5x\n").unwrap_err().code, Code::F001);
    }

    #[test]
    fn scalar_variable_lexemes() {
        let toks = kinds("@a\n  v: $name\n  w: ${a.b}\n");
        assert!(toks.contains(&Tok::Str("$name".into())));
        assert!(toks.contains(&Tok::Str("${a.b}".into())));
    }

    #[test]
    fn comments_are_discarded() {
        let toks = kinds("@a # header comment\n  x: 1 # after value\n");
        assert!(toks.iter().all(|t| !matches!(t, Tok::Str(s) if s.contains('#'))));
        assert!(toks.contains(&Tok::Number("1".into())));
    }

    #[test]
    fn dedents_flushed_at_eof() {
        let toks = kinds("@a\n  b:\n    c: 1");
        let dedents = toks.iter().filter(|t| matches!(t, Tok::Dedent)).count();
        assert_eq!(dedents, 2);
    }
}
