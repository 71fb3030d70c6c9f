//! Recursive-descent parser: token stream to [`Document`].
//!
//! A document is a sequence of facets. Each facet is `@` IDENT, an optional
//! `&` anchor label, an optional parenthesized attribute list, a newline,
//! and an optional body introduced by one `Indent` and closed by the
//! matching `Dedent`. Body shape (mapping vs list) is decided by the first
//! item; mixing shapes is F101.
//!
//! The parser can run in fail-fast mode ([`parse`]) or recover at facet
//! boundaries and collect several diagnostics ([`parse_recovering`]), which
//! is what `lint` uses.

use crate::ast::{Block, Document, Facet, KeyValue, ListItem, Value};
use crate::error::{Code, Diagnostic, Pos};
use crate::lexer::{Spanned, Tok};

mod values;

pub(crate) use values::parse_lens_chain;

pub(crate) struct Parser<'a> {
    toks: &'a [Spanned],
    i: usize,
}

/// Parse a token stream, stopping at the first error.
pub fn parse(tokens: &[Spanned]) -> Result<Document, Diagnostic> {
    let mut p = Parser::new(tokens);
    let mut facets = Vec::new();
    while !p.at_eof() {
        if p.accept_trivia() {
            continue;
        }
        facets.push(p.parse_facet()?);
    }
    Ok(Document { facets })
}

/// Parse with recovery at facet boundaries, collecting up to `max_errors`
/// diagnostics. Facets that parse cleanly are kept.
pub fn parse_recovering(tokens: &[Spanned], max_errors: usize) -> (Document, Vec<Diagnostic>) {
    let mut p = Parser::new(tokens);
    let mut facets = Vec::new();
    let mut errors = Vec::new();
    while !p.at_eof() {
        if p.accept_trivia() {
            continue;
        }
        match p.parse_facet() {
            Ok(f) => facets.push(f),
            Err(e) => {
                errors.push(e);
                if errors.len() >= max_errors {
                    break;
                }
                p.recover_to_next_facet();
            }
        }
    }
    (Document { facets }, errors)
}

impl<'a> Parser<'a> {
    pub(crate) fn new(toks: &'a [Spanned]) -> Self {
        Parser { toks, i: 0 }
    }

    pub(crate) fn cur(&self) -> &Spanned {
        &self.toks[self.i.min(self.toks.len() - 1)]
    }

    pub(crate) fn peek(&self) -> &Tok {
        &self.cur().tok
    }

    pub(crate) fn pos(&self) -> Pos {
        self.cur().pos
    }

    pub(crate) fn advance(&mut self) -> &Spanned {
        let t = &self.toks[self.i.min(self.toks.len() - 1)];
        if self.i < self.toks.len() - 1 {
            self.i += 1;
        }
        t
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    /// Consume a stray newline or dedent at the top level.
    fn accept_trivia(&mut self) -> bool {
        if matches!(self.peek(), Tok::Newline | Tok::Dedent) {
            self.advance();
            return true;
        }
        false
    }

    pub(crate) fn err(&self, code: Code, msg: impl Into<String>) -> Diagnostic {
        Diagnostic::new(code, msg, self.pos())
    }

    pub(crate) fn expect_ident(&mut self, what: &str) -> Result<(String, Pos), Diagnostic> {
        let pos = self.pos();
        if let Tok::Ident(name) = self.peek() {
            let name = name.clone();
            self.advance();
            Ok((name, pos))
        } else {
            Err(self.err(Code::F001, format!("{} expected", what)))
        }
    }

    pub(crate) fn expect_colon(&mut self) -> Result<(), Diagnostic> {
        if matches!(self.peek(), Tok::Colon) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(Code::F001, "':' expected after key"))
        }
    }

    pub(crate) fn expect_newline(&mut self, context: &str) -> Result<(), Diagnostic> {
        match self.peek() {
            Tok::Newline => {
                self.advance();
                Ok(())
            }
            Tok::Eof | Tok::Dedent => Ok(()),
            _ => Err(self.err(Code::F001, format!("newline expected after {}", context))),
        }
    }

    fn parse_facet(&mut self) -> Result<Facet, Diagnostic> {
        if !matches!(self.peek(), Tok::At) {
            return Err(self.err(Code::F001, "expected '@' to start a facet"));
        }
        let at_pos = self.pos();
        self.advance();
        let (name, _) = self.expect_ident("facet name")?;

        // @import is a directive with no body.
        if name == "import" {
            let mut attrs = indexmap::IndexMap::new();
            if matches!(self.peek(), Tok::LParen) {
                self.advance();
                attrs = self.parse_attrs()?;
            } else if let Tok::Str(path) = self.peek() {
                let path = path.clone();
                self.advance();
                attrs.insert("path".to_string(), crate::ast::AttrValue::Str(path));
            }
            self.expect_newline("@import")?;
            return Ok(Facet {
                name,
                anchor: None,
                attrs,
                body: Block::Empty,
                pos: at_pos,
            });
        }

        let anchor = if matches!(self.peek(), Tok::Amp) {
            self.advance();
            let (label, _) = self.expect_ident("anchor label")?;
            Some(label)
        } else {
            None
        };

        let attrs = if matches!(self.peek(), Tok::LParen) {
            self.advance();
            self.parse_attrs()?
        } else {
            indexmap::IndexMap::new()
        };

        self.expect_newline("facet header")?;
        while matches!(self.peek(), Tok::Newline) {
            self.advance();
        }

        let body = if matches!(self.peek(), Tok::Indent) {
            self.advance();
            self.parse_block()?
        } else {
            Block::Empty
        };

        Ok(Facet {
            name,
            anchor,
            attrs,
            body,
            pos: at_pos,
        })
    }

    /// Parse an indented block. The caller has consumed the `Indent`; this
    /// consumes the matching `Dedent`.
    fn parse_block(&mut self) -> Result<Block, Diagnostic> {
        let mut kvs: Vec<KeyValue> = Vec::new();
        let mut items: Vec<ListItem> = Vec::new();
        loop {
            match self.peek() {
                Tok::Dedent => {
                    self.advance();
                    break;
                }
                Tok::Eof => break,
                Tok::Newline => {
                    self.advance();
                }
                Tok::Dash => {
                    if !kvs.is_empty() {
                        return Err(self.err(
                            Code::F101,
                            "mapping pairs and list items cannot mix in one block",
                        ));
                    }
                    items.push(self.parse_list_item()?);
                }
                _ => {
                    if !items.is_empty() {
                        return Err(self.err(
                            Code::F101,
                            "mapping pairs and list items cannot mix in one block",
                        ));
                    }
                    kvs.push(self.parse_pair()?);
                }
            }
        }
        if !items.is_empty() {
            Ok(Block::List(items))
        } else if !kvs.is_empty() {
            Ok(Block::Map(kvs))
        } else {
            Ok(Block::Empty)
        }
    }

    fn parse_list_item(&mut self) -> Result<ListItem, Diagnostic> {
        let pos = self.pos();
        self.advance(); // '-'
        let value = self.parse_value()?;
        let mut item_if = None;
        if matches!(self.peek(), Tok::LParen) {
            self.advance();
            let (key, key_pos) = self.expect_ident("list-item attribute")?;
            if key != "if" {
                return Err(Diagnostic::new(
                    Code::F305,
                    format!("unsupported list-item attribute '{}' (only 'if' is allowed)", key),
                    key_pos,
                ));
            }
            if !matches!(self.peek(), Tok::Equal) {
                return Err(self.err(Code::F001, "'=' expected after 'if'"));
            }
            self.advance();
            match self.peek() {
                Tok::Str(expr) => {
                    item_if = Some(expr.clone());
                    self.advance();
                }
                _ => {
                    return Err(self.err(
                        Code::F704,
                        "conditional expression must be a quoted string",
                    ));
                }
            }
            if !matches!(self.peek(), Tok::RParen) {
                return Err(self.err(Code::F001, "')' expected after list-item attribute"));
            }
            self.advance();
        }
        let pipeline = self.parse_pipeline()?;
        if !pipeline.is_empty() && matches!(value, Value::Alias(_)) {
            return Err(Diagnostic::new(
                Code::F101,
                "a pipeline cannot be applied to an alias",
                pos,
            ));
        }
        self.expect_newline("list item")?;
        Ok(ListItem {
            value,
            item_if,
            pipeline,
            pos,
        })
    }

    fn parse_pair(&mut self) -> Result<KeyValue, Diagnostic> {
        let (key, pos) = self.expect_ident("key")?;
        self.expect_colon()?;

        // `key:` followed by a newline introduces a nested block or fence.
        if matches!(self.peek(), Tok::Newline) {
            while matches!(self.peek(), Tok::Newline) {
                self.advance();
            }
            if !matches!(self.peek(), Tok::Indent) {
                return Err(self.err(Code::F001, "indented block expected after 'key:'"));
            }
            self.advance();
            if matches!(self.peek(), Tok::Fence { .. }) {
                let value = self.parse_value()?;
                let pipeline = self.parse_pipeline()?;
                if matches!(self.peek(), Tok::Newline) {
                    self.advance();
                }
                if matches!(self.peek(), Tok::Dedent) {
                    self.advance();
                }
                return Ok(KeyValue {
                    key,
                    value,
                    pipeline,
                    pos,
                });
            }
            let nested = self.parse_block()?;
            let value = match nested {
                Block::Map(kvs) => Value::Map(kvs),
                Block::List(items) => Value::List(items),
                Block::Empty => Value::InlineMap(indexmap::IndexMap::new()),
            };
            return Ok(KeyValue {
                key,
                value,
                pipeline: Vec::new(),
                pos,
            });
        }

        let value = self.parse_value()?;
        let pipeline = self.parse_pipeline()?;
        if !pipeline.is_empty() && matches!(value, Value::Alias(_)) {
            return Err(Diagnostic::new(
                Code::F101,
                "a pipeline cannot be applied to an alias",
                pos,
            ));
        }
        self.expect_newline("value")?;
        Ok(KeyValue {
            key,
            value,
            pipeline,
            pos,
        })
    }

    /// Skip tokens until the next top-level `@` (at indent depth zero) or
    /// end of input. Used for multi-error recovery.
    fn recover_to_next_facet(&mut self) {
        let mut depth: i32 = 0;
        loop {
            match self.peek() {
                Tok::Eof => break,
                Tok::Indent => {
                    depth += 1;
                    self.advance();
                }
                Tok::Dedent => {
                    depth -= 1;
                    self.advance();
                }
                Tok::At if depth <= 0 => break,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
