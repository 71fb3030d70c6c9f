//! Value grammar: literals, inline collections, anchors, attributes and
//! lens pipelines.

use indexmap::IndexMap;

use crate::ast::{AttrValue, LensArg, LensCall, Num, Value};
use crate::error::{Code, Diagnostic, Pos};
use crate::lexer::Tok;

use super::Parser;

/// Parse a `name(args) |> name(args) …` lens chain from an interpolation
/// marker body. The text has already been tokenized by the main lexer.
pub(crate) fn parse_lens_chain(
    tokens: &[crate::lexer::Spanned],
) -> Result<Vec<LensCall>, Diagnostic> {
    let mut p = Parser::new(tokens);
    let mut calls = vec![p.parse_lens_segment()?];
    loop {
        match p.peek() {
            Tok::Pipe => {
                p.advance();
                calls.push(p.parse_lens_segment()?);
            }
            Tok::Eof | Tok::Newline => break,
            _ => {
                return Err(p.err(Code::F801, "malformed lens call in interpolation"));
            }
        }
    }
    Ok(calls)
}

impl<'a> Parser<'a> {
    pub(crate) fn parse_value(&mut self) -> Result<Value, Diagnostic> {
        let pos = self.pos();
        match self.peek().clone() {
            Tok::Amp => {
                self.advance();
                let (label, _) = self.expect_ident("anchor label")?;
                let inner = self.parse_value()?;
                Ok(Value::Anchor {
                    label,
                    value: Box::new(inner),
                })
            }
            Tok::Star => {
                self.advance();
                let (label, _) = self.expect_ident("alias label")?;
                Ok(Value::Alias(label))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Value::Str(s))
            }
            Tok::Number(lexeme) => {
                self.advance();
                Ok(Value::Num(self.num(&lexeme, pos)?))
            }
            Tok::Bool(b) => {
                self.advance();
                Ok(Value::Bool(b))
            }
            Tok::Null => {
                self.advance();
                Ok(Value::Null)
            }
            Tok::Ident(name) => {
                self.advance();
                Ok(Value::Ident(name))
            }
            Tok::LBrace => self.parse_inline_map(),
            Tok::LBracket => self.parse_inline_list(),
            Tok::Fence { lang, body } => {
                self.advance();
                Ok(Value::Fence { lang, body })
            }
            Tok::Ext { kind, text } => {
                self.advance();
                Ok(Value::Ext { kind, text })
            }
            other => Err(Diagnostic::new(
                Code::F101,
                format!("unexpected {} in value position", token_name(&other)),
                pos,
            )),
        }
    }

    /// `{ key: value, … }` on a single line. Keys are bare identifiers or
    /// quoted strings; trailing commas are illegal.
    fn parse_inline_map(&mut self) -> Result<Value, Diagnostic> {
        self.advance(); // '{'
        let mut map: IndexMap<String, Value> = IndexMap::new();
        let mut first = true;
        loop {
            self.reject_inline_break()?;
            if matches!(self.peek(), Tok::RBrace) {
                self.advance();
                break;
            }
            if !first {
                if !matches!(self.peek(), Tok::Comma) {
                    return Err(self.err(Code::F001, "',' expected in inline map"));
                }
                self.advance();
                self.reject_inline_break()?;
            }
            first = false;
            let key = match self.peek().clone() {
                Tok::Ident(k) => {
                    self.advance();
                    k
                }
                Tok::Str(k) => {
                    self.advance();
                    k
                }
                _ => return Err(self.err(Code::F001, "key expected in inline map")),
            };
            self.expect_colon()?;
            let value = self.parse_value()?;
            self.reject_inline_pipe()?;
            map.insert(key, value);
        }
        Ok(Value::InlineMap(map))
    }

    /// `[ value, … ]` on a single line.
    fn parse_inline_list(&mut self) -> Result<Value, Diagnostic> {
        self.advance(); // '['
        let mut items = Vec::new();
        let mut first = true;
        loop {
            self.reject_inline_break()?;
            if matches!(self.peek(), Tok::RBracket) {
                self.advance();
                break;
            }
            if !first {
                if !matches!(self.peek(), Tok::Comma) {
                    return Err(self.err(Code::F001, "',' expected in inline list"));
                }
                self.advance();
                self.reject_inline_break()?;
            }
            first = false;
            items.push(self.parse_value()?);
            self.reject_inline_pipe()?;
        }
        Ok(Value::InlineList(items))
    }

    fn reject_inline_break(&mut self) -> Result<(), Diagnostic> {
        if matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Indent | Tok::Dedent) {
            return Err(self.err(
                Code::F001,
                "inline collections must open and close on one line",
            ));
        }
        Ok(())
    }

    fn reject_inline_pipe(&mut self) -> Result<(), Diagnostic> {
        if matches!(self.peek(), Tok::Pipe) {
            return Err(self.err(
                Code::F001,
                "pipelines are not allowed on inline sub-values",
            ));
        }
        Ok(())
    }

    /// Comma-separated `key = literal` attribute list. The caller has
    /// consumed the opening parenthesis; this consumes the closing one.
    pub(crate) fn parse_attrs(&mut self) -> Result<IndexMap<String, AttrValue>, Diagnostic> {
        let mut attrs: IndexMap<String, AttrValue> = IndexMap::new();
        let mut first = true;
        loop {
            if matches!(self.peek(), Tok::RParen) {
                self.advance();
                break;
            }
            if !first {
                if !matches!(self.peek(), Tok::Comma) {
                    return Err(self.err(Code::F001, "',' expected in attribute list"));
                }
                self.advance();
            }
            first = false;
            let (key, key_pos) = self.expect_ident("attribute name")?;
            if !matches!(self.peek(), Tok::Equal) {
                return Err(self.err(Code::F001, "'=' expected after attribute name"));
            }
            self.advance();
            let value = self.parse_attr_value(&key, key_pos)?;
            if matches!(self.peek(), Tok::Pipe) {
                return Err(self.err(
                    Code::F301,
                    "pipelines are not allowed on attribute values",
                ));
            }
            attrs.insert(key, value);
        }
        Ok(attrs)
    }

    fn parse_attr_value(&mut self, key: &str, key_pos: Pos) -> Result<AttrValue, Diagnostic> {
        let pos = self.pos();
        let value = match self.peek().clone() {
            Tok::Str(s) => {
                self.advance();
                // No interpolation or substitution of any form in attributes.
                if s.contains("{{") || s.starts_with('$') {
                    return Err(Diagnostic::new(
                        Code::F304,
                        "interpolation is prohibited in attributes",
                        pos,
                    ));
                }
                AttrValue::Str(s)
            }
            Tok::Number(lexeme) => {
                self.advance();
                AttrValue::Num(self.num(&lexeme, pos)?)
            }
            Tok::Bool(b) => {
                self.advance();
                AttrValue::Bool(b)
            }
            Tok::Null => {
                self.advance();
                AttrValue::Null
            }
            Tok::Ident(name) => {
                self.advance();
                AttrValue::Ident(name)
            }
            _ => {
                return Err(Diagnostic::new(
                    Code::F301,
                    "malformed attribute value",
                    pos,
                ));
            }
        };
        // A conditional must always be a quoted expression.
        if key == "if" && !matches!(value, AttrValue::Str(_)) {
            return Err(Diagnostic::new(
                Code::F704,
                "conditional expression must be a quoted string",
                key_pos,
            ));
        }
        Ok(value)
    }

    /// Zero or more `|> name(args)` segments. A bare lens name is an empty
    /// argument list.
    pub(crate) fn parse_pipeline(&mut self) -> Result<Vec<LensCall>, Diagnostic> {
        let mut calls = Vec::new();
        while matches!(self.peek(), Tok::Pipe) {
            self.advance();
            calls.push(self.parse_lens_segment()?);
        }
        Ok(calls)
    }

    fn parse_lens_segment(&mut self) -> Result<LensCall, Diagnostic> {
        let (name, pos) = self.expect_ident("lens name")?;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if matches!(self.peek(), Tok::LParen) {
            self.advance();
            let mut first = true;
            loop {
                if matches!(self.peek(), Tok::RParen) {
                    self.advance();
                    break;
                }
                if !first {
                    if !matches!(self.peek(), Tok::Comma) {
                        return Err(self.err(Code::F001, "',' expected in lens arguments"));
                    }
                    self.advance();
                }
                first = false;
                if let Tok::Ident(key) = self.peek().clone() {
                    // `ident =` starts a keyword argument; a bare
                    // identifier is not a literal and is rejected.
                    let key_pos = self.pos();
                    self.advance();
                    if !matches!(self.peek(), Tok::Equal) {
                        return Err(Diagnostic::new(
                            Code::F801,
                            "lens arguments must be literals",
                            key_pos,
                        ));
                    }
                    self.advance();
                    let val = self.parse_lens_literal()?;
                    kwargs.push((key, val));
                } else {
                    args.push(self.parse_lens_literal()?);
                }
            }
        }
        Ok(LensCall {
            name,
            args,
            kwargs,
            pos,
        })
    }

    fn parse_lens_literal(&mut self) -> Result<LensArg, Diagnostic> {
        let pos = self.pos();
        match self.peek().clone() {
            Tok::Str(s) => {
                self.advance();
                Ok(LensArg::Str(s))
            }
            Tok::Number(lexeme) => {
                self.advance();
                Ok(LensArg::Num(self.num(&lexeme, pos)?))
            }
            Tok::Bool(b) => {
                self.advance();
                Ok(LensArg::Bool(b))
            }
            Tok::Null => {
                self.advance();
                Ok(LensArg::Null)
            }
            _ => Err(Diagnostic::new(
                Code::F801,
                "lens arguments must be literals",
                pos,
            )),
        }
    }

    /// Convert a numeric lexeme. NaN and the infinities can only arise from
    /// overflow and are rejected.
    pub(crate) fn num(&self, lexeme: &str, pos: Pos) -> Result<Num, Diagnostic> {
        if lexeme.contains(['.', 'e', 'E']) {
            let x: f64 = lexeme
                .parse()
                .map_err(|_| Diagnostic::new(Code::F101, format!("invalid number '{}'", lexeme), pos))?;
            if !x.is_finite() {
                return Err(Diagnostic::new(
                    Code::F101,
                    "NaN and Infinity are not representable",
                    pos,
                ));
            }
            Ok(Num::Float(x))
        } else if let Ok(n) = lexeme.parse::<i64>() {
            Ok(Num::Int(n))
        } else {
            // Integer literal beyond i64: fall back to the float form.
            let x: f64 = lexeme
                .parse()
                .map_err(|_| Diagnostic::new(Code::F101, format!("invalid number '{}'", lexeme), pos))?;
            if !x.is_finite() {
                return Err(Diagnostic::new(
                    Code::F101,
                    "NaN and Infinity are not representable",
                    pos,
                ));
            }
            Ok(Num::Float(x))
        }
    }
}

fn token_name(tok: &Tok) -> &'static str {
    match tok {
        Tok::At => "'@'",
        Tok::Ident(_) => "identifier",
        Tok::Str(_) => "string",
        Tok::Number(_) => "number",
        Tok::Bool(_) => "boolean",
        Tok::Null => "null",
        Tok::LBrace => "'{'",
        Tok::RBrace => "'}'",
        Tok::LBracket => "'['",
        Tok::RBracket => "']'",
        Tok::LParen => "'('",
        Tok::RParen => "')'",
        Tok::Comma => "','",
        Tok::Colon => "':'",
        Tok::Amp => "'&'",
        Tok::Star => "'*'",
        Tok::Equal => "'='",
        Tok::Dash => "'-'",
        Tok::Pipe => "'|>'",
        Tok::Newline => "newline",
        Tok::Indent => "indent",
        Tok::Dedent => "dedent",
        Tok::Fence { .. } => "fence",
        Tok::Ext { .. } => "extended scalar",
        Tok::Eof => "end of input",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Block;
    use crate::lexer::{lex, normalize};
    use crate::parser::parse;

    fn first_value(src: &str) -> Value {
        let doc = parse(&lex(&normalize(src)).unwrap()).unwrap();
        match &doc.facets[0].body {
            Block::Map(kvs) => kvs[0].value.clone(),
            other => panic!("expected map body, got {:?}", other),
        }
    }

    fn parse_err(src: &str) -> Diagnostic {
        parse(&lex(&normalize(src)).unwrap()).unwrap_err()
    }

    #[test]
    fn inline_map_with_mixed_keys() {
        let v = first_value("@a\n  m: { x: 1, \"y z\": true }\n");
        let Value::InlineMap(m) = v else { panic!() };
        assert_eq!(m["x"], Value::Num(Num::Int(1)));
        assert_eq!(m["y z"], Value::Bool(true));
    }

    #[test]
    fn inline_list_preserves_order() {
        let v = first_value("@a\n  l: [\"Hi\", \"Hello\", \"Hey\"]\n");
        let Value::InlineList(items) = v else { panic!() };
        assert_eq!(
            items,
            vec![
                Value::Str("Hi".into()),
                Value::Str("Hello".into()),
                Value::Str("Hey".into())
            ]
        );
    }

    #[test]
    fn trailing_comma_is_rejected() {
        let err = parse_err("@a\n  l: [1, 2,]\n");
        assert_eq!(err.code, Code::F001);
    }

    #[test]
    fn multiline_inline_collection_is_rejected() {
        let err = parse_err("@a\n  l: [1,\n    2]\n");
        assert_eq!(err.code, Code::F001);
    }

    #[test]
    fn pipeline_on_inline_sub_value_is_rejected() {
        let err = parse_err("@a\n  l: [\"x\" |> trim]\n");
        assert_eq!(err.code, Code::F001);
    }

    #[test]
    fn attr_interpolation_is_f304() {
        assert_eq!(parse_err("@a(role=\"{{x}}\")\n  k: 1\n").code, Code::F304);
        assert_eq!(parse_err("@a(role=\"$x\")\n  k: 1\n").code, Code::F304);
    }

    #[test]
    fn attr_pipeline_is_f301() {
        assert_eq!(
            parse_err("@a(role=\"dev\" |> upper)\n  k: 1\n").code,
            Code::F301
        );
    }

    #[test]
    fn unquoted_facet_if_is_f704() {
        assert_eq!(parse_err("@a(if=true)\n  k: 1\n").code, Code::F704);
    }

    #[test]
    fn lens_kwargs_and_args() {
        let doc = parse(
            &lex(&normalize(
                "@a\n  s: \"x\" |> replace(\"a\", \"b\") |> limit(n=8)\n",
            ))
            .unwrap(),
        )
        .unwrap();
        let Block::Map(kvs) = &doc.facets[0].body else { panic!() };
        let pipe = &kvs[0].pipeline;
        assert_eq!(pipe.len(), 2);
        assert_eq!(pipe[0].args.len(), 2);
        assert_eq!(pipe[1].kwarg("n"), Some(&LensArg::Num(Num::Int(8))));
    }

    #[test]
    fn bare_lens_name_means_no_args() {
        let doc = parse(&lex(&normalize("@a\n  s: \"x\" |> trim\n")).unwrap()).unwrap();
        let Block::Map(kvs) = &doc.facets[0].body else { panic!() };
        assert!(kvs[0].pipeline[0].args.is_empty());
    }

    #[test]
    fn identifier_lens_arg_is_f801() {
        assert_eq!(parse_err("@a\n  s: \"x\" |> replace(foo, \"b\")\n").code, Code::F801);
    }

    #[test]
    fn huge_integer_falls_back_to_float() {
        let v = first_value("@a\n  n: 99999999999999999999\n");
        assert!(matches!(v, Value::Num(Num::Float(_))));
    }
}
