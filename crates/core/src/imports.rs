//! Import expansion and facet merging.
//!
//! `@import` directives are expanded depth-first. Paths must be relative,
//! free of `..` components, not URLs, and resolve under one of the
//! configured allowlist roots (F601). A per-invocation cache keyed by
//! canonical path avoids re-parsing; an import already on the resolution
//! stack is a cycle, and the depth and total-count ceilings also surface as
//! F602.
//!
//! This stage also collapses duplicate facet names — imported or local —
//! by the merge rule, so every facet name is unique afterwards and no
//! `@import` facet survives.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::ast::{AttrValue, Block, Document, Facet, KeyValue, ListItem, Value};
use crate::error::{Code, Diagnostic, Pos};
use crate::lexer;
use crate::limits;
use crate::parser;
use crate::source::SourceProvider;

/// Expand all imports of `doc` and collapse duplicate facet names.
///
/// `current_file` anchors relative paths in the root document; imported
/// documents anchor their own imports at their location.
pub fn expand_document(
    doc: Document,
    provider: &dyn SourceProvider,
    import_roots: &[PathBuf],
    strict_merge: bool,
    current_file: Option<&Path>,
) -> Result<Vec<Facet>, Diagnostic> {
    let roots: Vec<PathBuf> = import_roots
        .iter()
        .filter_map(|r| provider.canonical(r).ok())
        .collect();
    let mut ctx = Expander {
        provider,
        roots,
        strict: strict_merge,
        count: 0,
        cache: HashMap::new(),
        stack: Vec::new(),
    };
    let base = current_file.and_then(|p| p.parent().map(Path::to_path_buf));
    ctx.expand(doc, base.as_deref())
}

struct Expander<'a> {
    provider: &'a dyn SourceProvider,
    roots: Vec<PathBuf>,
    strict: bool,
    count: usize,
    cache: HashMap<PathBuf, Vec<Facet>>,
    stack: Vec<PathBuf>,
}

impl<'a> Expander<'a> {
    fn expand(&mut self, doc: Document, base: Option<&Path>) -> Result<Vec<Facet>, Diagnostic> {
        let mut out: Vec<Facet> = Vec::new();
        for facet in doc.facets {
            if facet.name == "import" {
                let expanded = self.expand_import(&facet, base)?;
                for f in expanded {
                    merge_facet(&mut out, f, self.strict)?;
                }
            } else {
                merge_facet(&mut out, facet, self.strict)?;
            }
        }
        Ok(out)
    }

    fn expand_import(
        &mut self,
        directive: &Facet,
        base: Option<&Path>,
    ) -> Result<Vec<Facet>, Diagnostic> {
        let pos = directive.pos;
        let path = match directive.attrs.get("path") {
            Some(AttrValue::Str(p)) => p.clone(),
            _ => {
                return Err(Diagnostic::new(
                    Code::F601,
                    "@import path missing or invalid",
                    pos,
                ));
            }
        };
        let strategy = match directive.attrs.get("strategy") {
            None => Strategy::Merge,
            Some(AttrValue::Str(s)) if s == "merge" => Strategy::Merge,
            Some(AttrValue::Str(s)) if s == "replace" => Strategy::Replace,
            _ => {
                return Err(Diagnostic::new(
                    Code::F601,
                    "@import strategy must be \"merge\" or \"replace\"",
                    pos,
                ));
            }
        };

        if looks_like_url(&path) {
            return Err(Diagnostic::new(
                Code::F601,
                "network URLs are forbidden in @import",
                pos,
            ));
        }
        let rel = Path::new(&path);
        if rel.is_absolute() {
            return Err(Diagnostic::new(
                Code::F601,
                "absolute paths are forbidden in @import",
                pos,
            ));
        }
        if rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(Diagnostic::new(
                Code::F601,
                "'..' components are forbidden in @import",
                pos,
            ));
        }
        let base = match base.or_else(|| self.roots.first().map(PathBuf::as_path)) {
            Some(b) => b.to_path_buf(),
            None => {
                return Err(Diagnostic::new(
                    Code::F601,
                    "no import roots configured",
                    pos,
                ));
            }
        };
        let full = base.join(rel);
        let canon = self.provider.canonical(&full).map_err(|_| {
            Diagnostic::new(Code::F601, format!("import '{}' not found", path), pos)
        })?;
        if !self.roots.iter().any(|root| canon.starts_with(root)) {
            return Err(Diagnostic::new(
                Code::F601,
                format!("import '{}' is outside the allowed roots", path),
                pos,
            ));
        }

        if self.stack.len() >= limits::MAX_IMPORT_DEPTH {
            return Err(Diagnostic::new(Code::F602, "import depth exceeded", pos));
        }
        self.count += 1;
        if self.count > limits::MAX_IMPORTS {
            return Err(Diagnostic::new(Code::F602, "import count exceeded", pos));
        }
        if self.stack.contains(&canon) {
            return Err(Diagnostic::new(
                Code::F602,
                format!("import cycle detected at '{}'", path),
                pos,
            ));
        }
        if let Some(cached) = self.cache.get(&canon) {
            let facets = cached.clone();
            return self.apply_strategy(facets, strategy);
        }

        let text = self.provider.read(&canon).map_err(|e| {
            Diagnostic::new(Code::F601, format!("cannot read import '{}': {}", path, e), pos)
        })?;
        let normalized = lexer::normalize(&text);
        let sub = (|| {
            let tokens = lexer::lex(&normalized)?;
            parser::parse(&tokens)
        })()
        .map_err(|mut d| {
            d.attach_snippet(&normalized);
            d.message = format!("{}: {}", canon.display(), d.message);
            d
        })?;

        self.stack.push(canon.clone());
        let sub_base = canon.parent().map(Path::to_path_buf);
        let expanded = self.expand(sub, sub_base.as_deref())?;
        self.stack.pop();
        self.cache.insert(canon, expanded.clone());
        self.apply_strategy(expanded, strategy)
    }

    fn apply_strategy(
        &self,
        mut facets: Vec<Facet>,
        strategy: Strategy,
    ) -> Result<Vec<Facet>, Diagnostic> {
        if strategy == Strategy::Replace {
            // Tag facets so the caller replaces rather than merges.
            for f in &mut facets {
                f.attrs.insert(REPLACE_MARK.to_string(), AttrValue::Bool(true));
            }
        }
        Ok(facets)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Merge,
    Replace,
}

/// Internal marker attribute carried by facets imported under
/// `strategy="replace"`; consumed by [`merge_facet`], never emitted.
const REPLACE_MARK: &str = "__replace__";

fn looks_like_url(path: &str) -> bool {
    path.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
    })
}

/// Merge one facet into the accumulated list by name, honoring the replace
/// marker and the strict-merge rules.
fn merge_facet(out: &mut Vec<Facet>, mut facet: Facet, strict: bool) -> Result<(), Diagnostic> {
    let replace = facet.attrs.shift_remove(REPLACE_MARK).is_some();
    let Some(idx) = out.iter().position(|f| f.name == facet.name) else {
        out.push(facet);
        return Ok(());
    };
    if replace {
        out[idx] = facet;
        return Ok(());
    }
    let existing = &mut out[idx];
    // Attributes: later definitions override earlier by key.
    for (k, v) in facet.attrs {
        existing.attrs.insert(k, v);
    }
    if facet.anchor.is_some() {
        existing.anchor = facet.anchor;
    }
    let earlier = std::mem::replace(&mut existing.body, Block::Empty);
    existing.body = merge_blocks(earlier, facet.body, strict, facet.pos)?;
    Ok(())
}

fn merge_blocks(a: Block, b: Block, strict: bool, pos: Pos) -> Result<Block, Diagnostic> {
    match (a, b) {
        (Block::Empty, b) => Ok(b),
        (a, Block::Empty) => Ok(a),
        (Block::Map(x), Block::Map(y)) => Ok(Block::Map(merge_pairs(x, y, strict, pos)?)),
        (Block::List(x), Block::List(y)) => {
            let mut items = x;
            items.extend(y);
            Ok(Block::List(items))
        }
        (_, b) => {
            if strict {
                return Err(Diagnostic::new(
                    Code::F605,
                    "merge shape mismatch (mapping vs list) under strict merge",
                    pos,
                ));
            }
            Ok(b)
        }
    }
}

/// Merge mapping pairs key by key, recursively. Key order is first
/// appearance; a later scalar replaces an earlier one.
fn merge_pairs(
    a: Vec<KeyValue>,
    b: Vec<KeyValue>,
    strict: bool,
    pos: Pos,
) -> Result<Vec<KeyValue>, Diagnostic> {
    let mut out = a;
    for kv in b {
        let Some(idx) = out.iter().position(|e| e.key == kv.key) else {
            out.push(kv);
            continue;
        };
        let earlier = out[idx].clone();
        out[idx] = merge_pair(earlier, kv, strict, pos)?;
    }
    Ok(out)
}

fn merge_pair(mut a: KeyValue, b: KeyValue, strict: bool, pos: Pos) -> Result<KeyValue, Diagnostic> {
    match (shape(&a.value), shape(&b.value)) {
        (Shape::Map, Shape::Map) => {
            let x = into_pairs(std::mem::replace(&mut a.value, Value::Null));
            let y = into_pairs(b.value);
            a.value = Value::Map(merge_pairs(x, y, strict, pos)?);
            Ok(a)
        }
        (Shape::List, Shape::List) => {
            let mut items = into_items(std::mem::replace(&mut a.value, Value::Null));
            items.extend(into_items(b.value));
            a.value = Value::List(items);
            Ok(a)
        }
        (Shape::Scalar, Shape::Scalar) => Ok(b),
        _ => {
            if strict {
                return Err(Diagnostic::new(
                    Code::F605,
                    format!("merge shape mismatch for key '{}' under strict merge", a.key),
                    pos,
                ));
            }
            Ok(b)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Map,
    List,
    Scalar,
}

fn shape(v: &Value) -> Shape {
    match v {
        Value::Map(_) | Value::InlineMap(_) => Shape::Map,
        Value::List(_) | Value::InlineList(_) => Shape::List,
        _ => Shape::Scalar,
    }
}

fn into_pairs(v: Value) -> Vec<KeyValue> {
    match v {
        Value::Map(kvs) => kvs,
        Value::InlineMap(m) => m
            .into_iter()
            .map(|(key, value)| KeyValue {
                key,
                value,
                pipeline: Vec::new(),
                pos: Pos::start(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn into_items(v: Value) -> Vec<ListItem> {
    match v {
        Value::List(items) => items,
        Value::InlineList(values) => values
            .into_iter()
            .map(|value| ListItem {
                value,
                item_if: None,
                pipeline: Vec::new(),
                pos: Pos::start(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;

    fn parse_doc(src: &str) -> Document {
        let normalized = lexer::normalize(src);
        parser::parse(&lexer::lex(&normalized).unwrap()).unwrap()
    }

    fn expand_with(
        root_src: &str,
        files: &[(&str, &str)],
        strict: bool,
    ) -> Result<Vec<Facet>, Diagnostic> {
        let mut provider = InMemorySource::new().with("/roots/main.facet", root_src);
        for (path, text) in files {
            provider = provider.with(*path, *text);
        }
        expand_document(
            parse_doc(root_src),
            &provider,
            &[PathBuf::from("/roots")],
            strict,
            Some(Path::new("/roots/main.facet")),
        )
    }

    #[test]
    fn merge_import_combines_mapping_bodies() {
        let facets = expand_with(
            "@import \"lib.facet\"\n@system\n  tone: \"warm\"\n",
            &[("/roots/lib.facet", "@system\n  style: \"concise\"\n")],
            false,
        )
        .unwrap();
        assert_eq!(facets.len(), 1);
        let Block::Map(kvs) = &facets[0].body else { panic!() };
        assert_eq!(kvs[0].key, "style");
        assert_eq!(kvs[1].key, "tone");
    }

    #[test]
    fn replace_strategy_supersedes() {
        let facets = expand_with(
            "@system\n  style: \"verbose\"\n@import(path=\"lib.facet\", strategy=\"replace\")\n",
            &[("/roots/lib.facet", "@system\n  style: \"concise\"\n")],
            false,
        )
        .unwrap();
        let Block::Map(kvs) = &facets[0].body else { panic!() };
        assert_eq!(kvs.len(), 1);
        assert_eq!(kvs[0].value, Value::Str("concise".into()));
        assert!(!facets[0].attrs.contains_key(REPLACE_MARK));
    }

    #[test]
    fn list_bodies_concatenate_in_load_order() {
        let facets = expand_with(
            "@import \"lib.facet\"\n@plan\n  - \"local\"\n",
            &[("/roots/lib.facet", "@plan\n  - \"imported\"\n")],
            false,
        )
        .unwrap();
        let Block::List(items) = &facets[0].body else { panic!() };
        assert_eq!(items[0].value, Value::Str("imported".into()));
        assert_eq!(items[1].value, Value::Str("local".into()));
    }

    #[test]
    fn shape_mismatch_strict_is_f605() {
        let err = expand_with(
            "@import \"lib.facet\"\n@plan\n  k: 1\n",
            &[("/roots/lib.facet", "@plan\n  - \"x\"\n")],
            true,
        )
        .unwrap_err();
        assert_eq!(err.code, Code::F605);
    }

    #[test]
    fn shape_mismatch_lenient_replaces() {
        let facets = expand_with(
            "@import \"lib.facet\"\n@plan\n  k: 1\n",
            &[("/roots/lib.facet", "@plan\n  - \"x\"\n")],
            false,
        )
        .unwrap();
        assert!(matches!(facets[0].body, Block::Map(_)));
    }

    #[test]
    fn absolute_url_and_dotdot_paths_are_f601() {
        for src in [
            "@import \"/etc/passwd\"\n",
            "@import \"https://evil.example/x.facet\"\n",
            "@import \"../outside.facet\"\n",
        ] {
            let err = expand_with(src, &[], false).unwrap_err();
            assert_eq!(err.code, Code::F601, "for {}", src);
        }
    }

    #[test]
    fn import_outside_roots_is_f601() {
        let provider = InMemorySource::new()
            .with("/roots/main.facet", "x")
            .with("/other/lib.facet", "@a\n");
        let err = expand_document(
            parse_doc("@import \"lib.facet\"\n"),
            &provider,
            &[PathBuf::from("/roots")],
            false,
            Some(Path::new("/other/main.facet")),
        )
        .unwrap_err();
        assert_eq!(err.code, Code::F601);
    }

    #[test]
    fn import_cycle_is_f602() {
        let err = expand_with(
            "@import \"a.facet\"\n",
            &[
                ("/roots/a.facet", "@import \"b.facet\"\n"),
                ("/roots/b.facet", "@import \"a.facet\"\n"),
            ],
            false,
        )
        .unwrap_err();
        assert_eq!(err.code, Code::F602);
    }

    #[test]
    fn missing_import_is_f601() {
        let err = expand_with("@import \"nope.facet\"\n", &[], false).unwrap_err();
        assert_eq!(err.code, Code::F601);
    }

    #[test]
    fn local_duplicate_facets_collapse() {
        let facets = expand_with(
            "@system\n  a: 1\n@system\n  b: 2\n",
            &[],
            false,
        )
        .unwrap();
        assert_eq!(facets.len(), 1);
        let Block::Map(kvs) = &facets[0].body else { panic!() };
        assert_eq!(kvs.len(), 2);
    }

    #[test]
    fn recursive_map_merge() {
        let facets = expand_with(
            "@import \"lib.facet\"\n@cfg\n  net:\n    retries: 3\n",
            &[(
                "/roots/lib.facet",
                "@cfg\n  net:\n    timeout: 30s\n    retries: 1\n",
            )],
            false,
        )
        .unwrap();
        let Block::Map(kvs) = &facets[0].body else { panic!() };
        let Value::Map(net) = &kvs[0].value else { panic!() };
        assert_eq!(net.len(), 2);
        assert_eq!(net[0].key, "timeout");
        assert_eq!(net[1].key, "retries");
        assert_eq!(net[1].value, Value::Num(crate::ast::Num::Int(3)));
    }
}
