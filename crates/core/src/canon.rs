//! Pipeline orchestration and the host-facing entry points.
//!
//! [`canonize`] runs the fixed stage order: lex + parse, import expansion,
//! variable scope assembly and typing, conditional pruning, substitution
//! and interpolation, pipelines, anchor resolution, extended-scalar and
//! fence conversion, JSON construction. Each stage consumes the previous
//! stage's tree and returns a new one; the first stage to fail ends the
//! run with its diagnostics. [`lint`] stops after parsing and reports
//! every diagnostic the recovering parser collected.

use std::path::PathBuf;

use serde_json::Value as Json;

use crate::anchors;
use crate::ast::{AttrValue, Block, Facet, KeyValue, ListItem, Value};
use crate::error::{Code, Diagnostic, Pos};
use crate::expr;
use crate::imports;
use crate::lenses::{self, LensCtx};
use crate::lexer;
use crate::limits;
use crate::parser;
use crate::source::{FileSystemSource, SourceProvider};
use crate::vars::{self, Scope};

/// Which variables participate in substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Only host-supplied variables are visible.
    #[default]
    Host,
    /// The document's `@vars` merge over host variables (document wins).
    All,
}

/// Configuration for one `canonize` call.
#[derive(Default)]
pub struct CanonizeOptions {
    pub resolve_mode: ResolveMode,
    pub host_vars: Scope,
    /// Allowlist roots for `@import`; empty rejects every import.
    pub import_roots: Vec<PathBuf>,
    pub strict_merge: bool,
    /// Location of the source document, anchoring relative import paths.
    pub current_file: Option<PathBuf>,
}

/// Canonicalize a FACET document to its JSON value, reading imports from
/// the filesystem.
pub fn canonize(source: &str, opts: &CanonizeOptions) -> Result<Json, Vec<Diagnostic>> {
    canonize_with_provider(source, opts, &FileSystemSource)
}

/// Canonicalize with a caller-supplied import source.
pub fn canonize_with_provider(
    source: &str,
    opts: &CanonizeOptions,
    provider: &dyn SourceProvider,
) -> Result<Json, Vec<Diagnostic>> {
    let normalized = lexer::normalize(source);
    run_pipeline(&normalized, opts, provider).map_err(|mut diags| {
        for d in &mut diags {
            d.attach_snippet(&normalized);
        }
        diags
    })
}

/// Lex, parse and report structural diagnostics without running imports,
/// variables or any later stage. An empty result means a clean document.
pub fn lint(source: &str) -> Vec<Diagnostic> {
    let normalized = lexer::normalize(source);
    if normalized.len() > limits::MAX_DOC_BYTES {
        return vec![doc_too_large()];
    }
    let tokens = match lexer::lex(&normalized) {
        Ok(t) => t,
        Err(mut e) => {
            e.attach_snippet(&normalized);
            return vec![e];
        }
    };
    let (_, mut errors) = parser::parse_recovering(&tokens, limits::MAX_PARSE_ERRORS);
    for e in &mut errors {
        e.attach_snippet(&normalized);
    }
    errors
}

fn doc_too_large() -> Diagnostic {
    Diagnostic::new(
        Code::F999,
        format!("document exceeds {} bytes", limits::MAX_DOC_BYTES),
        Pos::start(),
    )
}

fn run_pipeline(
    src: &str,
    opts: &CanonizeOptions,
    provider: &dyn SourceProvider,
) -> Result<Json, Vec<Diagnostic>> {
    if src.len() > limits::MAX_DOC_BYTES {
        return Err(vec![doc_too_large()]);
    }
    let tokens = lexer::lex(src).map_err(|e| vec![e])?;
    let (doc, parse_errors) = parser::parse_recovering(&tokens, limits::MAX_PARSE_ERRORS);
    if !parse_errors.is_empty() {
        return Err(parse_errors);
    }

    let facets = imports::expand_document(
        doc,
        provider,
        &opts.import_roots,
        opts.strict_merge,
        opts.current_file.as_deref(),
    )
    .map_err(one)?;

    let mut lens_ctx = LensCtx::new();

    // Compile-time facets are consumed here and never reach the output.
    let mut doc_vars = Scope::new();
    let mut specs = Scope::new();
    let mut specs_pos = Pos::start();
    let mut normal = Vec::new();
    for facet in facets {
        match facet.name.as_str() {
            "vars" => doc_vars = vars::collect_vars(&facet, &mut lens_ctx).map_err(|e| vec![e])?,
            "var_types" => {
                specs_pos = facet.pos;
                specs = vars::collect_var_types(&facet).map_err(|e| vec![e])?;
            }
            _ => normal.push(facet),
        }
    }
    if !specs.is_empty() {
        vars::validate_var_types(&doc_vars, &specs, &mut lens_ctx, specs_pos).map_err(one)?;
    }
    let env = vars::assemble_scope(
        opts.resolve_mode == ResolveMode::All,
        &opts.host_vars,
        &doc_vars,
    );

    let facets = prune_facets(normal, &env).map_err(one)?;
    let facets = vars::resolve_facets(facets, &env, &mut lens_ctx).map_err(one)?;
    let facets = apply_lenses(facets, &mut lens_ctx).map_err(one)?;
    let facets = anchors::resolve_facets(facets).map_err(one)?;
    build(&facets).map_err(one)
}

fn one(d: Diagnostic) -> Vec<Diagnostic> {
    vec![d]
}

// ── stage 4: conditional pruning ─────────────────────────────────────

fn prune_facets(facets: Vec<Facet>, env: &Scope) -> Result<Vec<Facet>, Diagnostic> {
    let mut out = Vec::with_capacity(facets.len());
    for mut facet in facets {
        if let Some(cond) = facet.attrs.shift_remove("if") {
            let AttrValue::Str(cond) = cond else {
                return Err(Diagnostic::new(
                    Code::F704,
                    "conditional expression must be a quoted string",
                    facet.pos,
                ));
            };
            if !expr::eval_if(&cond, env, facet.pos)? {
                continue;
            }
        }
        facet.body = prune_block(facet.body, env)?;
        out.push(facet);
    }
    Ok(out)
}

fn prune_block(block: Block, env: &Scope) -> Result<Block, Diagnostic> {
    match block {
        Block::Empty => Ok(Block::Empty),
        Block::Map(kvs) => {
            let kvs = kvs
                .into_iter()
                .map(|mut kv| {
                    let value = std::mem::replace(&mut kv.value, Value::Null);
                    kv.value = prune_value(value, env)?;
                    Ok(kv)
                })
                .collect::<Result<Vec<_>, Diagnostic>>()?;
            Ok(Block::Map(kvs))
        }
        Block::List(items) => Ok(Block::List(prune_items(items, env)?)),
    }
}

fn prune_items(items: Vec<ListItem>, env: &Scope) -> Result<Vec<ListItem>, Diagnostic> {
    let mut out = Vec::with_capacity(items.len());
    for mut item in items {
        if let Some(cond) = item.item_if.take() {
            if !expr::eval_if(&cond, env, item.pos)? {
                continue;
            }
        }
        let value = std::mem::replace(&mut item.value, Value::Null);
        item.value = prune_value(value, env)?;
        out.push(item);
    }
    Ok(out)
}

fn prune_value(v: Value, env: &Scope) -> Result<Value, Diagnostic> {
    match v {
        Value::Map(kvs) => {
            let kvs = kvs
                .into_iter()
                .map(|mut kv| {
                    let value = std::mem::replace(&mut kv.value, Value::Null);
                    kv.value = prune_value(value, env)?;
                    Ok(kv)
                })
                .collect::<Result<Vec<_>, Diagnostic>>()?;
            Ok(Value::Map(kvs))
        }
        Value::List(items) => Ok(Value::List(prune_items(items, env)?)),
        Value::InlineMap(map) => {
            let mut out = indexmap::IndexMap::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, prune_value(v, env)?);
            }
            Ok(Value::InlineMap(out))
        }
        Value::InlineList(items) => {
            let items = items
                .into_iter()
                .map(|v| prune_value(v, env))
                .collect::<Result<Vec<_>, Diagnostic>>()?;
            Ok(Value::InlineList(items))
        }
        Value::Anchor { label, value } => Ok(Value::Anchor {
            label,
            value: Box::new(prune_value(*value, env)?),
        }),
        other => Ok(other),
    }
}

// ── stage 6: pipelines ───────────────────────────────────────────────

fn apply_lenses(facets: Vec<Facet>, ctx: &mut LensCtx) -> Result<Vec<Facet>, Diagnostic> {
    facets
        .into_iter()
        .map(|mut facet| {
            let body = std::mem::replace(&mut facet.body, Block::Empty);
            facet.body = lens_block(body, ctx)?;
            Ok(facet)
        })
        .collect()
}

fn lens_block(block: Block, ctx: &mut LensCtx) -> Result<Block, Diagnostic> {
    match block {
        Block::Empty => Ok(Block::Empty),
        Block::Map(kvs) => {
            let kvs = kvs
                .into_iter()
                .map(|kv| lens_pair(kv, ctx))
                .collect::<Result<Vec<_>, Diagnostic>>()?;
            Ok(Block::Map(kvs))
        }
        Block::List(items) => {
            let items = items
                .into_iter()
                .map(|item| lens_item(item, ctx))
                .collect::<Result<Vec<_>, Diagnostic>>()?;
            Ok(Block::List(items))
        }
    }
}

fn lens_pair(mut kv: KeyValue, ctx: &mut LensCtx) -> Result<KeyValue, Diagnostic> {
    let mut value = lens_value(std::mem::replace(&mut kv.value, Value::Null), ctx)?;
    let pipeline = std::mem::take(&mut kv.pipeline);
    if !pipeline.is_empty() {
        value = lenses::apply_pipeline(value, &pipeline, ctx)?;
    }
    kv.value = value;
    Ok(kv)
}

fn lens_item(mut item: ListItem, ctx: &mut LensCtx) -> Result<ListItem, Diagnostic> {
    let mut value = lens_value(std::mem::replace(&mut item.value, Value::Null), ctx)?;
    let pipeline = std::mem::take(&mut item.pipeline);
    if !pipeline.is_empty() {
        value = lenses::apply_pipeline(value, &pipeline, ctx)?;
    }
    item.value = value;
    Ok(item)
}

fn lens_value(v: Value, ctx: &mut LensCtx) -> Result<Value, Diagnostic> {
    match v {
        Value::Map(kvs) => {
            let kvs = kvs
                .into_iter()
                .map(|kv| lens_pair(kv, ctx))
                .collect::<Result<Vec<_>, Diagnostic>>()?;
            Ok(Value::Map(kvs))
        }
        Value::List(items) => {
            let items = items
                .into_iter()
                .map(|item| lens_item(item, ctx))
                .collect::<Result<Vec<_>, Diagnostic>>()?;
            Ok(Value::List(items))
        }
        Value::InlineMap(map) => {
            let mut out = indexmap::IndexMap::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, lens_value(v, ctx)?);
            }
            Ok(Value::InlineMap(out))
        }
        Value::InlineList(items) => {
            let items = items
                .into_iter()
                .map(|v| lens_value(v, ctx))
                .collect::<Result<Vec<_>, Diagnostic>>()?;
            Ok(Value::InlineList(items))
        }
        Value::Anchor { label, value } => Ok(Value::Anchor {
            label,
            value: Box::new(lens_value(*value, ctx)?),
        }),
        other => Ok(other),
    }
}

// ── stages 8-9: JSON construction ────────────────────────────────────

fn build(facets: &[Facet]) -> Result<Json, Diagnostic> {
    let mut root = serde_json::Map::new();
    for facet in facets {
        let mut obj = serde_json::Map::new();
        obj.insert("_attrs".to_string(), attrs_json(facet));
        match &facet.body {
            Block::Empty => {}
            Block::Map(kvs) => {
                for kv in kvs {
                    obj.insert(kv.key.clone(), final_json(&kv.value, kv.pos)?);
                }
            }
            Block::List(items) => {
                let mut arr = Vec::with_capacity(items.len());
                for item in items {
                    arr.push(final_json(&item.value, item.pos)?);
                }
                obj.insert("items".to_string(), Json::Array(arr));
            }
        }
        root.insert(facet.name.clone(), Json::Object(obj));
    }
    Ok(Json::Object(root))
}

fn attrs_json(facet: &Facet) -> Json {
    let mut out = serde_json::Map::new();
    for (key, value) in &facet.attrs {
        let v = match value {
            AttrValue::Str(s) => Json::String(s.clone()),
            AttrValue::Num(n) => n.to_json(),
            AttrValue::Bool(b) => Json::Bool(*b),
            AttrValue::Null => Json::Null,
            AttrValue::Ident(s) => Json::String(s.clone()),
        };
        out.insert(key.clone(), v);
    }
    Json::Object(out)
}

/// Convert an evaluated value to JSON. Extended scalars and fences become
/// their string form; anchors and aliases were resolved in stage 7, so
/// meeting one here is an engine defect.
fn final_json(v: &Value, pos: Pos) -> Result<Json, Diagnostic> {
    match v {
        Value::Str(s) | Value::Ident(s) => Ok(Json::String(s.clone())),
        Value::Num(n) => Ok(n.to_json()),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Null => Ok(Json::Null),
        Value::Fence { body, .. } => Ok(Json::String(body.clone())),
        Value::Ext { text, .. } => Ok(Json::String(text.clone())),
        Value::InlineMap(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), final_json(v, pos)?);
            }
            Ok(Json::Object(out))
        }
        Value::Map(kvs) => {
            let mut out = serde_json::Map::new();
            for kv in kvs {
                out.insert(kv.key.clone(), final_json(&kv.value, kv.pos)?);
            }
            Ok(Json::Object(out))
        }
        Value::InlineList(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(final_json(item, pos)?);
            }
            Ok(Json::Array(arr))
        }
        Value::List(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(final_json(&item.value, item.pos)?);
            }
            Ok(Json::Array(arr))
        }
        Value::Anchor { .. } | Value::Alias(_) => Err(Diagnostic::new(
            Code::F999,
            "unresolved anchor reached JSON construction",
            pos,
        )),
    }
}
