//! Variable scope, `@var_types` validation, substitution and interpolation.
//!
//! `@vars` resolves top-down: a value may reference names declared above it
//! (`$name`, `${a.b}` or `{{path}}`); a forward reference is F404. The
//! assembled scope is then either the host variables alone (*host* mode) or
//! the document variables merged over them (*all* mode, document wins).
//!
//! Substitution (`$name` replacing the whole scalar) and interpolation
//! (`{{ path }}` inside quoted strings, optionally with a lens pipeline)
//! run over every value except fence bodies and attributes.

use serde_json::Value as Json;

use crate::ast::{Block, Facet, KeyValue, LensArg, LensCall, ListItem, Num, Value};
use crate::error::{Code, Diagnostic, Pos};
use crate::lenses::{self, LensCtx};
use crate::lexer;
use crate::parser;

pub type Scope = serde_json::Map<String, Json>;

const ALLOWED_TYPES: &[&str] = &["string", "int", "float", "bool", "array", "object"];

/// Assemble the active variable scope from the resolve mode.
pub fn assemble_scope(resolve_all: bool, host_vars: &Scope, doc_vars: &Scope) -> Scope {
    if !resolve_all {
        return host_vars.clone();
    }
    let mut env = host_vars.clone();
    for (k, v) in doc_vars {
        env.insert(k.clone(), v.clone());
    }
    env
}

// ── @vars collection ─────────────────────────────────────────────────

/// Flatten a `@vars` facet into a JSON map, resolving references top-down.
pub fn collect_vars(facet: &Facet, ctx: &mut LensCtx) -> Result<Scope, Diagnostic> {
    let mut acc = Scope::new();
    let kvs = match &facet.body {
        Block::Map(kvs) => kvs,
        Block::Empty => return Ok(acc),
        Block::List(_) => {
            return Err(Diagnostic::new(
                Code::F101,
                "@vars body must be a mapping",
                facet.pos,
            ));
        }
    };
    for kv in kvs {
        let val = var_value(&kv.value, &acc, ctx, kv.pos)?;
        acc.insert(kv.key.clone(), val);
    }
    Ok(acc)
}

fn var_value(v: &Value, env: &Scope, ctx: &mut LensCtx, pos: Pos) -> Result<Json, Diagnostic> {
    match v {
        Value::Str(s) => {
            if let Some(path) = scalar_var_path(s) {
                return lookup(env, path).ok_or_else(|| {
                    Diagnostic::new(
                        Code::F404,
                        format!("variable forward reference '{}'", path),
                        pos,
                    )
                });
            }
            if s.contains("{{") || s.contains("\\}}") {
                let text = interpolate(s, env, ctx, pos).map_err(|e| {
                    if e.code == Code::F402A {
                        Diagnostic::new(
                            Code::F404,
                            e.message.replace("undefined template variable", "variable forward reference"),
                            pos,
                        )
                    } else {
                        e
                    }
                })?;
                return Ok(Json::String(text));
            }
            Ok(Json::String(s.clone()))
        }
        Value::Num(n) => Ok(n.to_json()),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Null => Ok(Json::Null),
        Value::Ident(s) => Ok(Json::String(s.clone())),
        Value::Fence { body, .. } => Ok(Json::String(body.clone())),
        Value::Ext { text, .. } => Ok(Json::String(text.clone())),
        Value::InlineList(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(var_value(item, env, ctx, pos)?);
            }
            Ok(Json::Array(arr))
        }
        Value::List(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(var_value(&item.value, env, ctx, item.pos)?);
            }
            Ok(Json::Array(arr))
        }
        Value::InlineMap(map) => {
            let mut obj = Scope::new();
            for (k, v) in map {
                obj.insert(k.clone(), var_value(v, env, ctx, pos)?);
            }
            Ok(Json::Object(obj))
        }
        Value::Map(kvs) => {
            let mut obj = Scope::new();
            for kv in kvs {
                obj.insert(kv.key.clone(), var_value(&kv.value, env, ctx, kv.pos)?);
            }
            Ok(Json::Object(obj))
        }
        Value::Anchor { value, .. } => var_value(value, env, ctx, pos),
        Value::Alias(label) => Err(Diagnostic::new(
            Code::F201,
            format!("alias '*{}' is not available inside @vars", label),
            pos,
        )),
    }
}

// ── @var_types validation ────────────────────────────────────────────

/// Collect `@var_types` specs as a JSON map of schema objects.
pub fn collect_var_types(facet: &Facet) -> Result<Scope, Diagnostic> {
    let mut specs = Scope::new();
    let kvs = match &facet.body {
        Block::Map(kvs) => kvs,
        Block::Empty => return Ok(specs),
        Block::List(_) => {
            return Err(Diagnostic::new(
                Code::F401,
                "@var_types body must be a mapping",
                facet.pos,
            ));
        }
    };
    for kv in kvs {
        let spec = spec_value(&kv.value, kv.pos)?;
        if !spec.is_object() {
            return Err(Diagnostic::new(
                Code::F401,
                format!("schema for '{}' must be an object", kv.key),
                kv.pos,
            ));
        }
        specs.insert(kv.key.clone(), spec);
    }
    Ok(specs)
}

fn spec_value(v: &Value, pos: Pos) -> Result<Json, Diagnostic> {
    match v {
        Value::Str(s) | Value::Ident(s) => Ok(Json::String(s.clone())),
        Value::Num(n) => Ok(n.to_json()),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Null => Ok(Json::Null),
        Value::InlineList(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(spec_value(item, pos)?);
            }
            Ok(Json::Array(arr))
        }
        Value::List(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(spec_value(&item.value, item.pos)?);
            }
            Ok(Json::Array(arr))
        }
        Value::InlineMap(map) => {
            let mut obj = Scope::new();
            for (k, v) in map {
                obj.insert(k.clone(), spec_value(v, pos)?);
            }
            Ok(Json::Object(obj))
        }
        Value::Map(kvs) => {
            let mut obj = Scope::new();
            for kv in kvs {
                obj.insert(kv.key.clone(), spec_value(&kv.value, kv.pos)?);
            }
            Ok(Json::Object(obj))
        }
        _ => Err(Diagnostic::new(
            Code::F401,
            "schemas may contain only literals and collections",
            pos,
        )),
    }
}

/// Check every declared variable against its schema. Schema defects are
/// F401, type mismatches F451, constraint violations F452.
pub fn validate_var_types(
    vars: &Scope,
    specs: &Scope,
    ctx: &mut LensCtx,
    pos: Pos,
) -> Result<(), Diagnostic> {
    for (path, spec) in specs {
        let spec = spec
            .as_object()
            .ok_or_else(|| Diagnostic::new(Code::F401, format!("schema for '{}' must be an object", path), pos))?;
        let declared = spec
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| Diagnostic::new(Code::F401, format!("schema for '{}' is missing 'type'", path), pos))?;
        if !ALLOWED_TYPES.contains(&declared) {
            return Err(Diagnostic::new(
                Code::F401,
                format!("unknown type '{}' for '{}'", declared, path),
                pos,
            ));
        }
        let Some(actual) = lookup(vars, path) else {
            return Err(Diagnostic::new(
                Code::F451,
                format!("path '{}' not found in @vars", path),
                pos,
            ));
        };
        let actual_type = type_of(&actual);
        let type_ok = match declared {
            "float" => matches!(actual_type, "float" | "int"),
            other => other == actual_type,
        };
        if !type_ok {
            return Err(Diagnostic::new(
                Code::F451,
                format!(
                    "type mismatch for '{}': expected {}, got {}",
                    path, declared, actual_type
                ),
                pos,
            ));
        }
        if let Some(allowed) = spec.get("enum") {
            let allowed = allowed.as_array().ok_or_else(|| {
                Diagnostic::new(Code::F401, format!("enum for '{}' must be an array", path), pos)
            })?;
            if !allowed.iter().any(|v| json_eq(v, &actual)) {
                return Err(Diagnostic::new(
                    Code::F452,
                    format!("enum violation for '{}'", path),
                    pos,
                ));
            }
        }
        for (bound, key) in [(spec.get("min"), "min"), (spec.get("max"), "max")] {
            let Some(bound) = bound else { continue };
            if !matches!(declared, "int" | "float") {
                return Err(Diagnostic::new(
                    Code::F401,
                    format!("'{}' constraint on '{}' requires a numeric type", key, path),
                    pos,
                ));
            }
            let Some(limit) = bound.as_f64() else {
                return Err(Diagnostic::new(
                    Code::F401,
                    format!("'{}' for '{}' must be a number", key, path),
                    pos,
                ));
            };
            let x = actual.as_f64().unwrap_or_default();
            let violated = match key {
                "min" => x < limit,
                _ => x > limit,
            };
            if violated {
                return Err(Diagnostic::new(
                    Code::F452,
                    format!("{} violation for '{}': {} vs {}", key, path, x, limit),
                    pos,
                ));
            }
        }
        if let Some(pattern) = spec.get("pattern") {
            if declared != "string" {
                return Err(Diagnostic::new(
                    Code::F401,
                    format!("'pattern' constraint on '{}' requires type string", path),
                    pos,
                ));
            }
            let Some(pattern) = pattern.as_str() else {
                return Err(Diagnostic::new(
                    Code::F401,
                    format!("'pattern' for '{}' must be a string", path),
                    pos,
                ));
            };
            let anchored = format!("^(?:{})$", pattern);
            let re = ctx.regex(&anchored, pos)?;
            let text = actual.as_str().unwrap_or_default();
            if !re.is_match(text) {
                return Err(Diagnostic::new(
                    Code::F452,
                    format!("pattern violation for '{}'", path),
                    pos,
                ));
            }
        }
    }
    Ok(())
}

fn type_of(v: &Json) -> &'static str {
    match v {
        Json::String(_) => "string",
        Json::Bool(_) => "bool",
        Json::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Json::Array(_) => "array",
        Json::Object(_) => "object",
        Json::Null => "object",
    }
}

fn json_eq(a: &Json, b: &Json) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

// ── substitution and interpolation over facet bodies ─────────────────

/// Run scalar substitution and string interpolation through every facet
/// body. Fence bodies and attributes are never touched.
pub fn resolve_facets(
    facets: Vec<Facet>,
    env: &Scope,
    ctx: &mut LensCtx,
) -> Result<Vec<Facet>, Diagnostic> {
    facets
        .into_iter()
        .map(|mut f| {
            let body = std::mem::replace(&mut f.body, Block::Empty);
            f.body = resolve_block(body, env, ctx, f.pos)?;
            Ok(f)
        })
        .collect()
}

fn resolve_block(block: Block, env: &Scope, ctx: &mut LensCtx, pos: Pos) -> Result<Block, Diagnostic> {
    match block {
        Block::Empty => Ok(Block::Empty),
        Block::Map(kvs) => Ok(Block::Map(resolve_pairs(kvs, env, ctx)?)),
        Block::List(items) => Ok(Block::List(resolve_items(items, env, ctx, pos)?)),
    }
}

fn resolve_pairs(
    kvs: Vec<KeyValue>,
    env: &Scope,
    ctx: &mut LensCtx,
) -> Result<Vec<KeyValue>, Diagnostic> {
    kvs.into_iter()
        .map(|mut kv| {
            let value = std::mem::replace(&mut kv.value, Value::Null);
            kv.value = resolve_value(value, env, ctx, kv.pos)?;
            Ok(kv)
        })
        .collect()
}

fn resolve_items(
    items: Vec<ListItem>,
    env: &Scope,
    ctx: &mut LensCtx,
    _pos: Pos,
) -> Result<Vec<ListItem>, Diagnostic> {
    items
        .into_iter()
        .map(|mut item| {
            let value = std::mem::replace(&mut item.value, Value::Null);
            item.value = resolve_value(value, env, ctx, item.pos)?;
            Ok(item)
        })
        .collect()
}

fn resolve_value(v: Value, env: &Scope, ctx: &mut LensCtx, pos: Pos) -> Result<Value, Diagnostic> {
    match v {
        Value::Str(s) => {
            if let Some(path) = scalar_var_path(&s) {
                let val = lookup(env, path).ok_or_else(|| {
                    Diagnostic::new(
                        Code::F404,
                        format!("undefined substitution path '{}'", path),
                        pos,
                    )
                })?;
                return Ok(json_to_value(val));
            }
            if s.contains("{{") || s.contains("\\}}") {
                return Ok(Value::Str(interpolate(&s, env, ctx, pos)?));
            }
            Ok(Value::Str(s))
        }
        Value::Ident(s) => Ok(Value::Str(s)),
        Value::Anchor { label, value } => Ok(Value::Anchor {
            label,
            value: Box::new(resolve_value(*value, env, ctx, pos)?),
        }),
        Value::InlineMap(map) => {
            let mut out = indexmap::IndexMap::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, resolve_value(v, env, ctx, pos)?);
            }
            Ok(Value::InlineMap(out))
        }
        Value::InlineList(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_value(item, env, ctx, pos)?);
            }
            Ok(Value::InlineList(out))
        }
        Value::Map(kvs) => Ok(Value::Map(resolve_pairs(kvs, env, ctx)?)),
        Value::List(items) => Ok(Value::List(resolve_items(items, env, ctx, pos)?)),
        other => Ok(other),
    }
}

/// The whole-scalar substitution form: `$name` or `${a.b}`.
fn scalar_var_path(s: &str) -> Option<&str> {
    if let Some(inner) = s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
        let path = inner.trim();
        if !path.is_empty() {
            return Some(path);
        }
        return None;
    }
    let name = s.strip_prefix('$')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.')) {
        Some(name)
    } else {
        None
    }
}

fn lookup(env: &Scope, path: &str) -> Option<Json> {
    let mut parts = path.split('.');
    let mut cur = env.get(parts.next()?)?;
    for part in parts {
        cur = cur.get(part)?;
    }
    Some(cur.clone())
}

fn json_to_value(v: Json) -> Value {
    match v {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Num(Num::Int(i))
            } else {
                Value::Num(Num::Float(n.as_f64().unwrap_or_default()))
            }
        }
        Json::String(s) => Value::Str(s),
        Json::Array(items) => {
            Value::InlineList(items.into_iter().map(json_to_value).collect())
        }
        Json::Object(map) => {
            let mut out = indexmap::IndexMap::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k, json_to_value(v));
            }
            Value::InlineMap(out)
        }
    }
}

/// Interpolate `{{ path }}` and `{{ path |> lens(...) }}` markers inside a
/// string. `\{{` and `\}}` escape literal braces. Non-string results embed
/// in their compact JSON form.
pub fn interpolate(
    text: &str,
    env: &Scope,
    ctx: &mut LensCtx,
    pos: Pos,
) -> Result<String, Diagnostic> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        if rest.is_empty() {
            break;
        }
        if let Some(tail) = rest.strip_prefix("\\{{") {
            out.push_str("{{");
            rest = tail;
            continue;
        }
        if let Some(tail) = rest.strip_prefix("\\}}") {
            out.push_str("}}");
            rest = tail;
            continue;
        }
        if let Some(tail) = rest.strip_prefix("{{") {
            let Some(end) = tail.find("}}") else {
                return Err(Diagnostic::new(
                    Code::F402B,
                    "unclosed interpolation marker",
                    pos,
                ));
            };
            let inner = tail[..end].trim();
            if inner.is_empty() {
                return Err(Diagnostic::new(
                    Code::F402B,
                    "empty interpolation marker",
                    pos,
                ));
            }
            out.push_str(&expand_marker(inner, env, ctx, pos)?);
            rest = &tail[end + 2..];
            continue;
        }
        let ch = rest.chars().next().unwrap_or_default();
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    Ok(out)
}

fn expand_marker(
    inner: &str,
    env: &Scope,
    ctx: &mut LensCtx,
    pos: Pos,
) -> Result<String, Diagnostic> {
    let (path, chain_text) = match inner.find("|>") {
        Some(idx) => (inner[..idx].trim(), Some(inner[idx + 2..].trim())),
        None => (inner, None),
    };
    let mut value = lookup(env, path).ok_or_else(|| {
        Diagnostic::new(
            Code::F402A,
            format!("undefined template variable '{{{{{}}}}}'", path),
            pos,
        )
    })?;
    if let Some(chain_text) = chain_text {
        let calls = parse_marker_chain(chain_text, env, pos)?;
        let result = lenses::apply_pipeline(json_to_value(value), &calls, ctx)?;
        value = plain_to_json(&result, pos)?;
    }
    Ok(match value {
        Json::String(s) => s,
        other => crate::json::compact(&other),
    })
}

/// Parse the lens chain of an interpolation marker. Keyword arguments may
/// be `$name` references, resolved against the scope here.
fn parse_marker_chain(text: &str, env: &Scope, pos: Pos) -> Result<Vec<LensCall>, Diagnostic> {
    let tokens = lexer::lex(&lexer::normalize(text)).map_err(|e| {
        Diagnostic::new(Code::F801, format!("malformed lens call: {}", e.message), pos)
    })?;
    let calls = parser::parse_lens_chain(&tokens)
        .map_err(|e| Diagnostic::new(e.code, e.message, pos))?;
    calls
        .into_iter()
        .map(|call| resolve_call_refs(call, env, pos))
        .collect()
}

fn resolve_call_refs(call: LensCall, env: &Scope, pos: Pos) -> Result<LensCall, Diagnostic> {
    let resolve = |arg: LensArg| -> Result<LensArg, Diagnostic> {
        let LensArg::Str(s) = &arg else {
            return Ok(arg);
        };
        let Some(path) = scalar_var_path(s) else {
            return Ok(arg);
        };
        let val = lookup(env, path).ok_or_else(|| {
            Diagnostic::new(
                Code::F404,
                format!("undefined substitution path '{}'", path),
                pos,
            )
        })?;
        match val {
            Json::String(s) => Ok(LensArg::Str(s)),
            Json::Bool(b) => Ok(LensArg::Bool(b)),
            Json::Null => Ok(LensArg::Null),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(LensArg::Num(Num::Int(i)))
                } else {
                    Ok(LensArg::Num(Num::Float(n.as_f64().unwrap_or_default())))
                }
            }
            _ => Err(Diagnostic::new(
                Code::F801,
                format!("lens argument '{}' must resolve to a scalar", path),
                pos,
            )),
        }
    };
    let LensCall {
        name,
        args,
        kwargs,
        pos: call_pos,
    } = call;
    let args = args.into_iter().map(resolve).collect::<Result<Vec<_>, _>>()?;
    let kwargs = kwargs
        .into_iter()
        .map(|(k, v)| Ok((k, resolve(v)?)))
        .collect::<Result<Vec<_>, Diagnostic>>()?;
    Ok(LensCall {
        name,
        args,
        kwargs,
        pos: call_pos,
    })
}

/// Convert a lens result back to JSON. Anchors and aliases cannot appear
/// in interpolation context.
fn plain_to_json(v: &Value, pos: Pos) -> Result<Json, Diagnostic> {
    match v {
        Value::Str(s) | Value::Ident(s) => Ok(Json::String(s.clone())),
        Value::Num(n) => Ok(n.to_json()),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Null => Ok(Json::Null),
        Value::Fence { body, .. } => Ok(Json::String(body.clone())),
        Value::Ext { text, .. } => Ok(Json::String(text.clone())),
        Value::InlineList(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(plain_to_json(item, pos)?);
            }
            Ok(Json::Array(arr))
        }
        Value::InlineMap(map) => {
            let mut obj = Scope::new();
            for (k, v) in map {
                obj.insert(k.clone(), plain_to_json(v, pos)?);
            }
            Ok(Json::Object(obj))
        }
        _ => Err(Diagnostic::new(
            Code::F999,
            "unexpected structured value in interpolation",
            pos,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(v: Json) -> Scope {
        v.as_object().unwrap().clone()
    }

    fn interp(text: &str, env: Json) -> Result<String, Diagnostic> {
        interpolate(text, &scope(env), &mut LensCtx::new(), Pos::start())
    }

    #[test]
    fn plain_interpolation() {
        let out = interp("Hello, {{name}} x{{retries}}", json!({"name": "Alex", "retries": 3}));
        assert_eq!(out.unwrap(), "Hello, Alex x3");
    }

    #[test]
    fn dotted_paths_resolve() {
        let out = interp("{{user.role}}", json!({"user": {"role": "admin"}}));
        assert_eq!(out.unwrap(), "admin");
    }

    #[test]
    fn missing_interpolation_path_is_f402a() {
        let err = interp("{{ghost}}", json!({})).unwrap_err();
        assert_eq!(err.code, Code::F402A);
    }

    #[test]
    fn unclosed_marker_is_f402b() {
        let err = interp("{{oops", json!({})).unwrap_err();
        assert_eq!(err.code, Code::F402B);
    }

    #[test]
    fn escaped_braces_stay_literal() {
        let out = interp("\\{{not a ref\\}}", json!({})).unwrap();
        assert_eq!(out, "{{not a ref}}");
    }

    #[test]
    fn non_string_values_embed_as_compact_json() {
        let out = interp("v={{items}}", json!({"items": [1, 2]})).unwrap();
        assert_eq!(out, "v=[1,2]");
    }

    #[test]
    fn marker_pipeline_with_scope_reference_in_seed() {
        let env = json!({"greetings": ["Hi", "Hello", "Hey"], "seed": 42});
        let out = interp("{{ greetings |> choose(seed=$seed) }}", env).unwrap();
        assert_eq!(out, "Hi");
    }

    #[test]
    fn marker_pipeline_chains() {
        let env = json!({"name": "  alex  "});
        let out = interp("{{ name |> trim |> upper }}", env).unwrap();
        assert_eq!(out, "ALEX");
    }

    #[test]
    fn vars_collect_with_back_references() {
        let src = "@vars\n  base: \"gpt\"\n  full: \"{{base}}-4\"\n  again: $base\n";
        let doc = crate::parser::parse(&lexer::lex(&lexer::normalize(src)).unwrap()).unwrap();
        let vars = collect_vars(&doc.facets[0], &mut LensCtx::new()).unwrap();
        assert_eq!(vars["full"], json!("gpt-4"));
        assert_eq!(vars["again"], json!("gpt"));
    }

    #[test]
    fn vars_forward_reference_is_f404() {
        let src = "@vars\n  a: $b\n  b: 1\n";
        let doc = crate::parser::parse(&lexer::lex(&lexer::normalize(src)).unwrap()).unwrap();
        let err = collect_vars(&doc.facets[0], &mut LensCtx::new()).unwrap_err();
        assert_eq!(err.code, Code::F404);
    }

    #[test]
    fn scope_assembly_document_wins_in_all_mode() {
        let host = scope(json!({"a": 1, "b": 2}));
        let doc = scope(json!({"b": 3}));
        let all = assemble_scope(true, &host, &doc);
        assert_eq!(all["b"], json!(3));
        let host_only = assemble_scope(false, &host, &doc);
        assert_eq!(host_only["b"], json!(2));
    }

    #[test]
    fn type_validation_accepts_and_rejects() {
        let vars = scope(json!({"name": "Alex", "retries": 3}));
        let mut ctx = LensCtx::new();
        let specs = scope(json!({
            "name": {"type": "string", "pattern": "[A-Z][a-z]+"},
            "retries": {"type": "int", "min": 0, "max": 5},
        }));
        validate_var_types(&vars, &specs, &mut ctx, Pos::start()).unwrap();

        let bad = scope(json!({"retries": {"type": "int", "max": 2}}));
        let err = validate_var_types(&vars, &bad, &mut ctx, Pos::start()).unwrap_err();
        assert_eq!(err.code, Code::F452);

        let mismatch = scope(json!({"name": {"type": "int"}}));
        let err = validate_var_types(&vars, &mismatch, &mut ctx, Pos::start()).unwrap_err();
        assert_eq!(err.code, Code::F451);

        let unknown = scope(json!({"name": {"type": "text"}}));
        let err = validate_var_types(&vars, &unknown, &mut ctx, Pos::start()).unwrap_err();
        assert_eq!(err.code, Code::F401);
    }

    #[test]
    fn int_accepted_where_float_declared() {
        let vars = scope(json!({"ratio": 2}));
        let specs = scope(json!({"ratio": {"type": "float"}}));
        validate_var_types(&vars, &specs, &mut LensCtx::new(), Pos::start()).unwrap();
    }

    #[test]
    fn enum_constraint() {
        let vars = scope(json!({"mode": "fast"}));
        let specs = scope(json!({"mode": {"type": "string", "enum": ["fast", "slow"]}}));
        validate_var_types(&vars, &specs, &mut LensCtx::new(), Pos::start()).unwrap();
        let specs = scope(json!({"mode": {"type": "string", "enum": ["slow"]}}));
        let err = validate_var_types(&vars, &specs, &mut LensCtx::new(), Pos::start()).unwrap_err();
        assert_eq!(err.code, Code::F452);
    }

    #[test]
    fn substitution_replaces_whole_scalar() {
        let env = scope(json!({"plan": ["a", "b"]}));
        let out = resolve_value(
            Value::Str("$plan".into()),
            &env,
            &mut LensCtx::new(),
            Pos::start(),
        )
        .unwrap();
        assert_eq!(
            out,
            Value::InlineList(vec![Value::Str("a".into()), Value::Str("b".into())])
        );
    }

    #[test]
    fn missing_substitution_is_f404() {
        let err = resolve_value(
            Value::Str("${a.b}".into()),
            &Scope::new(),
            &mut LensCtx::new(),
            Pos::start(),
        )
        .unwrap_err();
        assert_eq!(err.code, Code::F404);
    }

    #[test]
    fn fences_are_never_interpolated() {
        let env = scope(json!({"x": 1}));
        let fence = Value::Fence {
            lang: None,
            body: "{{x}}".into(),
        };
        let out = resolve_value(fence.clone(), &env, &mut LensCtx::new(), Pos::start()).unwrap();
        assert_eq!(out, fence);
    }
}
