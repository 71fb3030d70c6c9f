//! Canonical source re-printer for the `fmt` subcommand.
//!
//! Re-emits a parsed document with 2-space indentation, normalized
//! quoting and one blank line between facets. Comments are not part of
//! the AST and do not survive formatting.

use facet_core::ast::{AttrValue, Block, Document, Facet, KeyValue, LensArg, LensCall, ListItem, Num, Value};

pub fn format_document(doc: &Document) -> String {
    let mut out = String::new();
    for (i, facet) in doc.facets.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        format_facet(&mut out, facet);
    }
    out
}

fn format_facet(out: &mut String, facet: &Facet) {
    out.push('@');
    out.push_str(&facet.name);
    if let Some(label) = &facet.anchor {
        out.push_str(" &");
        out.push_str(label);
    }
    if !facet.attrs.is_empty() {
        out.push('(');
        for (i, (key, value)) in facet.attrs.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(key);
            out.push('=');
            out.push_str(&attr_text(value));
        }
        out.push(')');
    }
    out.push('\n');
    format_block(out, &facet.body, 1);
}

fn format_block(out: &mut String, block: &Block, depth: usize) {
    match block {
        Block::Empty => {}
        Block::Map(kvs) => {
            for kv in kvs {
                format_pair(out, kv, depth);
            }
        }
        Block::List(items) => {
            for item in items {
                format_item(out, item, depth);
            }
        }
    }
}

fn format_pair(out: &mut String, kv: &KeyValue, depth: usize) {
    indent(out, depth);
    out.push_str(&kv.key);
    out.push(':');
    match &kv.value {
        Value::Map(inner) => {
            out.push('\n');
            for nested in inner {
                format_pair(out, nested, depth + 1);
            }
        }
        Value::List(items) => {
            out.push('\n');
            for item in items {
                format_item(out, item, depth + 1);
            }
        }
        Value::Fence { lang, body } => {
            out.push('\n');
            format_fence(out, lang.as_deref(), body, depth + 1, &kv.pipeline);
        }
        value => {
            out.push(' ');
            out.push_str(&value_text(value));
            format_pipeline(out, &kv.pipeline);
            out.push('\n');
        }
    }
}

fn format_item(out: &mut String, item: &ListItem, depth: usize) {
    indent(out, depth);
    out.push_str("- ");
    out.push_str(&value_text(&item.value));
    if let Some(cond) = &item.item_if {
        out.push_str(" (if=");
        out.push_str(&quote(cond));
        out.push(')');
    }
    format_pipeline(out, &item.pipeline);
    out.push('\n');
}

fn format_fence(
    out: &mut String,
    lang: Option<&str>,
    body: &str,
    depth: usize,
    pipeline: &[LensCall],
) {
    indent(out, depth);
    out.push_str("```");
    if let Some(lang) = lang {
        out.push_str(lang);
    }
    out.push('\n');
    if !body.is_empty() {
        out.push_str(body);
        out.push('\n');
    }
    indent(out, depth);
    out.push_str("```");
    format_pipeline(out, pipeline);
    out.push('\n');
}

fn format_pipeline(out: &mut String, pipeline: &[LensCall]) {
    for call in pipeline {
        out.push_str(" |> ");
        out.push_str(&call.name);
        if call.args.is_empty() && call.kwargs.is_empty() {
            continue;
        }
        out.push('(');
        let mut first = true;
        for arg in &call.args {
            if !first {
                out.push_str(", ");
            }
            first = false;
            out.push_str(&arg_text(arg));
        }
        for (key, arg) in &call.kwargs {
            if !first {
                out.push_str(", ");
            }
            first = false;
            out.push_str(key);
            out.push('=');
            out.push_str(&arg_text(arg));
        }
        out.push(')');
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Str(s) => quote_preferring_triple(s),
        Value::Num(n) => num_text(*n),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Null => "null".to_string(),
        Value::Ident(s) => s.clone(),
        Value::InlineMap(map) => {
            let mut out = String::from("{ ");
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if is_ident(k) {
                    out.push_str(k);
                } else {
                    out.push_str(&quote(k));
                }
                out.push_str(": ");
                out.push_str(&value_text(v));
            }
            out.push_str(" }");
            out
        }
        Value::InlineList(items) => {
            let mut out = String::from("[");
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&value_text(v));
            }
            out.push(']');
            out
        }
        Value::Anchor { label, value } => {
            format!("&{} {}", label, value_text(value))
        }
        Value::Alias(label) => format!("*{}", label),
        Value::Ext { text, .. } => text.clone(),
        // Block-shaped values are rendered by format_pair, never inline.
        Value::Map(_) | Value::List(_) => String::new(),
        Value::Fence { .. } => String::new(),
    }
}

fn attr_text(value: &AttrValue) -> String {
    match value {
        AttrValue::Str(s) => quote(s),
        AttrValue::Num(n) => num_text(*n),
        AttrValue::Bool(true) => "true".to_string(),
        AttrValue::Bool(false) => "false".to_string(),
        AttrValue::Null => "null".to_string(),
        AttrValue::Ident(s) => s.clone(),
    }
}

fn arg_text(arg: &LensArg) -> String {
    match arg {
        LensArg::Str(s) => quote(s),
        LensArg::Num(n) => num_text(*n),
        LensArg::Bool(true) => "true".to_string(),
        LensArg::Bool(false) => "false".to_string(),
        LensArg::Null => "null".to_string(),
    }
}

fn num_text(n: Num) -> String {
    match n {
        Num::Int(i) => i.to_string(),
        Num::Float(x) => {
            if x.fract() == 0.0 && x.abs() < 1e15 {
                format!("{:.1}", x)
            } else {
                format!("{}", x)
            }
        }
    }
}

/// Quoted form; multi-line strings prefer the triple-quoted shape.
fn quote_preferring_triple(s: &str) -> String {
    if s.contains('\n') && !s.contains("\"\"\"") {
        return format!("\"\"\"{}\"\"\"", s);
    }
    quote(s)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}
