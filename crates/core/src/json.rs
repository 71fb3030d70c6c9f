//! Deterministic JSON emission.
//!
//! Objects iterate in insertion order (serde_json's `preserve_order`
//! feature keeps that end to end), numbers delegate to serde_json's
//! itoa/ryu formatting (integers without a decimal point, floats in their
//! shortest round-trippable form) and strings use the minimal escape set.
//! With `ascii` enabled every code point outside printable ASCII is emitted
//! as a `\uXXXX` escape (surrogate pairs beyond the BMP); otherwise output
//! is literal UTF-8. NaN and the infinities cannot reach this writer; the
//! parser rejects them long before.

use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// 2-space indentation and key/value spacing.
    pub pretty: bool,
    /// Escape all non-ASCII code points.
    pub ascii: bool,
}

/// Minimal single-line form.
pub fn compact(value: &Json) -> String {
    to_string(value, &WriteOptions::default())
}

/// Human-oriented 2-space indented form.
pub fn pretty(value: &Json) -> String {
    to_string(
        value,
        &WriteOptions {
            pretty: true,
            ascii: false,
        },
    )
}

pub fn to_string(value: &Json, opts: &WriteOptions) -> String {
    let mut out = String::new();
    write_value(&mut out, value, opts, 0);
    out
}

fn write_value(out: &mut String, value: &Json, opts: &WriteOptions, depth: usize) {
    match value {
        Json::Null => out.push_str("null"),
        Json::Bool(true) => out.push_str("true"),
        Json::Bool(false) => out.push_str("false"),
        Json::Number(n) => out.push_str(&n.to_string()),
        Json::String(s) => write_string(out, s, opts),
        Json::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if opts.pretty {
                    out.push('\n');
                    indent(out, depth + 1);
                }
                write_value(out, item, opts, depth + 1);
            }
            if opts.pretty {
                out.push('\n');
                indent(out, depth);
            }
            out.push(']');
        }
        Json::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if opts.pretty {
                    out.push('\n');
                    indent(out, depth + 1);
                }
                write_string(out, key, opts);
                out.push(':');
                if opts.pretty {
                    out.push(' ');
                }
                write_value(out, item, opts, depth + 1);
            }
            if opts.pretty {
                out.push('\n');
                indent(out, depth);
            }
            out.push('}');
        }
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_string(out: &mut String, s: &str, opts: &WriteOptions) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                push_escape(out, c as u32);
            }
            c if opts.ascii && !c.is_ascii() => {
                let code = c as u32;
                if code <= 0xFFFF {
                    push_escape(out, code);
                } else {
                    // Surrogate pair for code points beyond the BMP.
                    let v = code - 0x10000;
                    push_escape(out, 0xD800 + (v >> 10));
                    push_escape(out, 0xDC00 + (v & 0x3FF));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn push_escape(out: &mut String, code: u32) {
    use std::fmt::Write;
    let _ = write!(out, "\\u{:04x}", code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compact_is_minimal() {
        let v = json!({"a": [1, 2], "b": "x"});
        assert_eq!(compact(&v), "{\"a\":[1,2],\"b\":\"x\"}");
    }

    #[test]
    fn key_order_is_insertion_order() {
        let mut m = serde_json::Map::new();
        m.insert("zeta".to_string(), json!(1));
        m.insert("alpha".to_string(), json!(2));
        assert_eq!(compact(&Json::Object(m)), "{\"zeta\":1,\"alpha\":2}");
    }

    #[test]
    fn integers_have_no_decimal_point() {
        assert_eq!(compact(&json!(3)), "3");
        assert_eq!(compact(&json!(2.5)), "2.5");
        assert_eq!(compact(&json!(-1)), "-1");
    }

    #[test]
    fn control_characters_are_escaped() {
        assert_eq!(compact(&json!("a\nb\u{1}")), "\"a\\nb\\u0001\"");
    }

    #[test]
    fn utf8_passes_through_unless_ascii_requested() {
        let v = json!("héllo 🌍");
        assert_eq!(compact(&v), "\"héllo 🌍\"");
        let ascii = to_string(
            &v,
            &WriteOptions {
                pretty: false,
                ascii: true,
            },
        );
        assert_eq!(ascii, "\"h\\u00e9llo \\ud83c\\udf0d\"");
    }

    #[test]
    fn pretty_uses_two_space_indent() {
        let v = json!({"a": {"b": [1]}});
        assert_eq!(
            pretty(&v),
            "{\n  \"a\": {\n    \"b\": [\n      1\n    ]\n  }\n}"
        );
    }

    #[test]
    fn empty_containers() {
        assert_eq!(pretty(&json!({})), "{}");
        assert_eq!(pretty(&json!([])), "[]");
    }

    #[test]
    fn compact_round_trips_through_serde() {
        let v = json!({"k": ["a", 1, 2.5, true, null, {"n": "é"}]});
        let re: Json = serde_json::from_str(&compact(&v)).unwrap();
        assert_eq!(re, v);
    }
}
