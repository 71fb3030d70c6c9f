//! Shared AST types for the FACET compiler.
//!
//! These types are produced by the parser and consumed by every later
//! pipeline stage. Stages transform owned trees and hand back new ones; no
//! node is mutated in place after parsing. Everything position-bearing
//! carries a [`Pos`] so diagnostics can point at the source.

use indexmap::IndexMap;

use crate::error::Pos;

/// A parsed source document: an ordered list of facets. Compile-time
/// directives (`@import`, `@vars`, `@var_types`) appear here as ordinary
/// facets with reserved names and are consumed by later stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub facets: Vec<Facet>,
}

/// A top-level named block.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub name: String,
    /// Anchor label attached to the facet header (`@name &label`).
    pub anchor: Option<String>,
    /// Attributes in source order. Values are restricted to literals.
    pub attrs: IndexMap<String, AttrValue>,
    pub body: Block,
    pub pos: Pos,
}

/// An attribute literal. Interpolation and substitution are barred from
/// attributes, so this is a strict subset of [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Num(Num),
    Bool(bool),
    Null,
    Ident(String),
}

/// A facet or nested block body. Mapping pairs and list items never coexist
/// within one block.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Empty,
    Map(Vec<KeyValue>),
    List(Vec<ListItem>),
}

/// One `key: value` pair in a mapping block.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
    pub pipeline: Vec<LensCall>,
    pub pos: Pos,
}

/// One `- value` entry in a list block.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub value: Value,
    /// The quoted expression of an `(if="…")` attribute, if present.
    pub item_if: Option<String>,
    pub pipeline: Vec<LensCall>,
    pub pos: Pos,
}

/// A numeric literal. NaN and the infinities are rejected at parse time, so
/// a `Num` always converts to a JSON number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn to_json(self) -> serde_json::Value {
        match self {
            Num::Int(n) => serde_json::Value::from(n),
            Num::Float(x) => serde_json::Value::from(x),
        }
    }
}

/// The kinds of extended scalar literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtKind {
    /// `@YYYY-MM-DDThh:mm:ss[.fff][Z|±hh:mm]`
    Timestamp,
    /// `<digits>(ms|s|m|h|d)`
    Duration,
    /// `<digits>(B|KB|MB|GB)`
    Size,
    /// `/pattern/flags`
    Regex,
}

/// A value as it appears in mapping pairs, list items and inline
/// collections.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(Num),
    Bool(bool),
    Null,
    /// Bare identifier used in value position; renders as a string.
    Ident(String),
    /// `{ k: v, … }` on one line.
    InlineMap(IndexMap<String, Value>),
    /// `[ v, … ]` on one line.
    InlineList(Vec<Value>),
    /// An indented mapping block used as a value.
    Map(Vec<KeyValue>),
    /// An indented list block used as a value.
    List(Vec<ListItem>),
    /// Triple-backtick block, captured verbatim.
    Fence { lang: Option<String>, body: String },
    /// `&label value`
    Anchor { label: String, value: Box<Value> },
    /// `*label`
    Alias(String),
    /// Typed literal serialized back to its textual form.
    Ext { kind: ExtKind, text: String },
}

impl Value {
    /// Human-readable kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Num(_) => "number",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Ident(_) => "identifier",
            Value::InlineMap(_) | Value::Map(_) => "map",
            Value::InlineList(_) | Value::List(_) => "list",
            Value::Fence { .. } => "fence",
            Value::Anchor { .. } => "anchor",
            Value::Alias(_) => "alias",
            Value::Ext { .. } => "extended scalar",
        }
    }
}

/// A single `|> name(args)` segment of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LensCall {
    pub name: String,
    pub args: Vec<LensArg>,
    pub kwargs: Vec<(String, LensArg)>,
    pub pos: Pos,
}

/// A lens argument. Restricted to literals; identifiers and variable
/// references are rejected by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum LensArg {
    Str(String),
    Num(Num),
    Bool(bool),
    Null,
}

impl LensCall {
    /// Look up a keyword argument by name.
    pub fn kwarg(&self, name: &str) -> Option<&LensArg> {
        self.kwargs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}
