//! facet-core: the FACET compile engine.
//!
//! FACET is a human-readable, machine-deterministic markup for structured
//! AI instructions. This crate is the whole of the deterministic pipeline
//! from source text to one canonical JSON value:
//!
//! lexical normalization → tokenization with indentation → parsing →
//! import expansion → variable resolution and typing → conditional
//! pruning → anchor resolution → lens application → JSON construction.
//!
//! # Public API
//!
//! - [`canonize()`] / [`canonize_with_provider()`] -- run the full pipeline
//! - [`lint()`] -- lex + parse + structural checks only
//! - [`CanonizeOptions`], [`ResolveMode`] -- per-call configuration
//! - [`Diagnostic`], [`Code`] -- structured errors with source positions
//! - [`json`] -- the deterministic JSON writer (compact, pretty, ASCII)
//!
//! The engine is synchronous, allocates no global state, and given
//! identical inputs produces byte-identical output.

/// FACET language version implemented by this crate.
pub const FACET_VERSION: &str = "1.1";

pub mod anchors;
pub mod ast;
pub mod canon;
pub mod error;
pub mod expr;
pub mod imports;
pub mod json;
pub mod lenses;
pub mod lexer;
pub mod limits;
pub mod parser;
pub mod scalars;
pub mod source;
pub mod vars;

pub use canon::{canonize, canonize_with_provider, lint, CanonizeOptions, ResolveMode};
pub use error::{Code, Diagnostic, Pos};
pub use source::{FileSystemSource, InMemorySource, SourceProvider};
pub use vars::Scope;
