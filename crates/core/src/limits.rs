//! Central resource ceilings for the compile engine.
//!
//! Every bound the pipeline enforces lives here so the limits are auditable
//! in one place. Exceeding a ceiling produces a diagnostic, never a panic.

/// Maximum size of a single source document, in bytes (post-normalization).
pub const MAX_DOC_BYTES: usize = 2 * 1024 * 1024;

/// Maximum size of a fenced block body, in bytes.
pub const MAX_FENCE_BYTES: usize = 256 * 1024;

/// Maximum number of lens calls in one pipeline (F805 beyond this).
pub const MAX_LENS_CHAIN: usize = 16;

/// Maximum import nesting depth (F602 beyond this).
pub const MAX_IMPORT_DEPTH: usize = 8;

/// Maximum total number of `@import` directives expanded per invocation
/// (F602 beyond this).
pub const MAX_IMPORTS: usize = 64;

/// Maximum indentation depth, in 2-space levels (F002 beyond this).
pub const MAX_INDENT_DEPTH: usize = 32;

/// Maximum number of parse diagnostics collected before the parser stops
/// recovering and reports what it has.
pub const MAX_PARSE_ERRORS: usize = 10;
