//! `facet` — command-line frontend over the facet-core engine.
//!
//! Thin conveniences only: argument parsing, file/stdin I/O and exit
//! codes. All semantics live in facet-core. Exit codes: 0 success,
//! 1 user-visible error (diagnostics printed), 2 internal or usage error.

mod fmt;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use facet_core::{canonize, lint, CanonizeOptions, Code, Diagnostic, ResolveMode, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ResolveArg {
    Host,
    All,
}

/// FACET markup toolchain.
#[derive(Parser)]
#[command(name = "facet", version, about = "FACET markup toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize a document to JSON with default settings
    #[command(name = "to-json")]
    ToJson {
        /// Path to the .facet source file, or - for stdin
        input: String,
    },

    /// Run the full pipeline and report diagnostics without emitting JSON
    Validate {
        /// Path to the .facet source file, or - for stdin
        input: String,
    },

    /// Re-print a document in canonical form
    Fmt {
        /// Path to the .facet source file, or - for stdin
        input: String,
    },

    /// Lex and parse only, reporting structural diagnostics
    Lint {
        /// Path to the .facet source file, or - for stdin
        input: String,
    },

    /// Canonicalize with explicit resolve mode, variables and import roots
    Canon {
        /// Which variables participate in substitution
        #[arg(long, default_value = "host", value_enum)]
        resolve: ResolveArg,
        /// Host variable as k=v; the value parses as JSON when possible
        #[arg(long = "var")]
        vars: Vec<String>,
        /// Directory allowed to serve @import targets (repeatable)
        #[arg(long = "import-root")]
        import_roots: Vec<PathBuf>,
        /// Treat merge shape mismatches as errors
        #[arg(long)]
        strict_merge: bool,
        /// Path to the .facet source file, or - for stdin
        input: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::ToJson { input } => cmd_to_json(&input),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Fmt { input } => cmd_fmt(&input),
        Commands::Lint { input } => cmd_lint(&input),
        Commands::Canon {
            resolve,
            vars,
            import_roots,
            strict_merge,
            input,
        } => cmd_canon(resolve, &vars, import_roots, strict_merge, &input),
    };
    process::exit(code);
}

/// Read the document text; `-` means stdin. Returns the text and, for
/// file inputs, the path (used to anchor relative imports).
fn read_input(input: &str) -> Result<(String, Option<PathBuf>), i32> {
    if input == "-" {
        let mut text = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut text) {
            eprintln!("error: cannot read stdin: {}", e);
            return Err(1);
        }
        return Ok((text, None));
    }
    let path = PathBuf::from(input);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok((text, Some(path))),
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", input, e);
            Err(1)
        }
    }
}

/// Default options for file-based commands: host mode, imports allowed
/// from the document's own directory.
fn default_options(file: Option<&Path>) -> CanonizeOptions {
    let mut opts = CanonizeOptions::default();
    if let Some(file) = file {
        if let Some(dir) = file.parent() {
            opts.import_roots = vec![dir.to_path_buf()];
        }
        opts.current_file = Some(file.to_path_buf());
    }
    opts
}

fn report(diags: &[Diagnostic]) -> i32 {
    for d in diags {
        eprintln!("error: {}", d);
        if let Some(snippet) = &d.snippet {
            for line in snippet.lines() {
                eprintln!("  {}", line);
            }
        }
        if let Some(hint) = &d.hint {
            eprintln!("  hint: {}", hint);
        }
    }
    if diags.iter().any(|d| d.code == Code::F999) {
        2
    } else {
        1
    }
}

fn cmd_to_json(input: &str) -> i32 {
    let Ok((text, file)) = read_input(input) else {
        return 1;
    };
    let opts = default_options(file.as_deref());
    match canonize(&text, &opts) {
        Ok(value) => {
            println!("{}", facet_core::json::pretty(&value));
            0
        }
        Err(diags) => report(&diags),
    }
}

fn cmd_validate(input: &str) -> i32 {
    let Ok((text, file)) = read_input(input) else {
        return 1;
    };
    let opts = default_options(file.as_deref());
    match canonize(&text, &opts) {
        Ok(_) => {
            println!("OK");
            0
        }
        Err(diags) => report(&diags),
    }
}

fn cmd_fmt(input: &str) -> i32 {
    let Ok((text, _)) = read_input(input) else {
        return 1;
    };
    let normalized = facet_core::lexer::normalize(&text);
    let tokens = match facet_core::lexer::lex(&normalized) {
        Ok(t) => t,
        Err(mut e) => {
            e.attach_snippet(&normalized);
            return report(&[e]);
        }
    };
    match facet_core::parser::parse(&tokens) {
        Ok(doc) => {
            print!("{}", fmt::format_document(&doc));
            0
        }
        Err(mut e) => {
            e.attach_snippet(&normalized);
            report(&[e])
        }
    }
}

fn cmd_lint(input: &str) -> i32 {
    let Ok((text, _)) = read_input(input) else {
        return 1;
    };
    let diags = lint(&text);
    if diags.is_empty() {
        println!("OK");
        0
    } else {
        report(&diags)
    }
}

fn cmd_canon(
    resolve: ResolveArg,
    vars: &[String],
    import_roots: Vec<PathBuf>,
    strict_merge: bool,
    input: &str,
) -> i32 {
    let mut host_vars = Scope::new();
    for pair in vars {
        let Some((key, raw)) = pair.split_once('=') else {
            eprintln!("error: --var expects k=v, got '{}'", pair);
            return 2;
        };
        // JSON value when it parses, bare string otherwise.
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        host_vars.insert(key.to_string(), value);
    }
    let Ok((text, file)) = read_input(input) else {
        return 1;
    };
    let opts = CanonizeOptions {
        resolve_mode: match resolve {
            ResolveArg::Host => ResolveMode::Host,
            ResolveArg::All => ResolveMode::All,
        },
        host_vars,
        import_roots,
        strict_merge,
        current_file: file,
    };
    match canonize(&text, &opts) {
        Ok(value) => {
            println!("{}", facet_core::json::pretty(&value));
            0
        }
        Err(diags) => report(&diags),
    }
}
