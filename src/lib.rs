//! `emberc`: a PEG-parsed, statically typed systems language that compiles
//! to C. The pipeline is parse → analyze (scope/symbol/type/preprocessor,
//! all folded into one pass) → emit → hand off to a C toolchain.
//!
//! Each stage is its own module and can be driven independently (useful for
//! tooling that only needs, say, diagnostics from analysis without ever
//! reaching the emitter); [`compile`] wires the whole pipeline together the
//! way the `emberc` binary uses it.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod emitter;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod scope;
pub mod symbol;
pub mod toolchain;
pub mod types;

use std::path::Path;

use analyzer::Context;
use diagnostics::DiagnosticBag;

/// The result of turning one source file into C: either the emitted text or
/// the diagnostics collected along the way. Analysis warnings are reported
/// even on success (`diagnostics.has_errors()` is `false` but `diagnostics`
/// may be non-empty).
pub struct CompileOutput {
    pub c_source: String,
    pub diagnostics: DiagnosticBag,
}

#[derive(Debug)]
pub enum CompileError {
    Parse(parser::ParseError),
    Analyze(DiagnosticBag),
    Emit(emitter::EmitError),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Parse(e) => write!(f, "{e}"),
            CompileError::Analyze(bag) => write!(f, "{bag}"),
            CompileError::Emit(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Run the whole front-to-back pipeline over `source` and return the
/// generated C translation unit. `filename` is used only for diagnostics
/// and the span text embedded in error messages.
pub fn compile(source: &str, filename: &str) -> Result<CompileOutput, CompileError> {
    let mut ctx = Context::new(source, filename).map_err(CompileError::Parse)?;
    if ctx.analyze().is_err() {
        return Err(CompileError::Analyze(std::mem::take(&mut ctx.diagnostics)));
    }
    let c_source = emitter::emit(&ctx).map_err(CompileError::Emit)?;
    Ok(CompileOutput {
        c_source,
        diagnostics: ctx.diagnostics,
    })
}

/// Read `path`, compile it, and return the generated C alongside
/// diagnostics — the shape the `emberc compile` subcommand drives directly.
pub fn compile_file(path: &Path) -> Result<CompileOutput, CompileError> {
    let source = std::fs::read_to_string(path).unwrap_or_default();
    let filename = path.to_string_lossy().to_string();
    compile(&source, &filename)
}

/// Parse and analyze `source` without ever reaching the emitter — the
/// `emberc check` subcommand's entire job, and a cheaper way for tooling
/// (an LSP, a pre-commit hook) to ask "does this type-check" without paying
/// for C generation it will throw away.
pub fn check(source: &str, filename: &str) -> Result<DiagnosticBag, CompileError> {
    let mut ctx = Context::new(source, filename).map_err(CompileError::Parse)?;
    if ctx.analyze().is_err() {
        return Err(CompileError::Analyze(std::mem::take(&mut ctx.diagnostics)));
    }
    Ok(ctx.diagnostics)
}

/// [`check`], reading the source from `path` first.
pub fn check_file(path: &Path) -> Result<DiagnosticBag, CompileError> {
    let source = std::fs::read_to_string(path).unwrap_or_default();
    let filename = path.to_string_lossy().to_string();
    check(&source, &filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_compiles_to_a_zero_returning_main() {
        let out = compile("", "empty.ember").expect("compile");
        assert!(!out.diagnostics.has_errors());
        assert!(out.c_source.contains("int main(void)"));
    }

    #[test]
    fn a_type_error_is_reported_without_emitting() {
        let err = compile("local a: integer = 'x'\nreturn a", "bad.ember").unwrap_err();
        matches!(err, CompileError::Analyze(_));
    }
}
