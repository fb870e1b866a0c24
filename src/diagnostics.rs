//! Shared error/diagnostic machinery used by every compiler stage.
//!
//! Each stage (parser, scope/type checker, preprocessor, emitter) defines
//! its own error enum with `thiserror`-free, hand-written `Display` impls in
//! the style of the scope/type checker, but all of them bottom out in a
//! [`Diagnostic`] so the CLI can render them uniformly.

pub use crate::lexer::Span;

/// Severity of a reported [`Diagnostic`]. Warnings do not change the process
/// exit code; errors cause compilation to stop before emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// The closed error-kind set. Lex/Parse errors abort
/// immediately; everything from `UndeclaredSymbol` through `GenericCycle` is
/// collected per-pass; `Preprocess` aborts immediately (it can leave the AST
/// inconsistent); `Emit`/`Toolchain` surface once the analyzer has already
/// succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    UndeclaredSymbol,
    Redeclared,
    TypeMismatch,
    NotAssignable,
    TypeCouldNotBeInferred,
    InvalidAnnotation,
    UseAfterMove,
    GenericCycle,
    Preprocess,
    Emit,
    Toolchain,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Lex => "LexError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::UndeclaredSymbol => "UndeclaredSymbol",
            ErrorKind::Redeclared => "Redeclared",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::NotAssignable => "NotAssignable",
            ErrorKind::TypeCouldNotBeInferred => "TypeCouldNotBeInferred",
            ErrorKind::InvalidAnnotation => "InvalidAnnotation",
            ErrorKind::UseAfterMove => "UseAfterMove",
            ErrorKind::GenericCycle => "GenericCycle",
            ErrorKind::Preprocess => "PreprocessError",
            ErrorKind::Emit => "EmitError",
            ErrorKind::Toolchain => "ToolchainError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: Option<ErrorKind>,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            kind: None,
            message: message.into(),
            span,
        }
    }

    pub fn error_kind(kind: ErrorKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            kind: Some(kind),
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            kind: None,
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "error".red(),
            Severity::Warning => "warning".yellow(),
        };

        let message = match self.kind {
            Some(kind) => format!("{kind}: {}", self.message),
            None => self.message.clone(),
        };

        match &self.span {
            Some(span) => write!(f, "{label}: {}", span.to_string(&message)),
            None => write!(f, "{label}: {message}"),
        }
    }
}

use colored::Colorize;

/// Accumulates diagnostics across a compile session; `has_errors` is what
/// gates whether the pipeline proceeds to emission.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::debug!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.push(Diagnostic::error(message, span));
    }

    pub fn error_kind(&mut self, kind: ErrorKind, message: impl Into<String>, span: Option<Span>) {
        self.push(Diagnostic::error_kind(kind, message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Option<Span>) {
        self.push(Diagnostic::warning(message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl std::fmt::Display for DiagnosticBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bag_reports_errors_distinctly_from_warnings() {
        let mut bag = DiagnosticBag::new();
        bag.warning("unused local 'x'", None);
        assert!(!bag.has_errors());
        bag.error("undeclared symbol 'y'", None);
        assert!(bag.has_errors());
    }
}
