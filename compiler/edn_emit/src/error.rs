//! Emission errors.
//!
//! Two tiers:
//!
//! - [`EmitProblem`] is local. A handler that cannot make sense of its
//!   instruction skips it and the problem is collected on the session;
//!   emission carries on with the next instruction.
//! - [`EmitError`] is fatal for the module and surfaces as `Err`.

use edn_diagnostic::{Diagnostic, ErrorCode};
use edn_ir::Span;

/// Why an instruction was skipped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProblemKind {
    #[error("malformed instruction, expected `{0}`")]
    Malformed(&'static str),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("cannot resolve `{0}`")]
    Unresolved(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("unknown layout `{0}`")]
    UnknownLayout(String),
    #[error("unknown callee `{0}`")]
    UnknownCallee(String),
    #[error("unrecognized instruction")]
    Unrecognized,
}

impl ProblemKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProblemKind::Malformed(_) | ProblemKind::Unrecognized => ErrorCode::E2005,
            ProblemKind::UnknownType(_) => ErrorCode::E2001,
            ProblemKind::Unresolved(_) => ErrorCode::E2002,
            ProblemKind::TypeMismatch(_) => ErrorCode::E2003,
            ProblemKind::UnknownLayout(_) => ErrorCode::E2004,
            ProblemKind::UnknownCallee(_) => ErrorCode::E2006,
        }
    }
}

/// A skipped instruction, with enough context to report it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitProblem {
    /// Function being emitted, empty for module-level forms.
    pub function: String,
    /// Head symbol of the offending form.
    pub op: String,
    pub kind: ProblemKind,
    pub span: Option<Span>,
}

impl EmitProblem {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::warning(self.kind.code())
            .with_message(format!("`{}` skipped: {}", self.op, self.kind));
        let diag = match self.span {
            Some(span) => diag.with_label(span, "instruction not emitted"),
            None => diag,
        };
        if self.function.is_empty() {
            diag
        } else {
            diag.with_note(format!("in function `{}`", self.function))
        }
    }
}

/// Fatal emission failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("`{function}`: {count} instruction(s) built with no insertion point")]
    NoInsertionPoint { function: String, count: u32 },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("malformed module form: {0}")]
    MalformedModule(String),
    #[error("function `{0}` has no entry block")]
    MissingEntry(String),
}

impl EmitError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EmitError::MalformedModule(_) => ErrorCode::E9002,
            EmitError::NoInsertionPoint { .. }
            | EmitError::UnknownFunction(_)
            | EmitError::MissingEntry(_) => ErrorCode::E9001,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code()).with_message(self.to_string())
    }
}
