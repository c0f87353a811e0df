//! Read, expand, lint and emit one module.
//!
//! Every phase reports through [`Diagnostic`]. Reader and expansion
//! failures stop the pipeline; lint errors and skipped instructions do
//! not, so `check` can report everything a file has wrong in one run.
//!
//! Emission and verification need the LLVM backend and are only built
//! with the `llvm` feature. The front end (read, expand, lint) is always
//! available through [`lint_source`].

use edn_diagnostic::{Diagnostic, ErrorCode};
use edn_ir::{read, ExpandError, Node, Position, ReadError, Span};
use tracing::instrument;

#[cfg(feature = "llvm")]
use edn_backend::{Context, VerifyError};
#[cfg(feature = "llvm")]
use edn_emit::{EmitConfig, Session};

use crate::{lint, sugar};

/// What one run of the pipeline produced.
pub struct Compilation {
    /// The expanded module form, if reading and expansion succeeded.
    pub expanded: Option<Node>,
    /// Textual LLVM IR of the emitted module, if emission succeeded.
    pub ir: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }
}

/// Read `src`, which must hold exactly one form.
pub fn read_module(src: &str) -> Result<Node, Diagnostic> {
    let mut forms = read(src).map_err(|e| read_error_diagnostic(&e))?;
    match forms.len() {
        1 => Ok(forms.remove(0)),
        0 => Err(Diagnostic::error(ErrorCode::E0006)
            .with_message("no form found")
            .with_label(Span::point(Position::new(1, 1)), "expected `(module ..)`")),
        n => {
            let diag = Diagnostic::error(ErrorCode::E9002)
                .with_message(format!("expected one `(module ..)` form, found {n}"));
            Err(match forms[1].span() {
                Some(span) => diag.with_label(span, "second top-level form"),
                None => diag,
            })
        }
    }
}

/// Expand the built-in sugar in `form`.
pub fn expand_module(form: &Node) -> Result<Node, Diagnostic> {
    sugar::transformer()
        .expand(form)
        .map_err(|e| expand_error_diagnostic(&e, form.span()))
}

/// Read, expand and lint `src` without emitting anything.
#[instrument(skip_all, level = "debug")]
pub fn lint_source(src: &str) -> Compilation {
    match read_module(src).and_then(|form| expand_module(&form)) {
        Ok(expanded) => Compilation {
            diagnostics: lint::check_matches(&expanded),
            expanded: Some(expanded),
            ir: None,
        },
        Err(diag) => Compilation {
            expanded: None,
            ir: None,
            diagnostics: vec![diag],
        },
    }
}

/// Run the whole pipeline over `src`.
///
/// With `verify`, a module that emits without a fatal error is also run
/// through LLVM's verifier.
#[cfg(feature = "llvm")]
#[instrument(skip_all, level = "debug", fields(verify = verify))]
pub fn compile(src: &str, config: EmitConfig, verify: bool) -> Compilation {
    let mut compilation = lint_source(src);
    let Some(expanded) = &compilation.expanded else {
        return compilation;
    };

    let context = Context::create();
    let mut session = Session::new(&context, config);
    let emitted = session.emit_module(expanded);
    compilation.diagnostics.extend(session.diagnostics());
    match emitted {
        Ok(()) => {
            let module = session.module();
            if verify {
                if let Err(err) = module.verify() {
                    compilation.diagnostics.push(verify_error_diagnostic(&err));
                }
            }
            compilation.ir = Some(module.print_to_string());
        }
        Err(e) => compilation.diagnostics.push(e.to_diagnostic()),
    }
    tracing::debug!(
        diagnostics = compilation.diagnostics.len(),
        emitted = compilation.ir.is_some(),
        "pipeline done"
    );
    compilation
}

pub fn read_error_diagnostic(err: &ReadError) -> Diagnostic {
    let (code, message) = match err {
        ReadError::UnexpectedEof { .. } => (ErrorCode::E0001, "unexpected end of input".to_owned()),
        ReadError::UnexpectedChar { ch, .. } => {
            (ErrorCode::E0002, format!("unexpected character `{ch}`"))
        }
        ReadError::UnmatchedClose { ch, .. } => {
            (ErrorCode::E0003, format!("unmatched closing `{ch}`"))
        }
        ReadError::OddMapEntries { .. } => (
            ErrorCode::E0004,
            "map literal needs an even number of forms".to_owned(),
        ),
        ReadError::InvalidNumber { text, .. } => {
            (ErrorCode::E0005, format!("invalid number `{text}`"))
        }
        ReadError::Empty { .. } => (ErrorCode::E0006, "no form found".to_owned()),
    };
    let label = match err {
        ReadError::UnexpectedEof { .. } => "input ends here",
        ReadError::OddMapEntries { .. } => "map starts here",
        _ => "here",
    };
    Diagnostic::error(code)
        .with_message(message)
        .with_label(Span::point(err.position()), label)
}

pub fn expand_error_diagnostic(err: &ExpandError, span: Option<Span>) -> Diagnostic {
    let code = match err {
        ExpandError::RewriteLimit { .. } => ErrorCode::E1001,
        ExpandError::DepthLimit { .. } => ErrorCode::E1002,
    };
    let diag = Diagnostic::error(code).with_message(err.to_string());
    let diag = match span {
        Some(span) => diag.with_label(span, "while expanding this form"),
        None => diag,
    };
    diag.with_note("a macro probably rewrites into itself or into another macro that does")
}

#[cfg(feature = "llvm")]
pub fn verify_error_diagnostic(err: &VerifyError) -> Diagnostic {
    Diagnostic::error(ErrorCode::E9003)
        .with_message(format!("emitted module is invalid: {err}"))
        .with_note("the input was accepted but an instruction was skipped or mis-typed")
}
