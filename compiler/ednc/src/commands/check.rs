//! The `check` command: run the whole pipeline and report what it found.

use crate::pipeline::Compilation;

use super::{read_file, report, EmitOptions};

/// Expand, lint, emit and verify a file, then report every diagnostic.
///
/// All phases run even after errors, so one run gives the complete
/// picture. Exits with status 1 if anything was an error. Without the
/// `llvm` feature only the front end runs.
pub fn check_file(path: &str, options: &EmitOptions) {
    let content = read_file(path);
    let compilation = run(&content, options);
    report(path, &content, &compilation.diagnostics);

    if compilation.has_errors() {
        eprintln!(
            "{path}: {} error(s), {} warning(s)",
            compilation.error_count(),
            compilation.warning_count()
        );
        std::process::exit(1);
    }
    match compilation.warning_count() {
        0 => println!("OK: {path}"),
        n => println!("OK: {path} ({n} warning(s))"),
    }
}

#[cfg(feature = "llvm")]
fn run(content: &str, options: &EmitOptions) -> Compilation {
    crate::pipeline::compile(content, options.config(), true)
}

#[cfg(not(feature = "llvm"))]
fn run(content: &str, _options: &EmitOptions) -> Compilation {
    eprintln!("note: built without LLVM support; emission and verification are skipped");
    crate::pipeline::lint_source(content)
}
