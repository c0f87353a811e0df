//! Command handlers for the `ednc` CLI.
//!
//! Each submodule implements one command. Shared utilities like
//! `read_file` and `report` live here in the module root.

use std::io::IsTerminal;

use edn_diagnostic::Diagnostic;

use crate::render::Renderer;

mod check;
mod emit;
mod expand;
mod options;

pub use check::check_file;
pub use emit::emit_file;
pub use expand::expand_file;
pub use options::{parse_emit_options, EhModel, EmitOptions};

/// Read a source file, exiting with a message if it cannot be read.
pub(super) fn read_file(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            let msg = match e.kind() {
                std::io::ErrorKind::NotFound => format!("cannot find file '{path}'"),
                std::io::ErrorKind::PermissionDenied => {
                    format!("permission denied reading '{path}'")
                }
                std::io::ErrorKind::InvalidData => {
                    format!("'{path}' contains invalid UTF-8 data")
                }
                _ => format!("error reading '{path}': {e}"),
            };
            eprintln!("{msg}");
            std::process::exit(1);
        }
    }
}

/// Render diagnostics to stderr, in color when stderr is a terminal.
pub(super) fn report(path: &str, source: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    let color = std::io::stderr().is_terminal();
    let renderer = Renderer::new(path, source).with_color(color);
    let mut stderr = std::io::stderr().lock();
    if let Err(e) = renderer.render_all(diagnostics, &mut stderr) {
        eprintln!("error: could not render diagnostics: {e}");
        for diag in diagnostics {
            eprintln!("{path}:{diag}");
        }
    }
}
