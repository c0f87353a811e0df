//! The `emit` command: print or write the module's LLVM IR.

#[cfg(feature = "llvm")]
use tracing::warn;

#[cfg(feature = "llvm")]
use crate::pipeline::compile;

#[cfg(feature = "llvm")]
use super::{read_file, report};
use super::EmitOptions;

/// Emit a module. Warnings are reported and emission goes on; any error
/// exits with status 1 without writing output.
#[cfg(feature = "llvm")]
pub fn emit_file(path: &str, options: &EmitOptions) {
    let content = read_file(path);
    let compilation = compile(&content, options.config(), options.verify);
    report(path, &content, &compilation.diagnostics);

    let errors = compilation.error_count();
    let Some(text) = compilation.ir.filter(|_| errors == 0) else {
        warn!(errors, "emission failed");
        std::process::exit(1);
    };
    match &options.output {
        Some(out) => {
            if let Err(e) = std::fs::write(out, text) {
                eprintln!("error writing '{}': {e}", out.display());
                std::process::exit(1);
            }
        }
        None => print!("{text}"),
    }
}

/// Emit command when the LLVM feature is not enabled.
#[cfg(not(feature = "llvm"))]
pub fn emit_file(_path: &str, _options: &EmitOptions) {
    eprintln!("error: the 'emit' command requires the LLVM backend");
    eprintln!();
    eprintln!("ednc was built without LLVM support.");
    eprintln!("To enable emission, rebuild with the 'llvm' feature:");
    eprintln!();
    eprintln!("  cargo build --features llvm");
    std::process::exit(1);
}
