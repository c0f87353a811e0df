//! EDN IR compiler driver.
//!
//! The pipeline behind every command:
//!
//! ```text
//! source ──read──▶ (module ..) ──sugar──▶ expanded ──lint──▶ ──emit──▶ LLVM IR
//! ```
//!
//! Emission links LLVM and is behind the `llvm` feature; without it,
//! `expand` and the front half of `check` still work.
//!
//! - [`sugar`] registers the built-in macros on a [`edn_ir::Transformer`].
//! - [`lint`] checks `match` forms for exhaustiveness and annotates them.
//! - [`pipeline`] strings the phases together and turns every failure into
//!   an [`edn_diagnostic::Diagnostic`].
//! - [`render`] prints diagnostics with `ariadne`.
//! - [`commands`] holds the `expand`, `emit` and `check` entry points.

pub mod commands;
pub mod lint;
pub mod pipeline;
pub mod render;
pub mod sugar;

#[cfg(feature = "llvm")]
pub use pipeline::compile;
pub use pipeline::{expand_module, lint_source, read_module, Compilation};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing from `RUST_LOG`. Does nothing when it is unset.
///
/// Spans are printed as a tree, so `RUST_LOG=edn_emit=debug` shows each
/// function's emission nested under its module.
///
/// Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_writer(std::io::stderr),
                )
                .with(filter)
                .init();
        }
    });
}
