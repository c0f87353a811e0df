//! Emission core for the EDN IR compiler.
//!
//! Lowers `(module ..)` forms into an [`edn_backend::Module`]. A
//! [`Session`] handles module-level declarations; each function body is
//! emitted by a per-function emitter that owns the emission context:
//! SSA bindings, stack slots and their scopes, loop targets, unwind
//! destinations and deferred phis.
//!
//! # Architecture
//!
//! - **Dispatch**: every instruction head maps to an [`Op`]; one handler
//!   per op. A failing handler reports a problem and emission continues
//!   with the next instruction.
//! - **Value resolution**: names resolve through slots first, then `as`
//!   aliases, then SSA bindings. Names assigned more than once in a body
//!   are slot-backed up front.
//! - **Control flow**: `if`, `while`, `for`, `switch`, `match` and `try`
//!   each take one construct number for their block names and leave the
//!   builder at a single exit block.
//! - **Exceptions**: the [`Personality`] picks Itanium landingpads or SEH
//!   funclets; with neither, panics trap.
//!
//! # Crate Dependencies
//!
//! Depends on `edn_ir` for the node tree, `edn_backend` for LLVM module
//! construction and `edn_diagnostic` for problem reports. Links LLVM, so
//! it sits outside the default workspace build.

mod config;
mod context;
mod control_flow;
mod emitter;
mod error;
mod exceptions;
mod forms;
mod intern;
mod layout;
mod matching;
mod op;
mod ops;
mod phi;
mod prepass;
mod resolver;
mod session;
mod types;

pub use config::{EmitConfig, Personality};
pub use error::{EmitError, EmitProblem, ProblemKind};
pub use intern::InternCache;
pub use layout::{Field, Layouts, StructLayout, SumLayout, UnionLayout, Variant};
pub use op::{Comparison, CoroOp, Op};
pub use session::Session;
pub use types::{is_unsigned, lower_type, struct_type_name};

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
