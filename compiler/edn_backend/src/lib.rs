//! LLVM backend for the EDN IR compiler, an ID-based layer over inkwell.
//!
//! A [`Module`] wraps an inkwell module and hands out `Copy` IDs for its
//! values, blocks, functions and globals, so emitter state never carries
//! the `'ctx` lifetime. Code is added through a positioned [`Builder`],
//! printed with [`Module::print_to_string`], and checked with LLVM's own
//! verifier via [`Module::verify`].
//!
//! # Design
//!
//! - Callers see `ValueId`, `BlockId`, `FuncId`, `GlobalId`, `TypeId`; all `Copy`.
//! - Types are interned in a [`TypeTable`] that keeps pointee types, so
//!   loads and GEPs know their element type even though LLVM pointers are
//!   opaque.
//! - Blocks are looked up by name, which is how deferred phi wiring finds
//!   predecessors created long after the phi itself.
//! - Token-typed values (funclet pads, coroutine IDs) go through
//!   `llvm-sys`, since inkwell has no wrapper for them.

mod builder;
mod ids;
mod module;
mod types;
mod value;

pub use builder::{Builder, InsertPoint};
pub use ids::{BlockId, FuncId, GlobalId, TypeId, ValueId};
pub use module::{FnAttrs, Function, Global, Linkage, Module, VerifyError};
pub use types::{TypeKind, TypeTable, POINTER_SIZE};
pub use value::{BinOp, CastOp, Const, FloatPredicate, IntPredicate};

/// Re-exported so callers can create the context a [`Module`] lives in.
pub use inkwell::context::Context;
