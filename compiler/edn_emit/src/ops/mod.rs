//! Handlers for instructions that produce, convert or store values.
//!
//! Most handlers follow the same steps: check the arity, lower the
//! declared type, resolve operands, build, then [`define`] the result.
//! Operand problems are returned before anything is built, so a skipped
//! instruction leaves no partial code behind.
//!
//! [`define`]: crate::emitter::FunctionEmitter::define

mod arith;
mod call;
mod cast;
mod closure;
mod compare;
mod constant;
mod coro;
mod literal;
mod memory;
mod pointer;
mod sum;
mod variable;
