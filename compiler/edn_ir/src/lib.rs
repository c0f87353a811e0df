//! Symbolic node tree for the EDN IR compiler.
//!
//! This crate provides:
//!
//! - **Node tree** ([`Node`], [`NodeKind`]): the tagged value model every
//!   other phase consumes. Each node carries a metadata side table that can
//!   be annotated in place while the tree shape stays copy-on-write.
//!
//! - **Reader** ([`read`], [`read_one`]): parses the parenthesized textual
//!   form into nodes, attaching `line`/`col`/`end-line`/`end-col` metadata.
//!
//! - **Printer**: `Display` for [`Node`] renders the canonical text form.
//!
//! - **Transformer** ([`Transformer`]): macro fixpoint expansion and
//!   head-keyed visitor traversal. All front-end sugar compiles through it.
//!
//! # Crate Dependencies
//!
//! Leaf crate. No dependency on the backend model or the emission core.

mod node;
mod printer;
pub mod reader;
mod span;
mod stack;
pub mod transform;

pub use node::{Metadata, Node, NodeKind};
pub use reader::{read, read_one, ReadError};
pub use span::{Position, Span};
pub use stack::ensure_sufficient_stack;
pub use transform::{build_keyword_call, ExpandError, ExpansionLimits, Transformer};
