//! Mutability pre-pass.
//!
//! Walks a function body once before emission and decides which names
//! need a stack slot. A name is mutable when it is
//!
//! - defined more than once (parameters and `match` payload binds count
//!   as definitions),
//! - the destination of `assign` or `as`,
//! - a block `local`, or
//! - the source of `addr`.
//!
//! Every other name stays a plain SSA value.

use edn_ir::{ensure_sufficient_stack, Node, NodeKind};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::forms::{is_local_ref, local_name};
use crate::op::Op;

#[derive(Default)]
struct Census<'n> {
    definitions: FxHashMap<&'n str, u32>,
    marked: FxHashSet<&'n str>,
}

impl<'n> Census<'n> {
    fn define(&mut self, name: &'n str) {
        *self.definitions.entry(name).or_default() += 1;
    }

    fn visit(&mut self, node: &'n Node) {
        ensure_sufficient_stack(|| match node.kind() {
            NodeKind::List(items) => {
                self.classify(node, items);
                for item in items {
                    self.visit(item);
                }
            }
            NodeKind::Vector(items) => {
                for item in items {
                    self.visit(item);
                }
            }
            _ => {}
        });
    }

    fn classify(&mut self, node: &'n Node, items: &'n [Node]) {
        let at = |i: usize| items.get(i).and_then(local_name);
        match node.head() {
            Some("local") => {
                if let Some(name) = at(2) {
                    self.marked.insert(name);
                }
                return;
            }
            Some("bind") => {
                if let Some(name) = at(1) {
                    self.define(name);
                }
                return;
            }
            _ => {}
        }
        let op = Op::from_head(node.head());
        match op {
            Op::Match => {
                if items.get(1).is_some_and(is_local_ref) {
                    if let Some(name) = at(1) {
                        self.define(name);
                    }
                }
            }
            Op::Addr => {
                if let Some(name) = at(3) {
                    self.marked.insert(name);
                }
            }
            Op::Assign | Op::As => {
                if let Some(name) = at(1) {
                    self.marked.insert(name);
                }
            }
            _ => {}
        }
        if op.defines_result() {
            if let Some(name) = at(1) {
                self.define(name);
            }
        }
    }
}

/// Names in `body` that must live in a stack slot.
pub(crate) fn mutable_names<'n>(
    body: impl IntoIterator<Item = &'n Node>,
    params: impl IntoIterator<Item = &'n str>,
) -> FxHashSet<String> {
    let mut census = Census::default();
    for param in params {
        census.define(param);
    }
    for node in body {
        census.visit(node);
    }
    let Census {
        definitions,
        marked,
    } = census;
    definitions
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(name, _)| name)
        .chain(marked)
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
