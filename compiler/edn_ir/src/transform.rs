//! Macro expansion and visitor traversal over node trees.
//!
//! # Expansion
//!
//! [`Transformer::expand`] rewrites a tree to a fixpoint. For a list whose
//! head symbol names a registered macro, the macro is applied repeatedly
//! until it declines or its output is no longer macro-headed; the output is
//! then expanded recursively. Once a list's head is stable every child is
//! expanded. Vectors, sets, maps and tagged values are rebuilt with their
//! elements expanded; atoms pass through. The input is never mutated.
//!
//! Two macros that rewrite into each other would loop forever, so the
//! number of rewrites per form and the nesting depth are both capped by
//! [`ExpansionLimits`]. Exceeding either is an [`ExpandError`].
//!
//! # Traversal
//!
//! [`Transformer::traverse`] visits every list once, dispatching on the
//! head symbol to a registered visitor or the unmatched-list fallback, then
//! recurses into the children. Atoms go to the atom fallback. Visitors get
//! `&Node`: they can annotate metadata but cannot reshape the tree.

use rustc_hash::FxHashMap;

use crate::node::{Node, NodeKind};
use crate::stack::ensure_sufficient_stack;

/// A rewrite rule. Returns `None` to decline (e.g. on arity mismatch).
pub type MacroFn<'a> = Box<dyn Fn(&Node) -> Option<Node> + 'a>;

/// A traversal callback.
pub type VisitorFn<'a> = Box<dyn FnMut(&Node) + 'a>;

/// Caps that turn runaway rewriting into an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpansionLimits {
    /// Maximum macro applications on a single form before its head is stable.
    pub rewrites: u32,
    /// Maximum nesting depth of expanded forms.
    pub depth: u32,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        ExpansionLimits {
            rewrites: 256,
            depth: 512,
        }
    }
}

/// Fatal macro expansion failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExpandError {
    #[error("macro `{head}` did not reach a fixpoint after {limit} rewrites")]
    RewriteLimit { head: String, limit: u32 },
    #[error("macro expansion exceeded nesting depth {limit} at `{head}`")]
    DepthLimit { head: String, limit: u32 },
}

/// Registry of macros and visitors keyed by list head symbol.
pub struct Transformer<'a> {
    macros: FxHashMap<String, MacroFn<'a>>,
    visitors: FxHashMap<String, VisitorFn<'a>>,
    unmatched: Option<VisitorFn<'a>>,
    atom: Option<VisitorFn<'a>>,
    limits: ExpansionLimits,
}

impl Default for Transformer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Transformer<'a> {
    pub fn new() -> Self {
        Transformer {
            macros: FxHashMap::default(),
            visitors: FxHashMap::default(),
            unmatched: None,
            atom: None,
            limits: ExpansionLimits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ExpansionLimits) -> Self {
        self.limits = limits;
        self
    }

    // Registration

    /// Register a macro for lists headed by `name`. Replaces any earlier one.
    pub fn add_macro(&mut self, name: impl Into<String>, f: impl Fn(&Node) -> Option<Node> + 'a) {
        self.macros.insert(name.into(), Box::new(f));
    }

    /// Register a visitor for lists headed by `name`.
    pub fn add_visitor(&mut self, name: impl Into<String>, f: impl FnMut(&Node) + 'a) {
        self.visitors.insert(name.into(), Box::new(f));
    }

    /// Fallback for lists with no registered visitor.
    pub fn on_unmatched_list(&mut self, f: impl FnMut(&Node) + 'a) {
        self.unmatched = Some(Box::new(f));
    }

    /// Fallback for atoms.
    pub fn on_atom(&mut self, f: impl FnMut(&Node) + 'a) {
        self.atom = Some(Box::new(f));
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    // Expansion

    /// Expand every macro in `node` to a fixpoint, producing a new tree.
    pub fn expand(&self, node: &Node) -> Result<Node, ExpandError> {
        self.expand_at(node, 0)
    }

    fn expand_at(&self, node: &Node, depth: u32) -> Result<Node, ExpandError> {
        if depth > self.limits.depth {
            return Err(ExpandError::DepthLimit {
                head: node.head().unwrap_or(node.kind().variant_name()).to_owned(),
                limit: self.limits.depth,
            });
        }
        ensure_sufficient_stack(|| match node.kind() {
            NodeKind::List(_) => self.expand_list(node, depth),
            NodeKind::Vector(items) => {
                Ok(node.rebuild(NodeKind::Vector(self.expand_all(items, depth)?)))
            }
            NodeKind::Set(items) => Ok(node.rebuild(NodeKind::Set(self.expand_all(items, depth)?))),
            NodeKind::Map(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    out.push((self.expand_at(k, depth + 1)?, self.expand_at(v, depth + 1)?));
                }
                Ok(node.rebuild(NodeKind::Map(out)))
            }
            NodeKind::Tagged { tag, value } => Ok(node.rebuild(NodeKind::Tagged {
                tag: tag.clone(),
                value: Box::new(self.expand_at(value, depth + 1)?),
            })),
            _ => Ok(node.clone()),
        })
    }

    fn expand_all(&self, items: &[Node], depth: u32) -> Result<Vec<Node>, ExpandError> {
        items
            .iter()
            .map(|item| self.expand_at(item, depth + 1))
            .collect()
    }

    fn expand_list(&self, node: &Node, depth: u32) -> Result<Node, ExpandError> {
        let mut current = node.clone();
        let mut rewrites = 0u32;

        while let Some(rewrite) = current.head().and_then(|h| self.macros.get(h)) {
            let Some(output) = rewrite(&current) else {
                break;
            };
            rewrites += 1;
            if rewrites > self.limits.rewrites {
                return Err(ExpandError::RewriteLimit {
                    head: current.head().unwrap_or_default().to_owned(),
                    limit: self.limits.rewrites,
                });
            }
            tracing::trace!(from = %current, to = %output, "macro rewrite");
            if !output.is_list() {
                return self.expand_at(&output, depth + 1);
            }
            current = output;
        }

        match current.kind() {
            NodeKind::List(items) => {
                let expanded = self.expand_all(items, depth)?;
                Ok(current.rebuild(NodeKind::List(expanded)))
            }
            _ => Ok(current),
        }
    }

    // Traversal

    /// Visit every list and atom in `node`. Shape is never changed.
    pub fn traverse(&mut self, node: &Node) {
        ensure_sufficient_stack(|| match node.kind() {
            NodeKind::List(items) => {
                let visitor = node.head().and_then(|h| self.visitors.get_mut(h));
                match visitor {
                    Some(visit) => visit(node),
                    None => {
                        if let Some(fallback) = self.unmatched.as_mut() {
                            fallback(node);
                        }
                    }
                }
                for child in items {
                    self.traverse(child);
                }
            }
            NodeKind::Vector(items) | NodeKind::Set(items) => {
                for child in items {
                    self.traverse(child);
                }
            }
            NodeKind::Map(entries) => {
                for (k, v) in entries {
                    self.traverse(k);
                    self.traverse(v);
                }
            }
            NodeKind::Tagged { value, .. } => self.traverse(value),
            _ => {
                if let Some(fallback) = self.atom.as_mut() {
                    fallback(node);
                }
            }
        });
    }

    /// Expand, then traverse the expanded tree.
    pub fn expand_and_traverse(&mut self, node: &Node) -> Result<Node, ExpandError> {
        let expanded = self.expand(node)?;
        self.traverse(&expanded);
        Ok(expanded)
    }
}

/// Build `(head :k1 v1 :k2 v2 ...)`.
pub fn build_keyword_call<'k>(head: &str, pairs: impl IntoIterator<Item = (&'k str, Node)>) -> Node {
    let mut items = vec![Node::symbol(head)];
    for (key, value) in pairs {
        items.push(Node::keyword(key));
        items.push(value);
    }
    Node::list(items)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
