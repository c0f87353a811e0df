//! Per-function emission state.
//!
//! # Name resolution state
//!
//! | Map | Holds |
//! |-----|-------|
//! | `values` | last SSA value bound to a name |
//! | `types` | declared type of a name (element type for slot-backed names) |
//! | `slots` | stack slot backing a mutable name; wins over `values` |
//! | `init_alias` | initializer name of an `as`, mapped to the variable it seeded |
//! | `shadows` | slot stack per name, tagged with the scope depth that pushed it |
//! | `defs` | defining form of compares and bitwise ops, for re-evaluation |
//!
//! A slot, once created, is the authority for its name: reads load from
//! it and definitions store into it. Leaving a scope pops every slot the
//! scope pushed and puts the outer one back in `slots`.

use edn_backend::{BlockId, TypeId, ValueId};
use edn_ir::Node;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// One slot pushed for a name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ShadowEntry {
    pub depth: u32,
    pub slot: ValueId,
    pub ty: TypeId,
}

/// Where `break` and `continue` go inside the innermost loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct LoopTargets {
    pub break_to: BlockId,
    pub continue_to: BlockId,
}

/// An incoming phi value: resolved now, or by name at finalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum PhiSource {
    Named(String),
    Value(ValueId),
}

/// A phi whose incoming edges are wired after the body is emitted.
#[derive(Clone, Debug)]
pub(crate) struct PendingPhi {
    pub dst: String,
    pub ty: TypeId,
    /// `(value, predecessor block name)`.
    pub incoming: Vec<(PhiSource, String)>,
    pub phi: ValueId,
}

/// Unwind destinations of the enclosing `try` bodies.
#[derive(Clone, Debug, Default)]
pub(crate) struct UnwindStack {
    /// Landing pads, innermost last.
    pub itanium: Vec<BlockId>,
    /// `catchswitch` dispatch blocks, innermost last.
    pub seh: Vec<BlockId>,
    /// Shared cleanup funclet for SEH unwinds outside any `try`.
    pub seh_cleanup: Option<BlockId>,
}

#[derive(Default)]
pub(crate) struct EmissionContext {
    values: FxHashMap<String, ValueId>,
    types: FxHashMap<String, TypeId>,
    slots: FxHashMap<String, ValueId>,
    init_alias: FxHashMap<String, String>,
    shadows: FxHashMap<String, SmallVec<[ShadowEntry; 2]>>,
    defs: FxHashMap<String, Node>,
    mutable: FxHashSet<String>,
    depth: u32,
    loops: Vec<LoopTargets>,
    pub(crate) phis: Vec<PendingPhi>,
    pub(crate) unwind: UnwindStack,
    /// Token of the last `coro.id`, for `coro-id`.
    pub(crate) coro_id: Option<ValueId>,
    next_id: u32,
}

impl EmissionContext {
    pub(crate) fn new(mutable: FxHashSet<String>) -> Self {
        EmissionContext {
            mutable,
            ..EmissionContext::default()
        }
    }

    // ── Names ───────────────────────────────────────────────────────

    pub(crate) fn value(&self, name: &str) -> Option<ValueId> {
        self.values.get(name).copied()
    }

    pub(crate) fn type_of(&self, name: &str) -> Option<TypeId> {
        self.types.get(name).copied()
    }

    pub(crate) fn slot(&self, name: &str) -> Option<ValueId> {
        self.slots.get(name).copied()
    }

    pub(crate) fn alias_of(&self, name: &str) -> Option<&str> {
        self.init_alias.get(name).map(String::as_str)
    }

    pub(crate) fn is_mutable(&self, name: &str) -> bool {
        self.mutable.contains(name)
    }

    pub(crate) fn bind_value(&mut self, name: &str, value: ValueId, ty: TypeId) {
        self.values.insert(name.to_owned(), value);
        self.types.insert(name.to_owned(), ty);
    }

    pub(crate) fn set_alias(&mut self, init: &str, var: &str) {
        self.init_alias.insert(init.to_owned(), var.to_owned());
    }

    pub(crate) fn record_def(&mut self, name: &str, form: Node) {
        self.defs.insert(name.to_owned(), form);
    }

    pub(crate) fn def(&self, name: &str) -> Option<&Node> {
        self.defs.get(name)
    }

    // ── Slots and scopes ────────────────────────────────────────────

    /// Make `slot` the authority for `name` in the current scope.
    pub(crate) fn push_scoped_slot(&mut self, name: &str, slot: ValueId, ty: TypeId) {
        self.shadows
            .entry(name.to_owned())
            .or_default()
            .push(ShadowEntry {
                depth: self.depth,
                slot,
                ty,
            });
        self.slots.insert(name.to_owned(), slot);
        self.types.insert(name.to_owned(), ty);
    }

    /// Slot pushed for `name` by the current scope, if any.
    pub(crate) fn slot_at_current_depth(&self, name: &str) -> Option<ValueId> {
        let top = self.shadows.get(name)?.last()?;
        (top.depth == self.depth).then_some(top.slot)
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    /// Enter a nested scope. Returns the depth to unwind back to.
    pub(crate) fn enter_scope(&mut self) -> u32 {
        let outer = self.depth;
        self.depth += 1;
        outer
    }

    /// Leave every scope deeper than `depth`, restoring the slots that
    /// were shadowed.
    pub(crate) fn unwind_scope(&mut self, depth: u32) {
        let slots = &mut self.slots;
        let types = &mut self.types;
        let values = &mut self.values;
        self.shadows.retain(|name, stack| {
            let before = stack.len();
            while stack.last().is_some_and(|e| e.depth > depth) {
                stack.pop();
            }
            if stack.len() == before {
                return true;
            }
            match stack.last() {
                Some(outer) => {
                    slots.insert(name.clone(), outer.slot);
                    types.insert(name.clone(), outer.ty);
                    true
                }
                None => {
                    slots.remove(name);
                    types.remove(name);
                    values.remove(name);
                    false
                }
            }
        });
        self.depth = depth;
    }

    // ── Loops ───────────────────────────────────────────────────────

    pub(crate) fn push_loop(&mut self, break_to: BlockId, continue_to: BlockId) {
        self.loops.push(LoopTargets {
            break_to,
            continue_to,
        });
    }

    pub(crate) fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub(crate) fn innermost_loop(&self) -> Option<LoopTargets> {
        self.loops.last().copied()
    }

    /// Next construct number; one number names every block of a construct.
    pub(crate) fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests;
