//! Name resolution and slot management.
//!
//! Resolution order for `get_value(name)`:
//!
//! 1. a slot for `name`: load it,
//! 2. `name` is the initializer of an `as`: read the variable it seeded,
//! 3. `name` carries a temporary suffix (`x.cst.load`): retry 2 with `x`,
//! 4. the last SSA value bound to `name`.

use edn_backend::{BinOp, TypeId, ValueId};
use edn_ir::{Node, NodeKind};

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{int_as_float, local_name};
use crate::op::Op;

/// Suffixes handlers append to scratch values derived from a name.
const TEMP_SUFFIXES: [&str; 4] = [".cst.load", ".load", ".cst.tmp", ".tmp"];

fn strip_temp_suffix(name: &str) -> &str {
    TEMP_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name)
}

impl FunctionEmitter<'_, '_> {
    pub(crate) fn get_value(&mut self, name: &str) -> Option<ValueId> {
        if let Some(v) = self.load_slot(name) {
            return Some(v);
        }
        if let Some(v) = self.read_aliased(name) {
            return Some(v);
        }
        let base = strip_temp_suffix(name);
        if base != name {
            if let Some(v) = self.read_aliased(base) {
                return Some(v);
            }
        }
        self.cx.value(name)
    }

    /// `get_value` for a `%name` operand.
    pub(crate) fn value_of(&mut self, node: &Node) -> Result<ValueId, ProblemKind> {
        let name = local_name(node).ok_or(ProblemKind::Malformed("%name"))?;
        self.get_value(name)
            .ok_or_else(|| ProblemKind::Unresolved(name.to_owned()))
    }

    /// An operand of type `ty`: a name, or an int, float or bool literal.
    pub(crate) fn operand(&mut self, node: &Node, ty: TypeId) -> Result<ValueId, ProblemKind> {
        match node.kind() {
            NodeKind::Int(v) if self.b.types().is_float(ty) => {
                Ok(self.b.const_float(ty, int_as_float(*v)))
            }
            NodeKind::Int(v) => Ok(self.b.const_int(ty, *v)),
            NodeKind::Float(v) => Ok(self.b.const_float(ty, *v)),
            NodeKind::Bool(v) => Ok(self.b.const_int(ty, i64::from(*v))),
            NodeKind::Nil if self.b.types().is_pointer(ty) => Ok(self.b.const_null(ty)),
            _ => self.value_of(node),
        }
    }

    fn load_slot(&mut self, name: &str) -> Option<ValueId> {
        let slot = self.cx.slot(name)?;
        self.b.load(slot, name)
    }

    fn read_aliased(&mut self, init: &str) -> Option<ValueId> {
        let var = self.cx.alias_of(init)?.to_owned();
        self.load_slot(&var).or_else(|| self.cx.value(&var))
    }

    /// The slot backing `name`, created in the entry block on first use.
    /// With `init`, the name's current SSA value is stored into a new slot.
    /// A slot first created inside a block belongs to that block.
    pub(crate) fn ensure_slot(&mut self, name: &str, ty: TypeId, init: bool) -> ValueId {
        if let Some(slot) = self.cx.slot(name) {
            return slot;
        }
        let slot = self.b.entry_alloca(ty, &format!("{name}.slot"));
        if init {
            if let Some(current) = self.cx.value(name).filter(|&v| self.b.type_of(v) == ty) {
                self.b.store(current, slot);
            }
        }
        self.cx.push_scoped_slot(name, slot, ty);
        slot
    }

    /// A slot for `name` owned by the current scope. Reuses the scope's
    /// own slot; shadows any outer one.
    pub(crate) fn declare_slot(&mut self, name: &str, ty: TypeId) -> ValueId {
        if let Some(slot) = self
            .cx
            .slot_at_current_depth(name)
            .filter(|&s| self.b.types().pointee(self.b.type_of(s)) == Some(ty))
        {
            return slot;
        }
        let slot = self.b.entry_alloca(ty, &format!("{name}.slot"));
        self.cx.push_scoped_slot(name, slot, ty);
        slot
    }

    /// Publish `value` as the result `name`. Mutable names also store it
    /// into their slot.
    pub(crate) fn define(&mut self, name: &str, value: ValueId, ty: TypeId) -> Handled {
        self.cx.bind_value(name, value, ty);
        if !self.cx.is_mutable(name) {
            return Ok(());
        }
        let slot = self.ensure_slot(name, ty, false);
        let slot_ty = self.b.types().pointee(self.b.type_of(slot));
        let found = self.b.type_of(value);
        match slot_ty {
            Some(expected) if expected == found => {
                self.b.store(value, slot);
                Ok(())
            }
            Some(expected) => Err(self.mismatch(&format!("store to `{name}`"), expected, found)),
            None => Err(ProblemKind::Unresolved(name.to_owned())),
        }
    }

    /// Re-evaluate the compare or bitwise op that defined `name`, in the
    /// current block. Loop conditions read their operands fresh this way.
    pub(crate) fn eval_defined(&mut self, name: &str) -> Option<ValueId> {
        let form = self.cx.def(name)?.clone();
        let items = form.as_list()?;
        if items.len() != 5 {
            return None;
        }
        let ty = self.lower(&items[2]).ok()?;
        let lhs = self.operand(&items[3], ty).ok()?;
        let rhs = self.operand(&items[4], ty).ok()?;
        let result = format!("{name}.re");
        match Op::from_head(form.head()) {
            Op::Compare(cmp) => Some(self.build_compare(cmp, &items[2], lhs, rhs, &result)),
            Op::Binary(op @ (BinOp::And | BinOp::Or | BinOp::Xor)) => {
                Some(self.b.binary(op, lhs, rhs, &result))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::strip_temp_suffix;

    #[test]
    fn temp_suffixes_are_stripped_once() {
        assert_eq!(strip_temp_suffix("x.cst.load"), "x");
        assert_eq!(strip_temp_suffix("x.tmp"), "x");
        assert_eq!(strip_temp_suffix("x.slot"), "x.slot");
        assert_eq!(strip_temp_suffix("x.y"), "x.y");
    }
}
