use edn_ir::{Node, NodeKind};

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, local_name, name_at};

impl FunctionEmitter<'_, '_> {
    /// `(as %d T init)` declares `d` in the current scope and stores `init`.
    ///
    /// A named initializer becomes an alias of `d`: later reads of the
    /// initializer see the variable.
    pub(crate) fn lower_as(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(as %d T init)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let init_name = match items[3].kind() {
            NodeKind::Symbol(_) | NodeKind::Str(_) => local_name(&items[3]),
            _ => None,
        };
        let init = match items[3].kind() {
            NodeKind::Int(_) | NodeKind::Float(_) | NodeKind::Bool(_) => {
                self.operand(&items[3], ty)?
            }
            _ if init_name.is_some() => self.value_of(&items[3])?,
            _ => self.b.const_undef(ty),
        };
        let found = self.b.type_of(init);
        if found != ty {
            return Err(self.mismatch(&format!("initializer of `{dst}`"), ty, found));
        }

        let slot = self.declare_slot(dst, ty);
        self.b.store(init, slot);
        let value = self
            .b
            .load(slot, dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        self.cx.bind_value(dst, value, ty);
        if let Some(init_name) = init_name.filter(|&n| n != dst) {
            self.cx.set_alias(init_name, dst);
            self.cx.bind_value(init_name, value, ty);
        }
        Ok(())
    }

    /// `(assign %d %src)` stores into `d`'s slot, creating it on first use.
    pub(crate) fn lower_assign(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(assign %d %src)";
        expect_len(items, 3, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let value = self.value_of(&items[2])?;
        let ty = self.b.type_of(value);
        let slot = self.ensure_slot(dst, ty, false);
        let slot_ty = self.b.type_of(slot);
        if self.b.types().pointee(slot_ty) != Some(ty) {
            let expected = self.b.types().pointee(slot_ty).unwrap_or(slot_ty);
            return Err(self.mismatch(&format!("assign to `{dst}`"), expected, ty));
        }
        self.b.store(value, slot);
        let current = self
            .b
            .load(slot, dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        self.cx.bind_value(dst, current, ty);
        Ok(())
    }
}
