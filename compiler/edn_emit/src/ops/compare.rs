use edn_backend::{FloatPredicate, IntPredicate, TypeId, ValueId};
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, name_at};
use crate::op::Comparison;
use crate::types::is_unsigned;

impl FunctionEmitter<'_, '_> {
    /// `icmp` or `fcmp` for `cmp`, chosen by the operand type. Integer
    /// signedness comes from the type's spelling.
    pub(crate) fn build_compare(
        &mut self,
        cmp: Comparison,
        ty_node: &Node,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> ValueId {
        if self.b.types().is_float(self.b.type_of(lhs)) {
            self.b.fcmp(cmp.float_predicate(), lhs, rhs, name)
        } else {
            self.b
                .icmp(cmp.int_predicate(is_unsigned(ty_node)), lhs, rhs, name)
        }
    }

    /// `(eq %d T a b)` and friends. The result is `i1`.
    pub(crate) fn lower_compare(&mut self, cmp: Comparison, items: &[Node]) -> Handled {
        const SHAPE: &str = "(cmp %d T a b)";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let (lhs, rhs) = self.compare_operands(&items[3], &items[4], ty)?;
        self.cx.record_def(dst, Node::list(items.to_vec()));
        let value = self.build_compare(cmp, &items[2], lhs, rhs, dst);
        let i1 = self.b.types_mut().i1();
        self.define(dst, value, i1)
    }

    /// `(icmp %d T :pred p a b)`
    pub(crate) fn lower_icmp(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(icmp %d T :pred p a b)";
        let (dst, ty, pred) = predicate_form(items, SHAPE)?;
        let pred = IntPredicate::from_mnemonic(pred).ok_or(ProblemKind::Malformed(SHAPE))?;
        let ty = self.lower(ty)?;
        if !self.b.types().is_int(ty) && !self.b.types().is_pointer(ty) {
            return Err(ProblemKind::TypeMismatch(format!("icmp on {}", self.show(ty))));
        }
        let (lhs, rhs) = self.compare_operands(&items[5], &items[6], ty)?;
        let value = self.b.icmp(pred, lhs, rhs, dst);
        let i1 = self.b.types_mut().i1();
        self.define(dst, value, i1)
    }

    /// `(fcmp %d T :pred p a b)`
    pub(crate) fn lower_fcmp(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(fcmp %d T :pred p a b)";
        let (dst, ty, pred) = predicate_form(items, SHAPE)?;
        let pred = FloatPredicate::from_mnemonic(pred).ok_or(ProblemKind::Malformed(SHAPE))?;
        let ty = self.lower(ty)?;
        if !self.b.types().is_float(ty) {
            return Err(ProblemKind::TypeMismatch(format!("fcmp on {}", self.show(ty))));
        }
        let (lhs, rhs) = self.compare_operands(&items[5], &items[6], ty)?;
        let value = self.b.fcmp(pred, lhs, rhs, dst);
        let i1 = self.b.types_mut().i1();
        self.define(dst, value, i1)
    }

    fn compare_operands(
        &mut self,
        a: &Node,
        b: &Node,
        ty: TypeId,
    ) -> Result<(ValueId, ValueId), ProblemKind> {
        let lhs = self.operand(a, ty)?;
        let rhs = self.operand(b, ty)?;
        let (lt, rt) = (self.b.type_of(lhs), self.b.type_of(rhs));
        if lt != ty {
            return Err(self.mismatch("compare", ty, lt));
        }
        if rt != ty {
            return Err(self.mismatch("compare", ty, rt));
        }
        Ok((lhs, rhs))
    }
}

/// Destination, type and predicate of an `icmp`/`fcmp` form.
fn predicate_form<'n>(
    items: &'n [Node],
    shape: &'static str,
) -> Result<(&'n str, &'n Node, &'n str), ProblemKind> {
    expect_len(items, 7, shape)?;
    if items[3].as_keyword() != Some("pred") {
        return Err(ProblemKind::Malformed(shape));
    }
    let dst = name_at(items, 1, shape)?;
    let pred = items[4].as_name().ok_or(ProblemKind::Malformed(shape))?;
    Ok((dst, &items[2], pred))
}

#[cfg(test)]
mod tests {
    use edn_backend::Context;

    use crate::tests::helper::{body_text, emit_fn};

    #[test]
    fn unsigned_types_compare_unsigned() {
        let ctx = Context::create();
        let text = body_text(&emit_fn(
            &ctx,
            "i1",
            "[(lt %a i32 %x %y) (lt %b u32 %x %y) (ret i1 %b)]",
        ));
        assert!(text.contains("%a = icmp slt i32 %x, %y"), "{text}");
        assert!(text.contains("%b = icmp ult i32 %x, %y"), "{text}");
    }

    #[test]
    fn explicit_predicates() {
        let ctx = Context::create();
        let text = body_text(&emit_fn(
            &ctx,
            "i1",
            "[(icmp %a i32 :pred uge %x 3) (ret i1 %a)]",
        ));
        assert!(text.contains("%a = icmp uge i32 %x, 3"), "{text}");
    }

    #[test]
    fn unknown_predicate_is_skipped() {
        let ctx = Context::create();
        let session = emit_fn(&ctx, "void", "[(icmp %a i32 :pred bogus %x %y)]");
        assert_eq!(session.problems().len(), 1);
    }
}
