use edn_backend::BinOp;
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, name_at};

impl FunctionEmitter<'_, '_> {
    /// `(op %d T a b)` for every integer, float and bitwise operator.
    /// `and`, `or` and `xor` keep their form for branch re-evaluation.
    pub(crate) fn lower_binary(&mut self, op: BinOp, items: &[Node]) -> Handled {
        const SHAPE: &str = "(op %d T a b)";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let types = self.b.types();
        let fits = if op.is_float() {
            types.is_float(ty)
        } else {
            types.is_int(ty)
        };
        if !fits {
            return Err(ProblemKind::TypeMismatch(format!(
                "`{}` on {}",
                op.mnemonic(),
                self.show(ty)
            )));
        }
        let lhs = self.operand(&items[3], ty)?;
        let rhs = self.operand(&items[4], ty)?;
        for operand in [lhs, rhs] {
            let found = self.b.type_of(operand);
            if found != ty {
                return Err(self.mismatch(op.mnemonic(), ty, found));
            }
        }
        if matches!(op, BinOp::And | BinOp::Or | BinOp::Xor) {
            self.cx.record_def(dst, Node::list(items.to_vec()));
        }
        let value = self.b.binary(op, lhs, rhs, dst);
        self.define(dst, value, ty)
    }
}
