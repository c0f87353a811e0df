use edn_backend::{CastOp, TypeId};
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, local_name, name_at};

impl FunctionEmitter<'_, '_> {
    /// `(op %d T %src)` for every conversion operator.
    ///
    /// A source that resolves to a constant is spilled to a stack
    /// temporary and reloaded, so the cast always has an instruction
    /// operand.
    pub(crate) fn lower_cast(&mut self, op: CastOp, items: &[Node]) -> Handled {
        const SHAPE: &str = "(op %d T %src)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let to = self.lower(&items[2])?;
        let src_name = local_name(&items[3]).ok_or(ProblemKind::Malformed(SHAPE))?;
        let mut value = self.value_of(&items[3])?;
        let from = self.b.type_of(value);
        self.check_cast(op, from, to)?;

        if self.b.is_constant(value) {
            let tmp = self.b.alloca(from, &format!("{src_name}.cst.tmp"));
            self.b.store(value, tmp);
            value = self
                .b
                .load(tmp, &format!("{src_name}.cst.load"))
                .ok_or_else(|| ProblemKind::Unresolved(src_name.to_owned()))?;
        }
        let cast = self.b.cast(op, value, to, dst);
        self.define(dst, cast, to)
    }

    /// Operand classes and widths the conversion accepts.
    fn check_cast(&self, op: CastOp, from: TypeId, to: TypeId) -> Result<(), ProblemKind> {
        let types = self.b.types();
        let width = |ty| types.int_width(ty).unwrap_or(0);
        let ok = match op {
            CastOp::ZExt | CastOp::SExt => {
                types.is_int(from) && types.is_int(to) && width(from) < width(to)
            }
            CastOp::Trunc => types.is_int(from) && types.is_int(to) && width(from) > width(to),
            CastOp::FpTrunc | CastOp::FpExt => types.is_float(from) && types.is_float(to),
            CastOp::SiToFp | CastOp::UiToFp => types.is_int(from) && types.is_float(to),
            CastOp::FpToSi | CastOp::FpToUi => types.is_float(from) && types.is_int(to),
            CastOp::PtrToInt => types.is_pointer(from) && types.is_int(to),
            CastOp::IntToPtr => types.is_int(from) && types.is_pointer(to),
            CastOp::BitCast => {
                (types.is_pointer(from) && types.is_pointer(to))
                    || (!types.is_aggregate(from) && types.size_of(from) == types.size_of(to))
            }
        };
        if ok {
            Ok(())
        } else {
            Err(ProblemKind::TypeMismatch(format!(
                "cannot {} {} to {}",
                op.mnemonic(),
                self.show(from),
                self.show(to)
            )))
        }
    }
}
