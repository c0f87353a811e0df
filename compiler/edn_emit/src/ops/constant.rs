use edn_backend::TypeKind;
use edn_ir::{Node, NodeKind};

use crate::emitter::{FunctionEmitter, Handled};
use crate::forms::{expect_len, int_as_float, name_at};

impl FunctionEmitter<'_, '_> {
    /// `(const %d T lit)`
    ///
    /// Integers and floats convert to the declared type. `nil` and `0`
    /// give a null pointer or a `zeroinitializer` aggregate. Anything the
    /// type cannot hold becomes `undef`.
    pub(crate) fn lower_const(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(const %d T lit)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let kind = self.b.types().kind(ty).clone();
        let value = match (items[3].kind(), kind) {
            (NodeKind::Int(v), TypeKind::Int(_)) => self.b.const_int(ty, *v),
            (NodeKind::Bool(v), TypeKind::Int(_)) => self.b.const_int(ty, i64::from(*v)),
            (NodeKind::Int(v), TypeKind::Float | TypeKind::Double) => {
                self.b.const_float(ty, int_as_float(*v))
            }
            (NodeKind::Float(v), TypeKind::Float | TypeKind::Double) => self.b.const_float(ty, *v),
            (NodeKind::Int(0) | NodeKind::Nil, TypeKind::Pointer(_)) => self.b.const_null(ty),
            (NodeKind::Symbol(s), TypeKind::Pointer(_)) if s == "null" => self.b.const_null(ty),
            (NodeKind::Int(0) | NodeKind::Nil, _) if self.b.types().is_aggregate(ty) => {
                self.b.const_zero(ty)
            }
            (NodeKind::Symbol(s), _) if s == "zeroinitializer" && self.b.types().is_aggregate(ty) => {
                self.b.const_zero(ty)
            }
            _ => self.b.const_undef(ty),
        };
        self.define(dst, value, ty)
    }
}
