use edn_backend::{BinOp, CastOp, TypeId};
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, local_name, name_at};

impl FunctionEmitter<'_, '_> {
    /// `(ptr-add %d (ptr T) %base %off)` and `ptr-sub`. The offset counts
    /// elements of `T`.
    pub(crate) fn lower_ptr_offset(&mut self, items: &[Node], negate: bool) -> Handled {
        const SHAPE: &str = "(ptr-add %d (ptr T) %base %off)";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        if !self.b.types().is_pointer(ty) {
            return Err(ProblemKind::TypeMismatch(format!(
                "pointer arithmetic on {}",
                self.show(ty)
            )));
        }
        let base = self.value_of(&items[3])?;
        let base_ty = self.b.type_of(base);
        if base_ty != ty {
            return Err(self.mismatch("pointer base", ty, base_ty));
        }
        let i64 = self.b.types_mut().i64();
        let mut offset = self.operand(&items[4], i64)?;
        let offset_ty = self.b.type_of(offset);
        if !self.b.types().is_int(offset_ty) {
            return Err(self.mismatch("pointer offset", i64, offset_ty));
        }
        if negate {
            let zero = self.b.const_int(offset_ty, 0);
            let name = local_name(&items[4]).map_or_else(|| format!("{dst}.off"), str::to_owned);
            offset = self.b.binary(BinOp::Sub, zero, offset, &format!("{name}.neg"));
        }
        let value = self
            .b
            .gep(base, &[offset], dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        self.define(dst, value, ty)
    }

    /// `(ptr-diff %d IntT %a %b)`: `(a - b) / sizeof(*a)`.
    pub(crate) fn lower_ptr_diff(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(ptr-diff %d IntT %a %b)";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let a_name = name_at(items, 3, SHAPE)?;
        let b_name = name_at(items, 4, SHAPE)?;
        let a = self.value_of(&items[3])?;
        let b = self.value_of(&items[4])?;
        let (a_ty, b_ty) = (self.b.type_of(a), self.b.type_of(b));
        let Some(elem) = self.b.types().pointee(a_ty) else {
            return Err(ProblemKind::TypeMismatch(format!("ptr-diff on {}", self.show(a_ty))));
        };
        if a_ty != b_ty {
            return Err(self.mismatch("ptr-diff", a_ty, b_ty));
        }
        let Some(to_bits) = self.b.types().int_width(ty) else {
            return Err(ProblemKind::TypeMismatch(format!("ptr-diff into {}", self.show(ty))));
        };

        let i64 = self.b.types_mut().i64();
        let a_int = self.b.cast(CastOp::PtrToInt, a, i64, &format!("{a_name}.pi"));
        let b_int = self.b.cast(CastOp::PtrToInt, b, i64, &format!("{b_name}.pi"));
        let raw = self.b.binary(BinOp::Sub, a_int, b_int, &format!("{dst}.raw"));
        let size = self.b.types().size_of(elem).max(1);
        let scale = self.b.const_int(i64, i64::try_from(size).unwrap_or(1));
        let count = match to_bits {
            64 => self.b.binary(BinOp::SDiv, raw, scale, dst),
            _ => self.b.binary(BinOp::SDiv, raw, scale, &format!("{dst}.elts")),
        };
        let value = match to_bits {
            64 => count,
            bits if bits > 64 => self.b.cast(CastOp::SExt, count, ty, dst),
            _ => self.b.cast(CastOp::Trunc, count, ty, dst),
        };
        self.define(dst, value, ty)
    }

    /// `(addr %d (ptr T) %src)`: the address of `src`'s slot, created on
    /// first use and seeded with its current value.
    pub(crate) fn lower_addr(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(addr %d (ptr T) %src)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let src = name_at(items, 3, SHAPE)?;
        let Some(pointee) = self.b.types().pointee(ty) else {
            return Err(ProblemKind::TypeMismatch(format!("addr into {}", self.show(ty))));
        };
        let value_ty = self.cx.type_of(src).unwrap_or(pointee);
        let slot = self.ensure_slot(src, value_ty, true);
        let slot_ty = self.b.type_of(slot);
        if slot_ty != ty {
            return Err(self.mismatch(&format!("address of `{src}`"), ty, slot_ty));
        }
        self.define(dst, slot, ty)
    }

    /// `(deref %d T %p)`. `p` must point at `T`.
    pub(crate) fn lower_deref(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(deref %d T %p)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        self.load_checked(dst, ty, &items[3])
    }

    /// Load a `ty` through the pointer named by `ptr`, checking its pointee.
    pub(crate) fn load_checked(&mut self, dst: &str, ty: TypeId, ptr: &Node) -> Handled {
        let ptr = self.value_of(ptr)?;
        let ptr_ty = self.b.type_of(ptr);
        if self.b.types().pointee(ptr_ty) != Some(ty) {
            let expected = self.b.types_mut().ptr(ty);
            return Err(self.mismatch("load", expected, ptr_ty));
        }
        let value = self
            .b
            .load(ptr, dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        self.define(dst, value, ty)
    }
}
