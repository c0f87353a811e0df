//! Arithmetic, memory, conversion and call instructions.

use inkwell::types::AsTypeRef;
use inkwell::values::{
    AsValueRef, BasicMetadataValueEnum, BasicValueEnum, InstructionOpcode, IntValue,
};

use super::{c_name, Builder};
use crate::ids::{TypeId, ValueId};
use crate::types::TypeKind;
use crate::value::{BinOp, CastOp, Entry, FloatPredicate, IntPredicate};

impl<'ctx> Builder<'_, 'ctx> {
    // -- Arithmetic --

    /// Binary operator; the result has the type of `lhs`.
    pub fn binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId, name: &str) -> ValueId {
        let ty = self.type_of(lhs);
        if !self.attached("binary") {
            return self.const_undef(ty);
        }
        let (l, r) = (self.basic(lhs), self.basic(rhs));
        let v = self
            .ll
            .build_binop(op.opcode(), l, r, name)
            .expect("binop");
        self.push(v, ty)
    }

    pub fn icmp(&mut self, pred: IntPredicate, lhs: ValueId, rhs: ValueId, name: &str) -> ValueId {
        let ty = self.types_mut().i1();
        if !self.attached("icmp") {
            return self.const_undef(ty);
        }
        match (self.basic(lhs), self.basic(rhs)) {
            (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r)) => {
                let v = self
                    .ll
                    .build_int_compare(pred.llvm(), l, r, name)
                    .expect("icmp");
                self.push(v, ty)
            }
            // Pointer comparisons have no typed inkwell entry point.
            (l, r) => {
                let name = c_name(name);
                // SAFETY: both operands and the builder share this context.
                let v = unsafe {
                    llvm_sys::core::LLVMBuildICmp(
                        self.ll.as_mut_ptr(),
                        pred.raw(),
                        l.as_value_ref(),
                        r.as_value_ref(),
                        name.as_ptr(),
                    )
                };
                self.push_raw(v, ty)
            }
        }
    }

    pub fn fcmp(
        &mut self,
        pred: FloatPredicate,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> ValueId {
        let ty = self.types_mut().i1();
        if !self.attached("fcmp") {
            return self.const_undef(ty);
        }
        match (self.basic(lhs), self.basic(rhs)) {
            (BasicValueEnum::FloatValue(l), BasicValueEnum::FloatValue(r)) => {
                let v = self
                    .ll
                    .build_float_compare(pred.llvm(), l, r, name)
                    .expect("fcmp");
                self.push(v, ty)
            }
            (l, r) => {
                tracing::error!(?l, ?r, "fcmp on non-float operands");
                self.const_undef(ty)
            }
        }
    }

    /// Conversion to `to`. A bitcast between types that lower to the
    /// same LLVM type only retypes the value.
    pub fn cast(&mut self, op: CastOp, value: ValueId, to: TypeId, name: &str) -> ValueId {
        if op == CastOp::BitCast && self.type_of(value) == to {
            return value;
        }
        let v = self.basic(value);
        let Some(to_ll) = self.module.basic_type(to) else {
            tracing::error!(ty = %self.types().display(to), "cast to a non-first-class type");
            return self.const_undef(to);
        };
        if op == CastOp::BitCast && v.get_type() == to_ll {
            return self.push(v, to);
        }
        if !self.attached("cast") {
            return self.const_undef(to);
        }
        let v = self
            .ll
            .build_cast(op.opcode(), v, to_ll, name)
            .expect("cast");
        self.push(v, to)
    }

    pub fn bitcast(&mut self, value: ValueId, to: TypeId, name: &str) -> ValueId {
        self.cast(CastOp::BitCast, value, to, name)
    }

    // -- Memory --

    /// Stack allocation at the insertion point.
    pub fn alloca(&mut self, ty: TypeId, name: &str) -> ValueId {
        let ptr = self.types_mut().ptr(ty);
        if !self.attached("alloca") {
            return self.const_undef(ptr);
        }
        let Some(ll_ty) = self.module.basic_type(ty) else {
            tracing::error!(ty = %self.types().display(ty), "alloca of a non-first-class type");
            return self.const_undef(ptr);
        };
        let v = self.ll.build_alloca(ll_ty, name).expect("alloca");
        self.push(v, ptr)
    }

    /// Stack allocation in the entry block, after any allocas already
    /// there, so that the slot dominates every use.
    pub fn entry_alloca(&mut self, ty: TypeId, name: &str) -> ValueId {
        let Some(entry) = self.function().value.get_first_basic_block() else {
            return self.alloca(ty, name);
        };
        let ptr = self.types_mut().ptr(ty);
        let Some(ll_ty) = self.module.basic_type(ty) else {
            tracing::error!(ty = %self.types().display(ty), "alloca of a non-first-class type");
            return self.const_undef(ptr);
        };
        let at = Self::skip_leading(entry, InstructionOpcode::Alloca);
        let v = self
            .builder_at(entry, at)
            .build_alloca(ll_ty, name)
            .expect("alloca");
        self.push(v, ptr)
    }

    /// Load through a typed pointer. Returns `None` if `ptr` is not a pointer.
    pub fn load(&mut self, ptr: ValueId, name: &str) -> Option<ValueId> {
        let ty = self.types().pointee(self.type_of(ptr))?;
        if !self.attached("load") {
            return Some(self.const_undef(ty));
        }
        let BasicValueEnum::PointerValue(p) = self.basic(ptr) else {
            tracing::error!(?ptr, "load from a non-pointer value");
            return None;
        };
        let Some(ll_ty) = self.module.basic_type(ty) else {
            tracing::error!(ty = %self.types().display(ty), "load of a non-first-class type");
            return Some(self.const_undef(ty));
        };
        let v = self.ll.build_load(ll_ty, p, name).expect("load");
        Some(self.push(v, ty))
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) {
        if !self.attached("store") {
            return;
        }
        let BasicValueEnum::PointerValue(p) = self.basic(ptr) else {
            tracing::error!(?ptr, "store through a non-pointer value");
            return;
        };
        let v = self.basic(value);
        self.ll.build_store(p, v).expect("store");
    }

    /// `getelementptr`. The result type is computed by walking `indices`
    /// through the pointee; struct steps require constant indices.
    /// Returns `None` if the walk fails.
    pub fn gep(&mut self, base: ValueId, indices: &[ValueId], name: &str) -> Option<ValueId> {
        let pointee = self.types().pointee(self.type_of(base))?;
        let mut current = pointee;
        for &index in indices.iter().skip(1) {
            let step = self.const_int_value(index).unwrap_or(0);
            current = self
                .types()
                .element_at(current, u64::try_from(step).ok()?)?;
        }
        let ty = self.types_mut().ptr(current);
        if !self.attached("getelementptr") {
            return Some(self.const_undef(ty));
        }
        let BasicValueEnum::PointerValue(p) = self.basic(base) else {
            tracing::error!(?base, "getelementptr on a non-pointer value");
            return None;
        };
        let ll_ty = self.module.basic_type(pointee)?;
        let ll_indices: Option<Vec<IntValue<'ctx>>> = indices
            .iter()
            .map(|&i| match self.basic(i) {
                BasicValueEnum::IntValue(v) => Some(v),
                _ => None,
            })
            .collect();
        // SAFETY: the index walk above checked every step against the
        // pointee type.
        let v = unsafe { self.ll.build_gep(ll_ty, p, &ll_indices?, name) }.expect("gep");
        Some(self.push(v, ty))
    }

    /// `getelementptr %T, ptr base, i32 0, i32 field`.
    pub fn struct_gep(&mut self, base: ValueId, field: u32, name: &str) -> Option<ValueId> {
        let zero = self.const_i32(0);
        let idx = self.const_i32(i32::try_from(field).ok()?);
        self.gep(base, &[zero, idx], name)
    }

    /// Byte-offset pointer `base + offset` as `i8*`.
    pub fn byte_gep(&mut self, base: ValueId, offset: u64, name: &str) -> Option<ValueId> {
        let i8_ptr = self.types_mut().i8_ptr();
        let raw = self.bitcast(base, i8_ptr, "");
        let i64 = self.types_mut().i64();
        let off = self.const_int(i64, i64::try_from(offset).ok()?);
        self.gep(raw, &[off], name)
    }

    // -- Calls --

    /// Signature type behind a callee pointer.
    pub(super) fn callee_sig(&self, callee: ValueId) -> Option<TypeId> {
        let fn_ty = self.types().pointee(self.type_of(callee))?;
        self.types().signature(fn_ty).map(|_| fn_ty)
    }

    /// True if the call must go through the C API: a token appears in
    /// the signature or among the arguments.
    pub(super) fn needs_raw_call(&self, sig: TypeId, args: &[ValueId]) -> bool {
        let is_token = |t: TypeId| matches!(self.types().kind(t), TypeKind::Token);
        let sig_tokens = self
            .types()
            .signature(sig)
            .is_some_and(|(ret, params, _)| is_token(ret) || params.iter().copied().any(is_token));
        sig_tokens
            || args
                .iter()
                .any(|&a| !matches!(self.module.entry(a), Entry::Basic(_)))
    }

    /// Direct or indirect call. Returns `None` if `callee` is not a
    /// function pointer.
    pub fn call(&mut self, callee: ValueId, args: &[ValueId], name: &str) -> Option<ValueId> {
        let sig = self.callee_sig(callee)?;
        let (ret, _, _) = self.types().signature(sig)?;
        let name = if self.types().is_void(ret) { "" } else { name };
        if !self.attached("call") {
            return Some(self.const_undef(ret));
        }
        let fn_ty = self.module.fn_type(sig)?;
        if self.needs_raw_call(sig, args) {
            let mut raw_args: Vec<_> = args.iter().map(|&a| self.raw(a)).collect();
            let count = u32::try_from(raw_args.len()).ok()?;
            let c_name = c_name(name);
            // SAFETY: callee, arguments and signature share this context.
            let v = unsafe {
                llvm_sys::core::LLVMBuildCall2(
                    self.ll.as_mut_ptr(),
                    fn_ty.as_type_ref(),
                    self.raw(callee),
                    raw_args.as_mut_ptr(),
                    count,
                    c_name.as_ptr(),
                )
            };
            return Some(self.push_raw(v, ret));
        }
        let BasicValueEnum::PointerValue(ptr) = self.basic(callee) else {
            tracing::error!(?callee, "call through a non-pointer value");
            return None;
        };
        let ll_args: Vec<BasicMetadataValueEnum<'ctx>> =
            args.iter().map(|&a| self.basic(a).into()).collect();
        let call = self
            .ll
            .build_indirect_call(fn_ty, ptr, &ll_args, name)
            .expect("call");
        Some(match call.try_as_basic_value().basic() {
            Some(v) => self.push(v, ret),
            None => self.module.push_value(Entry::Void, ret),
        })
    }

    pub fn va_arg(&mut self, list: ValueId, ty: TypeId, name: &str) -> ValueId {
        if !self.attached("va_arg") {
            return self.const_undef(ty);
        }
        let (BasicValueEnum::PointerValue(p), Some(ll_ty)) =
            (self.basic(list), self.module.basic_type(ty))
        else {
            tracing::error!(?list, "va_arg needs a va_list pointer and a first-class type");
            return self.const_undef(ty);
        };
        let v = self.ll.build_va_arg(p, ll_ty, name).expect("va_arg");
        self.push(v, ty)
    }
}

