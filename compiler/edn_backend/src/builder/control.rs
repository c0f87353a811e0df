//! Terminators, phi nodes and exception-handling pads.
//!
//! Funclet pads (`catchswitch`, `catchpad`, `cleanuppad`) produce tokens,
//! which inkwell does not model; those go through `llvm-sys` directly.

use inkwell::types::{AsTypeRef, BasicTypeEnum};
use inkwell::values::{AsValueRef, BasicValue, BasicValueEnum, InstructionOpcode, PhiValue};
use llvm_sys::prelude::LLVMBasicBlockRef;

use super::{c_name, Builder};
use crate::ids::{BlockId, FuncId, TypeId, ValueId};
use crate::value::Entry;

impl<'ctx> Builder<'_, 'ctx> {
    // -- Terminators --

    pub fn br(&mut self, dest: BlockId) {
        if !self.attached("br") {
            return;
        }
        let bb = self.module.block(dest);
        self.ll.build_unconditional_branch(bb).expect("br");
    }

    pub fn cond_br(&mut self, cond: ValueId, then_dest: BlockId, else_dest: BlockId) {
        if !self.attached("br") {
            return;
        }
        let BasicValueEnum::IntValue(cond) = self.basic(cond) else {
            tracing::error!(?cond, "branch condition is not an integer");
            return;
        };
        let (then_bb, else_bb) = (self.module.block(then_dest), self.module.block(else_dest));
        self.ll
            .build_conditional_branch(cond, then_bb, else_bb)
            .expect("cond_br");
    }

    pub fn ret(&mut self, value: ValueId) {
        if !self.attached("ret") {
            return;
        }
        let v = self.basic(value);
        self.ll.build_return(Some(&v)).expect("ret");
    }

    pub fn ret_void(&mut self) {
        if !self.attached("ret") {
            return;
        }
        self.ll.build_return(None).expect("ret");
    }

    pub fn unreachable(&mut self) {
        if !self.attached("unreachable") {
            return;
        }
        self.ll.build_unreachable().expect("unreachable");
    }

    /// Call that transfers to `unwind` if the callee throws.
    pub fn invoke(
        &mut self,
        callee: ValueId,
        args: &[ValueId],
        normal: BlockId,
        unwind: BlockId,
        name: &str,
    ) -> Option<ValueId> {
        let sig = self.callee_sig(callee)?;
        let (ret, _, _) = self.types().signature(sig)?;
        let name = if self.types().is_void(ret) { "" } else { name };
        if !self.attached("invoke") {
            return Some(self.const_undef(ret));
        }
        let fn_ty = self.module.fn_type(sig)?;
        let (then_bb, catch_bb) = (self.module.block(normal), self.module.block(unwind));
        if self.needs_raw_call(sig, args) {
            let mut raw_args: Vec<_> = args.iter().map(|&a| self.raw(a)).collect();
            let count = u32::try_from(raw_args.len()).ok()?;
            let c_name = c_name(name);
            // SAFETY: callee, arguments, blocks and signature share this context.
            let v = unsafe {
                llvm_sys::core::LLVMBuildInvoke2(
                    self.ll.as_mut_ptr(),
                    fn_ty.as_type_ref(),
                    self.raw(callee),
                    raw_args.as_mut_ptr(),
                    count,
                    then_bb.as_mut_ptr(),
                    catch_bb.as_mut_ptr(),
                    c_name.as_ptr(),
                )
            };
            return Some(self.push_raw(v, ret));
        }
        let BasicValueEnum::PointerValue(ptr) = self.basic(callee) else {
            tracing::error!(?callee, "invoke through a non-pointer value");
            return None;
        };
        let ll_args: Vec<BasicValueEnum<'ctx>> = args.iter().map(|&a| self.basic(a)).collect();
        let call = self
            .ll
            .build_indirect_invoke(fn_ty, ptr, &ll_args, then_bb, catch_bb, name)
            .expect("invoke");
        Some(match call.try_as_basic_value().basic() {
            Some(v) => self.push(v, ret),
            None => self.module.push_value(Entry::Void, ret),
        })
    }

    // -- Phi nodes --

    /// Empty phi at the start of `block`, after any phis already there.
    /// The cursor is not moved.
    pub fn phi_at_start(&mut self, block: BlockId, ty: TypeId, name: &str) -> ValueId {
        let Some(ll_ty) = self.module.basic_type(ty) else {
            tracing::error!(ty = %self.types().display(ty), "phi of a non-first-class type");
            return self.const_undef(ty);
        };
        let bb = self.module.block(block);
        let at = Self::skip_leading(bb, InstructionOpcode::Phi);
        let phi = self
            .builder_at(bb, at)
            .build_phi(ll_ty, name)
            .expect("phi");
        self.push(phi.as_basic_value(), ty)
    }

    /// Add an incoming edge to a phi created by [`Builder::phi_at_start`].
    pub fn add_incoming(&mut self, phi: ValueId, value: ValueId, from: BlockId) {
        let Entry::Basic(phi_val) = self.module.entry(phi) else {
            tracing::warn!(?phi, "add_incoming on a non-phi value");
            return;
        };
        let is_phi = phi_val
            .as_instruction_value()
            .is_some_and(|i| i.get_opcode() == InstructionOpcode::Phi);
        if !is_phi {
            tracing::warn!(?phi, "add_incoming on a non-phi value");
            return;
        }
        // SAFETY: checked above that the value is a phi instruction.
        let raw_phi = unsafe { PhiValue::new(phi_val.as_value_ref()) };
        let v = self.basic(value);
        let bb = self.module.block(from);
        raw_phi.add_incoming(&[(&v as &dyn BasicValue<'ctx>, bb)]);
    }

    // -- Exception handling --

    /// `landingpad { ptr, i32 }` with the given catch clauses.
    /// `personality` must be the function's personality routine.
    pub fn landing_pad(
        &mut self,
        personality: FuncId,
        cleanup: bool,
        catches: &[ValueId],
        name: &str,
    ) -> ValueId {
        let ty = self.landing_pad_type();
        if !self.attached("landingpad") {
            return self.const_undef(ty);
        }
        let Some(BasicTypeEnum::StructType(lp_ty)) = self.module.basic_type(ty) else {
            return self.const_undef(ty);
        };
        let personality_fn = self.module.function(personality).value;
        let clauses: Vec<BasicValueEnum<'ctx>> =
            catches.iter().map(|&c| self.basic(c)).collect();
        let lp = self
            .ll
            .build_landing_pad(lp_ty, personality_fn, &clauses, cleanup, name)
            .expect("landingpad");
        self.push(lp, ty)
    }

    /// The `{ i8*, i32 }` record a landingpad produces.
    pub fn landing_pad_type(&mut self) -> TypeId {
        let i8_ptr = self.types_mut().i8_ptr();
        let i32 = self.types_mut().i32();
        self.types_mut().struct_literal(vec![i8_ptr, i32])
    }

    pub fn resume(&mut self, value: ValueId) {
        if !self.attached("resume") {
            return;
        }
        let v = self.basic(value);
        self.ll.build_resume(v).expect("resume");
    }

    /// `catchswitch within parent [handlers] unwind to caller|unwind`.
    pub fn catch_switch(
        &mut self,
        parent: ValueId,
        handlers: &[BlockId],
        unwind: Option<BlockId>,
        name: &str,
    ) -> ValueId {
        let token = self.types_mut().token();
        if !self.attached("catchswitch") {
            return self.const_undef(token);
        }
        let unwind = self.raw_block(unwind);
        let count = u32::try_from(handlers.len()).unwrap_or(u32::MAX);
        let c_name = c_name(name);
        // SAFETY: parent and blocks belong to the function being built.
        let switch = unsafe {
            llvm_sys::core::LLVMBuildCatchSwitch(
                self.ll.as_mut_ptr(),
                self.raw(parent),
                unwind,
                count,
                c_name.as_ptr(),
            )
        };
        let id = self.module.push_value(Entry::Token(switch), token);
        for &handler in handlers {
            self.add_handler(id, handler);
        }
        id
    }

    /// Register an extra handler on a catchswitch built earlier.
    pub fn add_handler(&mut self, catch_switch: ValueId, handler: BlockId) {
        let Entry::Token(switch) = self.module.entry(catch_switch) else {
            tracing::warn!(?catch_switch, "add_handler on a non-token value");
            return;
        };
        let bb = self.module.block(handler);
        // SAFETY: `switch` is a catchswitch built by this builder.
        unsafe { llvm_sys::core::LLVMAddHandler(switch, bb.as_mut_ptr()) };
    }

    pub fn catch_pad(&mut self, parent: ValueId, args: &[ValueId], name: &str) -> ValueId {
        self.funclet_pad(parent, args, name, true)
    }

    pub fn catch_ret(&mut self, pad: ValueId, dest: BlockId) {
        if !self.attached("catchret") {
            return;
        }
        let bb = self.module.block(dest);
        // SAFETY: `pad` is a catchpad of the function being built.
        unsafe {
            llvm_sys::core::LLVMBuildCatchRet(self.ll.as_mut_ptr(), self.raw(pad), bb.as_mut_ptr());
        }
    }

    pub fn cleanup_pad(&mut self, parent: ValueId, args: &[ValueId], name: &str) -> ValueId {
        self.funclet_pad(parent, args, name, false)
    }

    pub fn cleanup_ret(&mut self, pad: ValueId, unwind: Option<BlockId>) {
        if !self.attached("cleanupret") {
            return;
        }
        let unwind = self.raw_block(unwind);
        // SAFETY: `pad` is a cleanuppad of the function being built.
        unsafe {
            llvm_sys::core::LLVMBuildCleanupRet(self.ll.as_mut_ptr(), self.raw(pad), unwind);
        }
    }

    fn funclet_pad(
        &mut self,
        parent: ValueId,
        args: &[ValueId],
        name: &str,
        catch: bool,
    ) -> ValueId {
        let token = self.types_mut().token();
        if !self.attached(if catch { "catchpad" } else { "cleanuppad" }) {
            return self.const_undef(token);
        }
        let mut raw_args: Vec<_> = args.iter().map(|&a| self.raw(a)).collect();
        let count = u32::try_from(raw_args.len()).unwrap_or(u32::MAX);
        let c_name = c_name(name);
        let build = if catch {
            llvm_sys::core::LLVMBuildCatchPad
        } else {
            llvm_sys::core::LLVMBuildCleanupPad
        };
        // SAFETY: parent and arguments belong to the function being built.
        let pad = unsafe {
            build(
                self.ll.as_mut_ptr(),
                self.raw(parent),
                raw_args.as_mut_ptr(),
                count,
                c_name.as_ptr(),
            )
        };
        self.module.push_value(Entry::Token(pad), token)
    }

    /// Null for "unwind to caller".
    fn raw_block(&self, block: Option<BlockId>) -> LLVMBasicBlockRef {
        block.map_or(std::ptr::null_mut(), |b| self.module.block(b).as_mut_ptr())
    }
}
