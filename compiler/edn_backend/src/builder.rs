//! Positioned instruction builder.
//!
//! `Builder` borrows the [`Module`] mutably and drives an inkwell builder
//! inside one function. The insertion point is a block, optionally ahead
//! of that block's terminator.
//!
//! # Method Organization
//!
//! | Category | Methods |
//! |----------|---------|
//! | Position | `position_at_end`, `position_before_terminator`, `save`, `restore`, `switch_function` |
//! | Blocks | `append_block`, `current_block`, `is_terminated`, `find_block` |
//! | Constants | `const_int`, `const_float`, `const_null`, `const_undef`, `const_zero`, `global_ref`, `function_ref` |
//! | Arithmetic | `binary`, `icmp`, `fcmp`, `cast` |
//! | Memory | `alloca`, `entry_alloca`, `load`, `store`, `gep`, `struct_gep` |
//! | Calls | `call`, `invoke`, `va_arg` |
//! | Control flow | `br`, `cond_br`, `ret`, `ret_void`, `unreachable` |
//! | Phi nodes | `phi_at_start`, `add_incoming` |
//! | Exceptions | `landing_pad`, `resume`, `catch_switch`, `catch_pad`, `catch_ret`, `cleanup_pad`, `cleanup_ret` |
//!
//! Building with no insertion point is a caller bug. Rather than panic,
//! the builder returns `undef` of the requested type and counts the miss;
//! callers check [`Builder::detached_count`] at their fatal checkpoints.

mod control;
mod instructions;

use std::ffi::CString;

use inkwell::basic_block::BasicBlock;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{AsValueRef, BasicValueEnum, InstructionOpcode, InstructionValue};
use llvm_sys::prelude::LLVMValueRef;

use crate::ids::{BlockId, FuncId, GlobalId, TypeId, ValueId};
use crate::module::{Function, Lowered, Module};
use crate::types::TypeTable;
use crate::value::Entry;

/// A saved insertion point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertPoint {
    pub func: FuncId,
    pub block: Option<BlockId>,
    pub before_terminator: bool,
}

/// Instruction builder over a module.
pub struct Builder<'m, 'ctx> {
    module: &'m mut Module<'ctx>,
    ll: inkwell::builder::Builder<'ctx>,
    func: FuncId,
    block: Option<BlockId>,
    before_terminator: bool,
    detached: u32,
}

impl<'m, 'ctx> Builder<'m, 'ctx> {
    /// Create a builder targeting `func`, with no block selected yet.
    pub fn new(module: &'m mut Module<'ctx>, func: FuncId) -> Self {
        let ll = module.llcx().create_builder();
        Builder {
            module,
            ll,
            func,
            block: None,
            before_terminator: false,
            detached: 0,
        }
    }

    #[inline]
    pub fn module(&self) -> &Module<'ctx> {
        self.module
    }

    #[inline]
    pub fn module_mut(&mut self) -> &mut Module<'ctx> {
        self.module
    }

    #[inline]
    pub fn types(&self) -> &TypeTable {
        &self.module.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.module.types
    }

    #[inline]
    pub fn current_function(&self) -> FuncId {
        self.func
    }

    pub fn function(&self) -> &Function<'ctx> {
        self.module.function(self.func)
    }

    pub fn block_count(&self) -> u32 {
        self.function().value.count_basic_blocks()
    }

    /// Number of values handed out so far, across the module.
    pub fn value_count(&self) -> usize {
        self.module.value_count()
    }

    /// Number of instructions requested while no block was selected.
    pub fn detached_count(&self) -> u32 {
        self.detached
    }

    // ── Position ────────────────────────────────────────────────────

    /// Switch to another function of the module. Clears the block.
    pub fn switch_function(&mut self, func: FuncId) {
        self.func = func;
        self.block = None;
        self.before_terminator = false;
        self.ll.clear_insertion_position();
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.block = Some(block);
        self.before_terminator = false;
        self.ll.position_at_end(self.module.block(block));
    }

    /// Insert ahead of `block`'s terminator (or at its end if it has none).
    pub fn position_before_terminator(&mut self, block: BlockId) {
        let bb = self.module.block(block);
        self.block = Some(block);
        match bb.get_terminator() {
            Some(term) => {
                self.before_terminator = true;
                self.ll.position_before(&term);
            }
            None => {
                self.before_terminator = false;
                self.ll.position_at_end(bb);
            }
        }
    }

    pub fn save(&self) -> InsertPoint {
        InsertPoint {
            func: self.func,
            block: self.block,
            before_terminator: self.before_terminator,
        }
    }

    pub fn restore(&mut self, point: InsertPoint) {
        self.func = point.func;
        match point.block {
            Some(block) if point.before_terminator => self.position_before_terminator(block),
            Some(block) => self.position_at_end(block),
            None => {
                self.block = None;
                self.before_terminator = false;
                self.ll.clear_insertion_position();
            }
        }
    }

    // ── Blocks ──────────────────────────────────────────────────────

    /// Append a new block to the current function. LLVM uniques the name.
    pub fn append_block(&mut self, name: &str) -> BlockId {
        let value = self.function().value;
        let bb = self.module.llcx().append_basic_block(value, name);
        self.module.push_block(bb, self.func)
    }

    #[inline]
    pub fn current_block(&self) -> Option<BlockId> {
        self.block
    }

    pub fn has_insertion_point(&self) -> bool {
        self.block.is_some()
    }

    /// True if the current block already ends in a terminator.
    /// A builder with no block counts as terminated.
    pub fn is_terminated(&self) -> bool {
        match self.block {
            Some(b) => self.module.block(b).get_terminator().is_some(),
            None => true,
        }
    }

    pub fn find_block(&self, name: &str) -> Option<BlockId> {
        self.module.find_block(self.func, name)
    }

    pub fn block_name(&self, block: BlockId) -> String {
        self.module
            .block(block)
            .get_name()
            .to_string_lossy()
            .into_owned()
    }

    // ── Values ──────────────────────────────────────────────────────

    pub fn type_of(&self, value: ValueId) -> TypeId {
        self.module.value_type(value)
    }

    pub fn param(&self, index: usize) -> Option<ValueId> {
        self.function().params.get(index).copied()
    }

    /// The integer constant behind `value`, if it is one.
    pub fn const_int_value(&self, value: ValueId) -> Option<i64> {
        match self.module.entry(value) {
            Entry::Basic(BasicValueEnum::IntValue(v)) => v.get_sign_extended_constant(),
            _ => None,
        }
    }

    /// True if `value` is a constant other than a global or function
    /// address.
    pub fn is_constant(&self, value: ValueId) -> bool {
        let raw = match self.module.entry(value) {
            Entry::Basic(v) => v.as_value_ref(),
            Entry::Token(v) => v,
            Entry::Void => return false,
        };
        // SAFETY: the value belongs to this module's context.
        unsafe {
            llvm_sys::core::LLVMIsConstant(raw) != 0
                && llvm_sys::core::LLVMIsAGlobalValue(raw).is_null()
        }
    }

    /// `value` as a first-class LLVM value. Tokens and void results log
    /// an error and stand in as `i8 undef`.
    fn basic(&self, value: ValueId) -> BasicValueEnum<'ctx> {
        match self.module.entry(value) {
            Entry::Basic(v) => v,
            other => {
                tracing::error!(?value, ?other, "value is not first-class");
                self.module.llcx().i8_type().get_undef().into()
            }
        }
    }

    /// `value` as a raw LLVM value, for the C API paths.
    fn raw(&self, value: ValueId) -> LLVMValueRef {
        match self.module.entry(value) {
            Entry::Basic(v) => v.as_value_ref(),
            Entry::Token(v) => v,
            Entry::Void => {
                tracing::error!(?value, "void value used as an operand");
                self.module.llcx().i8_type().get_undef().as_value_ref()
            }
        }
    }

    fn push(&mut self, value: impl Into<BasicValueEnum<'ctx>>, ty: TypeId) -> ValueId {
        self.module.push_value(Entry::Basic(value.into()), ty)
    }

    /// Wrap a raw result of type `ty`.
    fn push_raw(&mut self, value: LLVMValueRef, ty: TypeId) -> ValueId {
        let entry = match self.module.lower(ty) {
            Lowered::Void => Entry::Void,
            // SAFETY: `value` was built with the first-class type `ty`.
            Lowered::Basic(_) => Entry::Basic(unsafe { BasicValueEnum::new(value) }),
            Lowered::Function(_) | Lowered::Raw(_) => Entry::Token(value),
        };
        self.module.push_value(entry, ty)
    }

    // ── Constants ───────────────────────────────────────────────────

    #[expect(
        clippy::cast_sign_loss,
        reason = "two's complement bits, sign-extended by LLVM"
    )]
    pub fn const_int(&mut self, ty: TypeId, value: i64) -> ValueId {
        match self.module.basic_type(ty) {
            Some(BasicTypeEnum::IntType(t)) => {
                let v = t.const_int(value as u64, value < 0);
                self.push(v, ty)
            }
            _ => {
                tracing::error!(ty = %self.types().display(ty), "integer constant of a non-integer type");
                self.const_zero(ty)
            }
        }
    }

    pub fn const_i32(&mut self, value: i32) -> ValueId {
        let ty = self.types_mut().i32();
        self.const_int(ty, i64::from(value))
    }

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        let ty = self.types_mut().i1();
        self.const_int(ty, i64::from(value))
    }

    pub fn const_float(&mut self, ty: TypeId, value: f64) -> ValueId {
        match self.module.basic_type(ty) {
            Some(BasicTypeEnum::FloatType(t)) => {
                let v = t.const_float(value);
                self.push(v, ty)
            }
            _ => {
                tracing::error!(ty = %self.types().display(ty), "float constant of a non-float type");
                self.const_zero(ty)
            }
        }
    }

    pub fn const_null(&mut self, ty: TypeId) -> ValueId {
        self.const_zero(ty)
    }

    pub fn const_undef(&mut self, ty: TypeId) -> ValueId {
        let lowered = self.module.lower(ty);
        match lowered {
            Lowered::Basic(t) => {
                let v = self.module.undef_value(t);
                self.push(v, ty)
            }
            Lowered::Void => self.module.push_value(Entry::Void, ty),
            Lowered::Function(_) | Lowered::Raw(_) => {
                let raw = self.module.raw_type(lowered);
                // SAFETY: `raw` is a type of this module's context.
                let v = unsafe { llvm_sys::core::LLVMGetUndef(raw) };
                self.module.push_value(Entry::Token(v), ty)
            }
        }
    }

    pub fn const_zero(&mut self, ty: TypeId) -> ValueId {
        let lowered = self.module.lower(ty);
        match lowered {
            Lowered::Basic(t) => {
                let v = self.module.zero_value(t);
                self.push(v, ty)
            }
            Lowered::Void => self.module.push_value(Entry::Void, ty),
            Lowered::Function(_) | Lowered::Raw(_) => {
                let raw = self.module.raw_type(lowered);
                // SAFETY: `raw` is a type of this module's context.
                let v = unsafe { llvm_sys::core::LLVMConstNull(raw) };
                self.module.push_value(Entry::Token(v), ty)
            }
        }
    }

    /// `none`, the parent token of a top-level funclet.
    pub fn const_token_none(&mut self) -> ValueId {
        let ty = self.types_mut().token();
        self.const_zero(ty)
    }

    /// Pointer to a module global, usable as an operand.
    pub fn global_ref(&mut self, global: GlobalId) -> ValueId {
        let pointee = self.module.global(global).ty;
        let ty = self.types_mut().ptr(pointee);
        let ptr = self.module.global_value(global).as_pointer_value();
        self.push(ptr, ty)
    }

    /// Pointer to a module function, usable as a callee or operand.
    pub fn function_ref(&mut self, func: FuncId) -> ValueId {
        let f = self.module.function(func);
        let (sig, ptr) = (f.ty, f.value.as_global_value().as_pointer_value());
        let ty = self.types_mut().ptr(sig);
        self.push(ptr, ty)
    }

    // ── Insertion core ──────────────────────────────────────────────

    /// True if an instruction can be placed. Counts the miss otherwise.
    fn attached(&mut self, what: &'static str) -> bool {
        if self.block.is_some() {
            return true;
        }
        self.detached += 1;
        tracing::warn!(what, "instruction built with no insertion point");
        false
    }

    /// A builder positioned at `at` (or the end of `bb`), leaving the
    /// main cursor alone.
    fn builder_at(
        &self,
        bb: BasicBlock<'ctx>,
        at: Option<InstructionValue<'ctx>>,
    ) -> inkwell::builder::Builder<'ctx> {
        let ll = self.module.llcx().create_builder();
        match at {
            Some(inst) => ll.position_before(&inst),
            None => ll.position_at_end(bb),
        }
        ll
    }

    /// First instruction of `bb` that is not an `opcode`.
    fn skip_leading(
        bb: BasicBlock<'ctx>,
        opcode: InstructionOpcode,
    ) -> Option<InstructionValue<'ctx>> {
        let mut inst = bb.get_first_instruction();
        while let Some(i) = inst {
            if i.get_opcode() != opcode {
                break;
            }
            inst = i.get_next_instruction();
        }
        inst
    }
}

/// Instruction names for the C API.
fn c_name(name: &str) -> CString {
    CString::new(name.replace('\0', "")).unwrap_or_default()
}

#[cfg(test)]
mod tests;
