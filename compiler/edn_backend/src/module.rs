//! Module, function and global containers over an inkwell module.
//!
//! [`Module`] owns the LLVM module plus the arenas that back the `Copy`
//! IDs handed to callers: values, blocks, functions and globals. Types
//! are interned in [`TypeTable`] and lowered into the LLVM context on
//! demand; named structs pick up their body the first time they are
//! lowered after [`TypeTable::set_body`].

use std::fmt;

use bitflags::bitflags;
use inkwell::attributes::{Attribute, AttributeLoc};
use inkwell::basic_block::BasicBlock;
use inkwell::context::Context;
use inkwell::module::Linkage as LlvmLinkage;
use inkwell::targets::TargetTriple;
use inkwell::types::{
    AsTypeRef, BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType, StructType,
};
use inkwell::values::{AsValueRef, BasicValueEnum, FunctionValue, GlobalValue};
use inkwell::AddressSpace;
use llvm_sys::prelude::LLVMTypeRef;
use rustc_hash::FxHashMap;

use crate::ids::{BlockId, FuncId, GlobalId, TypeId, ValueId};
use crate::types::{TypeKind, TypeTable};
use crate::value::{Const, Entry};

/// Nesting limit for by-value aggregates while lowering.
const MAX_TYPE_DEPTH: u32 = 64;

/// Symbol linkage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    #[default]
    External,
    Internal,
    Private,
}

impl Linkage {
    fn llvm(self) -> LlvmLinkage {
        match self {
            Linkage::External => LlvmLinkage::External,
            Linkage::Internal => LlvmLinkage::Internal,
            Linkage::Private => LlvmLinkage::Private,
        }
    }
}

bitflags! {
    /// Function attributes the emitter sets.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FnAttrs: u8 {
        /// Unwind tables are required (functions under a personality).
        const UWTABLE = 1 << 0;
        /// Coroutine awaiting the split pass.
        const PRESPLIT_COROUTINE = 1 << 1;
        /// Function never returns.
        const NORETURN = 1 << 2;
    }
}

impl FnAttrs {
    /// LLVM enum attribute name and value for each flag.
    fn llvm(self) -> impl Iterator<Item = (&'static str, u64)> {
        [
            // `uwtable` without an argument means asynchronous tables.
            (FnAttrs::UWTABLE, "uwtable", 2),
            (FnAttrs::PRESPLIT_COROUTINE, "presplitcoroutine", 0),
            (FnAttrs::NORETURN, "noreturn", 0),
        ]
        .into_iter()
        .filter(move |(flag, _, _)| self.contains(*flag))
        .map(|(_, name, value)| (name, value))
    }
}

/// A function declaration or definition.
pub struct Function<'ctx> {
    pub name: String,
    /// The function's signature type.
    pub ty: TypeId,
    pub linkage: Linkage,
    pub attrs: FnAttrs,
    pub personality: Option<FuncId>,
    pub(crate) value: FunctionValue<'ctx>,
    pub(crate) params: Vec<ValueId>,
}

impl Function<'_> {
    /// A function with no blocks is a declaration.
    pub fn is_declaration(&self) -> bool {
        self.value.count_basic_blocks() == 0
    }
}

/// A module-level global variable.
#[derive(Clone, Debug)]
pub struct Global {
    pub name: String,
    /// Type of the stored value (the global itself is a pointer to it).
    pub ty: TypeId,
    pub init: Option<Const>,
    pub constant: bool,
    pub linkage: Linkage,
}

/// LLVM's verifier rejected the module.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct VerifyError {
    /// The verifier's report, one problem per line.
    pub message: String,
}

/// An interned type lowered into the LLVM context.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Lowered<'ctx> {
    Basic(BasicTypeEnum<'ctx>),
    Void,
    Function(FunctionType<'ctx>),
    /// `token` and `label` have no inkwell wrapper.
    Raw(LLVMTypeRef),
}

/// A compilation unit.
pub struct Module<'ctx> {
    llcx: &'ctx Context,
    llmod: inkwell::module::Module<'ctx>,
    name: String,
    pub types: TypeTable,
    functions: Vec<Function<'ctx>>,
    globals: Vec<(Global, GlobalValue<'ctx>)>,
    fn_index: FxHashMap<String, FuncId>,
    global_index: FxHashMap<String, GlobalId>,
    values: Vec<(Entry<'ctx>, TypeId)>,
    blocks: Vec<(BasicBlock<'ctx>, FuncId)>,
}

impl<'ctx> Module<'ctx> {
    pub fn new(llcx: &'ctx Context, name: &str) -> Self {
        Module {
            llcx,
            llmod: llcx.create_module(name),
            name: name.to_owned(),
            types: TypeTable::new(),
            functions: Vec::new(),
            globals: Vec::new(),
            fn_index: FxHashMap::default(),
            global_index: FxHashMap::default(),
            values: Vec::new(),
            blocks: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn llcx(&self) -> &'ctx Context {
        self.llcx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        name.clone_into(&mut self.name);
        self.llmod.set_name(name);
    }

    pub fn set_target_triple(&mut self, triple: Option<&str>) {
        if let Some(triple) = triple {
            self.llmod.set_triple(&TargetTriple::create(triple));
        }
    }

    // ── Output ──────────────────────────────────────────────────────

    /// Textual LLVM IR.
    pub fn print_to_string(&self) -> String {
        self.sync_struct_bodies();
        self.llmod.print_to_string().to_string()
    }

    /// Run LLVM's module verifier.
    pub fn verify(&self) -> Result<(), VerifyError> {
        self.sync_struct_bodies();
        self.llmod.verify().map_err(|message| VerifyError {
            message: message.to_string().trim_end().to_owned(),
        })
    }

    /// Give every lowered named struct the body its table entry has by now.
    fn sync_struct_bodies(&self) {
        for id in self.types.named_structs() {
            if let TypeKind::Named(name) = self.types.kind(id) {
                if let Some(st) = self.llmod.get_struct_type(name) {
                    self.complete_struct(st, id, 0);
                }
            }
        }
    }

    // ── Functions ───────────────────────────────────────────────────

    /// Add a function with signature `ty`. Returns the existing function
    /// if one with this name is already declared.
    pub fn add_function(&mut self, name: &str, ty: TypeId, linkage: Linkage) -> FuncId {
        if let Some(&id) = self.fn_index.get(name) {
            return id;
        }
        let fn_ty = self.fn_type(ty).unwrap_or_else(|| {
            tracing::error!(name, "function declared with a non-function type");
            self.llcx.void_type().fn_type(&[], false)
        });
        let value = self.llmod.add_function(name, fn_ty, Some(linkage.llvm()));
        let param_types = self
            .types
            .signature(ty)
            .map(|(_, params, _)| params.to_vec())
            .unwrap_or_default();
        let mut params = Vec::with_capacity(param_types.len());
        for (index, param_ty) in param_types.into_iter().enumerate() {
            let index = u32::try_from(index).expect("parameter count fits in u32");
            let entry = if matches!(self.types.kind(param_ty), TypeKind::Token) {
                // SAFETY: `index` is below the function's parameter count.
                Entry::Token(unsafe { llvm_sys::core::LLVMGetParam(value.as_value_ref(), index) })
            } else {
                value
                    .get_nth_param(index)
                    .map_or(Entry::Void, Entry::Basic)
            };
            params.push(self.push_value(entry, param_ty));
        }
        let id = FuncId::from_index(self.functions.len());
        self.functions.push(Function {
            name: name.to_owned(),
            ty,
            linkage,
            attrs: FnAttrs::empty(),
            personality: None,
            value,
            params,
        });
        self.fn_index.insert(name.to_owned(), id);
        id
    }

    pub fn get_function(&self, name: &str) -> Option<FuncId> {
        self.fn_index.get(name).copied()
    }

    pub fn function(&self, id: FuncId) -> &Function<'ctx> {
        &self.functions[id.index()]
    }

    /// Rename a parameter. Used to give params their source names.
    pub fn set_param_name(&mut self, func: FuncId, index: usize, name: &str) {
        let Some(&param) = self.function(func).params.get(index) else {
            return;
        };
        if let Entry::Basic(value) = self.entry(param) {
            value.set_name(name);
        }
    }

    pub fn add_attrs(&mut self, func: FuncId, attrs: FnAttrs) {
        let f = &mut self.functions[func.index()];
        let added = attrs - f.attrs;
        f.attrs |= attrs;
        for (name, value) in added.llvm() {
            let kind = Attribute::get_named_enum_kind_id(name);
            let attr = self.llcx.create_enum_attribute(kind, value);
            f.value.add_attribute(AttributeLoc::Function, attr);
        }
    }

    pub fn set_personality(&mut self, func: FuncId, personality: FuncId) {
        let routine = self.function(personality).value;
        let f = &mut self.functions[func.index()];
        f.personality = Some(personality);
        f.value.set_personality_function(routine);
    }

    /// Block names of `func`, in layout order.
    pub fn block_names(&self, func: FuncId) -> Vec<String> {
        self.function(func)
            .value
            .get_basic_blocks()
            .iter()
            .map(|bb| bb.get_name().to_string_lossy().into_owned())
            .collect()
    }

    // ── Globals ─────────────────────────────────────────────────────

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        if let Some(&id) = self.global_index.get(&global.name) {
            return id;
        }
        let ty = self.basic_type(global.ty).unwrap_or_else(|| {
            tracing::error!(name = %global.name, "global of a non-first-class type");
            self.llcx.i8_type().into()
        });
        let value = self.llmod.add_global(ty, None, &global.name);
        value.set_linkage(global.linkage.llvm());
        value.set_constant(global.constant);
        if let Some(init) = &global.init {
            value.set_initializer(&self.const_value(ty, init));
        }
        let id = GlobalId::from_index(self.globals.len());
        self.global_index.insert(global.name.clone(), id);
        self.globals.push((global, value));
        id
    }

    pub fn get_global(&self, name: &str) -> Option<GlobalId> {
        self.global_index.get(name).copied()
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()].0
    }

    pub(crate) fn global_value(&self, id: GlobalId) -> GlobalValue<'ctx> {
        self.globals[id.index()].1
    }

    /// An initializer of LLVM type `ty`. Shapes that do not fit become
    /// `zeroinitializer`.
    #[expect(
        clippy::cast_sign_loss,
        reason = "two's complement bits, sign-extended by LLVM"
    )]
    fn const_value(&self, ty: BasicTypeEnum<'ctx>, init: &Const) -> BasicValueEnum<'ctx> {
        match (init, ty) {
            (Const::Int(v), BasicTypeEnum::IntType(t)) => t.const_int(*v as u64, *v < 0).into(),
            (Const::Float(v), BasicTypeEnum::FloatType(t)) => t.const_float(*v).into(),
            (Const::Bytes(bytes), BasicTypeEnum::ArrayType(_)) => {
                self.llcx.const_string(bytes, false).into()
            }
            (Const::Null | Const::Zero, _) => self.zero_value(ty),
            (other, _) => {
                tracing::warn!(?other, ?ty, "initializer does not fit its global");
                self.zero_value(ty)
            }
        }
    }

    // ── Arenas ──────────────────────────────────────────────────────

    pub(crate) fn push_value(&mut self, entry: Entry<'ctx>, ty: TypeId) -> ValueId {
        let id = ValueId::from_index(self.values.len());
        self.values.push((entry, ty));
        id
    }

    #[inline]
    pub(crate) fn entry(&self, id: ValueId) -> Entry<'ctx> {
        self.values[id.index()].0
    }

    #[inline]
    pub(crate) fn value_type(&self, id: ValueId) -> TypeId {
        self.values[id.index()].1
    }

    pub(crate) fn value_count(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn push_block(&mut self, bb: BasicBlock<'ctx>, func: FuncId) -> BlockId {
        let id = BlockId::from_index(self.blocks.len());
        self.blocks.push((bb, func));
        id
    }

    #[inline]
    pub(crate) fn block(&self, id: BlockId) -> BasicBlock<'ctx> {
        self.blocks[id.index()].0
    }

    /// Block `name` of `func`, if one was appended through a builder.
    pub(crate) fn find_block(&self, func: FuncId, name: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|(bb, owner)| *owner == func && bb.get_name().to_bytes() == name.as_bytes())
            .map(BlockId::from_index)
    }

    // ── Type lowering ───────────────────────────────────────────────

    pub(crate) fn lower(&self, ty: TypeId) -> Lowered<'ctx> {
        self.lower_at(ty, 0)
    }

    /// `ty` as a first-class LLVM type, if it is one.
    pub(crate) fn basic_type(&self, ty: TypeId) -> Option<BasicTypeEnum<'ctx>> {
        match self.lower(ty) {
            Lowered::Basic(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn fn_type(&self, ty: TypeId) -> Option<FunctionType<'ctx>> {
        match self.lower(ty) {
            Lowered::Function(t) => Some(t),
            _ => None,
        }
    }

    /// `zeroinitializer`, `null` or `0` of `ty`.
    pub(crate) fn zero_value(&self, ty: BasicTypeEnum<'ctx>) -> BasicValueEnum<'ctx> {
        match ty {
            BasicTypeEnum::IntType(t) => t.const_zero().into(),
            BasicTypeEnum::FloatType(t) => t.const_zero().into(),
            BasicTypeEnum::PointerType(t) => t.const_null().into(),
            BasicTypeEnum::StructType(t) => t.const_zero().into(),
            BasicTypeEnum::ArrayType(t) => t.const_zero().into(),
            BasicTypeEnum::VectorType(t) => t.const_zero().into(),
            // Never produced by lowering.
            BasicTypeEnum::ScalableVectorType(_) => self.llcx.i8_type().const_zero().into(),
        }
    }

    /// `undef` of `ty`.
    pub(crate) fn undef_value(&self, ty: BasicTypeEnum<'ctx>) -> BasicValueEnum<'ctx> {
        match ty {
            BasicTypeEnum::IntType(t) => t.get_undef().into(),
            BasicTypeEnum::FloatType(t) => t.get_undef().into(),
            BasicTypeEnum::PointerType(t) => t.get_undef().into(),
            BasicTypeEnum::StructType(t) => t.get_undef().into(),
            BasicTypeEnum::ArrayType(t) => t.get_undef().into(),
            BasicTypeEnum::VectorType(t) => t.get_undef().into(),
            BasicTypeEnum::ScalableVectorType(_) => self.llcx.i8_type().get_undef().into(),
        }
    }

    pub(crate) fn raw_type(&self, lowered: Lowered<'ctx>) -> LLVMTypeRef {
        match lowered {
            Lowered::Basic(t) => t.as_type_ref(),
            Lowered::Void => self.llcx.void_type().as_type_ref(),
            Lowered::Function(t) => t.as_type_ref(),
            Lowered::Raw(t) => t,
        }
    }

    fn lower_at(&self, ty: TypeId, depth: u32) -> Lowered<'ctx> {
        if depth > MAX_TYPE_DEPTH {
            tracing::error!(ty = %self.types.display(ty), "type nests too deeply to lower");
            return Lowered::Void;
        }
        let llcx = self.llcx;
        match self.types.kind(ty) {
            TypeKind::Void => Lowered::Void,
            TypeKind::Int(bits) => Lowered::Basic(llcx.custom_width_int_type(*bits).into()),
            TypeKind::Float => Lowered::Basic(llcx.f32_type().into()),
            TypeKind::Double => Lowered::Basic(llcx.f64_type().into()),
            TypeKind::Pointer(_) => Lowered::Basic(llcx.ptr_type(AddressSpace::default()).into()),
            TypeKind::Array { elem, len } => match self.lower_at(*elem, depth + 1) {
                Lowered::Basic(elem) => {
                    let len = u32::try_from(*len).unwrap_or(u32::MAX);
                    Lowered::Basic(elem.array_type(len).into())
                }
                _ => Lowered::Void,
            },
            TypeKind::Struct(fields) => match self.lower_fields(fields, depth) {
                Some(fields) => Lowered::Basic(llcx.struct_type(&fields, false).into()),
                None => Lowered::Void,
            },
            TypeKind::Named(name) => {
                let st = self
                    .llmod
                    .get_struct_type(name)
                    .unwrap_or_else(|| llcx.opaque_struct_type(name));
                self.complete_struct(st, ty, depth);
                Lowered::Basic(st.into())
            }
            TypeKind::Function {
                ret,
                params,
                variadic,
            } => Lowered::Function(self.lower_fn(*ret, params, *variadic, depth)),
            // SAFETY: the context outlives the module and every type made in it.
            TypeKind::Label => {
                Lowered::Raw(unsafe { llvm_sys::core::LLVMLabelTypeInContext(llcx.raw()) })
            }
            TypeKind::Token => {
                Lowered::Raw(unsafe { llvm_sys::core::LLVMTokenTypeInContext(llcx.raw()) })
            }
        }
    }

    /// Attach the table's body to an opaque LLVM struct.
    fn complete_struct(&self, st: StructType<'ctx>, id: TypeId, depth: u32) {
        if !st.is_opaque() {
            return;
        }
        let Some(fields) = self.types.struct_fields(id) else {
            return;
        };
        if let Some(body) = self.lower_fields(fields, depth) {
            st.set_body(&body, false);
        }
    }

    fn lower_fields(&self, fields: &[TypeId], depth: u32) -> Option<Vec<BasicTypeEnum<'ctx>>> {
        fields
            .iter()
            .map(|&f| match self.lower_at(f, depth + 1) {
                Lowered::Basic(t) => Some(t),
                other => {
                    tracing::error!(?other, "struct field is not first-class");
                    None
                }
            })
            .collect()
    }

    /// Signatures mentioning `token` go through the C API.
    fn lower_fn(
        &self,
        ret: TypeId,
        params: &[TypeId],
        variadic: bool,
        depth: u32,
    ) -> FunctionType<'ctx> {
        let ret = self.lower_at(ret, depth + 1);
        let params: Vec<Lowered<'ctx>> = params
            .iter()
            .map(|&p| self.lower_at(p, depth + 1))
            .collect();
        let basic: Option<Vec<BasicMetadataTypeEnum<'ctx>>> = params
            .iter()
            .map(|p| match p {
                Lowered::Basic(t) => Some((*t).into()),
                _ => None,
            })
            .collect();
        match (ret, basic) {
            (Lowered::Basic(r), Some(ps)) => r.fn_type(&ps, variadic),
            (Lowered::Void, Some(ps)) => self.llcx.void_type().fn_type(&ps, variadic),
            (ret, _) => {
                let mut raw: Vec<LLVMTypeRef> = params.iter().map(|&p| self.raw_type(p)).collect();
                let count = u32::try_from(raw.len()).expect("parameter count fits in u32");
                // SAFETY: every type ref comes from this module's context.
                unsafe {
                    FunctionType::new(llvm_sys::core::LLVMFunctionType(
                        self.raw_type(ret),
                        raw.as_mut_ptr(),
                        count,
                        i32::from(variadic),
                    ))
                }
            }
        }
    }
}

impl fmt::Display for Module<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print_to_string())
    }
}
