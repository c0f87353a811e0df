//! Operators, predicates and global initializers.
//!
//! Each operator keeps its textual mnemonic for diagnostics and maps onto
//! the matching inkwell opcode or predicate when built.

use inkwell::values::{BasicValueEnum, InstructionOpcode};
use llvm_sys::prelude::LLVMValueRef;
use llvm_sys::LLVMIntPredicate;

/// A global initializer.
#[derive(Clone, Debug, PartialEq)]
pub enum Const {
    Int(i64),
    Float(f64),
    Null,
    /// `zeroinitializer`
    Zero,
    /// Raw array bytes, printed as a `c"..."` string.
    Bytes(Vec<u8>),
}

/// What the arena holds behind a [`ValueId`](crate::ValueId).
#[derive(Clone, Copy, Debug)]
pub(crate) enum Entry<'ctx> {
    Basic(BasicValueEnum<'ctx>),
    /// Token-typed values (funclet pads, coroutine ids), which inkwell
    /// has no wrapper for.
    Token(LLVMValueRef),
    /// Result of a call to a `void` function.
    Void,
}

/// Integer binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

impl BinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::FRem => "frem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::LShr => "lshr",
            BinOp::AShr => "ashr",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem
        )
    }

    pub(crate) fn opcode(self) -> InstructionOpcode {
        match self {
            BinOp::Add => InstructionOpcode::Add,
            BinOp::Sub => InstructionOpcode::Sub,
            BinOp::Mul => InstructionOpcode::Mul,
            BinOp::SDiv => InstructionOpcode::SDiv,
            BinOp::UDiv => InstructionOpcode::UDiv,
            BinOp::SRem => InstructionOpcode::SRem,
            BinOp::URem => InstructionOpcode::URem,
            BinOp::FAdd => InstructionOpcode::FAdd,
            BinOp::FSub => InstructionOpcode::FSub,
            BinOp::FMul => InstructionOpcode::FMul,
            BinOp::FDiv => InstructionOpcode::FDiv,
            BinOp::FRem => InstructionOpcode::FRem,
            BinOp::And => InstructionOpcode::And,
            BinOp::Or => InstructionOpcode::Or,
            BinOp::Xor => InstructionOpcode::Xor,
            BinOp::Shl => InstructionOpcode::Shl,
            BinOp::LShr => InstructionOpcode::LShr,
            BinOp::AShr => InstructionOpcode::AShr,
        }
    }
}

/// Integer comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Some(match s {
            "eq" => IntPredicate::Eq,
            "ne" => IntPredicate::Ne,
            "ugt" => IntPredicate::Ugt,
            "uge" => IntPredicate::Uge,
            "ult" => IntPredicate::Ult,
            "ule" => IntPredicate::Ule,
            "sgt" => IntPredicate::Sgt,
            "sge" => IntPredicate::Sge,
            "slt" => IntPredicate::Slt,
            "sle" => IntPredicate::Sle,
            _ => return None,
        })
    }

    pub(crate) fn llvm(self) -> inkwell::IntPredicate {
        match self {
            IntPredicate::Eq => inkwell::IntPredicate::EQ,
            IntPredicate::Ne => inkwell::IntPredicate::NE,
            IntPredicate::Ugt => inkwell::IntPredicate::UGT,
            IntPredicate::Uge => inkwell::IntPredicate::UGE,
            IntPredicate::Ult => inkwell::IntPredicate::ULT,
            IntPredicate::Ule => inkwell::IntPredicate::ULE,
            IntPredicate::Sgt => inkwell::IntPredicate::SGT,
            IntPredicate::Sge => inkwell::IntPredicate::SGE,
            IntPredicate::Slt => inkwell::IntPredicate::SLT,
            IntPredicate::Sle => inkwell::IntPredicate::SLE,
        }
    }

    /// The C API predicate, for pointer comparisons built through llvm-sys.
    pub(crate) fn raw(self) -> LLVMIntPredicate {
        match self {
            IntPredicate::Eq => LLVMIntPredicate::LLVMIntEQ,
            IntPredicate::Ne => LLVMIntPredicate::LLVMIntNE,
            IntPredicate::Ugt => LLVMIntPredicate::LLVMIntUGT,
            IntPredicate::Uge => LLVMIntPredicate::LLVMIntUGE,
            IntPredicate::Ult => LLVMIntPredicate::LLVMIntULT,
            IntPredicate::Ule => LLVMIntPredicate::LLVMIntULE,
            IntPredicate::Sgt => LLVMIntPredicate::LLVMIntSGT,
            IntPredicate::Sge => LLVMIntPredicate::LLVMIntSGE,
            IntPredicate::Slt => LLVMIntPredicate::LLVMIntSLT,
            IntPredicate::Sle => LLVMIntPredicate::LLVMIntSLE,
        }
    }
}

/// Floating-point comparison predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

impl FloatPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FloatPredicate::False => "false",
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::One => "one",
            FloatPredicate::Ord => "ord",
            FloatPredicate::Ueq => "ueq",
            FloatPredicate::Ugt => "ugt",
            FloatPredicate::Uge => "uge",
            FloatPredicate::Ult => "ult",
            FloatPredicate::Ule => "ule",
            FloatPredicate::Une => "une",
            FloatPredicate::Uno => "uno",
            FloatPredicate::True => "true",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Some(match s {
            "false" => FloatPredicate::False,
            "oeq" => FloatPredicate::Oeq,
            "ogt" => FloatPredicate::Ogt,
            "oge" => FloatPredicate::Oge,
            "olt" => FloatPredicate::Olt,
            "ole" => FloatPredicate::Ole,
            "one" => FloatPredicate::One,
            "ord" => FloatPredicate::Ord,
            "ueq" => FloatPredicate::Ueq,
            "ugt" => FloatPredicate::Ugt,
            "uge" => FloatPredicate::Uge,
            "ult" => FloatPredicate::Ult,
            "ule" => FloatPredicate::Ule,
            "une" => FloatPredicate::Une,
            "uno" => FloatPredicate::Uno,
            "true" => FloatPredicate::True,
            _ => return None,
        })
    }

    pub(crate) fn llvm(self) -> inkwell::FloatPredicate {
        match self {
            FloatPredicate::False => inkwell::FloatPredicate::PredicateFalse,
            FloatPredicate::Oeq => inkwell::FloatPredicate::OEQ,
            FloatPredicate::Ogt => inkwell::FloatPredicate::OGT,
            FloatPredicate::Oge => inkwell::FloatPredicate::OGE,
            FloatPredicate::Olt => inkwell::FloatPredicate::OLT,
            FloatPredicate::Ole => inkwell::FloatPredicate::OLE,
            FloatPredicate::One => inkwell::FloatPredicate::ONE,
            FloatPredicate::Ord => inkwell::FloatPredicate::ORD,
            FloatPredicate::Ueq => inkwell::FloatPredicate::UEQ,
            FloatPredicate::Ugt => inkwell::FloatPredicate::UGT,
            FloatPredicate::Uge => inkwell::FloatPredicate::UGE,
            FloatPredicate::Ult => inkwell::FloatPredicate::ULT,
            FloatPredicate::Ule => inkwell::FloatPredicate::ULE,
            FloatPredicate::Une => inkwell::FloatPredicate::UNE,
            FloatPredicate::Uno => inkwell::FloatPredicate::UNO,
            FloatPredicate::True => inkwell::FloatPredicate::PredicateTrue,
        }
    }
}

/// Conversion operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    PtrToInt,
    IntToPtr,
    BitCast,
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::FpTrunc => "fptrunc",
            CastOp::FpExt => "fpext",
            CastOp::FpToUi => "fptoui",
            CastOp::FpToSi => "fptosi",
            CastOp::UiToFp => "uitofp",
            CastOp::SiToFp => "sitofp",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::BitCast => "bitcast",
        }
    }

    pub(crate) fn opcode(self) -> InstructionOpcode {
        match self {
            CastOp::Trunc => InstructionOpcode::Trunc,
            CastOp::ZExt => InstructionOpcode::ZExt,
            CastOp::SExt => InstructionOpcode::SExt,
            CastOp::FpTrunc => InstructionOpcode::FPTrunc,
            CastOp::FpExt => InstructionOpcode::FPExt,
            CastOp::FpToUi => InstructionOpcode::FPToUI,
            CastOp::FpToSi => InstructionOpcode::FPToSI,
            CastOp::UiToFp => InstructionOpcode::UIToFP,
            CastOp::SiToFp => InstructionOpcode::SIToFP,
            CastOp::PtrToInt => InstructionOpcode::PtrToInt,
            CastOp::IntToPtr => InstructionOpcode::IntToPtr,
            CastOp::BitCast => InstructionOpcode::BitCast,
        }
    }
}
