//! Instruction heads.
//!
//! [`Op::from_head`] is the only place a head symbol is turned into an
//! operation. Everything downstream matches on [`Op`], so adding an
//! instruction means adding a variant here and the compiler points at
//! every `match` that needs an arm.

use edn_backend::{BinOp, CastOp, FloatPredicate, IntPredicate};

/// Source-level comparison (`eq`, `lt`, ...). Lowered to `icmp` or `fcmp`
/// depending on the operand type; integer signedness comes from the
/// declared type (`u8`..`u64` compare unsigned).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Comparison {
    pub fn int_predicate(self, unsigned: bool) -> IntPredicate {
        match (self, unsigned) {
            (Comparison::Eq, _) => IntPredicate::Eq,
            (Comparison::Ne, _) => IntPredicate::Ne,
            (Comparison::Lt, false) => IntPredicate::Slt,
            (Comparison::Lt, true) => IntPredicate::Ult,
            (Comparison::Gt, false) => IntPredicate::Sgt,
            (Comparison::Gt, true) => IntPredicate::Ugt,
            (Comparison::Le, false) => IntPredicate::Sle,
            (Comparison::Le, true) => IntPredicate::Ule,
            (Comparison::Ge, false) => IntPredicate::Sge,
            (Comparison::Ge, true) => IntPredicate::Uge,
        }
    }

    /// Ordered predicates, except `ne` which is true on NaN.
    pub fn float_predicate(self) -> FloatPredicate {
        match self {
            Comparison::Eq => FloatPredicate::Oeq,
            Comparison::Ne => FloatPredicate::Une,
            Comparison::Lt => FloatPredicate::Olt,
            Comparison::Gt => FloatPredicate::Ogt,
            Comparison::Le => FloatPredicate::Ole,
            Comparison::Ge => FloatPredicate::Oge,
        }
    }
}

/// Coroutine operations (`coro-*`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CoroOp {
    Begin,
    Id,
    Size,
    Alloc,
    Free,
    Save,
    Suspend,
    FinalSuspend,
    Promise,
    Resume,
    Destroy,
    Done,
    End,
}

impl CoroOp {
    /// True if the op yields a value into position 1.
    pub fn defines_result(self) -> bool {
        !matches!(self, CoroOp::Resume | CoroOp::Destroy | CoroOp::End)
    }
}

/// One instruction head.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    // Control flow
    If,
    While,
    For,
    Switch,
    Match,
    Break,
    Continue,
    Block,
    Phi,
    Ret,
    Panic,
    Try,
    // Values
    Const,
    Binary(BinOp),
    Compare(Comparison),
    ICmp,
    FCmp,
    Cast(CastOp),
    PtrAdd,
    PtrSub,
    PtrDiff,
    // Variables and memory
    As,
    Assign,
    Alloca,
    Load,
    Store,
    GLoad,
    GStore,
    Index,
    ArrayLit,
    StructLit,
    Member,
    MemberAddr,
    UnionMember,
    Addr,
    Deref,
    // Functions
    FnPtr,
    Call,
    CallIndirect,
    VaStart,
    VaArg,
    VaEnd,
    // Literals and closures
    CStr,
    Bytes,
    Closure,
    MakeClosure,
    CallClosure,
    // Coroutines and sums
    Coro(CoroOp),
    SumNew,
    SumIs,
    SumGet,
    /// Anything else. Skipped with a problem.
    Unrecognized,
}

impl Op {
    pub fn from_head(head: Option<&str>) -> Op {
        let Some(head) = head else {
            return Op::Unrecognized;
        };
        match head {
            "if" => Op::If,
            "while" => Op::While,
            "for" => Op::For,
            "switch" => Op::Switch,
            "match" => Op::Match,
            "break" => Op::Break,
            "continue" => Op::Continue,
            "block" => Op::Block,
            "phi" => Op::Phi,
            "ret" => Op::Ret,
            "panic" => Op::Panic,
            "try" => Op::Try,

            "const" => Op::Const,
            "add" => Op::Binary(BinOp::Add),
            "sub" => Op::Binary(BinOp::Sub),
            "mul" => Op::Binary(BinOp::Mul),
            "sdiv" => Op::Binary(BinOp::SDiv),
            "udiv" => Op::Binary(BinOp::UDiv),
            "srem" => Op::Binary(BinOp::SRem),
            "urem" => Op::Binary(BinOp::URem),
            "fadd" => Op::Binary(BinOp::FAdd),
            "fsub" => Op::Binary(BinOp::FSub),
            "fmul" => Op::Binary(BinOp::FMul),
            "fdiv" => Op::Binary(BinOp::FDiv),
            "frem" => Op::Binary(BinOp::FRem),
            "and" => Op::Binary(BinOp::And),
            "or" => Op::Binary(BinOp::Or),
            "xor" => Op::Binary(BinOp::Xor),
            "shl" => Op::Binary(BinOp::Shl),
            "lshr" => Op::Binary(BinOp::LShr),
            "ashr" => Op::Binary(BinOp::AShr),
            "eq" => Op::Compare(Comparison::Eq),
            "ne" => Op::Compare(Comparison::Ne),
            "lt" => Op::Compare(Comparison::Lt),
            "gt" => Op::Compare(Comparison::Gt),
            "le" => Op::Compare(Comparison::Le),
            "ge" => Op::Compare(Comparison::Ge),
            "icmp" => Op::ICmp,
            "fcmp" => Op::FCmp,
            "trunc" => Op::Cast(CastOp::Trunc),
            "zext" => Op::Cast(CastOp::ZExt),
            "sext" => Op::Cast(CastOp::SExt),
            "fptrunc" => Op::Cast(CastOp::FpTrunc),
            "fpext" => Op::Cast(CastOp::FpExt),
            "fptoui" => Op::Cast(CastOp::FpToUi),
            "fptosi" => Op::Cast(CastOp::FpToSi),
            "uitofp" => Op::Cast(CastOp::UiToFp),
            "sitofp" => Op::Cast(CastOp::SiToFp),
            "ptrtoint" => Op::Cast(CastOp::PtrToInt),
            "inttoptr" => Op::Cast(CastOp::IntToPtr),
            "bitcast" => Op::Cast(CastOp::BitCast),
            "ptr-add" => Op::PtrAdd,
            "ptr-sub" => Op::PtrSub,
            "ptr-diff" => Op::PtrDiff,

            "as" => Op::As,
            "assign" => Op::Assign,
            "alloca" => Op::Alloca,
            "load" => Op::Load,
            "store" => Op::Store,
            "gload" => Op::GLoad,
            "gstore" => Op::GStore,
            "index" => Op::Index,
            "array-lit" => Op::ArrayLit,
            "struct-lit" => Op::StructLit,
            "member" => Op::Member,
            "member-addr" => Op::MemberAddr,
            "union-member" => Op::UnionMember,
            "addr" => Op::Addr,
            "deref" => Op::Deref,

            "fnptr" => Op::FnPtr,
            "call" => Op::Call,
            "call-indirect" => Op::CallIndirect,
            "va-start" => Op::VaStart,
            "va-arg" => Op::VaArg,
            "va-end" => Op::VaEnd,

            "cstr" => Op::CStr,
            "bytes" => Op::Bytes,
            "closure" => Op::Closure,
            "make-closure" => Op::MakeClosure,
            "call-closure" => Op::CallClosure,

            "coro-begin" => Op::Coro(CoroOp::Begin),
            "coro-id" => Op::Coro(CoroOp::Id),
            "coro-size" => Op::Coro(CoroOp::Size),
            "coro-alloc" => Op::Coro(CoroOp::Alloc),
            "coro-free" => Op::Coro(CoroOp::Free),
            "coro-save" => Op::Coro(CoroOp::Save),
            "coro-suspend" => Op::Coro(CoroOp::Suspend),
            "coro-final-suspend" => Op::Coro(CoroOp::FinalSuspend),
            "coro-promise" => Op::Coro(CoroOp::Promise),
            "coro-resume" => Op::Coro(CoroOp::Resume),
            "coro-destroy" => Op::Coro(CoroOp::Destroy),
            "coro-done" => Op::Coro(CoroOp::Done),
            "coro-end" => Op::Coro(CoroOp::End),

            "sum-new" => Op::SumNew,
            "sum-is" => Op::SumIs,
            "sum-get" => Op::SumGet,

            _ => Op::Unrecognized,
        }
    }

    /// True if the op writes a value to the name in position 1.
    ///
    /// The mutability pre-pass counts these definitions. `match` defines
    /// only in result mode and is handled by the caller.
    pub fn defines_result(self) -> bool {
        match self {
            Op::If
            | Op::While
            | Op::For
            | Op::Switch
            | Op::Match
            | Op::Break
            | Op::Continue
            | Op::Block
            | Op::Ret
            | Op::Panic
            | Op::Try
            | Op::Store
            | Op::GStore
            | Op::VaStart
            | Op::VaEnd
            | Op::Unrecognized => false,
            Op::Coro(c) => c.defines_result(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests;
