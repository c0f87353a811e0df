//! Function body emission.
//!
//! [`FunctionEmitter`] walks one `fn` body and drives the [`Builder`].
//! Handlers live in sibling modules as `impl FunctionEmitter` blocks,
//! grouped by instruction family:
//!
//! | Module | Instructions |
//! |--------|--------------|
//! | `control_flow` | `if`, `while`, `for`, `switch`, `break`, `continue`, `block` |
//! | `matching` | `match` |
//! | `phi` | `phi` and deferred phi wiring |
//! | `exceptions` | `panic`, `try`, invoke unwind targets |
//! | `ops::*` | everything that produces or stores values |
//!
//! Each handler returns `Ok(())` or the [`ProblemKind`] that made it give
//! up. A failed handler is recorded as an [`EmitProblem`] and emission
//! moves on to the next instruction.

use edn_backend::{Builder, FnAttrs, FuncId, TypeId, TypeKind, ValueId};
use edn_ir::{ensure_sufficient_stack, Node, Span};
use tracing::{debug, instrument, trace};

use crate::config::Personality;
use crate::context::EmissionContext;
use crate::error::{EmitError, EmitProblem, ProblemKind};
use crate::op::Op;
use crate::prepass::mutable_names;
use crate::session::{declare_personality, EmitEnv, FnHeader, SessionState};
use crate::types::lower_type;

/// Outcome of one instruction handler.
pub(crate) type Handled = Result<(), ProblemKind>;

pub(crate) struct FunctionEmitter<'s, 'ctx> {
    pub(crate) b: Builder<'s, 'ctx>,
    pub(crate) env: &'s EmitEnv,
    pub(crate) state: &'s mut SessionState,
    pub(crate) cx: EmissionContext,
    func: FuncId,
    name: String,
    /// Span of the instruction being emitted, for problem reports.
    span: Option<Span>,
}

impl<'s, 'ctx> FunctionEmitter<'s, 'ctx> {
    pub(crate) fn new(
        module: &'s mut edn_backend::Module<'ctx>,
        env: &'s EmitEnv,
        state: &'s mut SessionState,
        func: FuncId,
    ) -> Self {
        let name = module.function(func).name.clone();
        FunctionEmitter {
            b: Builder::new(module, func),
            env,
            state,
            cx: EmissionContext::default(),
            func,
            name,
            span: None,
        }
    }

    /// Emit `body` as the definition of `header`.
    #[instrument(skip_all, fields(function = %header.name), level = "debug")]
    pub(crate) fn run(mut self, header: &FnHeader, body: &[Node]) -> Result<(), EmitError> {
        self.cx = EmissionContext::new(mutable_names(
            body,
            header.params.iter().map(|(name, _)| name.as_str()),
        ));
        if let Some(personality) = self.env.personality {
            let routine = declare_personality(self.b.module_mut(), personality);
            self.b.module_mut().set_personality(self.func, routine);
            self.b.module_mut().add_attrs(self.func, FnAttrs::UWTABLE);
        }

        let entry = self.b.append_block("entry");
        self.b.position_at_end(entry);
        for (index, (pname, ty)) in header.params.iter().enumerate() {
            self.b.module_mut().set_param_name(self.func, index, pname);
            let Some(arg) = self.b.param(index) else {
                return Err(EmitError::MissingEntry(header.name.clone()));
            };
            self.cx.bind_value(pname, arg, *ty);
            if self.cx.is_mutable(pname) {
                self.ensure_slot(pname, *ty, true);
            }
        }

        self.emit_seq(body);
        if !self.b.is_terminated() {
            self.implicit_return();
        }
        self.finalize_phis();

        let detached = self.b.detached_count();
        if detached > 0 {
            return Err(EmitError::NoInsertionPoint {
                function: header.name.clone(),
                count: detached,
            });
        }
        debug!(
            blocks = self.b.block_count(),
            values = self.b.value_count(),
            "function emitted"
        );
        Ok(())
    }

    /// `ret void`, or `ret` of a zero of the return type.
    fn implicit_return(&mut self) {
        let ret = self.return_type();
        if self.b.types().is_void(ret) {
            self.b.ret_void();
        } else {
            let zero = self.zero_value(ret);
            self.b.ret(zero);
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────

    /// Emit instructions in order. Stops at the first one that leaves the
    /// current block terminated; anything after it would be unreachable.
    pub(crate) fn emit_seq<'n>(&mut self, items: impl IntoIterator<Item = &'n Node>) {
        for node in items {
            if self.b.is_terminated() {
                trace!(skipped = %node, "instruction after terminator");
                break;
            }
            self.emit_inst(node);
        }
    }

    pub(crate) fn emit_inst(&mut self, node: &Node) {
        let Some(items) = node.as_list() else {
            self.report(node.kind().variant_name(), ProblemKind::Malformed("(op ..)"));
            return;
        };
        let op = Op::from_head(node.head());
        let span = node.span().or(self.span);
        let outer = std::mem::replace(&mut self.span, span);
        let result = ensure_sufficient_stack(|| self.dispatch(op, items));
        if let Err(kind) = result {
            self.report(node.head().unwrap_or_default(), kind);
        }
        self.span = outer;
    }

    fn dispatch(&mut self, op: Op, items: &[Node]) -> Handled {
        match op {
            Op::If => self.lower_if(items),
            Op::While => self.lower_while(items),
            Op::For => self.lower_for(items),
            Op::Switch => self.lower_switch(items),
            Op::Match => self.lower_match(items),
            Op::Break => self.lower_break(items),
            Op::Continue => self.lower_continue(items),
            Op::Block => self.lower_block(items),
            Op::Phi => self.lower_phi(items),
            Op::Ret => self.lower_ret(items),
            Op::Panic => self.lower_panic(items),
            Op::Try => self.lower_try(items),

            Op::Const => self.lower_const(items),
            Op::Binary(bin) => self.lower_binary(bin, items),
            Op::Compare(cmp) => self.lower_compare(cmp, items),
            Op::ICmp => self.lower_icmp(items),
            Op::FCmp => self.lower_fcmp(items),
            Op::Cast(cast) => self.lower_cast(cast, items),
            Op::PtrAdd => self.lower_ptr_offset(items, false),
            Op::PtrSub => self.lower_ptr_offset(items, true),
            Op::PtrDiff => self.lower_ptr_diff(items),

            Op::As => self.lower_as(items),
            Op::Assign => self.lower_assign(items),
            Op::Alloca => self.lower_alloca(items),
            Op::Load => self.lower_load(items),
            Op::Store => self.lower_store(items),
            Op::GLoad => self.lower_gload(items),
            Op::GStore => self.lower_gstore(items),
            Op::Index => self.lower_index(items),
            Op::ArrayLit => self.lower_array_lit(items),
            Op::StructLit => self.lower_struct_lit(items),
            Op::Member => self.lower_member(items, false),
            Op::MemberAddr => self.lower_member(items, true),
            Op::UnionMember => self.lower_union_member(items),
            Op::Addr => self.lower_addr(items),
            Op::Deref => self.lower_deref(items),

            Op::FnPtr => self.lower_fnptr(items),
            Op::Call => self.lower_call(items),
            Op::CallIndirect => self.lower_call_indirect(items),
            Op::VaStart => self.lower_va_start(items),
            Op::VaArg => self.lower_va_arg(items),
            Op::VaEnd => self.lower_va_end(items),

            Op::CStr => self.lower_cstr(items),
            Op::Bytes => self.lower_bytes(items),
            Op::Closure => self.lower_closure(items),
            Op::MakeClosure => self.lower_make_closure(items),
            Op::CallClosure => self.lower_call_closure(items),

            Op::Coro(coro) => self.lower_coro(coro, items),
            Op::SumNew => self.lower_sum_new(items),
            Op::SumIs => self.lower_sum_is(items),
            Op::SumGet => self.lower_sum_get(items),

            Op::Unrecognized => Err(ProblemKind::Unrecognized),
        }
    }

    /// Record a skipped instruction against the current span.
    pub(crate) fn report(&mut self, op: &str, kind: ProblemKind) {
        let problem = EmitProblem {
            function: self.name.clone(),
            op: op.to_owned(),
            kind,
            span: self.span,
        };
        debug!(?problem, "instruction skipped");
        self.state.problems.push(problem);
    }

    // ── Shared helpers ──────────────────────────────────────────────

    pub(crate) fn lower(&mut self, node: &Node) -> Result<TypeId, ProblemKind> {
        lower_type(self.b.types_mut(), node)
    }

    pub(crate) fn personality(&self) -> Option<Personality> {
        self.env.personality
    }

    pub(crate) fn return_type(&self) -> TypeId {
        let ty = self.b.function().ty;
        self.b
            .types()
            .signature(ty)
            .map_or(ty, |(ret, _, _)| ret)
    }

    /// The all-zero value of `ty`.
    pub(crate) fn zero_value(&mut self, ty: TypeId) -> ValueId {
        let kind = self.b.types().kind(ty).clone();
        match kind {
            TypeKind::Int(_) => self.b.const_int(ty, 0),
            TypeKind::Float | TypeKind::Double => self.b.const_float(ty, 0.0),
            TypeKind::Pointer(_) => self.b.const_null(ty),
            _ => self.b.const_zero(ty),
        }
    }

    /// Name of `ty` for mismatch messages.
    pub(crate) fn show(&self, ty: TypeId) -> String {
        self.b.types().display(ty).to_string()
    }

    pub(crate) fn mismatch(&self, what: &str, expected: TypeId, found: TypeId) -> ProblemKind {
        ProblemKind::TypeMismatch(format!(
            "{what}: expected {}, found {}",
            self.show(expected),
            self.show(found)
        ))
    }

    /// Declare (or find) a function by name and signature.
    pub(crate) fn declare(&mut self, name: &str, ret: TypeId, params: Vec<TypeId>, variadic: bool) -> FuncId {
        if let Some(existing) = self.b.module().get_function(name) {
            return existing;
        }
        let ty = self.b.types_mut().function(ret, params, variadic);
        self.b
            .module_mut()
            .add_function(name, ty, edn_backend::Linkage::External)
    }
}
