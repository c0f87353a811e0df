//! `panic`, `try` and unwind destinations.
//!
//! The active personality decides the shape of everything here:
//!
//! | | Itanium | SEH |
//! |--|--|--|
//! | handler target | `landingpad` block | `catchswitch` block |
//! | panic | `invoke __cxa_throw` | `invoke RaiseException` |
//! | unwind with no handler | fresh `panic.lpad.N` that resumes | shared `seh.cleanup` funclet |
//!
//! With no personality, or with unwinding disabled, `panic` traps and
//! `try` emits its body and then its catch block in sequence.

use edn_backend::{BlockId, FnAttrs, FuncId, TypeId};
use edn_ir::Node;

use crate::config::Personality;
use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::KeywordArgs;
use crate::session::declare_personality;

/// Exception code `RaiseException` is called with.
const SEH_PANIC_CODE: i64 = 0xE0ED_0001;
/// `catchpad` flag for a catch-all handler.
const SEH_CATCH_ALL: i64 = 64;

impl FunctionEmitter<'_, '_> {
    /// Where a call or panic unwinds to: the innermost handler, else a
    /// block that resumes unwinding in the caller.
    pub(crate) fn unwind_target(&mut self, personality: Personality) -> BlockId {
        match personality {
            Personality::Itanium => match self.cx.unwind.itanium.last() {
                Some(&handler) => handler,
                None => self.resume_pad(),
            },
            Personality::Seh => match self.cx.unwind.seh.last() {
                Some(&handler) => handler,
                None => self.seh_cleanup(),
            },
        }
    }

    /// The current function's personality routine.
    fn personality_routine(&mut self, personality: Personality) -> FuncId {
        match self.b.function().personality {
            Some(routine) => routine,
            None => declare_personality(self.b.module_mut(), personality),
        }
    }

    /// `panic.lpad.N`: a cleanup landingpad that resumes.
    fn resume_pad(&mut self) -> BlockId {
        let n = self.cx.next_id();
        let block = self.b.append_block(&format!("panic.lpad.{n}"));
        let point = self.b.save();
        self.b.position_at_end(block);
        let routine = self.personality_routine(Personality::Itanium);
        let lp = self.b.landing_pad(routine, true, &[], "lpad");
        self.b.resume(lp);
        self.b.restore(point);
        block
    }

    /// The function's shared SEH cleanup funclet, built on first use.
    fn seh_cleanup(&mut self) -> BlockId {
        if let Some(block) = self.cx.unwind.seh_cleanup {
            return block;
        }
        let block = self.b.append_block("seh.cleanup");
        let point = self.b.save();
        self.b.position_at_end(block);
        let none = self.b.const_token_none();
        let pad = self.b.cleanup_pad(none, &[], "cp");
        self.b.cleanup_ret(pad, None);
        self.b.restore(point);
        self.cx.unwind.seh_cleanup = Some(block);
        block
    }

    /// Declare a runtime routine that does not return.
    fn declare_noreturn(&mut self, name: &str, params: Vec<TypeId>) -> FuncId {
        let void = self.b.types_mut().void();
        let func = self.declare(name, void, params, false);
        self.b.module_mut().add_attrs(func, FnAttrs::NORETURN);
        func
    }

    /// `(panic)` or `(panic "message")`. The message is not emitted.
    pub(crate) fn lower_panic(&mut self, _items: &[Node]) -> Handled {
        let personality = self
            .personality()
            .filter(|_| self.env.config.panic_unwind);
        let Some(personality) = personality else {
            let trap = self.declare_noreturn("llvm.trap", Vec::new());
            let callee = self.b.function_ref(trap);
            self.b.call(callee, &[], "");
            self.b.unreachable();
            return Ok(());
        };

        let i8_ptr = self.b.types_mut().i8_ptr();
        let (callee, args) = match personality {
            Personality::Itanium => {
                let throw = self.declare_noreturn("__cxa_throw", vec![i8_ptr; 3]);
                let null = self.b.const_null(i8_ptr);
                (throw, vec![null; 3])
            }
            Personality::Seh => {
                let i32 = self.b.types_mut().i32();
                let raise = self.declare_noreturn("RaiseException", vec![i32, i32, i32, i8_ptr]);
                let code = self.b.const_int(i32, SEH_PANIC_CODE);
                let flags = self.b.const_int(i32, 1);
                let count = self.b.const_int(i32, 0);
                let null = self.b.const_null(i8_ptr);
                (raise, vec![code, flags, count, null])
            }
        };
        let unwind = self.unwind_target(personality);
        let n = self.cx.next_id();
        let cont = self.b.append_block(&format!("panic.cont.{n}"));
        let callee = self.b.function_ref(callee);
        self.b.invoke(callee, &args, cont, unwind, "");
        self.b.position_at_end(cont);
        self.b.unreachable();
        Ok(())
    }

    /// `(try :body [..] :catch [..])`
    pub(crate) fn lower_try(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(try :body [..] :catch [..])";
        let args = KeywordArgs::parse(&items[1..]);
        let body = args.vector("body").ok_or(ProblemKind::Malformed(SHAPE))?;
        let catch = args.vector("catch").unwrap_or_default();

        let n = self.cx.next_id();
        let body_bb = self.b.append_block(&format!("try.body.{n}"));
        match self.personality() {
            None => {
                let end_bb = self.b.append_block(&format!("try.end.{n}"));
                self.b.br(body_bb);
                self.b.position_at_end(body_bb);
                self.emit_seq(body);
                self.emit_seq(catch);
                if !self.b.is_terminated() {
                    self.b.br(end_bb);
                }
                self.b.position_at_end(end_bb);
            }
            Some(Personality::Itanium) => {
                let lpad_bb = self.b.append_block(&format!("try.lpad.{n}"));
                let handler_bb = self.b.append_block(&format!("try.handler.{n}"));
                let end_bb = self.b.append_block(&format!("try.end.{n}"));
                self.b.br(body_bb);

                self.b.position_at_end(lpad_bb);
                let i8_ptr = self.b.types_mut().i8_ptr();
                let catch_all = self.b.const_null(i8_ptr);
                let routine = self.personality_routine(Personality::Itanium);
                self.b.landing_pad(routine, false, &[catch_all], "lpad");
                self.b.br(handler_bb);

                self.cx.unwind.itanium.push(lpad_bb);
                self.emit_arm(body_bb, body, end_bb);
                self.cx.unwind.itanium.pop();

                self.emit_arm(handler_bb, catch, end_bb);
                self.b.position_at_end(end_bb);
            }
            Some(Personality::Seh) => {
                let dispatch_bb = self.b.append_block(&format!("try.dispatch.{n}"));
                let pad_bb = self.b.append_block(&format!("try.pad.{n}"));
                let handler_bb = self.b.append_block(&format!("try.handler.{n}"));
                let end_bb = self.b.append_block(&format!("try.end.{n}"));
                self.b.br(body_bb);

                self.b.position_at_end(dispatch_bb);
                let none = self.b.const_token_none();
                let switch = self.b.catch_switch(none, &[pad_bb], None, "cs");
                self.b.position_at_end(pad_bb);
                let i8_ptr = self.b.types_mut().i8_ptr();
                let i32 = self.b.types_mut().i32();
                let null = self.b.const_null(i8_ptr);
                let flags = self.b.const_int(i32, SEH_CATCH_ALL);
                let pad = self.b.catch_pad(switch, &[null, flags, null], "cpad");
                self.b.catch_ret(pad, handler_bb);

                self.cx.unwind.seh.push(dispatch_bb);
                self.emit_arm(body_bb, body, end_bb);
                self.cx.unwind.seh.pop();

                self.emit_arm(handler_bb, catch, end_bb);
                self.b.position_at_end(end_bb);
            }
        }
        Ok(())
    }
}
