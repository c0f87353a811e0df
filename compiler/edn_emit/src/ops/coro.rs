//! Coroutine ops.
//!
//! With coroutines enabled each op is a call to its `llvm.coro.*`
//! intrinsic and `coro-begin` marks the function `presplitcoroutine`.
//! Disabled, every op that yields a value binds an inert constant of the
//! same type and the rest emit nothing, so a coroutine body still
//! compiles as straight-line code.
//!
//! | Op | Form | Intrinsic | Disabled |
//! |----|------|-----------|----------|
//! | `coro-begin` | `(coro-begin %h)` | `coro.id` then `coro.begin` | `null` |
//! | `coro-id` | `(coro-id %d)` | last `coro.id` | `none` |
//! | `coro-size` | `(coro-size %d)` | `coro.size.i64` | `0` |
//! | `coro-alloc` | `(coro-alloc %d %id)` | `coro.alloc` | `false` |
//! | `coro-free` | `(coro-free %d %id %h)` | `coro.free` | `null` |
//! | `coro-save` | `(coro-save %d %h)` | `coro.save` | `none` |
//! | `coro-suspend` | `(coro-suspend %d %tok)` | `coro.suspend(tok, false)` | `0` |
//! | `coro-final-suspend` | `(coro-final-suspend %d %tok)` | `coro.suspend(tok, true)` | `0` |
//! | `coro-promise` | `(coro-promise %d %h)` | `coro.promise(h, 0, false)` | `null` |
//! | `coro-resume` | `(coro-resume %h)` | `coro.resume` | nothing |
//! | `coro-destroy` | `(coro-destroy %h)` | `coro.destroy` | nothing |
//! | `coro-done` | `(coro-done %d %h)` | `coro.done` | `false` |
//! | `coro-end` | `(coro-end %h)` | `coro.end(h, false, none)` | nothing |

use edn_backend::{FnAttrs, TypeId, ValueId};
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, name_at};
use crate::op::CoroOp;

impl CoroOp {
    fn shape(self) -> &'static str {
        match self {
            CoroOp::Begin => "(coro-begin %h)",
            CoroOp::Id => "(coro-id %d)",
            CoroOp::Size => "(coro-size %d)",
            CoroOp::Alloc => "(coro-alloc %d %id)",
            CoroOp::Free => "(coro-free %d %id %h)",
            CoroOp::Save => "(coro-save %d %h)",
            CoroOp::Suspend => "(coro-suspend %d %tok)",
            CoroOp::FinalSuspend => "(coro-final-suspend %d %tok)",
            CoroOp::Promise => "(coro-promise %d %h)",
            CoroOp::Resume => "(coro-resume %h)",
            CoroOp::Destroy => "(coro-destroy %h)",
            CoroOp::Done => "(coro-done %d %h)",
            CoroOp::End => "(coro-end %h)",
        }
    }

    /// Form length, head included.
    fn arity(self) -> usize {
        match self {
            CoroOp::Begin | CoroOp::Id | CoroOp::Size | CoroOp::Resume | CoroOp::Destroy | CoroOp::End => 2,
            CoroOp::Free => 4,
            _ => 3,
        }
    }
}

impl FunctionEmitter<'_, '_> {
    pub(crate) fn lower_coro(&mut self, op: CoroOp, items: &[Node]) -> Handled {
        let shape = op.shape();
        expect_len(items, op.arity(), shape)?;
        if !self.env.config.coroutines {
            return self.inert_coro(op, items, shape);
        }

        let types = self.b.types_mut();
        let (i1, i8, i64) = (types.i1(), types.i8(), types.i64());
        let (i8_ptr, token, void) = (types.i8_ptr(), types.token(), types.void());
        match op {
            CoroOp::Begin => {
                let handle = name_at(items, 1, shape)?;
                let null = self.b.const_null(i8_ptr);
                let align = self.b.const_i32(0);
                let id = self.intrinsic(
                    "llvm.coro.id",
                    token,
                    &[align, null, null, null],
                    "coro.id",
                )?;
                self.cx.coro_id = Some(id);
                let begin = self.intrinsic("llvm.coro.begin", i8_ptr, &[id, null], handle)?;
                let func = self.b.current_function();
                self.b.module_mut().add_attrs(func, FnAttrs::PRESPLIT_COROUTINE);
                self.define(handle, begin, i8_ptr)
            }
            CoroOp::Id => {
                let dst = name_at(items, 1, shape)?;
                let id = self
                    .cx
                    .coro_id
                    .ok_or_else(|| ProblemKind::Unresolved("coro.id".to_owned()))?;
                self.define(dst, id, token)
            }
            CoroOp::Size => {
                let dst = name_at(items, 1, shape)?;
                let size = self.intrinsic("llvm.coro.size.i64", i64, &[], dst)?;
                self.define(dst, size, i64)
            }
            CoroOp::Alloc => {
                let dst = name_at(items, 1, shape)?;
                let id = self.coro_operand(&items[2], token)?;
                let need = self.intrinsic("llvm.coro.alloc", i1, &[id], dst)?;
                self.define(dst, need, i1)
            }
            CoroOp::Free => {
                let dst = name_at(items, 1, shape)?;
                let id = self.coro_operand(&items[2], token)?;
                let handle = self.coro_operand(&items[3], i8_ptr)?;
                let mem = self.intrinsic("llvm.coro.free", i8_ptr, &[id, handle], dst)?;
                self.define(dst, mem, i8_ptr)
            }
            CoroOp::Save => {
                let dst = name_at(items, 1, shape)?;
                let handle = self.coro_operand(&items[2], i8_ptr)?;
                let saved = self.intrinsic("llvm.coro.save", token, &[handle], dst)?;
                self.define(dst, saved, token)
            }
            CoroOp::Suspend | CoroOp::FinalSuspend => {
                let dst = name_at(items, 1, shape)?;
                let tok = self.value_of(&items[2])?;
                let tok = if self.b.type_of(tok) == token {
                    tok
                } else {
                    self.b.const_token_none()
                };
                let last = self.b.const_bool(op == CoroOp::FinalSuspend);
                let state = self.intrinsic("llvm.coro.suspend", i8, &[tok, last], dst)?;
                self.define(dst, state, i8)
            }
            CoroOp::Promise => {
                let dst = name_at(items, 1, shape)?;
                let handle = self.coro_operand(&items[2], i8_ptr)?;
                let align = self.b.const_i32(0);
                let from = self.b.const_bool(false);
                let promise =
                    self.intrinsic("llvm.coro.promise", i8_ptr, &[handle, align, from], dst)?;
                self.define(dst, promise, i8_ptr)
            }
            CoroOp::Resume | CoroOp::Destroy => {
                let handle = self.coro_operand(&items[1], i8_ptr)?;
                let name = if op == CoroOp::Resume {
                    "llvm.coro.resume"
                } else {
                    "llvm.coro.destroy"
                };
                self.intrinsic(name, void, &[handle], "")?;
                Ok(())
            }
            CoroOp::Done => {
                let dst = name_at(items, 1, shape)?;
                let handle = self.coro_operand(&items[2], i8_ptr)?;
                let done = self.intrinsic("llvm.coro.done", i1, &[handle], dst)?;
                self.define(dst, done, i1)
            }
            CoroOp::End => {
                let handle = self.coro_operand(&items[1], i8_ptr)?;
                let unwind = self.b.const_bool(false);
                let none = self.b.const_token_none();
                self.intrinsic("llvm.coro.end", i1, &[handle, unwind, none], "coro.end")?;
                Ok(())
            }
        }
    }

    /// Bind the placeholder a disabled coroutine op yields, if any.
    fn inert_coro(&mut self, op: CoroOp, items: &[Node], shape: &'static str) -> Handled {
        if !op.defines_result() {
            return Ok(());
        }
        let dst = name_at(items, 1, shape)?;
        let types = self.b.types_mut();
        let (i1, i8, i64, i8_ptr, token) =
            (types.i1(), types.i8(), types.i64(), types.i8_ptr(), types.token());
        let (value, ty) = match op {
            CoroOp::Begin | CoroOp::Free | CoroOp::Promise => (self.b.const_null(i8_ptr), i8_ptr),
            CoroOp::Id | CoroOp::Save => (self.b.const_token_none(), token),
            CoroOp::Size => (self.b.const_int(i64, 0), i64),
            CoroOp::Suspend | CoroOp::FinalSuspend => (self.b.const_int(i8, 0), i8),
            CoroOp::Alloc | CoroOp::Done => (self.b.const_bool(false), i1),
            CoroOp::Resume | CoroOp::Destroy | CoroOp::End => return Ok(()),
        };
        self.define(dst, value, ty)
    }

    /// A named coroutine operand of type `ty`.
    fn coro_operand(&mut self, node: &Node, ty: TypeId) -> Result<ValueId, ProblemKind> {
        let value = self.value_of(node)?;
        let found = self.b.type_of(value);
        if found == ty {
            Ok(value)
        } else {
            Err(self.mismatch("coroutine operand", ty, found))
        }
    }

    /// Call an intrinsic, declaring it from the argument types.
    fn intrinsic(
        &mut self,
        name: &str,
        ret: TypeId,
        args: &[ValueId],
        result: &str,
    ) -> Result<ValueId, ProblemKind> {
        let params = args.iter().map(|&a| self.b.type_of(a)).collect();
        let func = self.declare(name, ret, params, false);
        let callee = self.b.function_ref(func);
        self.b
            .call(callee, args, result)
            .ok_or_else(|| ProblemKind::UnknownCallee(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use edn_backend::Context;

    use crate::config::EmitConfig;
    use crate::tests::helper::emit_source;

    const BODY: &str = "(module :id \"t\"
        (fn :name gen :ret (ptr i8)
          :body [(coro-begin %h)
                 (coro-size %n)
                 (coro-suspend %s %none)
                 (coro-done %d %h)
                 (coro-end %h)
                 (ret (ptr i8) %h)]))";

    #[test]
    fn enabled_coroutines_call_intrinsics() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            &BODY.replace("%none", "%h"),
            EmitConfig::default().with_coroutines(true),
        );
        let text = session.module().to_string();
        assert!(session.problems().is_empty(), "{:?}", session.problems());
        assert!(text.contains("%coro.id = call token @llvm.coro.id(i32 0, ptr null, ptr null, ptr null)"), "{text}");
        assert!(text.contains("%h = call ptr @llvm.coro.begin(token %coro.id, ptr null)"), "{text}");
        assert!(text.contains("%s = call i8 @llvm.coro.suspend(token none, i1 false)"), "{text}");
        assert!(text.contains("presplitcoroutine"), "{text}");
        assert!(text.contains("@llvm.coro.end(ptr %h, i1 false, token none)"), "{text}");
    }

    #[test]
    fn disabled_coroutines_bind_placeholders() {
        let ctx = Context::create();
        let session = emit_source(&ctx, &BODY.replace("%none", "%h"), EmitConfig::default());
        let text = session.module().to_string();
        assert!(session.problems().is_empty(), "{:?}", session.problems());
        assert!(!text.contains("llvm.coro"), "{text}");
        assert!(text.contains("ret ptr null"), "{text}");
    }
}
