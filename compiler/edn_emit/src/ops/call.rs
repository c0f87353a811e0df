//! Calls, function pointers, varargs and `ret`.

use edn_backend::{FuncId, TypeId, ValueId};
use edn_ir::{Node, NodeKind};

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, name_at};

impl FunctionEmitter<'_, '_> {
    /// `(call %d RetT callee args..)`
    ///
    /// An unknown callee is declared external with the argument types as
    /// its parameters. Under an active personality the call becomes an
    /// `invoke` that continues in `invoke.cont.N`.
    pub(crate) fn lower_call(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(call %d RetT callee args..)";
        if items.len() < 4 {
            return Err(ProblemKind::Malformed(SHAPE));
        }
        let dst = name_at(items, 1, SHAPE)?;
        let ret = self.lower(&items[2])?;
        let name = items[3].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let arg_forms = &items[4..];

        let (func, args) = match self.b.module().get_function(name) {
            Some(func) => {
                let fn_ty = self.b.module().function(func).ty;
                let args = self.call_args(name, fn_ty, arg_forms)?;
                (func, args)
            }
            None => {
                let args = arg_forms
                    .iter()
                    .map(|arg| self.loose_operand(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let params = args.iter().map(|&a| self.b.type_of(a)).collect();
                (self.declare(name, ret, params, false), args)
            }
        };
        self.check_return(name, func, ret)?;
        let callee = self.b.function_ref(func);
        let value = self
            .emit_call(callee, &args, dst)
            .ok_or_else(|| ProblemKind::UnknownCallee(name.to_owned()))?;
        self.define_result(dst, value, ret)
    }

    /// `(call-indirect %d RetT %fptr args..)`
    pub(crate) fn lower_call_indirect(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(call-indirect %d RetT %fptr args..)";
        if items.len() < 4 {
            return Err(ProblemKind::Malformed(SHAPE));
        }
        let dst = name_at(items, 1, SHAPE)?;
        let ret = self.lower(&items[2])?;
        let fptr_name = name_at(items, 3, SHAPE)?;
        let fptr = self.value_of(&items[3])?;
        let fptr_ty = self.b.type_of(fptr);
        let fn_ty = self
            .b
            .types()
            .pointee(fptr_ty)
            .filter(|&t| self.b.types().signature(t).is_some())
            .ok_or_else(|| ProblemKind::UnknownCallee(fptr_name.to_owned()))?;
        let args = self.call_args(fptr_name, fn_ty, &items[4..])?;
        let declared = self.signature_ret(fn_ty);
        if declared != ret {
            return Err(self.mismatch(&format!("return of `{fptr_name}`"), ret, declared));
        }
        let value = self
            .b
            .call(fptr, &args, dst)
            .ok_or_else(|| ProblemKind::UnknownCallee(fptr_name.to_owned()))?;
        self.define_result(dst, value, ret)
    }

    /// `(fnptr %d PtrT fname)`. A missing function is declared from `PtrT`.
    pub(crate) fn lower_fnptr(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(fnptr %d PtrT fname)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ptr_ty = self.lower(&items[2])?;
        let name = items[3].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let func = match self.b.module().get_function(name) {
            Some(func) => func,
            None => {
                let (ret, params, variadic) = self
                    .b
                    .types()
                    .pointee(ptr_ty)
                    .and_then(|fn_ty| self.b.types().signature(fn_ty))
                    .map(|(ret, params, variadic)| (ret, params.to_vec(), variadic))
                    .ok_or_else(|| {
                        ProblemKind::TypeMismatch(format!("fnptr of type {}", self.show(ptr_ty)))
                    })?;
                self.declare(name, ret, params, variadic)
            }
        };
        let value = self.b.function_ref(func);
        let found = self.b.type_of(value);
        if found != ptr_ty {
            return Err(self.mismatch(&format!("fnptr `{name}`"), ptr_ty, found));
        }
        self.define(dst, value, ptr_ty)
    }

    /// `(ret T %v)`, `(ret void)` or `(ret)`. A bare `ret` in a function
    /// that returns a value returns zero.
    pub(crate) fn lower_ret(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(ret T %v)";
        let expected = self.return_type();
        match items {
            [_, ty, value] => {
                let ty = self.lower(ty)?;
                if ty != expected {
                    return Err(self.mismatch("ret", expected, ty));
                }
                let value = self.typed_operand(value, ty, "return value")?;
                self.b.ret(value);
            }
            [_] | [_, _] if self.b.types().is_void(expected) => self.b.ret_void(),
            [_] | [_, _] => {
                let zero = self.zero_value(expected);
                self.b.ret(zero);
            }
            _ => return Err(ProblemKind::Malformed(SHAPE)),
        }
        Ok(())
    }

    // ── Varargs ─────────────────────────────────────────────────────

    /// `(va-start %ap)`: an `i8*` list slot in the entry block, started
    /// with `llvm.va_start`. Only valid in a variadic function.
    pub(crate) fn lower_va_start(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(va-start %ap)";
        expect_len(items, 2, SHAPE)?;
        let ap = name_at(items, 1, SHAPE)?;
        let own_ty = self.b.function().ty;
        if !self.b.types().signature(own_ty).is_some_and(|(_, _, variadic)| variadic) {
            return Err(ProblemKind::TypeMismatch(
                "va-start in a function without varargs".to_owned(),
            ));
        }
        let i8_ptr = self.b.types_mut().i8_ptr();
        let list = self.b.entry_alloca(i8_ptr, ap);
        self.va_intrinsic("llvm.va_start", ap, list);
        let list_ty = self.b.type_of(list);
        self.cx.bind_value(ap, list, list_ty);
        Ok(())
    }

    /// `(va-arg %d T %ap)`
    pub(crate) fn lower_va_arg(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(va-arg %d T %ap)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let list = self.va_list(&items[3], SHAPE)?;
        let value = self.b.va_arg(list, ty, dst);
        self.define(dst, value, ty)
    }

    /// `(va-end %ap)`
    pub(crate) fn lower_va_end(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(va-end %ap)";
        expect_len(items, 2, SHAPE)?;
        let ap = name_at(items, 1, SHAPE)?;
        let list = self.va_list(&items[1], SHAPE)?;
        self.va_intrinsic("llvm.va_end", ap, list);
        Ok(())
    }

    fn va_list(&mut self, node: &Node, shape: &'static str) -> Result<ValueId, ProblemKind> {
        let list = self.value_of(node)?;
        let list_ty = self.b.type_of(list);
        let i8_ptr = self.b.types_mut().i8_ptr();
        if self.b.types().pointee(list_ty) == Some(i8_ptr) {
            Ok(list)
        } else {
            Err(ProblemKind::Malformed(shape))
        }
    }

    fn va_intrinsic(&mut self, intrinsic: &str, ap: &str, list: ValueId) {
        let void = self.b.types_mut().void();
        let i8_ptr = self.b.types_mut().i8_ptr();
        let func = self.declare(intrinsic, void, vec![i8_ptr], false);
        let raw = self.b.bitcast(list, i8_ptr, &format!("{ap}.raw"));
        let callee = self.b.function_ref(func);
        self.b.call(callee, &[raw], "");
    }

    // ── Shared ──────────────────────────────────────────────────────

    /// Call, or `invoke` under an active personality. Leaves the builder
    /// in the normal continuation. `None` if `callee` is not callable.
    pub(crate) fn emit_call(
        &mut self,
        callee: ValueId,
        args: &[ValueId],
        name: &str,
    ) -> Option<ValueId> {
        let callable = self
            .b
            .types()
            .pointee(self.b.type_of(callee))
            .is_some_and(|t| self.b.types().signature(t).is_some());
        if !callable {
            return None;
        }
        let Some(personality) = self.personality() else {
            return self.b.call(callee, args, name);
        };
        let unwind = self.unwind_target(personality);
        let n = self.cx.next_id();
        let cont = self.b.append_block(&format!("invoke.cont.{n}"));
        let value = self.b.invoke(callee, args, cont, unwind, name);
        self.b.position_at_end(cont);
        value
    }

    /// Resolve `forms` as arguments to a function of type `fn_ty`. Fixed
    /// parameters are type-checked; variadic extras take their own type.
    pub(crate) fn call_args(
        &mut self,
        callee: &str,
        fn_ty: TypeId,
        forms: &[Node],
    ) -> Result<Vec<ValueId>, ProblemKind> {
        let (params, variadic) = self
            .b
            .types()
            .signature(fn_ty)
            .map(|(_, params, variadic)| (params.to_vec(), variadic))
            .ok_or_else(|| ProblemKind::UnknownCallee(callee.to_owned()))?;
        if forms.len() < params.len() || (forms.len() > params.len() && !variadic) {
            return Err(ProblemKind::TypeMismatch(format!(
                "`{callee}` takes {} arguments, found {}",
                params.len(),
                forms.len()
            )));
        }
        forms
            .iter()
            .enumerate()
            .map(|(i, form)| match params.get(i) {
                Some(&ty) => self.typed_operand(form, ty, "argument"),
                None => self.loose_operand(form),
            })
            .collect()
    }

    /// An operand with no expected type: literals default to `i32` and
    /// `double`.
    fn loose_operand(&mut self, node: &Node) -> Result<ValueId, ProblemKind> {
        match node.kind() {
            NodeKind::Int(_) | NodeKind::Bool(_) => {
                let i32 = self.b.types_mut().i32();
                self.operand(node, i32)
            }
            NodeKind::Float(_) => {
                let double = self.b.types_mut().double();
                self.operand(node, double)
            }
            _ => self.value_of(node),
        }
    }

    fn signature_ret(&self, fn_ty: TypeId) -> TypeId {
        self.b
            .types()
            .signature(fn_ty)
            .map_or(fn_ty, |(ret, _, _)| ret)
    }

    fn check_return(&self, name: &str, func: FuncId, ret: TypeId) -> Handled {
        let declared = self.signature_ret(self.b.module().function(func).ty);
        if declared == ret {
            Ok(())
        } else {
            Err(self.mismatch(&format!("return of `{name}`"), ret, declared))
        }
    }

    /// Publish a call result unless the callee returns `void`.
    pub(crate) fn define_result(&mut self, dst: &str, value: ValueId, ret: TypeId) -> Handled {
        if self.b.types().is_void(ret) {
            Ok(())
        } else {
            self.define(dst, value, ret)
        }
    }
}

#[cfg(test)]
mod tests {
    use edn_backend::Context;

    use crate::config::EmitConfig;
    use crate::error::ProblemKind;
    use crate::tests::helper::{body_text, emit_fn, emit_source};

    #[test]
    fn unknown_callee_is_declared_from_its_arguments() {
        let ctx = Context::create();
        let session = emit_fn(&ctx, "i32", "[(call %r i32 abs %x) (ret i32 %r)]");
        let text = body_text(&session);
        assert!(text.contains("declare i32 @abs(i32)"), "{text}");
        assert!(text.contains("%r = call i32 @abs(i32 %x)"), "{text}");
    }

    #[test]
    fn calls_check_declared_parameters() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            "(module :id \"t\"
               (fn :name g :ret i32 :params [(param i64 %a)] :external true)
               (fn :name f :ret i32 :params [(param i32 %x)]
                 :body [(call %r i32 g %x) (ret i32 %r)]))",
            EmitConfig::default(),
        );
        assert!(matches!(
            session.problems()[0].kind,
            ProblemKind::TypeMismatch(_)
        ));
    }

    #[test]
    fn calls_become_invokes_under_a_personality() {
        let ctx = Context::create();
        let config = EmitConfig::default().with_eh_models(true, false);
        let session = emit_source(
            &ctx,
            "(module :id \"t\"
               (fn :name g :ret void :external true)
               (fn :name f :ret void :body [(call %r void g)]))",
            config,
        );
        let text = session.module().to_string();
        assert!(text.contains("invoke void @g()"), "{text}");
        assert!(text.contains("to label %invoke.cont.1 unwind label %panic.lpad.0"), "{text}");
        assert!(text.contains("invoke.cont.1:"), "{text}");
    }

    #[test]
    fn function_pointers_call_indirectly() {
        let ctx = Context::create();
        let text = body_text(&emit_fn(
            &ctx,
            "i32",
            "[(fnptr %fp (ptr (fn-type :params [i32] :ret i32)) abs)
              (call-indirect %r i32 %fp %y)
              (ret i32 %r)]",
        ));
        assert!(text.contains("declare i32 @abs(i32)"), "{text}");
        assert!(text.contains("%r = call i32 @abs(i32 %y)"), "{text}");
    }

    #[test]
    fn bare_ret_returns_zero() {
        let ctx = Context::create();
        let text = body_text(&emit_fn(&ctx, "i32", "[(ret)]"));
        assert!(text.contains("ret i32 0"), "{text}");
    }
}
