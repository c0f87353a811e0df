//! Closures.
//!
//! Two representations coexist:
//!
//! - `closure` produces a plain function pointer. The environment is
//!   parked in a private global and a private thunk reloads it and
//!   forwards to the target with the environment as first argument.
//! - `make-closure` produces a `{i8*, Env}` record on the stack, typed
//!   `%struct.__edn.closure.<callee>`; `call-closure` recovers the target
//!   from that type name.

use edn_backend::{Const, FuncId, Global, Linkage, TypeId, TypeKind, ValueId};
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, name_at, vector_at};
use crate::types::struct_type_name;

const CLOSURE_STRUCT_PREFIX: &str = "__edn.closure.";

impl FunctionEmitter<'_, '_> {
    /// `(closure %d FnPtrT callee [%env])`
    pub(crate) fn lower_closure(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(closure %d FnPtrT callee [%env])";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ptr_ty = self.lower(&items[2])?;
        let callee = items[3].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let env = self.single_capture(items, 4, SHAPE)?;
        let fn_ty = self
            .b
            .types()
            .pointee(ptr_ty)
            .filter(|&t| self.b.types().signature(t).is_some())
            .ok_or_else(|| {
                ProblemKind::TypeMismatch(format!("closure of type {}", self.show(ptr_ty)))
            })?;
        let target = self.closure_target(callee)?;
        let env_ty = self.b.type_of(env);

        // The target takes the environment, then the thunk's own parameters.
        let target_ty = self.b.module().function(target).ty;
        let (params, ret) = match (
            self.b.types().signature(fn_ty),
            self.b.types().signature(target_ty),
        ) {
            (Some((ret, params, _)), Some((target_ret, target_params, _)))
                if target_ret == ret
                    && target_params.first() == Some(&env_ty)
                    && target_params[1..] == *params =>
            {
                (params.to_vec(), ret)
            }
            _ => {
                return Err(ProblemKind::TypeMismatch(format!(
                    "`{callee}` cannot back a closure of type {} over {}",
                    self.show(ptr_ty),
                    self.show(env_ty)
                )))
            }
        };

        let n = self.state.closures;
        self.state.closures += 1;
        let init = if self.b.types().is_pointer(env_ty) {
            Const::Null
        } else {
            Const::Zero
        };
        let env_global = self.b.module_mut().add_global(Global {
            name: format!("__edn.closure.env.{n}"),
            ty: env_ty,
            init: Some(init),
            constant: false,
            linkage: Linkage::Private,
        });
        let slot = self.b.global_ref(env_global);
        self.b.store(env, slot);

        let thunk = self.b.module_mut().add_function(
            &format!("__edn.closure.thunk.{callee}.{n}"),
            fn_ty,
            Linkage::Private,
        );
        for index in 0..params.len() {
            self.b
                .module_mut()
                .set_param_name(thunk, index, &format!("a{index}"));
        }

        let point = self.b.save();
        self.b.switch_function(thunk);
        let entry = self.b.append_block("entry");
        self.b.position_at_end(entry);
        let slot = self.b.global_ref(env_global);
        let mut args = Vec::with_capacity(params.len() + 1);
        if let Some(env) = self.b.load(slot, "env") {
            args.push(env);
        }
        args.extend((0..params.len()).filter_map(|i| self.b.param(i)));
        let target_ref = self.b.function_ref(target);
        match self.b.call(target_ref, &args, "retv") {
            Some(value) if !self.b.types().is_void(ret) => self.b.ret(value),
            _ => self.b.ret_void(),
        }
        self.b.restore(point);

        let value = self.b.function_ref(thunk);
        self.define(dst, value, ptr_ty)
    }

    /// `(make-closure %d callee [%env])`
    pub(crate) fn lower_make_closure(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(make-closure %d callee [%env])";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let callee = items[2].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let env = self.single_capture(items, 3, SHAPE)?;
        let target = self.closure_target(callee)?;
        let env_ty = self.b.type_of(env);

        let record = self.closure_record(callee, env_ty)?;
        let ptr = self.b.alloca(record, dst);
        if let Some(addr) = self.b.struct_gep(ptr, 1, &format!("{dst}.env.addr")) {
            self.b.store(env, addr);
        }
        let i8_ptr = self.b.types_mut().i8_ptr();
        let target_ref = self.b.function_ref(target);
        let erased = self.b.bitcast(target_ref, i8_ptr, &format!("{dst}.fn.raw"));
        if let Some(addr) = self.b.struct_gep(ptr, 0, &format!("{dst}.fn.addr")) {
            self.b.store(erased, addr);
        }
        let ptr_ty = self.b.type_of(ptr);
        self.define(dst, ptr, ptr_ty)
    }

    /// `(call-closure %d RetT %clos args..)`
    pub(crate) fn lower_call_closure(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(call-closure %d RetT %clos args..)";
        if items.len() < 4 {
            return Err(ProblemKind::Malformed(SHAPE));
        }
        let dst = name_at(items, 1, SHAPE)?;
        let ret = self.lower(&items[2])?;
        let clos = self.value_of(&items[3])?;
        let clos_ty = self.b.type_of(clos);
        let callee = self
            .b
            .types()
            .pointee(clos_ty)
            .and_then(|record| match self.b.types().kind(record) {
                TypeKind::Named(name) => name
                    .strip_prefix(&struct_type_name(CLOSURE_STRUCT_PREFIX))
                    .map(str::to_owned),
                _ => None,
            })
            .ok_or_else(|| {
                ProblemKind::TypeMismatch(format!("call-closure on {}", self.show(clos_ty)))
            })?;
        let target = self.closure_target(&callee)?;
        let fn_ty = self.b.module().function(target).ty;
        let Some((target_ret, params, _)) = self.b.types().signature(fn_ty) else {
            return Err(ProblemKind::UnknownCallee(callee));
        };
        let params = params.to_vec();
        if target_ret != ret {
            return Err(self.mismatch(&format!("return of `{callee}`"), ret, target_ret));
        }
        let forms = &items[4..];
        if params.len() != forms.len() + 1 {
            return Err(ProblemKind::TypeMismatch(format!(
                "`{callee}` takes {} arguments after its environment, found {}",
                params.len().saturating_sub(1),
                forms.len()
            )));
        }
        let mut args = Vec::with_capacity(params.len());
        for (form, &ty) in forms.iter().zip(&params[1..]) {
            args.push(self.typed_operand(form, ty, "argument")?);
        }

        let missing = || ProblemKind::UnknownLayout(callee.clone());
        let fn_addr = self
            .b
            .struct_gep(clos, 0, &format!("{dst}.fn.addr"))
            .ok_or_else(missing)?;
        let erased = self.b.load(fn_addr, &format!("{dst}.fn")).ok_or_else(missing)?;
        let env_addr = self
            .b
            .struct_gep(clos, 1, &format!("{dst}.env.addr"))
            .ok_or_else(missing)?;
        let env = self.b.load(env_addr, &format!("{dst}.env")).ok_or_else(missing)?;
        let fn_ptr_ty = self.b.types_mut().ptr(fn_ty);
        let typed = self.b.bitcast(erased, fn_ptr_ty, &format!("{dst}.fntyped"));
        args.insert(0, env);
        let value = self
            .b
            .call(typed, &args, dst)
            .ok_or_else(|| ProblemKind::UnknownCallee(callee.clone()))?;
        self.define_result(dst, value, ret)
    }

    /// The one captured value of a `[%env]` vector.
    fn single_capture(
        &mut self,
        items: &[Node],
        index: usize,
        shape: &'static str,
    ) -> Result<ValueId, ProblemKind> {
        match vector_at(items, index, shape)? {
            [env] => self.value_of(env),
            _ => Err(ProblemKind::Malformed(shape)),
        }
    }

    fn closure_target(&self, callee: &str) -> Result<FuncId, ProblemKind> {
        self.b
            .module()
            .get_function(callee)
            .ok_or_else(|| ProblemKind::UnknownCallee(callee.to_owned()))
    }

    /// `%struct.__edn.closure.<callee>` = `{i8*, Env}`, created once.
    fn closure_record(&mut self, callee: &str, env_ty: TypeId) -> Result<TypeId, ProblemKind> {
        let types = self.b.types_mut();
        let i8_ptr = types.i8_ptr();
        let name = struct_type_name(&format!("{CLOSURE_STRUCT_PREFIX}{callee}"));
        let record = types.named_struct(&name);
        match types.struct_fields(record) {
            None => {
                types.set_body(record, vec![i8_ptr, env_ty]);
                Ok(record)
            }
            Some([_, existing]) if *existing == env_ty => Ok(record),
            Some(_) => Err(ProblemKind::TypeMismatch(format!(
                "closures over `{callee}` capture different environment types"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use edn_backend::Context;

    use crate::config::EmitConfig;
    use crate::tests::helper::emit_source;

    const TARGET: &str = "(fn :name add_env :ret i32 :params [(param (ptr i32) %env) (param i32 %v)]
                            :body [(load %e i32 %env) (add %s i32 %e %v) (ret i32 %s)])";

    #[test]
    fn closure_builds_a_thunk() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            &format!(
                "(module :id \"t\" {TARGET}
                   (fn :name f :ret i32 :params [(param (ptr i32) %p) (param i32 %x)]
                     :body [(closure %c (ptr (fn-type :params [i32] :ret i32)) add_env [%p])
                            (call-indirect %r i32 %c %x)
                            (ret i32 %r)]))"
            ),
            EmitConfig::default(),
        );
        let text = session.module().to_string();
        assert!(session.problems().is_empty(), "{:?}", session.problems());
        assert!(text.contains("@__edn.closure.env.0 = private global ptr null"), "{text}");
        assert!(
            text.contains("define private i32 @__edn.closure.thunk.add_env.0(i32 %a0)"),
            "{text}"
        );
        assert!(text.contains("%env = load ptr, ptr @__edn.closure.env.0"), "{text}");
        assert!(text.contains("%retv = call i32 @add_env(ptr %env, i32 %a0)"), "{text}");
        assert!(text.contains("store ptr %p, ptr @__edn.closure.env.0"), "{text}");
    }

    #[test]
    fn record_closures_round_trip() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            &format!(
                "(module :id \"t\" {TARGET}
                   (fn :name f :ret i32 :params [(param (ptr i32) %p) (param i32 %x)]
                     :body [(make-closure %c add_env [%p])
                            (call-closure %r i32 %c %x)
                            (ret i32 %r)]))"
            ),
            EmitConfig::default(),
        );
        let text = session.module().to_string();
        assert!(session.problems().is_empty(), "{:?}", session.problems());
        assert!(text.contains("%struct.__edn.closure.add_env = type { ptr, ptr }"), "{text}");
        assert!(text.contains("%r.fn = load ptr, ptr %r.fn.addr"), "{text}");
        assert!(text.contains("%r = call i32 %r.fn(ptr %r.env, i32 %x)"), "{text}");
    }
}
