//! Stack, global and aggregate memory.
//!
//! Aggregate literals are built on the stack: one `alloca`, then a GEP
//! and a store per element. Their result is the pointer to the aggregate.

use edn_backend::{TypeId, TypeKind, ValueId};
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, local_name, name_at, vector_at};

impl FunctionEmitter<'_, '_> {
    /// `(alloca %d T)` at the insertion point. The result is a `T*`.
    pub(crate) fn lower_alloca(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(alloca %d T)";
        expect_len(items, 3, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let ptr = self.b.alloca(ty, dst);
        let ptr_ty = self.b.type_of(ptr);
        self.define(dst, ptr, ptr_ty)
    }

    /// `(load %d T %p)`
    pub(crate) fn lower_load(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(load %d T %p)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        self.load_checked(dst, ty, &items[3])
    }

    /// `(store T %p %v)`, or `(store %p %v)` with the type taken from `p`.
    pub(crate) fn lower_store(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(store T %p %v)";
        let (declared, ptr, value) = match items {
            [_, ty, ptr, value] => (Some(self.lower(ty)?), ptr, value),
            [_, ptr, value] => (None, ptr, value),
            _ => return Err(ProblemKind::Malformed(SHAPE)),
        };
        let ptr = self.value_of(ptr)?;
        let ptr_ty = self.b.type_of(ptr);
        let pointee = self.b.types().pointee(ptr_ty).ok_or_else(|| {
            ProblemKind::TypeMismatch(format!("store through {}", self.show(ptr_ty)))
        })?;
        if let Some(declared) = declared.filter(|&t| t != pointee) {
            return Err(self.mismatch("store", declared, pointee));
        }
        let value = self.operand(value, pointee)?;
        let found = self.b.type_of(value);
        if found != pointee {
            return Err(self.mismatch("store", pointee, found));
        }
        self.b.store(value, ptr);
        Ok(())
    }

    /// `(gload %d T G)`
    pub(crate) fn lower_gload(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(gload %d T G)";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let global = self.global_of(&items[3], ty, SHAPE)?;
        let value = self
            .b
            .load(global, dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        self.define(dst, value, ty)
    }

    /// `(gstore T G %v)`
    pub(crate) fn lower_gstore(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(gstore T G %v)";
        expect_len(items, 4, SHAPE)?;
        let ty = self.lower(&items[1])?;
        let global = self.global_of(&items[2], ty, SHAPE)?;
        let value = self.operand(&items[3], ty)?;
        let found = self.b.type_of(value);
        if found != ty {
            return Err(self.mismatch("gstore", ty, found));
        }
        self.b.store(value, global);
        Ok(())
    }

    /// Address of the module global named by `node`, which must hold a `ty`.
    fn global_of(
        &mut self,
        node: &Node,
        ty: TypeId,
        shape: &'static str,
    ) -> Result<ValueId, ProblemKind> {
        let name = node.as_name().ok_or(ProblemKind::Malformed(shape))?;
        let id = self
            .b
            .module()
            .get_global(name)
            .ok_or_else(|| ProblemKind::Unresolved(name.to_owned()))?;
        let declared = self.b.module().global(id).ty;
        if declared != ty {
            return Err(self.mismatch(&format!("global `{name}`"), ty, declared));
        }
        Ok(self.b.global_ref(id))
    }

    /// `(index %d ElemT %base %i)`: address of element `i` of the array
    /// `base` points to. The result is an `ElemT*`.
    pub(crate) fn lower_index(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(index %d ElemT %base %i)";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let elem = self.lower(&items[2])?;
        let base = self.value_of(&items[3])?;
        let base_ty = self.b.type_of(base);
        let types = self.b.types();
        let array_elem = types
            .pointee(base_ty)
            .filter(|&array| matches!(types.kind(array), TypeKind::Array { .. }))
            .and_then(|array| types.element_at(array, 0));
        if array_elem != Some(elem) {
            return Err(ProblemKind::TypeMismatch(format!(
                "index of {} as {}",
                self.show(base_ty),
                self.show(elem)
            )));
        }
        let i32 = self.b.types_mut().i32();
        let index = self.operand(&items[4], i32)?;
        if !self.b.types().is_int(self.b.type_of(index)) {
            return Err(ProblemKind::TypeMismatch("array index is not an integer".to_owned()));
        }
        let zero = self.b.const_i32(0);
        let addr = self
            .b
            .gep(base, &[zero, index], dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        let addr_ty = self.b.type_of(addr);
        self.define(dst, addr, addr_ty)
    }

    /// `(array-lit %d ElemT n [%e..])`. The element count must equal `n`.
    pub(crate) fn lower_array_lit(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(array-lit %d ElemT n [%e..])";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let elem = self.lower(&items[2])?;
        let len = items[3]
            .as_int()
            .and_then(|n| u64::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let elems = vector_at(items, 4, SHAPE)?;
        if u64::try_from(elems.len()).ok() != Some(len) {
            return Err(ProblemKind::Malformed(SHAPE));
        }
        let values = elems
            .iter()
            .map(|e| self.typed_operand(e, elem, "array element"))
            .collect::<Result<Vec<_>, _>>()?;

        let array = self.b.types_mut().array(elem, len);
        let ptr = self.b.alloca(array, dst);
        let zero = self.b.const_i32(0);
        for (i, value) in values.into_iter().enumerate() {
            let index = self.b.const_i32(i32::try_from(i).unwrap_or(i32::MAX));
            if let Some(addr) = self.b.gep(ptr, &[zero, index], &format!("{dst}.elem{i}.addr")) {
                self.b.store(value, addr);
            }
        }
        let ptr_ty = self.b.type_of(ptr);
        self.define(dst, ptr, ptr_ty)
    }

    /// `(struct-lit %d S [field %v ..])`. Fields not named stay
    /// uninitialized.
    pub(crate) fn lower_struct_lit(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(struct-lit %d S [field %v ..])";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let struct_name = items[2].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let pairs = vector_at(items, 3, SHAPE)?;
        if pairs.len() % 2 != 0 {
            return Err(ProblemKind::Malformed(SHAPE));
        }
        let env = self.env;
        let layout = env
            .layouts
            .struct_layout(struct_name)
            .ok_or_else(|| ProblemKind::UnknownLayout(struct_name.to_owned()))?;
        let mut fields = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            let field = pair[0].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
            let (index, ty) = layout
                .field(field)
                .ok_or_else(|| ProblemKind::UnknownLayout(format!("{struct_name}.{field}")))?;
            let value = self.typed_operand(&pair[1], ty, "struct field")?;
            fields.push((field, index, value));
        }

        let ptr = self.b.alloca(layout.ty, dst);
        for (field, index, value) in fields {
            if let Some(addr) = self.b.struct_gep(ptr, index, &format!("{dst}.{field}.addr")) {
                self.b.store(value, addr);
            }
        }
        let ptr_ty = self.b.type_of(ptr);
        self.define(dst, ptr, ptr_ty)
    }

    /// `(member %d S %base field)` loads the field; `member-addr` yields
    /// its address.
    pub(crate) fn lower_member(&mut self, items: &[Node], address: bool) -> Handled {
        const SHAPE: &str = "(member %d S %base field)";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let struct_name = items[2].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let field = items[4].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let env = self.env;
        let layout = env
            .layouts
            .struct_layout(struct_name)
            .ok_or_else(|| ProblemKind::UnknownLayout(struct_name.to_owned()))?;
        let (index, field_ty) = layout
            .field(field)
            .ok_or_else(|| ProblemKind::UnknownLayout(format!("{struct_name}.{field}")))?;
        let base = self.aggregate_base(&items[3], layout.ty)?;

        let addr_name = if address {
            dst.to_owned()
        } else {
            format!("{dst}.addr")
        };
        let addr = self
            .b
            .struct_gep(base, index, &addr_name)
            .ok_or_else(|| ProblemKind::UnknownLayout(struct_name.to_owned()))?;
        if address {
            let addr_ty = self.b.type_of(addr);
            return self.define(dst, addr, addr_ty);
        }
        let value = self
            .b
            .load(addr, dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        self.define(dst, value, field_ty)
    }

    /// `(union-member %d U %p field)`: reinterpret the union's storage as
    /// the field's type and load it.
    pub(crate) fn lower_union_member(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(union-member %d U %p field)";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let union_name = items[2].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let field = items[4].as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
        let env = self.env;
        let layout = env
            .layouts
            .union_layout(union_name)
            .ok_or_else(|| ProblemKind::UnknownLayout(union_name.to_owned()))?;
        let field_ty = layout
            .field(field)
            .ok_or_else(|| ProblemKind::UnknownLayout(format!("{union_name}.{field}")))?;
        let base = self.aggregate_base(&items[3], layout.ty)?;

        let storage = self
            .b
            .struct_gep(base, 0, &format!("{dst}.ustorage.addr"))
            .ok_or_else(|| ProblemKind::UnknownLayout(union_name.to_owned()))?;
        let field_ptr_ty = self.b.types_mut().ptr(field_ty);
        let cast = self.b.bitcast(storage, field_ptr_ty, &format!("{dst}.cast"));
        let value = self
            .b
            .load(cast, dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        self.define(dst, value, field_ty)
    }

    /// The pointer named by `node`, which must point at `aggregate`.
    fn aggregate_base(
        &mut self,
        node: &Node,
        aggregate: TypeId,
    ) -> Result<ValueId, ProblemKind> {
        let base = self.value_of(node)?;
        let found = self.b.type_of(base);
        if self.b.types().pointee(found) != Some(aggregate) {
            let expected = self.b.types_mut().ptr(aggregate);
            return Err(self.mismatch("aggregate base", expected, found));
        }
        Ok(base)
    }

    /// An operand that must have type `ty`.
    pub(crate) fn typed_operand(
        &mut self,
        node: &Node,
        ty: TypeId,
        what: &str,
    ) -> Result<ValueId, ProblemKind> {
        let value = self.operand(node, ty)?;
        let found = self.b.type_of(value);
        if found == ty {
            Ok(value)
        } else {
            let what = local_name(node)
                .map_or_else(|| what.to_owned(), |n| format!("{what} `{n}`"));
            Err(self.mismatch(&what, ty, found))
        }
    }
}

#[cfg(test)]
mod tests {
    use edn_backend::Context;

    use crate::error::ProblemKind;
    use crate::tests::helper::{body_text, emit_fn, emit_source};

    #[test]
    fn array_literal_stores_each_element() {
        let ctx = Context::create();
        let text = body_text(&emit_fn(
            &ctx,
            "i32",
            "[(array-lit %a i32 2 [%x %y]) (index %p i32 %a 1) (load %v i32 %p) (ret i32 %v)]",
        ));
        assert!(text.contains("%a = alloca [2 x i32]"), "{text}");
        assert!(
            text.contains("%a.elem0.addr = getelementptr [2 x i32], ptr %a, i32 0, i32 0"),
            "{text}"
        );
        assert!(text.contains("store i32 %y, ptr %a.elem1.addr"), "{text}");
        assert!(text.contains("%v = load i32, ptr %p"), "{text}");
    }

    #[test]
    fn array_literal_length_must_match() {
        let ctx = Context::create();
        let session = emit_fn(&ctx, "void", "[(array-lit %a i32 3 [%x %y])]");
        assert_eq!(
            session.problems()[0].kind,
            ProblemKind::Malformed("(array-lit %d ElemT n [%e..])")
        );
    }

    #[test]
    fn load_checks_the_pointee() {
        let ctx = Context::create();
        let session = emit_fn(&ctx, "void", "[(alloca %p i64) (load %v i32 %p)]");
        assert!(matches!(session.problems()[0].kind, ProblemKind::TypeMismatch(_)));
    }

    #[test]
    fn struct_fields_by_name() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            "(module :id \"t\"
               (struct :name Point :fields [(field :name x :type i32) (field :name y :type i32)])
               (fn :name f :ret i32 :params [(param i32 %a)]
                 :body [(struct-lit %p Point [y %a x 0])
                        (member %v Point %p y)
                        (member-addr %q Point %p x)
                        (store %q 5)
                        (ret i32 %v)]))",
            crate::EmitConfig::default(),
        );
        let text = session.module().to_string();
        assert!(session.problems().is_empty(), "{:?}", session.problems());
        assert!(
            text.contains("%p.y.addr = getelementptr %struct.Point, ptr %p, i32 0, i32 1"),
            "{text}"
        );
        assert!(text.contains("%v.addr = getelementptr"), "{text}");
        assert!(
            text.contains("%q = getelementptr %struct.Point, ptr %p, i32 0, i32 0"),
            "{text}"
        );
        assert!(text.contains("store i32 5, ptr %q"), "{text}");
    }

    #[test]
    fn union_member_reinterprets_storage() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            "(module :id \"t\"
               (union :name U :fields [(ufield :name i :type i32) (ufield :name f :type f32)])
               (fn :name f :ret f32 :params [(param (ptr U) %u)]
                 :body [(union-member %v U %u f) (ret f32 %v)]))",
            crate::EmitConfig::default(),
        );
        let text = session.module().to_string();
        assert!(text.contains("%v.ustorage.addr = getelementptr %struct.U"), "{text}");
        assert!(text.contains("%v = load float, ptr %v.ustorage.addr"), "{text}");
    }

    #[test]
    fn globals_round_trip_through_memory() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            "(module :id \"t\"
               (global :name counter :type i32 :init 0)
               (fn :name bump :ret i32
                 :body [(gload %c i32 counter) (add %n i32 %c 1) (gstore i32 counter %n) (ret i32 %n)]))",
            crate::EmitConfig::default(),
        );
        let text = session.module().to_string();
        assert!(text.contains("%c = load i32, ptr @counter"), "{text}");
        assert!(text.contains("store i32 %n, ptr @counter"), "{text}");
    }
}
