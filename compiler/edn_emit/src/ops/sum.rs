//! Tagged-union construction and inspection.
//!
//! A sum value is a pointer to `{ i32 tag, [N x i8] payload }`. Payload
//! fields are read and written through byte offsets into the payload
//! array, cast to the field type.

use edn_backend::{IntPredicate, TypeId, ValueId};
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, name_at, vector_at};
use crate::layout::{SumLayout, Variant};

impl<'s> FunctionEmitter<'s, '_> {
    /// `(sum-new %d S V [%v..])`
    pub(crate) fn lower_sum_new(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(sum-new %d S V [%v..])";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let (layout, variant) = self.sum_variant(items, 2, 3, SHAPE)?;
        let values = vector_at(items, 4, SHAPE)?;
        if values.len() != variant.fields.len() {
            return Err(ProblemKind::TypeMismatch(format!(
                "variant `{}` takes {} fields, got {}",
                variant.name,
                variant.fields.len(),
                values.len()
            )));
        }

        let sum = self.b.alloca(layout.ty, dst);
        let tag_addr = self
            .b
            .struct_gep(sum, 0, &format!("{dst}.tag.addr"))
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let tag = self.b.const_i32(variant.tag);
        self.b.store(tag, tag_addr);

        if !values.is_empty() {
            let payload = self
                .b
                .struct_gep(sum, 1, &format!("{dst}.payload.addr"))
                .ok_or(ProblemKind::Malformed(SHAPE))?;
            for (index, node) in values.iter().enumerate() {
                let (offset, ty) = self.payload_field(variant, index)?;
                let value = self.typed_operand(node, ty, "payload field")?;
                let ptr = self.payload_ptr(payload, offset, ty, &format!("{dst}.fld{index}"))?;
                self.b.store(value, ptr);
            }
        }
        let ptr_ty = self.b.types_mut().ptr(layout.ty);
        self.define(dst, sum, ptr_ty)
    }

    /// `(sum-is %d S %val V)`
    pub(crate) fn lower_sum_is(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(sum-is %d S %val V)";
        expect_len(items, 5, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let (layout, variant) = self.sum_variant(items, 2, 4, SHAPE)?;
        let sum = self.sum_operand(&items[3], layout)?;
        let tag_addr = self
            .b
            .struct_gep(sum, 0, &format!("{dst}.tag.addr"))
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let tag = self
            .b
            .load(tag_addr, &format!("{dst}.tag"))
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let expected = self.b.const_i32(variant.tag);
        let hit = self.b.icmp(IntPredicate::Eq, tag, expected, dst);
        let i1 = self.b.types_mut().i1();
        self.define(dst, hit, i1)
    }

    /// `(sum-get %d S %val V idx)`. The tag is not checked.
    pub(crate) fn lower_sum_get(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(sum-get %d S %val V idx)";
        expect_len(items, 6, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let index = items[5]
            .as_int()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let (layout, variant) = self.sum_variant(items, 2, 4, SHAPE)?;
        let (offset, ty) = self.payload_field(variant, index)?;
        let sum = self.sum_operand(&items[3], layout)?;
        let payload = self
            .b
            .struct_gep(sum, 1, &format!("{dst}.payload.addr"))
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let ptr = self.payload_ptr(payload, offset, ty, dst)?;
        let field = self.b.load(ptr, dst).ok_or(ProblemKind::Malformed(SHAPE))?;
        self.define(dst, field, ty)
    }

    /// The layout named at `sum_at` and its variant named at `variant_at`.
    fn sum_variant(
        &self,
        items: &[Node],
        sum_at: usize,
        variant_at: usize,
        shape: &'static str,
    ) -> Result<(&'s SumLayout, &'s Variant), ProblemKind> {
        let env = self.env;
        let sum_name = name_at(items, sum_at, shape)?;
        let variant_name = name_at(items, variant_at, shape)?;
        let layout = env
            .layouts
            .sum(sum_name)
            .ok_or_else(|| ProblemKind::UnknownLayout(sum_name.to_owned()))?;
        let variant = layout
            .variant(variant_name)
            .ok_or_else(|| ProblemKind::UnknownLayout(format!("{sum_name}.{variant_name}")))?;
        Ok((layout, variant))
    }

    fn payload_field(&self, variant: &Variant, index: usize) -> Result<(u64, TypeId), ProblemKind> {
        variant
            .field_offset(index, self.b.types())
            .ok_or_else(|| ProblemKind::UnknownLayout(format!("{}.{index}", variant.name)))
    }

    /// `<name>.raw` at `offset` into the payload, typed as `ty*`.
    fn payload_ptr(
        &mut self,
        payload: ValueId,
        offset: u64,
        ty: TypeId,
        name: &str,
    ) -> Result<ValueId, ProblemKind> {
        let raw = self
            .b
            .byte_gep(payload, offset, &format!("{name}.raw"))
            .ok_or(ProblemKind::Malformed("payload offset"))?;
        let ptr_ty = self.b.types_mut().ptr(ty);
        Ok(self.b.bitcast(raw, ptr_ty, &format!("{name}.ptr")))
    }

    fn sum_operand(&mut self, node: &Node, layout: &SumLayout) -> Result<ValueId, ProblemKind> {
        let value = self.value_of(node)?;
        let found = self.b.type_of(value);
        let expected = self.b.types_mut().ptr(layout.ty);
        if found == expected {
            Ok(value)
        } else {
            Err(self.mismatch("sum value", expected, found))
        }
    }
}

#[cfg(test)]
mod tests {
    use edn_backend::Context;

    use crate::error::ProblemKind;
    use crate::tests::helper::emit_source;
    use crate::EmitConfig;

    const OPTION: &str = "(sum :name Opt :variants [(variant :name None :fields [])
                                                  (variant :name Some :fields [i32 i64])])";

    fn module(body: &str) -> String {
        format!(
            "(module :id \"t\" {OPTION}
               (fn :name f :ret i32 :params [(param i32 %x)] :body {body}))"
        )
    }

    #[test]
    fn sum_new_writes_tag_and_payload() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            &module("[(sum-new %o Opt Some [%x 7]) (sum-get %v Opt %o Some 0) (ret i32 %v)]"),
            EmitConfig::default(),
        );
        let text = session.module().to_string();
        assert!(session.problems().is_empty(), "{:?}", session.problems());
        assert!(text.contains("%o = alloca %struct.Opt"), "{text}");
        assert!(text.contains("store i32 1, ptr %o.tag.addr"), "{text}");
        assert!(
            text.contains("%o.fld1.raw = getelementptr i8, ptr %o.payload.addr, i64 8"),
            "{text}"
        );
        assert!(text.contains("store i64 7, ptr %o.fld1.raw"), "{text}");
        assert!(text.contains("%v = load i32, ptr %v.raw"), "{text}");
    }

    #[test]
    fn sum_is_compares_the_tag() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            &module("[(sum-new %o Opt None []) (sum-is %t Opt %o None) (zext %r i32 %t) (ret i32 %r)]"),
            EmitConfig::default(),
        );
        let text = session.module().to_string();
        assert!(text.contains("%t.tag = load i32, ptr %t.tag.addr"), "{text}");
        assert!(text.contains("%t = icmp eq i32 %t.tag, 0"), "{text}");
    }

    #[test]
    fn unknown_variant_is_reported() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            &module("[(sum-new %o Opt Many []) (ret i32 0)]"),
            EmitConfig::default(),
        );
        assert_eq!(
            session.problems()[0].kind,
            ProblemKind::UnknownLayout("Opt.Many".to_owned())
        );
    }

    #[test]
    fn payload_arity_is_checked() {
        let ctx = Context::create();
        let session = emit_source(
            &ctx,
            &module("[(sum-new %o Opt Some [%x]) (ret i32 0)]"),
            EmitConfig::default(),
        );
        assert!(matches!(session.problems()[0].kind, ProblemKind::TypeMismatch(_)));
    }
}
