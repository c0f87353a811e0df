use edn_backend::GlobalId;
use edn_ir::Node;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, name_at, vector_at};

impl FunctionEmitter<'_, '_> {
    /// `(cstr %d "text")`: an `i8*` to an interned, NUL-terminated constant.
    pub(crate) fn lower_cstr(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(cstr %d \"text\")";
        expect_len(items, 3, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let text = items[2].as_str().ok_or(ProblemKind::Malformed(SHAPE))?;
        let global = self.state.interner.cstr(self.b.module_mut(), text);
        self.define_literal(dst, global)
    }

    /// `(bytes %d [b..])` with every element in `0..=255`.
    pub(crate) fn lower_bytes(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(bytes %d [0..255 ..])";
        expect_len(items, 3, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let data = vector_at(items, 2, SHAPE)?
            .iter()
            .map(|b| b.as_int().and_then(|v| u8::try_from(v).ok()))
            .collect::<Option<Vec<u8>>>()
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let global = self.state.interner.bytes(self.b.module_mut(), &data);
        self.define_literal(dst, global)
    }

    fn define_literal(&mut self, dst: &str, global: GlobalId) -> Handled {
        let array = self.b.global_ref(global);
        let zero = self.b.const_i32(0);
        let ptr = self
            .b
            .gep(array, &[zero, zero], dst)
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        let ty = self.b.type_of(ptr);
        self.define(dst, ptr, ty)
    }
}
