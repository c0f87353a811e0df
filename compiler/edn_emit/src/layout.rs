//! Aggregate layouts declared at module level.
//!
//! - `(struct :name S :fields [(field :name f :type T)..])` becomes
//!   `%struct.S = type { T.. }`.
//! - `(sum :name S :variants [(variant :name V :fields [T..])..])` becomes
//!   `%struct.S = type { i32, [N x i8] }`: a tag, then a payload big enough
//!   for the largest variant (at least one byte). Variant tags are their
//!   declaration index; payload fields are packed back to back.
//! - `(union :name U :fields [(ufield :name f :type T)..])` becomes
//!   `%struct.U = type { [N x i8] }` sized for the largest field.
//!
//! Names are registered before any body is lowered, so declarations may
//! refer to each other in any order.

use edn_backend::{TypeId, TypeTable};
use edn_ir::{Node, Span};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{EmitProblem, ProblemKind};
use crate::forms::KeywordArgs;
use crate::types::{lower_type, struct_type_name};

/// A named field and its lowered type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug)]
pub struct StructLayout {
    pub ty: TypeId,
    pub fields: Vec<Field>,
}

impl StructLayout {
    /// Position and type of field `name`.
    pub fn field(&self, name: &str) -> Option<(u32, TypeId)> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some((u32::try_from(index).ok()?, self.fields[index].ty))
    }
}

#[derive(Clone, Debug)]
pub struct Variant {
    pub name: String,
    pub tag: i32,
    pub fields: Vec<TypeId>,
}

impl Variant {
    /// Byte offset into the payload and type of field `index`.
    pub fn field_offset(&self, index: usize, types: &TypeTable) -> Option<(u64, TypeId)> {
        let ty = *self.fields.get(index)?;
        let offset = self.fields[..index].iter().map(|&f| types.size_of(f)).sum();
        Some((offset, ty))
    }

    fn payload_size(&self, types: &TypeTable) -> u64 {
        self.fields.iter().map(|&f| types.size_of(f)).sum()
    }
}

#[derive(Clone, Debug)]
pub struct SumLayout {
    pub ty: TypeId,
    pub variants: Vec<Variant>,
}

impl SumLayout {
    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.name.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct UnionLayout {
    pub ty: TypeId,
    pub fields: Vec<Field>,
}

impl UnionLayout {
    pub fn field(&self, name: &str) -> Option<TypeId> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.ty)
    }
}

/// Every aggregate declared by a module.
#[derive(Default)]
pub struct Layouts {
    structs: FxHashMap<String, StructLayout>,
    sums: FxHashMap<String, SumLayout>,
    unions: FxHashMap<String, UnionLayout>,
}

impl Layouts {
    /// Collect and lower every `struct`, `sum` and `union` form in `forms`.
    /// Malformed declarations are skipped and reported in `problems`.
    pub fn collect(forms: &[Node], types: &mut TypeTable, problems: &mut Vec<EmitProblem>) -> Self {
        let mut layouts = Layouts::default();
        let mut decls = Vec::new();
        for form in forms {
            let Some(head @ ("struct" | "sum" | "union")) = form.head() else {
                continue;
            };
            let args = KeywordArgs::parse(form.as_list().map_or(&[][..], |items| &items[1..]));
            match args.get("name").and_then(Node::as_name) {
                Some(name) => decls.push(Decl {
                    head,
                    name,
                    args,
                    span: form.span(),
                }),
                None => problems.push(module_problem(
                    head,
                    form.span(),
                    ProblemKind::Malformed("(.. :name N ..)"),
                )),
            }
        }

        for decl in &decls {
            types.named_struct(&struct_type_name(decl.name));
        }

        // Struct bodies first: sum and union sizes depend on them.
        for decl in decls.iter().filter(|d| d.head == "struct") {
            match struct_fields(&decl.args, "field", types) {
                Ok(fields) => {
                    let ty = types.named_struct(&struct_type_name(decl.name));
                    types.set_body(ty, fields.iter().map(|f| f.ty).collect());
                    layouts
                        .structs
                        .insert(decl.name.to_owned(), StructLayout { ty, fields });
                }
                Err(kind) => problems.push(module_problem(decl.head, decl.span, kind)),
            }
        }

        for decl in &decls {
            let result = match decl.head {
                "sum" => layouts.lower_sum(decl.name, &decl.args, types),
                "union" => layouts.lower_union(decl.name, &decl.args, types),
                _ => Ok(()),
            };
            if let Err(kind) = result {
                problems.push(module_problem(decl.head, decl.span, kind));
            }
        }

        debug!(
            structs = layouts.structs.len(),
            sums = layouts.sums.len(),
            unions = layouts.unions.len(),
            "collected layouts"
        );
        layouts
    }

    fn lower_sum(
        &mut self,
        name: &str,
        args: &KeywordArgs<'_>,
        types: &mut TypeTable,
    ) -> Result<(), ProblemKind> {
        const SHAPE: &str = "(sum :name S :variants [(variant :name V :fields [T..])..])";
        let mut variants = Vec::new();
        for (index, form) in args.vector("variants").unwrap_or_default().iter().enumerate() {
            if form.head() != Some("variant") {
                return Err(ProblemKind::Malformed(SHAPE));
            }
            let list = form.as_list().ok_or(ProblemKind::Malformed(SHAPE))?;
            let vargs = KeywordArgs::parse(&list[1..]);
            let vname = vargs.get("name").and_then(Node::as_name).ok_or(ProblemKind::Malformed(SHAPE))?;
            let fields = vargs
                .vector("fields")
                .unwrap_or_default()
                .iter()
                .map(|f| lower_type(types, f))
                .collect::<Result<Vec<_>, _>>()?;
            variants.push(Variant {
                name: vname.to_owned(),
                tag: i32::try_from(index).map_err(|_| ProblemKind::Malformed(SHAPE))?,
                fields,
            });
        }
        let payload = variants
            .iter()
            .map(|v| v.payload_size(types))
            .max()
            .unwrap_or(0)
            .max(1);
        let i32 = types.i32();
        let i8 = types.i8();
        let bytes = types.array(i8, payload);
        let ty = types.named_struct(&struct_type_name(name));
        types.set_body(ty, vec![i32, bytes]);
        self.sums.insert(name.to_owned(), SumLayout { ty, variants });
        Ok(())
    }

    fn lower_union(
        &mut self,
        name: &str,
        args: &KeywordArgs<'_>,
        types: &mut TypeTable,
    ) -> Result<(), ProblemKind> {
        let fields = struct_fields(args, "ufield", types)?;
        let size = fields.iter().map(|f| types.size_of(f.ty)).max().unwrap_or(0).max(1);
        let i8 = types.i8();
        let bytes = types.array(i8, size);
        let ty = types.named_struct(&struct_type_name(name));
        types.set_body(ty, vec![bytes]);
        self.unions.insert(name.to_owned(), UnionLayout { ty, fields });
        Ok(())
    }

    pub fn struct_layout(&self, name: &str) -> Option<&StructLayout> {
        self.structs.get(name)
    }

    pub fn sum(&self, name: &str) -> Option<&SumLayout> {
        self.sums.get(name)
    }

    pub fn union_layout(&self, name: &str) -> Option<&UnionLayout> {
        self.unions.get(name)
    }

    pub fn sums(&self) -> impl Iterator<Item = (&str, &SumLayout)> {
        self.sums.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// `[(head :name f :type T)..]` under `:fields`.
fn struct_fields(
    args: &KeywordArgs<'_>,
    head: &str,
    types: &mut TypeTable,
) -> Result<Vec<Field>, ProblemKind> {
    const SHAPE: &str = "(.. :fields [(field :name f :type T)..])";
    args.vector("fields")
        .unwrap_or_default()
        .iter()
        .map(|form| {
            if form.head() != Some(head) {
                return Err(ProblemKind::Malformed(SHAPE));
            }
            let list = form.as_list().ok_or(ProblemKind::Malformed(SHAPE))?;
            let fargs = KeywordArgs::parse(&list[1..]);
            let name = fargs.get("name").and_then(Node::as_name).ok_or(ProblemKind::Malformed(SHAPE))?;
            let ty = lower_type(types, fargs.get("type").ok_or(ProblemKind::Malformed(SHAPE))?)?;
            Ok(Field {
                name: name.to_owned(),
                ty,
            })
        })
        .collect()
}

struct Decl<'n> {
    head: &'n str,
    name: &'n str,
    args: KeywordArgs<'n>,
    span: Option<Span>,
}

fn module_problem(head: &str, span: Option<Span>, kind: ProblemKind) -> EmitProblem {
    EmitProblem {
        function: String::new(),
        op: head.to_owned(),
        kind,
        span,
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
