//! `match` over tagged unions.
//!
//! ```text
//! (match Sum %val :cases [..] :default ..)             statement
//! (match %dst T Sum %val :cases [..] :default ..)      result
//! ```
//!
//! The tag is compared against each case in a chain of `match.case.i.N`
//! blocks; bodies live in `match.body.i.N`. In result mode every arm that
//! reaches `match.end.N` contributes one phi edge keyed by its exit
//! block, carrying the arm's value as read at the end of that arm. A missing default contributes an `undef` edge for the no-match
//! path, so the phi always covers every predecessor.

use edn_backend::{BlockId, IntPredicate, TypeId, ValueId};
use edn_ir::Node;

use crate::context::{PendingPhi, PhiSource};
use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{body_and_value, is_local_ref, local_name, KeywordArgs};
use crate::layout::SumLayout;

const SHAPE: &str = "(match [%dst T]? Sum %val :cases [(case V ..)..] :default ..)";

/// A payload field bound to a name inside a case body.
struct Bind<'n> {
    name: &'n str,
    offset: u64,
    ty: TypeId,
}

/// One validated arm. The default arm has no tag.
struct Arm<'n> {
    tag: Option<i32>,
    binds: Vec<Bind<'n>>,
    body: Vec<&'n Node>,
    value: Option<&'n str>,
}

impl FunctionEmitter<'_, '_> {
    pub(crate) fn lower_match(&mut self, items: &[Node]) -> Handled {
        let (result, base) = match items.get(1) {
            Some(dst) if is_local_ref(dst) => {
                let name = local_name(dst).ok_or(ProblemKind::Malformed(SHAPE))?;
                let ty = self.lower(items.get(2).ok_or(ProblemKind::Malformed(SHAPE))?)?;
                (Some((name, ty)), 3)
            }
            _ => (None, 1),
        };
        let sum_name = items
            .get(base)
            .and_then(Node::as_name)
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let scrutinee = items.get(base + 1).ok_or(ProblemKind::Malformed(SHAPE))?;
        let args = KeywordArgs::parse(items.get(base + 2..).unwrap_or_default());
        let env = self.env;
        let layout = env
            .layouts
            .sum(sum_name)
            .ok_or_else(|| ProblemKind::UnknownLayout(sum_name.to_owned()))?;

        let mut arms = Vec::new();
        for case in args.vector("cases").unwrap_or_default() {
            if let Some(arm) = self.case_arm(layout, sum_name, case)? {
                arms.push(arm);
            }
        }
        let default = args.get("default").map(default_arm).transpose()?;

        let val = self.value_of(scrutinee)?;
        let val_ty = self.b.type_of(val);
        let expected = self.b.types_mut().ptr(layout.ty);
        if val_ty != expected {
            return Err(self.mismatch("match scrutinee", expected, val_ty));
        }
        let tag_addr = self
            .b
            .struct_gep(val, 0, "match.tag.addr")
            .ok_or_else(|| ProblemKind::UnknownLayout(sum_name.to_owned()))?;
        let tag = self
            .b
            .load(tag_addr, "match.tag")
            .ok_or_else(|| ProblemKind::UnknownLayout(sum_name.to_owned()))?;

        let n = self.cx.next_id();
        let tests: Vec<BlockId> = (0..arms.len())
            .map(|i| self.b.append_block(&format!("match.case.{i}.{n}")))
            .collect();
        let bodies: Vec<BlockId> = (0..arms.len())
            .map(|i| self.b.append_block(&format!("match.body.{i}.{n}")))
            .collect();
        let default_bb = default
            .as_ref()
            .map(|_| self.b.append_block(&format!("match.default.{n}")));
        let end_bb = self.b.append_block(&format!("match.end.{n}"));
        let no_match = default_bb.unwrap_or(end_bb);

        let mut no_match_from = self.b.current_block();
        self.b.br(tests.first().copied().unwrap_or(no_match));

        let mut incoming = Vec::new();
        for (i, arm) in arms.iter().enumerate() {
            self.b.position_at_end(tests[i]);
            let expected = self.b.const_i32(arm.tag.unwrap_or_default());
            let hit = self.b.icmp(IntPredicate::Eq, tag, expected, "match.cmp");
            self.b.cond_br(hit, bodies[i], tests.get(i + 1).copied().unwrap_or(no_match));
            no_match_from = Some(tests[i]);

            self.b.position_at_end(bodies[i]);
            if let Err(kind) = self.bind_payload(val, &arm.binds) {
                self.report("match", kind);
            }
            self.finish_arm(arm, end_bb, result, &mut incoming);
        }
        if let (Some(block), Some(arm)) = (default_bb, &default) {
            self.b.position_at_end(block);
            self.finish_arm(arm, end_bb, result, &mut incoming);
        }

        self.b.position_at_end(end_bb);
        let Some((dst, ty)) = result else {
            return Ok(());
        };
        if default.is_none() {
            if let Some(from) = no_match_from {
                let undef = self.b.const_undef(ty);
                incoming.push((PhiSource::Value(undef), self.b.block_name(from)));
            }
        }
        let phi = self.b.phi_at_start(end_bb, ty, dst);
        self.cx.phis.push(PendingPhi {
            dst: dst.to_owned(),
            ty,
            incoming,
            phi,
        });
        self.define(dst, phi, ty)
    }

    /// Validate a `case`. Unknown variants are reported and skipped.
    fn case_arm<'n>(
        &mut self,
        layout: &SumLayout,
        sum_name: &str,
        case: &'n Node,
    ) -> Result<Option<Arm<'n>>, ProblemKind> {
        let items = case
            .as_list()
            .filter(|_| case.head() == Some("case"))
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let variant_name = items
            .get(1)
            .and_then(Node::as_name)
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let Some(variant) = layout.variant(variant_name) else {
            self.report(
                "match",
                ProblemKind::UnknownLayout(format!("{sum_name}.{variant_name}")),
            );
            return Ok(None);
        };

        let (bind_forms, body, value) = match &items[2..] {
            [body] => {
                let body = body.as_vector().ok_or(ProblemKind::Malformed(SHAPE))?;
                let (body, value) = body_and_value(body);
                (&[][..], body, value)
            }
            rest => {
                let args = KeywordArgs::parse(rest);
                let (body, value) = body_and_value(args.vector("body").unwrap_or_default());
                (
                    args.vector("binds").unwrap_or_default(),
                    body,
                    args.name("value").or(value),
                )
            }
        };

        let mut binds = Vec::with_capacity(bind_forms.len());
        for bind in bind_forms {
            let Some([head, name, index]) = bind.as_list() else {
                return Err(ProblemKind::Malformed("(bind %n idx)"));
            };
            let (Some("bind"), Some(name), Some(index)) = (
                head.as_symbol(),
                local_name(name),
                index.as_int().and_then(|i| usize::try_from(i).ok()),
            ) else {
                return Err(ProblemKind::Malformed("(bind %n idx)"));
            };
            let (offset, ty) = variant
                .field_offset(index, self.b.types())
                .ok_or_else(|| {
                    ProblemKind::UnknownLayout(format!("{sum_name}.{variant_name}.{index}"))
                })?;
            binds.push(Bind { name, offset, ty });
        }
        Ok(Some(Arm {
            tag: Some(variant.tag),
            binds,
            body,
            value,
        }))
    }

    /// Load each bound payload field and define its name.
    fn bind_payload(&mut self, val: ValueId, binds: &[Bind<'_>]) -> Handled {
        if binds.is_empty() {
            return Ok(());
        }
        let payload = self
            .b
            .struct_gep(val, 1, "match.payload.addr")
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        for bind in binds {
            let raw = self
                .b
                .byte_gep(payload, bind.offset, &format!("{}.raw", bind.name))
                .ok_or(ProblemKind::Malformed(SHAPE))?;
            let ptr_ty = self.b.types_mut().ptr(bind.ty);
            let ptr = self.b.bitcast(raw, ptr_ty, &format!("{}.ptr", bind.name));
            let field = self
                .b
                .load(ptr, bind.name)
                .ok_or(ProblemKind::Malformed(SHAPE))?;
            self.define(bind.name, field, bind.ty)?;
        }
        Ok(())
    }

    /// Emit an arm body. If it falls through, record its phi edge and
    /// branch to the merge block.
    fn finish_arm(
        &mut self,
        arm: &Arm<'_>,
        end_bb: BlockId,
        result: Option<(&str, TypeId)>,
        incoming: &mut Vec<(PhiSource, String)>,
    ) {
        self.emit_seq(arm.body.iter().copied());
        let Some(exit) = self.b.current_block().filter(|_| !self.b.is_terminated()) else {
            return;
        };
        if let Some((_, ty)) = result {
            let value = match arm.value.map(|name| (name, self.get_value(name))) {
                Some((_, Some(value))) => value,
                Some((name, None)) => {
                    self.report("match", ProblemKind::Unresolved(name.to_owned()));
                    self.b.const_undef(ty)
                }
                None => self.b.const_undef(ty),
            };
            incoming.push((PhiSource::Value(value), self.b.block_name(exit)));
        }
        self.b.br(end_bb);
    }
}

/// `[body.. :value %v]` or `(default :body [..] :value %v)`.
fn default_arm(node: &Node) -> Result<Arm<'_>, ProblemKind> {
    let (body, value) = if let Some(items) = node.as_vector() {
        body_and_value(items)
    } else if node.head() == Some("default") {
        let items = node.as_list().unwrap_or_default();
        let args = KeywordArgs::parse(&items[1..]);
        let (body, value) = body_and_value(args.vector("body").unwrap_or_default());
        (body, args.name("value").or(value))
    } else {
        return Err(ProblemKind::Malformed(SHAPE));
    };
    Ok(Arm {
        tag: None,
        binds: Vec::new(),
        body,
        value,
    })
}
