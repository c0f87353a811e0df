//! Structured control flow.
//!
//! Every construct takes one number from [`EmissionContext::next_id`] and
//! suffixes all of its blocks with it (`if.then.3`, `if.end.3`), so the
//! blocks of one construct are easy to pick out of the printed IR.
//! Every construct leaves the builder positioned at its single exit block.
//!
//! [`EmissionContext::next_id`]: crate::context::EmissionContext::next_id

use edn_backend::{BlockId, IntPredicate, ValueId};
use edn_ir::{Node, NodeKind};
use tracing::debug;

use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, local_name, vector_at, KeywordArgs};

impl FunctionEmitter<'_, '_> {
    /// An `i1` branch condition: a `%name` or a boolean literal.
    ///
    /// Slot-backed names are loaded; compares and bitwise ops are
    /// re-evaluated where the branch is; wider integers are tested
    /// against zero.
    pub(crate) fn condition(&mut self, node: &Node) -> Result<ValueId, ProblemKind> {
        if let NodeKind::Bool(value) = node.kind() {
            return Ok(self.b.const_bool(*value));
        }
        let name = local_name(node).ok_or(ProblemKind::Malformed("%condition"))?;
        let value = if self.cx.slot(name).is_some() {
            self.get_value(name)
        } else {
            self.eval_defined(name).or_else(|| self.get_value(name))
        }
        .ok_or_else(|| ProblemKind::Unresolved(name.to_owned()))?;

        let ty = self.b.type_of(value);
        match self.b.types().int_width(ty) {
            Some(1) => Ok(value),
            Some(_) => {
                let zero = self.b.const_int(ty, 0);
                Ok(self.b.icmp(IntPredicate::Ne, value, zero, &format!("{name}.bool")))
            }
            None => Err(ProblemKind::TypeMismatch(format!(
                "condition `{name}` is {}",
                self.show(ty)
            ))),
        }
    }

    /// Emit `body` into `block`, then branch to `next` unless terminated.
    pub(crate) fn emit_arm<'n>(
        &mut self,
        block: BlockId,
        body: impl IntoIterator<Item = &'n Node>,
        next: BlockId,
    ) {
        self.b.position_at_end(block);
        self.emit_seq(body);
        if !self.b.is_terminated() {
            self.b.br(next);
        }
    }

    /// `(if %c [then] [else]?)`
    pub(crate) fn lower_if(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(if %c [then] [else]?)";
        if !(3..=4).contains(&items.len()) {
            return Err(ProblemKind::Malformed(SHAPE));
        }
        let then_body = vector_at(items, 2, SHAPE)?;
        let else_body = match items.get(3) {
            Some(_) => Some(vector_at(items, 3, SHAPE)?),
            None => None,
        };
        let cond = self.condition(&items[1])?;

        let n = self.cx.next_id();
        let then_bb = self.b.append_block(&format!("if.then.{n}"));
        let else_bb = else_body.map(|_| self.b.append_block(&format!("if.else.{n}")));
        let end_bb = self.b.append_block(&format!("if.end.{n}"));
        self.b.cond_br(cond, then_bb, else_bb.unwrap_or(end_bb));

        self.emit_arm(then_bb, then_body, end_bb);
        if let (Some(block), Some(body)) = (else_bb, else_body) {
            self.emit_arm(block, body, end_bb);
        }
        self.b.position_at_end(end_bb);
        Ok(())
    }

    /// `(while %c [body])`
    pub(crate) fn lower_while(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(while %c [body])";
        expect_len(items, 3, SHAPE)?;
        let body = vector_at(items, 2, SHAPE)?;

        let n = self.cx.next_id();
        let cond_bb = self.b.append_block(&format!("while.cond.{n}"));
        let body_bb = self.b.append_block(&format!("while.body.{n}"));
        let end_bb = self.b.append_block(&format!("while.end.{n}"));
        self.b.br(cond_bb);

        self.b.position_at_end(cond_bb);
        self.branch_on(&items[1], body_bb, end_bb);

        self.cx.push_loop(end_bb, cond_bb);
        self.emit_arm(body_bb, body, cond_bb);
        self.cx.pop_loop();

        self.b.position_at_end(end_bb);
        Ok(())
    }

    /// `(for :init [..] :cond %c :step [..] :body [..])`. A missing
    /// condition loops until `break`.
    pub(crate) fn lower_for(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(for :init [..] :cond %c :step [..] :body [..])";
        let args = KeywordArgs::parse(&items[1..]);
        let body = args.vector("body").ok_or(ProblemKind::Malformed(SHAPE))?;

        let n = self.cx.next_id();
        self.emit_seq(args.vector("init").unwrap_or_default());
        if self.b.is_terminated() {
            return Ok(());
        }
        let cond_bb = self.b.append_block(&format!("for.cond.{n}"));
        let body_bb = self.b.append_block(&format!("for.body.{n}"));
        let step_bb = self.b.append_block(&format!("for.step.{n}"));
        let end_bb = self.b.append_block(&format!("for.end.{n}"));
        self.b.br(cond_bb);

        self.b.position_at_end(cond_bb);
        match args.get("cond") {
            Some(cond) => self.branch_on(cond, body_bb, end_bb),
            None => self.b.br(body_bb),
        }

        self.cx.push_loop(end_bb, step_bb);
        self.emit_arm(body_bb, body, step_bb);
        self.cx.pop_loop();

        self.emit_arm(step_bb, args.vector("step").unwrap_or_default(), cond_bb);
        self.b.position_at_end(end_bb);
        Ok(())
    }

    /// Conditional branch on a loop condition. An unresolvable condition
    /// exits the loop and is reported.
    fn branch_on(&mut self, cond: &Node, then_bb: BlockId, else_bb: BlockId) {
        match self.condition(cond) {
            Ok(value) => self.b.cond_br(value, then_bb, else_bb),
            Err(kind) => {
                self.report("loop condition", kind);
                self.b.br(else_bb);
            }
        }
    }

    /// `(switch %x :cases [(case <int> [..])..] :default [..]?)`
    pub(crate) fn lower_switch(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(switch %x :cases [(case <int> [..])..] :default [..]?)";
        if items.len() < 2 {
            return Err(ProblemKind::Malformed(SHAPE));
        }
        let args = KeywordArgs::parse(&items[2..]);
        let cases = args
            .vector("cases")
            .ok_or(ProblemKind::Malformed(SHAPE))?
            .iter()
            .map(|case| match case.as_list() {
                Some([head, value, body]) if head.as_symbol() == Some("case") => {
                    Some((value.as_int()?, body.as_vector()?))
                }
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let default = args.vector("default");
        let scrutinee = self.value_of(&items[1])?;
        let ty = self.b.type_of(scrutinee);
        if !self.b.types().is_int(ty) {
            return Err(ProblemKind::TypeMismatch(format!(
                "switch on {}",
                self.show(ty)
            )));
        }

        let n = self.cx.next_id();
        let arms: Vec<(BlockId, BlockId)> = cases
            .iter()
            .map(|(value, _)| {
                let test = self.b.append_block(&format!("switch.case.{value}.{n}"));
                let body = self.b.append_block(&format!("switch.body.{value}.{n}"));
                (test, body)
            })
            .collect();
        let default_bb = default.map(|_| self.b.append_block(&format!("switch.default.{n}")));
        let end_bb = self.b.append_block(&format!("switch.end.{n}"));
        let no_match = default_bb.unwrap_or(end_bb);
        self.b.br(arms.first().map_or(no_match, |(test, _)| *test));

        for (index, ((value, body), (test_bb, body_bb))) in cases.iter().zip(&arms).enumerate() {
            self.b.position_at_end(*test_bb);
            let expected = self.b.const_int(ty, *value);
            let hit = self.b.icmp(IntPredicate::Eq, scrutinee, expected, "switch.cmp");
            let next = arms.get(index + 1).map_or(no_match, |(test, _)| *test);
            self.b.cond_br(hit, *body_bb, next);
            self.emit_arm(*body_bb, *body, end_bb);
        }
        if let (Some(block), Some(body)) = (default_bb, default) {
            self.emit_arm(block, body, end_bb);
        }
        self.b.position_at_end(end_bb);
        Ok(())
    }

    /// `(break)`. Outside a loop it does nothing.
    pub(crate) fn lower_break(&mut self, items: &[Node]) -> Handled {
        expect_len(items, 1, "(break)")?;
        if let Some(targets) = self.cx.innermost_loop() {
            self.b.br(targets.break_to);
        }
        Ok(())
    }

    /// `(continue)`. Outside a loop it does nothing.
    pub(crate) fn lower_continue(&mut self, items: &[Node]) -> Handled {
        expect_len(items, 1, "(continue)")?;
        if let Some(targets) = self.cx.innermost_loop() {
            self.b.br(targets.continue_to);
        }
        Ok(())
    }

    /// `(block [body])` or `(block :locals [(local T %n)..] :body [..])`.
    pub(crate) fn lower_block(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(block :locals [(local T %n)..] :body [..])";
        let (locals, body) = match items {
            [_, body] if body.as_vector().is_some() => (&[][..], vector_at(items, 1, SHAPE)?),
            _ => {
                let args = KeywordArgs::parse(&items[1..]);
                (
                    args.vector("locals").unwrap_or_default(),
                    args.vector("body").ok_or(ProblemKind::Malformed(SHAPE))?,
                )
            }
        };
        let mut declared = Vec::with_capacity(locals.len());
        for local in locals {
            match local.as_list() {
                Some([head, ty, name]) if head.as_symbol() == Some("local") => {
                    let name = local_name(name).ok_or(ProblemKind::Malformed(SHAPE))?;
                    declared.push((name, self.lower(ty)?));
                }
                _ => return Err(ProblemKind::Malformed(SHAPE)),
            }
        }

        let outer = self.cx.enter_scope();
        for (name, ty) in declared {
            self.declare_slot(name, ty);
        }
        debug!(depth = self.cx.depth(), locals = locals.len(), "enter block");
        self.emit_seq(body);
        self.cx.unwind_scope(outer);
        Ok(())
    }
}
