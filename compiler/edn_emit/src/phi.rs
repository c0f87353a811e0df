//! Explicit `phi` forms and deferred phi wiring.
//!
//! A phi is placed, empty, at the start of its block as soon as it is
//! seen, so later instructions can use it. Its incoming edges name
//! predecessor blocks that may not exist yet; they are wired by
//! [`FunctionEmitter::finalize_phis`] once the whole body is emitted.

use edn_ir::Node;
use tracing::debug;

use crate::context::{PendingPhi, PhiSource};
use crate::emitter::{FunctionEmitter, Handled};
use crate::error::ProblemKind;
use crate::forms::{expect_len, is_local_ref, local_name, name_at, vector_at};

impl FunctionEmitter<'_, '_> {
    /// `(phi %dst T [(%v label)..])`
    pub(crate) fn lower_phi(&mut self, items: &[Node]) -> Handled {
        const SHAPE: &str = "(phi %dst T [(%v label)..])";
        expect_len(items, 4, SHAPE)?;
        let dst = name_at(items, 1, SHAPE)?;
        let ty = self.lower(&items[2])?;
        let mut incoming = Vec::new();
        for edge in vector_at(items, 3, SHAPE)? {
            let Some([value, label]) = edge.as_list() else {
                return Err(ProblemKind::Malformed(SHAPE));
            };
            let label = label.as_name().ok_or(ProblemKind::Malformed(SHAPE))?;
            let source = match local_name(value).filter(|_| is_local_ref(value)) {
                Some(name) => PhiSource::Named(name.to_owned()),
                None => PhiSource::Value(self.operand(value, ty)?),
            };
            incoming.push((source, label.to_owned()));
        }
        let block = self
            .b
            .current_block()
            .ok_or_else(|| ProblemKind::Unresolved(dst.to_owned()))?;
        let phi = self.b.phi_at_start(block, ty, dst);
        self.cx.phis.push(PendingPhi {
            dst: dst.to_owned(),
            ty,
            incoming,
            phi,
        });
        self.define(dst, phi, ty)
    }

    /// Wire the incoming edges of every pending phi.
    ///
    /// Named values are resolved at the end of their predecessor, ahead
    /// of its terminator, so slot-backed names read the value that block
    /// leaves behind. Edges from unknown blocks are dropped; values that
    /// cannot be resolved become `undef` and are reported.
    pub(crate) fn finalize_phis(&mut self) {
        for pending in std::mem::take(&mut self.cx.phis) {
            for (source, label) in pending.incoming {
                let Some(pred) = self.b.find_block(&label) else {
                    debug!(dst = %pending.dst, %label, "phi predecessor not found");
                    continue;
                };
                let value = match source {
                    PhiSource::Value(value) => Ok(value),
                    PhiSource::Named(name) => {
                        let point = self.b.save();
                        self.b.position_before_terminator(pred);
                        let value = self.get_value(&name);
                        self.b.restore(point);
                        value.ok_or(ProblemKind::Unresolved(name))
                    }
                };
                let value = value.and_then(|v| {
                    let found = self.b.type_of(v);
                    if found == pending.ty {
                        Ok(v)
                    } else {
                        Err(self.mismatch(&format!("phi `{}`", pending.dst), pending.ty, found))
                    }
                });
                let value = value.unwrap_or_else(|kind| {
                    self.report("phi", kind);
                    self.b.const_undef(pending.ty)
                });
                self.b.add_incoming(pending.phi, value, pred);
            }
        }
    }
}
