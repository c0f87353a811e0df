use edn_backend::Context;
use pretty_assertions::assert_eq;

use super::helper::{assert_verifies, block_body, body_text, emit_source};
use crate::error::ProblemKind;
use crate::{EmitConfig, Session};

fn emit_match<'ctx>(ctx: &'ctx Context, body: &str) -> Session<'ctx> {
    emit_source(
        ctx,
        &format!(
            "(module :id \"t\"
               (sum :name Opt :variants [(variant :name None :fields [])
                                         (variant :name Some :fields [i32])])
               (fn :name f :ret i32 :params [(param (ptr Opt) %o)] :body {body}))"
        ),
        EmitConfig::default(),
    )
}

fn phi_line(text: &str) -> &str {
    text.lines().find(|l| l.contains(" = phi ")).unwrap().trim()
}

#[test]
fn missing_default_adds_an_undef_edge() {
    let ctx = Context::create();
    let session = emit_match(
        &ctx,
        "[(match %r i32 Opt %o
            :cases [(case Some :binds [(bind %v 0)] :body [(add %w i32 %v 1) :value %w])
                    (case None [(const %z i32 0) :value %z])])
          (ret i32 %r)]",
    );
    assert!(session.problems().is_empty(), "{:?}", session.problems());
    let text = body_text(&session);
    assert_eq!(
        phi_line(&text),
        "%r = phi i32 [ %w, %match.body.0.0 ], [ 0, %match.body.1.0 ], [ undef, %match.case.1.0 ]"
    );
    assert!(text.contains("%v = load i32, ptr %v.raw"), "{text}");
    assert_verifies(&session);
}

#[test]
fn default_arm_replaces_the_undef_edge() {
    let ctx = Context::create();
    let session = emit_match(
        &ctx,
        "[(match %r i32 Opt %o
            :cases [(case Some :binds [(bind %v 0)] :body [:value %v])]
            :default [(const %d i32 7) :value %d])
          (ret i32 %r)]",
    );
    let text = body_text(&session);
    assert_eq!(
        phi_line(&text),
        "%r = phi i32 [ %v, %match.body.0.0 ], [ 7, %match.default.0 ]"
    );
    assert_verifies(&session);
}

#[test]
fn returning_arms_contribute_no_edge() {
    let ctx = Context::create();
    let session = emit_match(
        &ctx,
        "[(match %r i32 Opt %o
            :cases [(case Some [(ret i32 1)])
                    (case None [(const %z i32 0) :value %z])]
            :default [(const %d i32 7) :value %d])
          (ret i32 %r)]",
    );
    let text = body_text(&session);
    assert_eq!(
        phi_line(&text),
        "%r = phi i32 [ 0, %match.body.1.0 ], [ 7, %match.default.0 ]"
    );
    assert_verifies(&session);
}

#[test]
fn arm_without_a_value_contributes_undef() {
    let ctx = Context::create();
    let session = emit_match(
        &ctx,
        "[(match %r i32 Opt %o :cases [(case None [])] :default [(const %d i32 7) :value %d])
          (ret i32 %r)]",
    );
    let text = body_text(&session);
    assert!(phi_line(&text).contains("[ undef, %match.body.0.0 ]"), "{text}");
    assert_verifies(&session);
}

#[test]
fn unknown_variant_is_skipped() {
    let ctx = Context::create();
    let session = emit_match(
        &ctx,
        "[(match Opt %o :cases [(case Many [(ret i32 1)]) (case None [(ret i32 2)])])
          (ret i32 3)]",
    );
    assert_eq!(session.problems().len(), 1);
    assert_eq!(
        session.problems()[0].kind,
        ProblemKind::UnknownLayout("Opt.Many".to_owned())
    );
    let text = body_text(&session);
    assert!(text.contains("match.case.0.0"), "{text}");
    assert!(!text.contains("match.case.1.0"), "{text}");
    assert!(!text.contains(" = phi "), "{text}");
    assert_verifies(&session);
}

#[test]
fn scrutinee_must_point_at_the_sum() {
    let ctx = Context::create();
    let session = emit_source(
        &ctx,
        "(module :id \"t\"
           (sum :name Opt :variants [(variant :name None :fields [])])
           (fn :name f :ret i32 :params [(param i32 %o)]
             :body [(match Opt %o :cases [(case None [(ret i32 1)])]) (ret i32 0)]))",
        EmitConfig::default(),
    );
    assert!(matches!(session.problems()[0].kind, ProblemKind::TypeMismatch(_)));
}

// === Arms binding the same name ===

const PAIR: &str = "(sum :name Pair :variants [(variant :name L :fields [i32])
                                               (variant :name R :fields [i64 i32])])";

fn emit_pair<'ctx>(ctx: &'ctx Context, body: &str) -> Session<'ctx> {
    emit_source(
        ctx,
        &format!(
            "(module :id \"t\" {PAIR}
               (fn :name f :ret i32 :params [(param (ptr Pair) %p)] :body {body}))"
        ),
        EmitConfig::default(),
    )
}

/// `(value, block)` pairs of a printed phi.
fn phi_edges(phi: &str) -> Vec<(String, String)> {
    phi.split('[')
        .skip(1)
        .map(|edge| {
            let edge = edge.trim_end_matches([']', ',', ' ']);
            let (value, block) = edge.split_once(", %").unwrap();
            (value.trim().to_owned(), block.trim().to_owned())
        })
        .collect()
}

/// True if `value` is assigned by an instruction in block `label`.
fn defined_in(text: &str, label: &str, value: &str) -> bool {
    block_body(text, label)
        .lines()
        .any(|l| l.trim_start().starts_with(&format!("{value} = ")))
}

#[test]
fn each_edge_carries_its_own_arms_bind() {
    let ctx = Context::create();
    let session = emit_pair(
        &ctx,
        "[(match %r i32 Pair %p
            :cases [(case L :binds [(bind %v 0)] :body [:value %v])
                    (case R :binds [(bind %v 1)] :body [:value %v])]
            :default [(const %d i32 7) :value %d])
          (ret i32 %r)]",
    );
    assert!(session.problems().is_empty(), "{:?}", session.problems());
    let text = body_text(&session);
    let edges = phi_edges(phi_line(&text));
    assert_eq!(edges.len(), 3, "{text}");
    let (left, right) = (&edges[0], &edges[1]);
    assert_eq!(left.1, "match.body.0.0");
    assert_eq!(right.1, "match.body.1.0");
    assert_ne!(left.0, right.0, "{text}");
    assert!(defined_in(&text, &left.1, &left.0), "{text}");
    assert!(defined_in(&text, &right.1, &right.0), "{text}");
    assert_eq!(edges[2], ("7".to_owned(), "match.default.0".to_owned()));
    assert!(text.contains("%v.slot = alloca i32"), "{text}");
    assert_verifies(&session);
}

#[test]
fn bind_at_an_offset_reads_past_the_first_field() {
    let ctx = Context::create();
    let session = emit_pair(
        &ctx,
        "[(match %r i32 Pair %p
            :cases [(case R :binds [(bind %v 1)] :body [:value %v])]
            :default [(const %d i32 7) :value %d])
          (ret i32 %r)]",
    );
    let text = body_text(&session);
    let body = block_body(&text, "match.body.0.0");
    assert!(body.contains("%v.raw = getelementptr i8, ptr "), "{text}");
    assert!(body.contains(", i64 8\n"), "{text}");
    assert!(body.contains("%v = load i32, ptr %v.raw"), "{text}");
    assert_eq!(
        phi_line(&text),
        "%r = phi i32 [ %v, %match.body.0.0 ], [ 7, %match.default.0 ]"
    );
    assert_verifies(&session);
}

#[test]
fn arm_computed_values_follow_their_own_binds() {
    let ctx = Context::create();
    let session = emit_pair(
        &ctx,
        "[(match %r i32 Pair %p
            :cases [(case L :binds [(bind %v 0)] :body [(add %w i32 %v 1) :value %w])
                    (case R :binds [(bind %v 1)] :body [(mul %w i32 %v 2) :value %w])])
          (ret i32 %r)]",
    );
    assert!(session.problems().is_empty(), "{:?}", session.problems());
    let text = body_text(&session);
    assert!(block_body(&text, "match.body.0.0").contains(" = add i32 "), "{text}");
    assert!(block_body(&text, "match.body.1.0").contains(" = mul i32 "), "{text}");
    let edges = phi_edges(phi_line(&text));
    assert_eq!(edges.len(), 3, "{text}");
    for (value, block) in &edges[..2] {
        assert!(defined_in(&text, block, value), "{value} in {block}:\n{text}");
    }
    assert_ne!(edges[0].0, edges[1].0, "{text}");
    assert_eq!(edges[2], ("undef".to_owned(), "match.case.1.0".to_owned()));
    assert_verifies(&session);
}
