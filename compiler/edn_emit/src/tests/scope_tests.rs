use edn_backend::Context;
use crate::error::ProblemKind;

use super::helper::{assert_verifies, block_body, body_text, emit_fn};

#[test]
fn leaving_a_block_restores_the_outer_variable() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(as %v i32 1)
          (block :locals [(local i32 %v)]
                 :body [(const %two i32 2) (assign %v %two)])
          (ret i32 %v)]",
    );
    assert!(session.problems().is_empty(), "{:?}", session.problems());
    let text = body_text(&session);
    let entry = block_body(&text, "entry");
    assert!(entry.contains("%v.slot = alloca i32"), "{text}");
    assert!(entry.contains("%v.slot1 = alloca i32"), "{text}");
    assert!(entry.contains("store i32 1, ptr %v.slot\n"), "{text}");
    assert!(entry.contains("store i32 2, ptr %v.slot1"), "{text}");

    let lines: Vec<&str> = entry.lines().collect();
    let ret = lines.iter().position(|l| l.contains("ret i32")).unwrap();
    assert!(lines[ret - 1].ends_with("load i32, ptr %v.slot"), "{text}");
    assert_verifies(&session);
}

#[test]
fn block_without_locals_shares_the_enclosing_scope() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(as %v i32 1) (block [(assign %v %y)]) (ret i32 %v)]",
    );
    let text = body_text(&session);
    assert!(!text.contains("%v.slot1"), "{text}");
    assert!(text.contains("store i32 %y, ptr %v.slot"), "{text}");
}

#[test]
fn redefined_names_are_slot_backed() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(add %t i32 %x 1) (add %t i32 %t %y) (ret i32 %t)]",
    );
    let text = body_text(&session);
    assert!(text.contains("%t.slot = alloca i32"), "{text}");
    assert!(text.contains("%t1 = load i32, ptr %t.slot"), "{text}");
    assert!(text.contains("%t2 = add i32 %t1, %y"), "{text}");
    assert!(text.contains("store i32 %t2, ptr %t.slot"), "{text}");
    assert_verifies(&session);
}

#[test]
fn assigned_parameters_are_spilled_on_entry() {
    let ctx = Context::create();
    let session = emit_fn(&ctx, "i32", "[(assign %x %y) (ret i32 %x)]");
    let text = body_text(&session);
    let entry = block_body(&text, "entry");
    assert!(entry.contains("%x.slot = alloca i32"), "{text}");
    assert!(entry.contains("store i32 %x, ptr %x.slot"), "{text}");
    assert!(entry.contains("store i32 %y, ptr %x.slot"), "{text}");
}

#[test]
fn slots_first_created_in_a_block_end_with_it() {
    let ctx = Context::create();
    let session = emit_fn(&ctx, "i32", "[(block [(assign %t %x)]) (ret i32 %t)]");
    let problems = session.problems();
    assert_eq!(problems.len(), 1, "{problems:?}");
    assert_eq!(problems[0].op, "ret");
    assert_eq!(problems[0].kind, ProblemKind::Unresolved("t".to_owned()));
}
