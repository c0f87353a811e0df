use edn_backend::Context;
use pretty_assertions::assert_eq;

use super::helper::{assert_verifies, block_body, block_names, body_text, emit_fn};

#[test]
fn if_else_shares_one_merge_block() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(lt %c i32 %x %y)
          (if %c [(add %a i32 %x 1)] [(add %b i32 %y 1)])
          (ret i32 %x)]",
    );
    assert_eq!(
        block_names(&session, "f"),
        ["entry", "if.then.0", "if.else.0", "if.end.0"]
    );
    let text = body_text(&session);
    assert!(
        text.contains("br i1 %c.re, label %if.then.0, label %if.else.0"),
        "{text}"
    );
    assert_eq!(block_body(&text, "if.then.0").lines().last(), Some("  br label %if.end.0"));
    assert_eq!(block_body(&text, "if.else.0").lines().last(), Some("  br label %if.end.0"));
    assert_verifies(&session);
}

#[test]
fn if_without_else_branches_to_the_merge_block() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(lt %c i32 %x %y) (if %c [(ret i32 %y)]) (ret i32 %x)]",
    );
    let text = body_text(&session);
    assert!(
        text.contains("br i1 %c.re, label %if.then.0, label %if.end.0"),
        "{text}"
    );
    assert_eq!(block_body(&text, "if.then.0"), "  ret i32 %y");
    assert_eq!(block_body(&text, "if.end.0"), "  ret i32 %x");
    assert_verifies(&session);
}

#[test]
fn arms_that_return_leave_an_empty_merge_for_the_implicit_return() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(lt %c i32 %x %y) (if %c [(ret i32 1)] [(ret i32 2)])]",
    );
    let text = body_text(&session);
    assert_eq!(block_body(&text, "if.end.0"), "  ret i32 0");
    assert_verifies(&session);
}

#[test]
fn nested_breaks_leave_their_own_loop() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(while true [(while true [(break)]) (break)]) (ret i32 0)]",
    );
    let text = body_text(&session);
    assert_eq!(block_body(&text, "while.body.1"), "  br label %while.end.1");
    assert_eq!(block_body(&text, "while.end.1"), "  br label %while.end.0");
    assert_eq!(block_body(&text, "while.end.0"), "  ret i32 0");
    assert_verifies(&session);
}

#[test]
fn loop_condition_reads_the_slot_each_iteration() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(as %i i32 0)
          (lt %c i32 %i %x)
          (while %c [(add %n i32 %i 1) (assign %i %n)])
          (ret i32 %i)]",
    );
    let text = body_text(&session);
    let cond = block_body(&text, "while.cond.0");
    assert!(cond.contains("load i32, ptr %i.slot"), "{text}");
    assert!(cond.contains("%c.re = icmp slt i32"), "{text}");
    assert!(
        block_body(&text, "while.body.0").contains("store i32 %n, ptr %i.slot"),
        "{text}"
    );
    assert!(
        block_body(&text, "while.end.0").contains("load i32, ptr %i.slot"),
        "{text}"
    );
    assert_verifies(&session);
}

#[test]
fn continue_goes_to_the_step_block() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "void",
        "[(for :init [(as %i i32 0)]
               :cond %more
               :step [(add %n i32 %i 1) (assign %i %n)]
               :body [(continue)])]",
    );
    // `%more` is never defined: the condition exits the loop.
    assert_eq!(session.problems().len(), 1);
    let text = body_text(&session);
    assert_eq!(block_body(&text, "for.cond.0"), "  br label %for.end.0");
    assert_eq!(block_body(&text, "for.body.0"), "  br label %for.step.0");
    assert!(block_body(&text, "for.step.0").ends_with("br label %for.cond.0"), "{text}");
    assert_verifies(&session);
}

#[test]
fn switch_tests_cases_in_order() {
    let ctx = Context::create();
    let session = emit_fn(
        &ctx,
        "i32",
        "[(switch %x :cases [(case 1 [(ret i32 10)]) (case 2 [(ret i32 20)])]
                     :default [(ret i32 0)])]",
    );
    let text = body_text(&session);
    assert_eq!(block_body(&text, "entry"), "  br label %switch.case.1.0");
    let first = block_body(&text, "switch.case.1.0");
    assert!(first.contains("%switch.cmp = icmp eq i32 %x, 1"), "{text}");
    assert!(
        first.contains("label %switch.body.1.0, label %switch.case.2.0"),
        "{text}"
    );
    assert!(
        block_body(&text, "switch.case.2.0").contains("label %switch.body.2.0, label %switch.default.0"),
        "{text}"
    );
    assert_verifies(&session);
}

#[test]
fn break_outside_a_loop_is_ignored() {
    let ctx = Context::create();
    let session = emit_fn(&ctx, "void", "[(break) (ret)]");
    assert!(session.problems().is_empty());
    assert_eq!(block_body(&body_text(&session), "entry"), "  ret void");
}
