use pretty_assertions::assert_eq;

use super::*;

fn ids(n: u32) -> (ValueId, TypeId) {
    (ValueId::new(n), TypeId::new(n))
}

// === Shadowing ===

#[test]
fn leaving_a_scope_restores_the_outer_slot() {
    let mut cx = EmissionContext::default();
    let (outer, outer_ty) = ids(1);
    let (inner, inner_ty) = ids(2);
    cx.push_scoped_slot("x", outer, outer_ty);

    let depth = cx.enter_scope();
    cx.push_scoped_slot("x", inner, inner_ty);
    assert_eq!(cx.slot("x"), Some(inner));
    assert_eq!(cx.slot_at_current_depth("x"), Some(inner));

    cx.unwind_scope(depth);
    assert_eq!(cx.slot("x"), Some(outer));
    assert_eq!(cx.type_of("x"), Some(outer_ty));
    assert_eq!(cx.depth(), 0);
}

#[test]
fn scope_locals_disappear_on_exit() {
    let mut cx = EmissionContext::default();
    let (slot, ty) = ids(3);
    let depth = cx.enter_scope();
    cx.push_scoped_slot("tmp", slot, ty);
    cx.bind_value("tmp", slot, ty);
    cx.unwind_scope(depth);
    assert_eq!(cx.slot("tmp"), None);
    assert_eq!(cx.value("tmp"), None);
}

#[test]
fn outer_slots_survive_nested_scopes() {
    let mut cx = EmissionContext::default();
    let (slot, ty) = ids(4);
    cx.push_scoped_slot("acc", slot, ty);
    let depth = cx.enter_scope();
    let inner = cx.enter_scope();
    assert_eq!(cx.slot_at_current_depth("acc"), None);
    cx.unwind_scope(inner);
    cx.unwind_scope(depth);
    assert_eq!(cx.slot("acc"), Some(slot));
}

#[test]
fn slots_pushed_in_a_nested_scope_are_dropped_with_it() {
    let mut cx = EmissionContext::default();
    let (slot, ty) = ids(8);
    let depth = cx.enter_scope();
    cx.push_scoped_slot("t", slot, ty);
    assert_eq!(cx.slot_at_current_depth("t"), Some(slot));
    cx.unwind_scope(depth);
    assert_eq!(cx.slot("t"), None);
    assert_eq!(cx.type_of("t"), None);
}

#[test]
fn unwinding_several_levels_at_once() {
    let mut cx = EmissionContext::default();
    let (a, ty) = ids(5);
    let (b, _) = ids(6);
    let (c, _) = ids(7);
    cx.push_scoped_slot("v", a, ty);
    let top = cx.enter_scope();
    cx.push_scoped_slot("v", b, ty);
    cx.enter_scope();
    cx.push_scoped_slot("v", c, ty);
    cx.unwind_scope(top);
    assert_eq!(cx.slot("v"), Some(a));
}

// === Bookkeeping ===

#[test]
fn loops_nest() {
    let mut cx = EmissionContext::default();
    cx.push_loop(BlockId::new(1), BlockId::new(2));
    cx.push_loop(BlockId::new(3), BlockId::new(4));
    assert_eq!(cx.innermost_loop().map(|l| l.break_to), Some(BlockId::new(3)));
    cx.pop_loop();
    assert_eq!(cx.innermost_loop().map(|l| l.continue_to), Some(BlockId::new(2)));
    cx.pop_loop();
    assert_eq!(cx.innermost_loop(), None);
}

#[test]
fn construct_ids_count_up() {
    let mut cx = EmissionContext::default();
    assert_eq!(cx.next_id(), 0);
    assert_eq!(cx.next_id(), 1);
}

#[test]
fn aliases_and_mutability() {
    let mut cx = EmissionContext::new(["x".to_owned()].into_iter().collect());
    cx.set_alias("init", "x");
    assert_eq!(cx.alias_of("init"), Some("x"));
    assert!(cx.is_mutable("x"));
    assert!(!cx.is_mutable("init"));
}
