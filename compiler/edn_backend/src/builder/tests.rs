use inkwell::context::Context;
use pretty_assertions::assert_eq;

use super::*;
use crate::module::Linkage;
use crate::value::{BinOp, IntPredicate};

/// Module with one `i32 (i32)` function `f`.
fn setup(module: &mut Module<'_>) -> FuncId {
    let i32 = module.types.i32();
    let fn_ty = module.types.function(i32, vec![i32], false);
    module.add_function("f", fn_ty, Linkage::External)
}

/// Index of the first line of `text` containing `needle`.
fn line_of(text: &str, needle: &str) -> usize {
    text.lines()
        .position(|l| l.contains(needle))
        .unwrap_or_else(|| panic!("`{needle}` not found in:\n{text}"))
}

// === Blocks and termination ===

#[test]
fn block_names_are_uniqued() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let a = b.append_block("if.then");
    let c = b.append_block("if.then");
    assert_eq!(b.block_name(a), "if.then");
    let second = b.block_name(c);
    assert!(second.starts_with("if.then") && second != "if.then");
    assert_eq!(b.find_block(&second), Some(c));
}

#[test]
fn terminated_tracks_last_instruction() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    let exit = b.append_block("exit");
    assert!(b.is_terminated(), "no block selected counts as terminated");
    b.position_at_end(entry);
    assert!(!b.is_terminated());
    b.br(exit);
    assert!(b.is_terminated());
}

#[test]
fn no_insertion_point_yields_undef_and_counts() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let x = b.param(0).unwrap();
    let v = b.binary(BinOp::Add, x, x, "sum");
    assert_eq!(b.detached_count(), 1);
    assert!(b.is_constant(v));
    assert!(!b.is_constant(x));
}

// === Placement ===

#[test]
fn entry_alloca_goes_after_leading_allocas() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    b.position_at_end(entry);
    let i32 = b.types_mut().i32();
    b.alloca(i32, "a");
    let x = b.param(0).unwrap();
    let sum = b.binary(BinOp::Add, x, x, "sum");
    b.entry_alloca(i32, "x.slot");
    b.ret(sum);
    drop(b);

    let text = m.print_to_string();
    assert!(line_of(&text, "%a = alloca i32") < line_of(&text, "%x.slot = alloca i32"));
    assert!(line_of(&text, "%x.slot = alloca i32") < line_of(&text, "%sum = add i32"));
    assert_eq!(m.verify(), Ok(()));
}

#[test]
fn position_before_terminator_inserts_ahead_of_branch() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    let exit = b.append_block("exit");
    b.position_at_end(entry);
    b.br(exit);
    b.position_before_terminator(entry);
    let x = b.param(0).unwrap();
    let late = b.binary(BinOp::Add, x, x, "late");
    assert!(b.is_terminated());
    b.position_at_end(exit);
    b.ret(late);
    drop(b);

    let text = m.print_to_string();
    assert!(line_of(&text, "%late = add i32") < line_of(&text, "br label %exit"));
    assert_eq!(m.verify(), Ok(()));
}

#[test]
fn restore_returns_ahead_of_the_terminator() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    let exit = b.append_block("exit");
    b.position_at_end(entry);
    b.br(exit);
    b.position_before_terminator(entry);
    let saved = b.save();
    b.position_at_end(exit);
    b.restore(saved);
    assert_eq!(b.current_block(), Some(entry));
    let x = b.param(0).unwrap();
    b.binary(BinOp::Mul, x, x, "sq");
    drop(b);

    let text = m.print_to_string();
    assert!(line_of(&text, "%sq = mul i32") < line_of(&text, "br label %exit"));
}

#[test]
fn phi_at_start_precedes_body_and_collects_edges() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    let merge = b.append_block("merge");
    b.position_at_end(entry);
    b.br(merge);
    b.position_at_end(merge);
    let x = b.param(0).unwrap();
    b.icmp(IntPredicate::Eq, x, x, "c");
    let i32 = b.types_mut().i32();
    let phi = b.phi_at_start(merge, i32, "r");
    b.add_incoming(phi, x, entry);
    b.ret(phi);
    drop(b);

    let text = m.print_to_string();
    assert!(text.contains("%r = phi i32 [ %0, %entry ]"), "{text}");
    assert!(line_of(&text, "%r = phi") < line_of(&text, "%c = icmp eq i32"));
    assert_eq!(m.verify(), Ok(()));
}

// === Typed operations ===

#[test]
fn gep_walks_struct_fields() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    b.position_at_end(entry);
    let i32 = b.types_mut().i32();
    let i8 = b.types_mut().i8();
    let payload = b.types_mut().array(i8, 8);
    let sum = b.types_mut().struct_literal(vec![i32, payload]);
    let slot = b.alloca(sum, "s");
    let tag = b.struct_gep(slot, 0, "tag").unwrap();
    let body = b.struct_gep(slot, 1, "body").unwrap();
    let i32_ptr = b.types_mut().ptr(i32);
    let payload_ptr = b.types_mut().ptr(payload);
    assert_eq!(b.type_of(tag), i32_ptr);
    assert_eq!(b.type_of(body), payload_ptr);
    let loaded = b.load(tag, "t").unwrap();
    assert_eq!(b.type_of(loaded), i32);
    drop(b);

    let text = m.print_to_string();
    assert!(text.contains("%body = getelementptr { i32, [8 x i8] }, ptr %s, i32 0, i32 1"));
}

#[test]
fn load_through_non_pointer_is_none() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    b.position_at_end(entry);
    let x = b.param(0).unwrap();
    assert!(b.load(x, "bad").is_none());
}

#[test]
fn pointer_bitcast_retypes_without_an_instruction() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    b.position_at_end(entry);
    let i32 = b.types_mut().i32();
    let slot = b.alloca(i32, "slot");
    let i8_ptr = b.types_mut().i8_ptr();
    let raw = b.bitcast(slot, i8_ptr, "raw");
    assert_ne!(raw, slot);
    assert_eq!(b.type_of(raw), i8_ptr);
    drop(b);

    assert!(!m.print_to_string().contains("%raw"));
}

#[test]
fn call_returns_callee_result_type() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    b.position_at_end(entry);
    let callee = b.function_ref(f);
    let x = b.param(0).unwrap();
    let r = b.call(callee, &[x], "r").unwrap();
    let i32 = b.types_mut().i32();
    assert_eq!(b.type_of(r), i32);
    b.ret(r);
    drop(b);

    assert!(m.print_to_string().contains("%r = call i32 @f(i32 %0)"));
    assert_eq!(m.verify(), Ok(()));
}

#[test]
fn token_results_go_through_the_c_api() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let token = m.types.token();
    let i32 = m.types.i32();
    let i8_ptr = m.types.i8_ptr();
    let coro_id_ty = m.types.function(token, vec![i32, i8_ptr, i8_ptr, i8_ptr], false);
    let coro_id = m.add_function("llvm.coro.id", coro_id_ty, Linkage::External);
    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    b.position_at_end(entry);
    let callee = b.function_ref(coro_id);
    let zero = b.const_i32(0);
    let null = b.const_null(i8_ptr);
    let id = b.call(callee, &[zero, null, null, null], "id").unwrap();
    assert_eq!(b.type_of(id), token);
    drop(b);

    let text = m.print_to_string();
    assert!(
        text.contains("%id = call token @llvm.coro.id(i32 0, ptr null, ptr null, ptr null)"),
        "{text}"
    );
}

// === Exception handling ===

#[test]
fn funclet_pads_build_a_verifiable_catch() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let i32 = m.types.i32();
    let void = m.types.void();
    let handler_ty = m.types.function(i32, vec![], true);
    let personality = m.add_function("__CxxFrameHandler3", handler_ty, Linkage::External);
    let thrower_ty = m.types.function(void, vec![], false);
    let thrower = m.add_function("may_throw", thrower_ty, Linkage::External);
    m.set_personality(f, personality);

    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    let dispatch = b.append_block("catch.dispatch");
    let handler = b.append_block("catch");
    let exit = b.append_block("exit");
    b.position_at_end(entry);
    let callee = b.function_ref(thrower);
    b.invoke(callee, &[], exit, dispatch, "");
    b.position_at_end(dispatch);
    let none = b.const_token_none();
    let cs = b.catch_switch(none, &[handler], None, "cs");
    b.position_at_end(handler);
    let i8_ptr = b.types_mut().i8_ptr();
    let null = b.const_null(i8_ptr);
    let flags = b.const_i32(64);
    let cp = b.catch_pad(cs, &[null, flags, null], "cp");
    b.catch_ret(cp, exit);
    b.position_at_end(exit);
    let zero = b.const_i32(0);
    b.ret(zero);
    drop(b);

    let text = m.print_to_string();
    assert!(text.contains("%cs = catchswitch within none [label %catch] unwind to caller"));
    assert!(text.contains("%cp = catchpad within %cs [ptr null, i32 64, ptr null]"));
    assert!(text.contains("catchret from %cp to label %exit"));
    assert_eq!(m.verify(), Ok(()));
}

#[test]
fn landing_pad_uses_the_given_personality() {
    let ctx = Context::create();
    let mut m = Module::new(&ctx, "m");
    let f = setup(&mut m);
    let i32 = m.types.i32();
    let gxx_ty = m.types.function(i32, vec![], true);
    let gxx = m.add_function("__gxx_personality_v0", gxx_ty, Linkage::External);
    m.set_personality(f, gxx);

    let mut b = Builder::new(&mut m, f);
    let entry = b.append_block("entry");
    let lpad = b.append_block("lpad");
    let cont = b.append_block("cont");
    b.position_at_end(entry);
    let callee = b.function_ref(f);
    let x = b.param(0).unwrap();
    let r = b.invoke(callee, &[x], cont, lpad, "r").unwrap();
    b.position_at_end(lpad);
    let lp = b.landing_pad(gxx, true, &[], "lp");
    b.resume(lp);
    b.position_at_end(cont);
    b.ret(r);
    drop(b);

    let text = m.print_to_string();
    assert!(text.contains("personality ptr @__gxx_personality_v0"));
    assert!(text.contains("%lp = landingpad { ptr, i32 }"));
    assert!(text.contains("resume { ptr, i32 } %lp"));
    assert_eq!(m.verify(), Ok(()));
}
