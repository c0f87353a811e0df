use edn_backend::Context;
use edn_diagnostic::ErrorCode;
use edn_ir::read_one;
use pretty_assertions::assert_eq;

use super::*;
use crate::tests::helper::{assert_verifies, emit_source};

fn emit<'ctx>(ctx: &'ctx Context, source: &str) -> Session<'ctx> {
    emit_source(ctx, source, EmitConfig::default())
}

// === Module form ===

#[test]
fn module_id_names_the_output() {
    let ctx = Context::create();
    let session = emit(&ctx, "(module :id \"demo\")");
    assert_eq!(session.module().name(), "demo");
    assert!(session.module().to_string().starts_with("; ModuleID = 'demo'"));
}

#[test]
fn non_module_form_is_fatal() {
    let ctx = Context::create();
    let form = read_one("(fn :name f)").unwrap();
    let mut session = Session::new(&ctx, EmitConfig::default());
    let err = session.emit_module(&form).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E9002);
}

#[test]
fn dangling_keyword_is_fatal() {
    let ctx = Context::create();
    let form = read_one("(module :id)").unwrap();
    let mut session = Session::new(&ctx, EmitConfig::default());
    assert!(matches!(
        session.emit_module(&form),
        Err(EmitError::MalformedModule(_))
    ));
}

#[test]
fn unknown_declarations_are_reported_and_skipped() {
    let ctx = Context::create();
    let session = emit(&ctx, "(module :id \"t\" (widget :name w) (fn :name f :ret void :body []))");
    assert_eq!(session.problems().len(), 1);
    assert_eq!(session.problems()[0].op, "widget");
    assert_eq!(session.problems()[0].kind, ProblemKind::Unrecognized);
    assert!(session.module().get_function("f").is_some());
}

#[test]
fn target_triple_is_printed() {
    let ctx = Context::create();
    let form = read_one("(module :id \"t\")").unwrap();
    let mut session = Session::new(&ctx, EmitConfig::default().with_target_triple("x86_64-unknown-linux-gnu"));
    session.emit_module(&form).unwrap();
    assert!(session
        .module()
        .to_string()
        .contains("target triple = \"x86_64-unknown-linux-gnu\""));
}

// === Functions ===

#[test]
fn bodies_may_call_functions_defined_later() {
    let ctx = Context::create();
    let session = emit(
        &ctx,
        "(module :id \"t\"
           (fn :name first :ret i32 :body [(call %r i32 second 1) (ret i32 %r)])
           (fn :name second :ret i32 :params [(param i32 %n)] :body [(ret i32 %n)]))",
    );
    assert!(session.problems().is_empty(), "{:?}", session.problems());
    let text = session.module().to_string();
    assert!(text.contains("%r = call i32 @second(i32 1)"), "{text}");
    assert!(text.contains("define i32 @second(i32 %n)"), "{text}");
    assert_verifies(&session);
}

#[test]
fn external_functions_are_declarations() {
    let ctx = Context::create();
    let session = emit(
        &ctx,
        "(module :id \"t\"
           (fn :name puts :ret i32 :params [(param (ptr i8) %s)] :external true)
           (fn :name printf :ret i32 :params [(param (ptr i8) %fmt)] :vararg true :external true))",
    );
    let text = session.module().to_string();
    assert!(text.contains("declare i32 @puts(ptr)"), "{text}");
    assert!(text.contains("declare i32 @printf(ptr, ...)"), "{text}");
}

#[test]
fn unnamed_params_get_positional_names() {
    let ctx = Context::create();
    let session = emit(&ctx, "(module :id \"t\" (fn :name f :ret void :params [(param i32)] :body []))");
    assert!(session.module().to_string().contains("define void @f(i32 %arg0)"));
}

#[test]
fn personality_is_declared_only_for_defined_bodies() {
    let ctx = Context::create();
    let config = EmitConfig::default().with_eh_models(true, false);
    let only_decls = emit_source(
        &ctx,
        "(module :id \"t\" (fn :name g :ret void :external true))",
        config.clone(),
    );
    assert!(only_decls.module().get_function("__gxx_personality_v0").is_none());

    let with_body = emit_source(&ctx, "(module :id \"t\" (fn :name f :ret void :body []))", config);
    let text = with_body.module().to_string();
    assert!(text.contains("declare i32 @__gxx_personality_v0(...)"), "{text}");
    assert!(text.contains("personality ptr @__gxx_personality_v0"), "{text}");
    assert!(text.contains("uwtable"), "{text}");
}

// === Globals ===

#[test]
fn globals_take_typed_initializers() {
    let ctx = Context::create();
    let session = emit(
        &ctx,
        "(module :id \"t\"
           (global :name count :type i64 :init 3)
           (global :name ratio :type f64 :init 2)
           (global :name name :type (array :elem i8 :size 4) :const true :init \"ab\")
           (global :name next :type (ptr i32)))",
    );
    let text = session.module().to_string();
    assert!(text.contains("@count = global i64 3"), "{text}");
    assert!(text.contains("@ratio = global double 2.000000e+00"), "{text}");
    assert!(text.contains("@name = constant [4 x i8] c\"ab\\00\\00\""), "{text}");
    assert!(text.contains("@next = global ptr null"), "{text}");
}

#[test]
fn global_without_type_is_reported() {
    let ctx = Context::create();
    let session = emit(&ctx, "(module :id \"t\" (global :name g))");
    assert_eq!(session.problems()[0].op, "global");
    assert!(matches!(session.problems()[0].kind, ProblemKind::Malformed(_)));
}

// === Problems ===

#[test]
fn bad_instructions_are_skipped_and_emission_continues() {
    let ctx = Context::create();
    let session = emit(
        &ctx,
        "(module :id \"t\"
           (fn :name f :ret i32 :params [(param i32 %x)]
             :body [(frobnicate %y) (add %z i32 %missing 1) (ret i32 %x)]))",
    );
    let kinds: Vec<_> = session.problems().iter().map(|p| &p.kind).collect();
    assert_eq!(
        kinds,
        [
            &ProblemKind::Unrecognized,
            &ProblemKind::Unresolved("missing".to_owned())
        ]
    );
    assert!(session.problems().iter().all(|p| p.function == "f"));
    assert!(session.module().to_string().contains("ret i32 %x"));

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics[0].code, ErrorCode::E2005);
    assert_eq!(diagnostics[1].code, ErrorCode::E2002);
    assert!(diagnostics[1].primary_span().is_some());
}

#[test]
fn equal_literals_share_one_global() {
    let ctx = Context::create();
    let session = emit(
        &ctx,
        "(module :id \"t\"
           (fn :name f :ret void :body [(cstr %a \"hi\") (cstr %b \"hi\") (cstr %c \"yo\")]))",
    );
    assert_eq!(session.interned_literals(), 2);
}
