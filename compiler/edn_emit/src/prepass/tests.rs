use edn_ir::read;

use super::*;

fn mutable(src: &str, params: &[&str]) -> Vec<String> {
    let body = read(src).unwrap();
    let mut names: Vec<String> = mutable_names(&body, params.iter().copied())
        .into_iter()
        .collect();
    names.sort();
    names
}

#[test]
fn single_definitions_stay_ssa() {
    assert!(mutable("(add %a i32 %x %y) (mul %b i32 %a %a)", &["x", "y"]).is_empty());
}

#[test]
fn redefinition_in_both_arms() {
    let src = "(if %c [(const %t i32 1)] [(const %t i32 2)]) (ret i32 %t)";
    assert_eq!(mutable(src, &[]), ["t"]);
}

#[test]
fn parameter_redefined_in_body() {
    assert_eq!(mutable("(add %n i32 %n 1)", &["n"]), ["n"]);
}

#[test]
fn assign_as_local_and_addr_mark() {
    let src = "(assign %a %b)
               (as %v i32 %init)
               (block :locals [(local i32 %l)] :body [])
               (addr %p (ptr i32) %taken)";
    assert_eq!(mutable(src, &[]), ["a", "l", "taken", "v"]);
}

#[test]
fn match_defines_only_in_result_mode() {
    let src = "(match %r i32 Opt %o :cases [(case Some [:value %x])] :default [:value %y])
               (match Opt %o :cases [])
               (const %r i32 0)";
    assert_eq!(mutable(src, &[]), ["r"]);
}

#[test]
fn payload_binds_count_as_definitions() {
    let once = "(match Pair %p :cases [(case L :binds [(bind %v 0)] :body [])])";
    assert!(mutable(once, &[]).is_empty());

    let twice = "(match %r i32 Pair %p
                   :cases [(case L :binds [(bind %v 0)] :body [] :value %v)
                           (case R :binds [(bind %v 0)] :body [] :value %v)]
                   :default [:value %d])";
    assert_eq!(mutable(twice, &[]), ["v"]);
}

#[test]
fn stores_do_not_define() {
    assert!(mutable("(store i32 %p %v) (store i32 %p %w)", &[]).is_empty());
}
