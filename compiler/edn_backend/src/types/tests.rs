use pretty_assertions::assert_eq;

use super::*;

#[test]
fn structural_types_are_interned() {
    let mut t = TypeTable::new();
    let a = t.i32();
    let b = t.int(32);
    assert_eq!(a, b);
    let p1 = t.ptr(a);
    let p2 = t.ptr(b);
    assert_eq!(p1, p2);
    assert_ne!(p1, t.i8_ptr());
}

#[test]
fn named_struct_starts_opaque_and_accepts_body() {
    let mut t = TypeTable::new();
    let node = t.named_struct("Node");
    assert_eq!(t.struct_fields(node), None);
    let self_ptr = t.ptr(node);
    let i64 = t.i64();
    t.set_body(node, vec![i64, self_ptr]);
    assert_eq!(t.struct_fields(node), Some(&[i64, self_ptr][..]));
    assert_eq!(t.named_struct("Node"), node);
    assert_eq!(t.get_named("Node"), Some(node));
    assert_eq!(t.get_named("Missing"), None);
}

#[test]
fn sizes_follow_abi_padding() {
    let mut t = TypeTable::new();
    let i8 = t.i8();
    let i32 = t.i32();
    let i64 = t.i64();
    let i1 = t.i1();
    assert_eq!(t.size_of(i1), 1);
    // { i8, i32 } pads the i8 to 4 bytes.
    let s = t.struct_literal(vec![i8, i32]);
    assert_eq!(t.size_of(s), 8);
    assert_eq!(t.align_of(s), 4);
    // { i64, i8 } has trailing padding up to 16.
    let s2 = t.struct_literal(vec![i64, i8]);
    assert_eq!(t.size_of(s2), 16);
    let arr = t.array(i32, 5);
    assert_eq!(t.size_of(arr), 20);
}

#[test]
fn display_uses_textual_syntax() {
    let mut t = TypeTable::new();
    let i8 = t.i8();
    let i32 = t.i32();
    let p = t.i8_ptr();
    let arr = t.array(i8, 4);
    let sum = t.struct_literal(vec![i32, arr]);
    let named = t.named_struct("Opt");
    let f = t.function(i32, vec![p], true);
    let fp = t.ptr(f);
    assert_eq!(t.display(p).to_string(), "i8*");
    assert_eq!(t.display(sum).to_string(), "{ i32, [4 x i8] }");
    assert_eq!(t.display(named).to_string(), "%Opt");
    assert_eq!(t.display(fp).to_string(), "i32 (i8*, ...)*");
}

#[test]
fn element_at_indexes_structs_and_arrays() {
    let mut t = TypeTable::new();
    let i8 = t.i8();
    let i32 = t.i32();
    let arr = t.array(i8, 3);
    let s = t.struct_literal(vec![i32, arr]);
    assert_eq!(t.element_at(s, 1), Some(arr));
    assert_eq!(t.element_at(arr, 2), Some(i8));
    assert_eq!(t.element_at(s, 7), None);
}

#[test]
fn named_structs_quote_unusual_names() {
    let mut t = TypeTable::new();
    let plain = t.named_struct("list.node");
    let spaced = t.named_struct("my pair");
    assert_eq!(t.display(plain).to_string(), "%list.node");
    assert_eq!(t.display(spaced).to_string(), "%\"my pair\"");
}
