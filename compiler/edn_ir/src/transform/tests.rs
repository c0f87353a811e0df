use std::cell::RefCell;

use pretty_assertions::assert_eq;

use crate::reader::read_one;

use super::*;

fn parse(src: &str) -> Node {
    read_one(src).unwrap()
}

/// `(twice x)` → `(pair x x)`
fn twice(list: &Node) -> Option<Node> {
    let items = list.as_list()?;
    if items.len() != 2 {
        return None;
    }
    Some(Node::list(vec![
        Node::symbol("pair"),
        items[1].clone(),
        items[1].clone(),
    ]))
}

// === Expansion ===

#[test]
fn expands_nested_macro_calls() {
    let mut t = Transformer::new();
    t.add_macro("twice", twice);
    let out = t.expand(&parse("(f (twice (twice 1)))")).unwrap();
    assert_eq!(out, parse("(f (pair (pair 1 1) (pair 1 1)))"));
}

#[test]
fn expands_inside_vectors_sets_and_maps() {
    let mut t = Transformer::new();
    t.add_macro("twice", twice);
    let out = t
        .expand(&parse("[(twice a) #{(twice b)} {:k (twice c)}]"))
        .unwrap();
    assert_eq!(out, parse("[(pair a a) #{(pair b b)} {:k (pair c c)}]"));
}

#[test]
fn macro_may_decline() {
    let mut t = Transformer::new();
    t.add_macro("twice", twice);
    let src = parse("(twice a b)");
    assert_eq!(t.expand(&src).unwrap(), src);
}

#[test]
fn macro_output_is_expanded_again() {
    let mut t = Transformer::new();
    t.add_macro("outer", |_| Some(parse("(twice z)")));
    t.add_macro("twice", twice);
    assert_eq!(t.expand(&parse("(outer)")).unwrap(), parse("(pair z z)"));
}

#[test]
fn macro_can_produce_an_atom() {
    let mut t = Transformer::new();
    t.add_macro("zero", |_| Some(Node::int(0)));
    assert_eq!(t.expand(&parse("[(zero)]")).unwrap(), parse("[0]"));
}

#[test]
fn expand_does_not_mutate_input() {
    let mut t = Transformer::new();
    t.add_macro("twice", twice);
    let src = parse("(twice a)");
    let before = src.to_string();
    let _ = t.expand(&src).unwrap();
    assert_eq!(src.to_string(), before);
}

#[test]
fn expansion_preserves_metadata_of_rebuilt_forms() {
    let t = Transformer::new();
    let out = t.expand(&parse("(f [1])")).unwrap();
    assert_eq!(out.meta("line"), Some(Node::int(1)));
}

// === Limits ===

#[test]
fn mutually_recursive_macros_hit_rewrite_limit() {
    let mut t = Transformer::new().with_limits(ExpansionLimits {
        rewrites: 10,
        depth: 100,
    });
    t.add_macro("ping", |_| Some(parse("(pong)")));
    t.add_macro("pong", |_| Some(parse("(ping)")));
    let err = t.expand(&parse("(ping)")).unwrap_err();
    assert!(matches!(err, ExpandError::RewriteLimit { limit: 10, .. }));
}

#[test]
fn growing_expansion_hits_depth_limit() {
    let mut t = Transformer::new().with_limits(ExpansionLimits {
        rewrites: 10,
        depth: 50,
    });
    t.add_macro("grow", |_| Some(parse("(wrap (grow))")));
    let err = t.expand(&parse("(grow)")).unwrap_err();
    assert!(matches!(err, ExpandError::DepthLimit { limit: 50, .. }));
}

// === Traversal ===

#[test]
fn traverse_dispatches_on_head() {
    let seen = RefCell::new(Vec::new());
    let atoms = RefCell::new(0);
    {
        let mut t = Transformer::new();
        t.add_visitor("add", |n| seen.borrow_mut().push(format!("add:{n}")));
        t.on_unmatched_list(|n| seen.borrow_mut().push(format!("other:{}", n.head().unwrap_or("?"))));
        t.on_atom(|_| *atoms.borrow_mut() += 1);
        t.traverse(&parse("(fn [(add 1 2) (sub 3 4)])"));
    }
    assert_eq!(
        seen.into_inner(),
        vec![
            "other:fn".to_owned(),
            "add:(add 1 2)".to_owned(),
            "other:sub".to_owned(),
        ]
    );
    // fn, add, 1, 2, sub, 3, 4
    assert_eq!(atoms.into_inner(), 7);
}

#[test]
fn visitor_annotates_metadata_in_place() {
    let tree = parse("(module (fn) (fn))");
    {
        let mut t = Transformer::new();
        t.add_visitor("fn", |n| n.set_meta("visited", Node::boolean(true)));
        t.traverse(&tree);
    }
    let items = tree.as_list().unwrap();
    assert_eq!(items[1].meta("visited"), Some(Node::boolean(true)));
    assert_eq!(items[2].meta("visited"), Some(Node::boolean(true)));
    assert_eq!(tree.to_string(), "(module (fn) (fn))");
}

#[test]
fn expand_and_traverse_visits_expanded_tree() {
    let count = RefCell::new(0);
    let out = {
        let mut t = Transformer::new();
        t.add_macro("twice", twice);
        t.add_visitor("pair", |_| *count.borrow_mut() += 1);
        t.expand_and_traverse(&parse("[(twice (twice x))]")).unwrap()
    };
    assert_eq!(out, parse("[(pair (pair x x) (pair x x))]"));
    assert_eq!(count.into_inner(), 3);
}

#[test]
fn build_keyword_call_alternates_pairs() {
    let n = build_keyword_call("fn", [("name", Node::string("f")), ("ret", Node::symbol("i32"))]);
    assert_eq!(n, parse(r#"(fn :name "f" :ret i32)"#));
}
