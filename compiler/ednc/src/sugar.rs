//! Built-in sugar macros.
//!
//! | Form | Expands to |
//! |------|------------|
//! | `(let %x T v)` | `(as %x T v)` |
//! | `(set! %x v)` | `(assign %x v)` |
//! | `(when %c body..)` | `(if %c [body..])` |
//! | `(unless %c body..)` | `(if %c [] [body..])` |
//! | `(loop body..)` | `(while true [body..])` |
//!
//! Every macro declines a form of the wrong arity, which leaves it for the
//! emitter to report. Expansions carry the source position of the form
//! they replace.

use edn_ir::{Node, Transformer};

/// Metadata keys copied from a sugar form onto its expansion.
const SPAN_KEYS: [&str; 4] = ["line", "col", "end-line", "end-col"];

/// A transformer with every built-in macro registered.
pub fn transformer<'a>() -> Transformer<'a> {
    let mut tx = Transformer::new();
    register(&mut tx);
    tx
}

/// Register the built-in macros on `tx`.
pub fn register(tx: &mut Transformer<'_>) {
    tx.add_macro("let", |form| match items(form) {
        [_, dst, ty, init] => Some(rewrite(
            form,
            "as",
            vec![dst.clone(), ty.clone(), init.clone()],
        )),
        _ => None,
    });
    tx.add_macro("set!", |form| match items(form) {
        [_, dst, src] => Some(rewrite(form, "assign", vec![dst.clone(), src.clone()])),
        _ => None,
    });
    tx.add_macro("when", |form| match items(form) {
        [_, cond, body @ ..] => Some(rewrite(
            form,
            "if",
            vec![cond.clone(), Node::vector(body.to_vec())],
        )),
        _ => None,
    });
    tx.add_macro("unless", |form| match items(form) {
        [_, cond, body @ ..] => Some(rewrite(
            form,
            "if",
            vec![cond.clone(), Node::vector(Vec::new()), Node::vector(body.to_vec())],
        )),
        _ => None,
    });
    tx.add_macro("loop", |form| match items(form) {
        [_, body @ ..] => Some(rewrite(
            form,
            "while",
            vec![Node::boolean(true), Node::vector(body.to_vec())],
        )),
        [] => None,
    });
}

fn items(form: &Node) -> &[Node] {
    form.as_list().unwrap_or_default()
}

/// `(head args..)`, positioned where `form` was.
fn rewrite(form: &Node, head: &str, args: Vec<Node>) -> Node {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Node::symbol(head));
    items.extend(args);
    let out = Node::list(items);
    for key in SPAN_KEYS {
        if let Some(value) = form.meta(key) {
            out.set_meta(key, value);
        }
    }
    out
}
