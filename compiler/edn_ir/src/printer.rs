//! Canonical text rendering of node trees.
//!
//! The output reads back into a structurally equal tree. Metadata is not
//! printed.

use std::fmt::{self, Write};

use crate::node::{Node, NodeKind};

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self)
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    match node.kind() {
        NodeKind::Nil => f.write_str("nil"),
        NodeKind::Bool(b) => write!(f, "{b}"),
        NodeKind::Int(v) => write!(f, "{v}"),
        // Debug keeps a fraction or exponent so the token reads back as a float.
        NodeKind::Float(v) => write!(f, "{v:?}"),
        NodeKind::Str(s) => write_string(f, s),
        NodeKind::Keyword(k) => write!(f, ":{k}"),
        NodeKind::Symbol(s) => f.write_str(s),
        NodeKind::List(items) => write_seq(f, "(", items, ")"),
        NodeKind::Vector(items) => write_seq(f, "[", items, "]"),
        NodeKind::Set(items) => write_seq(f, "#{", items, "}"),
        NodeKind::Map(entries) => {
            f.write_char('{')?;
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    f.write_char(' ')?;
                }
                write_node(f, k)?;
                f.write_char(' ')?;
                write_node(f, v)?;
            }
            f.write_char('}')
        }
        NodeKind::Tagged { tag, value } => {
            write!(f, "#{tag} ")?;
            write_node(f, value)
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Node], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }
        write_node(f, item)?;
    }
    f.write_str(close)
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\0' => f.write_str("\\0")?,
            _ => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::reader::read_one;

    use super::*;

    #[test]
    fn prints_nested_forms() {
        let n = Node::list(vec![
            Node::symbol("fn"),
            Node::keyword("name"),
            Node::string("main"),
            Node::vector(vec![Node::int(1), Node::float(2.5)]),
        ]);
        assert_eq!(n.to_string(), r#"(fn :name "main" [1 2.5])"#);
    }

    #[test]
    fn float_keeps_fraction() {
        assert_eq!(Node::float(1.0).to_string(), "1.0");
    }

    #[test]
    fn escapes_strings() {
        assert_eq!(Node::string("a\"b\n").to_string(), r#""a\"b\n""#);
    }

    #[test]
    fn printed_text_reads_back() {
        let src = r#"(module :id "m" #{1 2} {:a [x y] :b nil} #inst "t" (f -3 4.0e10 true))"#;
        let tree = read_one(src).unwrap();
        let again = read_one(&tree.to_string()).unwrap();
        assert_eq!(tree, again);
    }
}
