//! Shape helpers for instruction forms.

use edn_ir::Node;
use smallvec::SmallVec;

use crate::error::ProblemKind;

/// Name with its `%` sigil removed. Symbols and strings both qualify.
pub(crate) fn local_name(node: &Node) -> Option<&str> {
    let name = node.as_name()?;
    let name = name.strip_prefix('%').unwrap_or(name);
    (!name.is_empty()).then_some(name)
}

/// True for `%name` symbols.
pub(crate) fn is_local_ref(node: &Node) -> bool {
    node.as_symbol().is_some_and(|s| s.len() > 1 && s.starts_with('%'))
}

/// Require exactly `len` elements (head included).
pub(crate) fn expect_len(items: &[Node], len: usize, shape: &'static str) -> Result<(), ProblemKind> {
    if items.len() == len {
        Ok(())
    } else {
        Err(ProblemKind::Malformed(shape))
    }
}

/// Name at `index`, sigil stripped.
pub(crate) fn name_at<'n>(
    items: &'n [Node],
    index: usize,
    shape: &'static str,
) -> Result<&'n str, ProblemKind> {
    items
        .get(index)
        .and_then(local_name)
        .ok_or(ProblemKind::Malformed(shape))
}

/// Vector at `index`.
pub(crate) fn vector_at<'n>(
    items: &'n [Node],
    index: usize,
    shape: &'static str,
) -> Result<&'n [Node], ProblemKind> {
    items
        .get(index)
        .and_then(Node::as_vector)
        .ok_or(ProblemKind::Malformed(shape))
}

/// A `:key value` tail. Scanning stops at the first element that is not
/// a keyword.
pub(crate) struct KeywordArgs<'n> {
    pairs: SmallVec<[(&'n str, &'n Node); 4]>,
}

impl<'n> KeywordArgs<'n> {
    pub(crate) fn parse(items: &'n [Node]) -> Self {
        let mut pairs = SmallVec::new();
        let mut rest = items;
        while let [key, value, tail @ ..] = rest {
            let Some(key) = key.as_keyword() else { break };
            pairs.push((key, value));
            rest = tail;
        }
        KeywordArgs { pairs }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'n Node> {
        self.pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    pub(crate) fn vector(&self, key: &str) -> Option<&'n [Node]> {
        self.get(key).and_then(Node::as_vector)
    }

    pub(crate) fn name(&self, key: &str) -> Option<&'n str> {
        self.get(key).and_then(local_name)
    }

    pub(crate) fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(Node::as_bool).unwrap_or(false)
    }
}

/// Integer literal used where a float is expected.
#[expect(
    clippy::cast_precision_loss,
    reason = "literals beyond 2^53 round like they do in C"
)]
pub(crate) fn int_as_float(value: i64) -> f64 {
    value as f64
}

/// Split a body vector into its statements and a trailing `:value %v`.
///
/// Both `[stmt... :value %v]` and a `:value` anywhere in the vector are
/// accepted; the last one wins.
pub(crate) fn body_and_value(items: &[Node]) -> (Vec<&Node>, Option<&str>) {
    let mut body = Vec::with_capacity(items.len());
    let mut value = None;
    let mut iter = items.iter();
    while let Some(item) = iter.next() {
        if item.as_keyword() == Some("value") {
            value = iter.next().and_then(local_name);
        } else {
            body.push(item);
        }
    }
    (body, value)
}
