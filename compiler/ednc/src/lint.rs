//! Exhaustiveness of `match` over declared sums.
//!
//! A match is exhaustive when it has a `:default` arm or a `case` for every
//! variant of its sum. Each checked match node is annotated in place:
//!
//! - `exhaustive`: `true` or `false`
//! - `missing-variants`: vector of the uncovered variant names, in
//!   declaration order
//!
//! Every non-exhaustive match is reported as E2101. Matches over an
//! unknown sum are left alone; emission reports those.
//!
//! Only variant names matter here, so sums are read straight from their
//! `(sum ..)` forms and the lint runs without the LLVM backend.

use edn_diagnostic::{Diagnostic, ErrorCode};
use edn_ir::{Node, Transformer};
use rustc_hash::{FxHashMap, FxHashSet};

/// Variant names of every sum declared in a module, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct SumVariants {
    sums: FxHashMap<String, Vec<String>>,
}

impl SumVariants {
    /// Collect `(sum :name S :variants [(variant :name V ..)..])` forms.
    /// Malformed declarations are skipped.
    pub fn collect(forms: &[Node]) -> Self {
        let mut sums = FxHashMap::default();
        for form in forms.iter().filter(|f| f.head() == Some("sum")) {
            let Some(args) = form.as_list().map(|items| &items[1..]) else {
                continue;
            };
            let Some(name) = keyword_value(args, "name").and_then(Node::as_name) else {
                continue;
            };
            let variants = keyword_value(args, "variants")
                .and_then(Node::as_vector)
                .unwrap_or_default()
                .iter()
                .filter(|v| v.head() == Some("variant"))
                .filter_map(|v| {
                    let items = v.as_list()?;
                    keyword_value(&items[1..], "name")?.as_name()
                })
                .map(str::to_owned)
                .collect();
            sums.insert(name.to_owned(), variants);
        }
        SumVariants { sums }
    }

    pub fn variants(&self, sum: &str) -> Option<&[String]> {
        self.sums.get(sum).map(Vec::as_slice)
    }
}

/// Outcome of checking one match. With a default arm nothing is missing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coverage {
    pub sum: String,
    pub missing: Vec<String>,
    pub has_default: bool,
}

impl Coverage {
    pub fn is_exhaustive(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check every match in a `(module ..)` form.
pub fn check_matches(module: &Node) -> Vec<Diagnostic> {
    let forms = module.as_list().map_or(&[][..], |items| &items[1..]);
    let sums = SumVariants::collect(forms);

    let mut diagnostics = Vec::new();
    {
        let mut tx = Transformer::new();
        tx.add_visitor("match", |node| {
            if let Some(diag) = check_match(node, &sums) {
                diagnostics.push(diag);
            }
        });
        tx.traverse(module);
    }
    diagnostics
}

/// Check and annotate one match node.
pub fn check_match(node: &Node, sums: &SumVariants) -> Option<Diagnostic> {
    let (sum_name, args) = match_parts(node)?;
    let variants = sums.variants(sum_name)?;
    let coverage = coverage(sum_name, variants, args);

    node.set_meta("exhaustive", Node::boolean(coverage.is_exhaustive()));
    node.set_meta(
        "missing-variants",
        Node::vector(coverage.missing.iter().map(Node::symbol).collect()),
    );
    if coverage.is_exhaustive() {
        return None;
    }

    let missing = coverage
        .missing
        .iter()
        .map(|v| format!("`{v}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let diag = Diagnostic::error(ErrorCode::E2101)
        .with_message(format!("non-exhaustive match on `{sum_name}`"));
    let diag = match node.span() {
        Some(span) => diag.with_label(span, format!("missing {missing}")),
        None => diag,
    };
    Some(diag.with_note("add the missing cases or a :default arm"))
}

/// The sum name and the keyword arguments of a statement or result match.
fn match_parts(node: &Node) -> Option<(&str, &[Node])> {
    let items = node.as_list()?;
    let base = match items.get(1)?.as_symbol() {
        Some(s) if s.len() > 1 && s.starts_with('%') => 3,
        _ => 1,
    };
    let sum = items.get(base)?.as_name()?;
    Some((sum, items.get(base + 2..).unwrap_or_default()))
}

fn coverage(sum: &str, variants: &[String], args: &[Node]) -> Coverage {
    let covered: FxHashSet<&str> = keyword_value(args, "cases")
        .and_then(Node::as_vector)
        .unwrap_or_default()
        .iter()
        .filter(|case| case.head() == Some("case"))
        .filter_map(|case| case.as_list()?.get(1)?.as_name())
        .collect();
    let has_default = keyword_value(args, "default").is_some();
    let missing = if has_default {
        Vec::new()
    } else {
        variants
            .iter()
            .filter(|v| !covered.contains(v.as_str()))
            .cloned()
            .collect()
    };
    Coverage {
        sum: sum.to_owned(),
        missing,
        has_default,
    }
}

fn keyword_value<'n>(args: &'n [Node], key: &str) -> Option<&'n Node> {
    args.chunks(2).find_map(|pair| match pair {
        [k, v] if k.as_keyword() == Some(key) => Some(v),
        _ => None,
    })
}
