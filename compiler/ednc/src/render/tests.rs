use edn_diagnostic::ErrorCode;
use pretty_assertions::assert_eq;

use super::*;

fn span(start: (u32, u32), end: (u32, u32)) -> Span {
    Span::new(Position::new(start.0, start.1), Position::new(end.0, end.1))
}

fn render_plain(source: &str, diag: &Diagnostic) -> String {
    let mut out = Vec::new();
    Renderer::new("m.edn", source)
        .with_color(false)
        .render(diag, &mut out)
        .unwrap();
    String::from_utf8(out).unwrap()
}

// === Offsets ===

#[test]
fn offsets_count_chars_across_lines() {
    let src = "(a\n  bc)\n";
    assert_eq!(char_offset(src, Position::new(1, 1)), 0);
    assert_eq!(char_offset(src, Position::new(2, 3)), 5);
    assert_eq!(char_range(src, span((2, 3), (2, 5))), 5..8);
}

#[test]
fn offsets_count_chars_not_bytes() {
    let src = "\"é\" x";
    assert_eq!(char_offset(src, Position::new(1, 5)), 4);
}

#[test]
fn positions_past_the_end_clamp() {
    let src = "ab\ncd";
    assert_eq!(char_offset(src, Position::new(2, 40)), 5);
    assert_eq!(char_offset(src, Position::new(9, 1)), 5);
}

#[test]
fn point_spans_cover_one_char() {
    assert_eq!(char_range("abc", span((1, 2), (1, 2))), 1..2);
}

// === Reports ===

#[test]
fn report_shows_code_message_label_and_note() {
    let src = "(module\n  (match Shape %s :cases []))\n";
    let diag = Diagnostic::error(ErrorCode::E2101)
        .with_message("non-exhaustive match on `Shape`")
        .with_label(span((2, 3), (2, 29)), "missing `Circle`")
        .with_note("add the missing cases or a :default arm");
    let text = render_plain(src, &diag);
    assert!(text.contains("E2101"), "{text}");
    assert!(text.contains("non-exhaustive match on `Shape`"), "{text}");
    assert!(text.contains("missing `Circle`"), "{text}");
    assert!(text.contains("add the missing cases or a :default arm"), "{text}");
    assert!(text.contains("m.edn"), "{text}");
}

#[test]
fn warnings_and_unlabelled_diagnostics_render() {
    let diag = Diagnostic::warning(ErrorCode::E2005).with_message("`frob` skipped");
    let text = render_plain("(module)", &diag);
    assert!(text.contains("Warning"), "{text}");
    assert!(text.contains("`frob` skipped"), "{text}");
}

#[test]
fn render_all_writes_each_diagnostic() {
    let diags = [
        Diagnostic::error(ErrorCode::E0001).with_message("first"),
        Diagnostic::error(ErrorCode::E0002).with_message("second"),
    ];
    let mut out = Vec::new();
    Renderer::new("m.edn", "(")
        .with_color(false)
        .render_all(&diags, &mut out)
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.find("first").unwrap() < text.find("second").unwrap());
}
