//! Terminal rendering of diagnostics with `ariadne`.
//!
//! Spans are line/column pairs; ariadne wants char offsets into the
//! source, so each span is converted against the text being reported on.

use std::io::{self, Write};
use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use edn_diagnostic::{Diagnostic, Severity};
use edn_ir::{Position, Span};

/// Where and how diagnostics are printed.
pub struct Renderer<'s> {
    path: &'s str,
    source: &'s str,
    color: bool,
}

impl<'s> Renderer<'s> {
    pub fn new(path: &'s str, source: &'s str) -> Self {
        Renderer {
            path,
            source,
            color: true,
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn render(&self, diag: &Diagnostic, out: &mut impl Write) -> io::Result<()> {
        let (kind, color) = match diag.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
            Severity::Note => (ReportKind::Advice, Color::Cyan),
        };
        let offset = diag
            .primary_span()
            .map_or(0, |span| char_range(self.source, span).start);

        let mut report = Report::build(kind, self.path, offset)
            .with_config(Config::default().with_color(self.color))
            .with_code(diag.code.as_str())
            .with_message(&diag.message);
        for label in &diag.labels {
            let range = char_range(self.source, label.span);
            let label_color = if label.is_primary { color } else { Color::Blue };
            report = report.with_label(
                Label::new((self.path, range))
                    .with_message(&label.message)
                    .with_color(label_color),
            );
        }
        for note in &diag.notes {
            report = report.with_note(note);
        }
        report
            .finish()
            .write((self.path, Source::from(self.source)), out)
    }

    pub fn render_all(&self, diagnostics: &[Diagnostic], out: &mut impl Write) -> io::Result<()> {
        for diag in diagnostics {
            self.render(diag, out)?;
        }
        Ok(())
    }
}

/// Char offset of a 1-based line/column position. Positions past the end
/// clamp to the end of the text.
pub fn char_offset(source: &str, pos: Position) -> usize {
    let mut offset = 0;
    for (index, line) in source.split_inclusive('\n').enumerate() {
        if index + 1 == pos.line as usize {
            let col = (pos.col as usize).saturating_sub(1);
            return offset + col.min(line.chars().count());
        }
        offset += line.chars().count();
    }
    offset
}

/// Char range covered by `span`. The end position is inclusive.
pub fn char_range(source: &str, span: Span) -> Range<usize> {
    let start = char_offset(source, span.start);
    let end = char_offset(source, span.end) + 1;
    start..end.max(start + 1)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
