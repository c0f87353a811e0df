//! Text → node tree reader.
//!
//! Hand-written recursive descent over bytes. Every node produced gets
//! `line`, `col`, `end-line` and `end-col` metadata (1-based, end inclusive).
//!
//! # Syntax
//!
//! ```text
//! (a b c)     list            [a b]       vector
//! #{a b}      set             {k v}       map
//! "text"      string          :kw         keyword
//! 42 -1.5e3   int / float     true nil    literals
//! #tag form   tagged value    ; ...       comment to end of line
//! ```
//!
//! Commas are whitespace.

use crate::node::{Node, NodeKind};
use crate::span::Position;
use crate::stack::ensure_sufficient_stack;

/// Error produced while reading source text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("{pos}: unexpected end of input")]
    UnexpectedEof { pos: Position },
    #[error("{pos}: unexpected character `{ch}`")]
    UnexpectedChar { ch: char, pos: Position },
    #[error("{pos}: unmatched closing `{ch}`")]
    UnmatchedClose { ch: char, pos: Position },
    #[error("{pos}: map literal needs an even number of forms")]
    OddMapEntries { pos: Position },
    #[error("{pos}: invalid number `{text}`")]
    InvalidNumber { text: String, pos: Position },
    #[error("{pos}: no form found")]
    Empty { pos: Position },
}

impl ReadError {
    /// Where the error was detected.
    pub fn position(&self) -> Position {
        match self {
            ReadError::UnexpectedEof { pos }
            | ReadError::UnexpectedChar { pos, .. }
            | ReadError::UnmatchedClose { pos, .. }
            | ReadError::OddMapEntries { pos }
            | ReadError::InvalidNumber { pos, .. }
            | ReadError::Empty { pos } => *pos,
        }
    }
}

/// Read every top-level form in `src`.
pub fn read(src: &str) -> Result<Vec<Node>, ReadError> {
    let mut reader = Reader::new(src);
    let mut forms = Vec::new();
    loop {
        reader.skip_trivia();
        if reader.is_eof() {
            return Ok(forms);
        }
        forms.push(reader.read_form()?);
    }
}

/// Read the first form in `src`. Trailing forms are ignored.
pub fn read_one(src: &str) -> Result<Node, ReadError> {
    let mut reader = Reader::new(src);
    reader.skip_trivia();
    if reader.is_eof() {
        return Err(ReadError::Empty { pos: reader.pos() });
    }
    reader.read_form()
}

/// Bytes allowed inside a symbol or keyword after the first character.
fn is_symbol_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"*!_?-+/<>=$%&.#".contains(&b) || b >= 0x80
}

fn is_symbol_start(b: u8) -> bool {
    is_symbol_byte(b) && b != b'.' && b != b'#' && !b.is_ascii_digit()
}

struct Reader<'a> {
    src: &'a [u8],
    offset: usize,
    line: u32,
    col: u32,
    /// Position of the last consumed byte.
    last: Position,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Reader {
            src: src.as_bytes(),
            offset: 0,
            line: 1,
            col: 1,
            last: Position::new(1, 1),
        }
    }

    #[inline]
    fn is_eof(&self) -> bool {
        self.offset >= self.src.len()
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.src.get(self.offset).copied()
    }

    #[inline]
    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.offset + ahead).copied()
    }

    #[inline]
    fn pos(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.last = self.pos();
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if b & 0xC0 != 0x80 {
            // Continuation bytes of a multi-byte char share its column.
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | b',' => {
                    self.bump();
                }
                b';' => {
                    while let Some(c) = self.bump() {
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn finish(&self, kind: NodeKind, start: Position) -> Node {
        Node::new(kind)
            .with_meta("line", Node::int(i64::from(start.line)))
            .with_meta("col", Node::int(i64::from(start.col)))
            .with_meta("end-line", Node::int(i64::from(self.last.line)))
            .with_meta("end-col", Node::int(i64::from(self.last.col)))
    }

    fn unexpected(&self) -> ReadError {
        match self.peek() {
            None => ReadError::UnexpectedEof { pos: self.pos() },
            Some(b) => ReadError::UnexpectedChar {
                ch: char::from(b),
                pos: self.pos(),
            },
        }
    }

    fn read_form(&mut self) -> Result<Node, ReadError> {
        ensure_sufficient_stack(|| self.read_form_inner())
    }

    fn read_form_inner(&mut self) -> Result<Node, ReadError> {
        self.skip_trivia();
        let start = self.pos();
        let Some(b) = self.peek() else {
            return Err(ReadError::UnexpectedEof { pos: start });
        };
        match b {
            b'(' => {
                self.bump();
                let items = self.read_seq(b')')?;
                Ok(self.finish(NodeKind::List(items), start))
            }
            b'[' => {
                self.bump();
                let items = self.read_seq(b']')?;
                Ok(self.finish(NodeKind::Vector(items), start))
            }
            b'{' => {
                self.bump();
                let items = self.read_seq(b'}')?;
                if items.len() % 2 != 0 {
                    return Err(ReadError::OddMapEntries { pos: start });
                }
                let mut entries = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    entries.push((k, v));
                }
                Ok(self.finish(NodeKind::Map(entries), start))
            }
            b'#' => self.read_dispatch(start),
            b')' | b']' | b'}' => Err(ReadError::UnmatchedClose {
                ch: char::from(b),
                pos: start,
            }),
            b'"' => self.read_string(start),
            b':' => {
                self.bump();
                let name = self.take_symbol_text();
                if name.is_empty() {
                    return Err(self.unexpected());
                }
                Ok(self.finish(NodeKind::Keyword(name), start))
            }
            b'0'..=b'9' => self.read_number(start),
            b'+' | b'-' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                self.read_number(start)
            }
            _ if is_symbol_start(b) => {
                let text = self.take_symbol_text();
                let kind = match text.as_str() {
                    "nil" => NodeKind::Nil,
                    "true" => NodeKind::Bool(true),
                    "false" => NodeKind::Bool(false),
                    _ => NodeKind::Symbol(text),
                };
                Ok(self.finish(kind, start))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn read_seq(&mut self, close: u8) -> Result<Vec<Node>, ReadError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(ReadError::UnexpectedEof { pos: self.pos() }),
                Some(b) if b == close => {
                    self.bump();
                    return Ok(items);
                }
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    /// `#{...}` set or `#tag form` tagged value.
    fn read_dispatch(&mut self, start: Position) -> Result<Node, ReadError> {
        self.bump();
        if self.peek() == Some(b'{') {
            self.bump();
            let items = self.read_seq(b'}')?;
            return Ok(self.finish(NodeKind::Set(items), start));
        }
        let tag = self.take_symbol_text();
        if tag.is_empty() {
            return Err(self.unexpected());
        }
        let value = self.read_form()?;
        Ok(self.finish(
            NodeKind::Tagged {
                tag,
                value: Box::new(value),
            },
            start,
        ))
    }

    fn take_symbol_text(&mut self) -> String {
        let begin = self.offset;
        while self.peek().is_some_and(is_symbol_byte) {
            self.bump();
        }
        String::from_utf8_lossy(&self.src[begin..self.offset]).into_owned()
    }

    fn read_string(&mut self, start: Position) -> Result<Node, ReadError> {
        self.bump();
        let mut out = Vec::new();
        loop {
            let Some(b) = self.bump() else {
                return Err(ReadError::UnexpectedEof { pos: self.pos() });
            };
            match b {
                b'"' => break,
                b'\\' => {
                    let Some(e) = self.bump() else {
                        return Err(ReadError::UnexpectedEof { pos: self.pos() });
                    };
                    out.push(match e {
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        b'0' => 0,
                        // Unknown escapes keep the escaped byte.
                        other => other,
                    });
                }
                _ => out.push(b),
            }
        }
        let text = String::from_utf8_lossy(&out).into_owned();
        Ok(self.finish(NodeKind::Str(text), start))
    }

    fn read_number(&mut self, start: Position) -> Result<Node, ReadError> {
        let begin = self.offset;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.bump();
        }
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {}
                b'.' => is_float = true,
                b'e' | b'E' => {
                    is_float = true;
                    if matches!(self.peek_at(1), Some(b'+' | b'-')) {
                        self.bump();
                    }
                }
                _ if is_symbol_byte(b) => {}
                _ => break,
            }
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[begin..self.offset]).into_owned();
        let kind = if is_float {
            text.parse::<f64>().ok().map(NodeKind::Float)
        } else {
            text.parse::<i64>().ok().map(NodeKind::Int)
        };
        match kind {
            Some(kind) => Ok(self.finish(kind, start)),
            None => Err(ReadError::InvalidNumber { text, pos: start }),
        }
    }
}
