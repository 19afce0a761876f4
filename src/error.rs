//! Diagnostic types shared by every engine phase
//!
//! All failures funnel into [`Diagnostic`]: a kind from the fixed taxonomy,
//! a human-readable message, an optional source span, and (for runtime
//! errors) a back-trace of call frames. Compile-time phases collect several
//! diagnostics before reporting; runtime evaluation stops at the first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A caret position in the source text (0-indexed; rendered 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    /// Byte offset into the source
    pub offset: usize,
}

impl Position {
    pub fn start() -> Self {
        Position {
            line: 0,
            column: 0,
            offset: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Source span covering a half-open range of characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start position (inclusive)
    pub start: Position,
    /// End position (exclusive)
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    pub fn point(pos: Position) -> Self {
        Span {
            start: pos,
            end: pos,
        }
    }

    /// Smallest span covering both operands
    pub fn merge(self, other: Span) -> Span {
        let start = if self.start.offset <= other.start.offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };
        Span { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

/// The fixed error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unrecognized character, unterminated string or comment
    Lex,
    /// Token stream does not match the grammar
    Parse,
    /// Identifier not bound in any scope
    UnresolvedBinding,
    /// Operator or function applied to the wrong variant
    TypeMismatch,
    /// Wrong number of arguments
    ArityMismatch,
    /// Navigation produced undefined on a required access
    SelectorFailure,
    /// `apply` found a node with no matching template
    NoTemplateMatch,
    /// A format bridge could not parse input bytes
    FormatParse,
    /// A format bridge cannot represent the value
    FormatSerialize,
    /// A stdlib function received a value it cannot accept
    FunctionArgument,
    /// Integer `/` or `%` with a zero divisor
    DivisionByZero,
    /// Cooperative cancellation flipped during evaluation
    Cancelled,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Lex => "LexError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::UnresolvedBinding => "UnresolvedBinding",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::ArityMismatch => "ArityMismatch",
            ErrorKind::SelectorFailure => "SelectorFailure",
            ErrorKind::NoTemplateMatch => "NoTemplateMatch",
            ErrorKind::FormatParse => "FormatParseError",
            ErrorKind::FormatSerialize => "FormatSerializeError",
            ErrorKind::FunctionArgument => "FunctionArgumentException",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in a runtime back-trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Function or template name
    pub name: String,
    pub span: Option<Span>,
}

/// A single diagnostic: kind, message, location, optional hint and trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    /// Suggested fix, rendered on its own line
    pub hint: Option<String>,
    /// Call frames, innermost last
    pub frames: Vec<Frame>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            span: None,
            hint: None,
            frames: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn push_frame(&mut self, name: impl Into<String>, span: Option<Span>) {
        self.frames.push(Frame {
            name: name.into(),
            span,
        });
    }

    /// Render the diagnostic with a caret-annotated excerpt of `source`
    pub fn render(&self, source: &str) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        if let Some(span) = self.span {
            out.push_str(&format!(" at {}", span.start));
            if let Some(line) = source.lines().nth(span.start.line) {
                out.push('\n');
                out.push_str("  | ");
                out.push_str(line);
                out.push('\n');
                out.push_str("  | ");
                for _ in 0..span.start.column {
                    out.push(' ');
                }
                let width = if span.end.line == span.start.line {
                    span.end.column.saturating_sub(span.start.column).max(1)
                } else {
                    1
                };
                for _ in 0..width {
                    out.push('^');
                }
            }
        }
        if let Some(hint) = &self.hint {
            out.push_str(&format!("\n  hint: {}", hint));
        }
        if !self.frames.is_empty() {
            out.push_str("\n  trace:");
            for frame in self.frames.iter().rev() {
                match frame.span {
                    Some(span) => out.push_str(&format!("\n    {} at {}", frame.name, span.start)),
                    None => out.push_str(&format!("\n    {}", frame.name)),
                }
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " at {}", span.start)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// A batch of diagnostics from a compile-time phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics { items: Vec::new() }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Diagnostics {
            items: vec![diagnostic],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(line: usize, column: usize, len: usize) -> Span {
        Span {
            start: Position {
                line,
                column,
                offset: 0,
            },
            end: Position {
                line,
                column: column + len,
                offset: len,
            },
        }
    }

    #[test]
    fn test_render_caret_excerpt() {
        let source = "let x = 1\nlet y = oops\nx + y";
        let diag = Diagnostic::new(ErrorKind::UnresolvedBinding, "unknown identifier `oops`")
            .with_span(span_at(1, 8, 4));

        let rendered = diag.render(source);
        assert!(rendered.contains("UnresolvedBinding"));
        assert!(rendered.contains("let y = oops"));
        assert!(rendered.contains("        ^^^^"));
        assert!(rendered.contains("at 2:9"));
    }

    #[test]
    fn test_render_hint_and_trace() {
        let mut diag =
            Diagnostic::new(ErrorKind::Parse, "expected `;`").with_hint("insert `;` after the let binding");
        diag.push_frame("main", None);

        let rendered = diag.render("");
        assert!(rendered.contains("hint: insert `;`"));
        assert!(rendered.contains("trace:"));
    }

    #[test]
    fn test_span_merge() {
        let a = span_at(0, 0, 3);
        let b = span_at(0, 5, 2);
        let merged = a.merge(b);
        assert_eq!(merged.start.column, 0);
        assert_eq!(merged.end.column, 7);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::FunctionArgument.label(), "FunctionArgumentException");
        assert_eq!(ErrorKind::FormatParse.label(), "FormatParseError");
    }
}
