use cup_ast::span::Span;
use thiserror::Error;

/// Tokenizer or parser failure at a 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    /// The offending source line, trailing whitespace removed.
    pub fn source_line<'s>(&self, source: &'s str) -> Option<&'s str> {
        let idx = (self.line as usize).checked_sub(1)?;
        source.lines().nth(idx).map(str::trim_end)
    }

    /// Three-line report: message, source line, caret under the column.
    pub fn render(&self, source: &str) -> String {
        let line = self.source_line(source).unwrap_or("");
        let pad = " ".repeat((self.column as usize).saturating_sub(1));
        format!("Syntax error: {self}\n{line}\n{pad}^")
    }
}
