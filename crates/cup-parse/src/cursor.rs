use crate::error::SyntaxError;
use crate::token::{Tok, TokKind};
use cup_ast::span::Span;

/// Forward-only view over a token vector with one token of lookahead.
pub struct TokenCursor {
    toks: Vec<Tok>,
    pos: usize,
}

impl TokenCursor {
    pub fn new(toks: Vec<Tok>) -> Self {
        Self { toks, pos: 0 }
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    /// Position used for errors raised once the stream is exhausted.
    fn end_span(&self) -> Span {
        self.toks.last().map_or(Span::new(1, 1), |t| t.span)
    }

    pub fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    /// Span of the current token, or of the last one once exhausted.
    pub fn span(&self) -> Span {
        self.peek().map_or_else(|| self.end_span(), |t| t.span)
    }

    pub fn current(&self) -> Result<&Tok, SyntaxError> {
        self.toks
            .get(self.pos)
            .ok_or_else(|| SyntaxError::new("Unexpected end of input", self.end_span()))
    }

    pub fn consume(&mut self) -> Result<Tok, SyntaxError> {
        let tok = self.current()?.clone();
        self.pos += 1;
        Ok(tok)
    }

    /// Kinds are compared by variant only; payloads are ignored.
    pub fn at(&self, kind: &TokKind) -> bool {
        self.toks
            .get(self.pos)
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    pub fn at_operator(&self, op: &str) -> bool {
        matches!(self.toks.get(self.pos), Some(Tok { kind: TokKind::Operator(o), .. }) if *o == op)
    }

    pub fn consume_expected(&mut self, kind: &TokKind) -> Result<Tok, SyntaxError> {
        let tok = self.current()?;
        if std::mem::discriminant(&tok.kind) != std::mem::discriminant(kind) {
            return Err(SyntaxError::new(
                format!("Expected {}, got {}", kind.name(), tok.kind.name()),
                tok.span,
            ));
        }
        self.consume()
    }

    pub fn expect_end(&self) -> Result<(), SyntaxError> {
        match self.toks.get(self.pos) {
            None => Ok(()),
            Some(tok) => Err(SyntaxError::new("End expected", tok.span)),
        }
    }
}
