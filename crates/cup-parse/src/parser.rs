use std::collections::HashSet;
use std::rc::Rc;

use crate::cursor::TokenCursor;
use crate::error::SyntaxError;
use crate::lexer::tokenize;
use crate::token::{Logic, Tok, TokKind};
use cup_ast::ast::{
    BinOp, ClassDecl, ConditionElif, FnDecl, Ident, Lit, Node, Program, UnOp, Unless,
    WhenPattern,
};
use cup_ast::span::Span;

type PResult<T> = Result<T, SyntaxError>;

/// Tokenize and parse a whole source text.
pub fn parse_str(src: &str) -> PResult<Program> {
    parse(tokenize(src)?)
}

/// Parse a token stream; every token must be consumed.
pub fn parse(toks: Vec<Tok>) -> PResult<Program> {
    let mut p = Parser::new(toks);
    let body = p.parse_statements()?;
    p.cur.expect_end()?;
    log::trace!("parsed {} top-level statements", body.len());
    Ok(Program { body })
}

/// Syntactic context a statement is nested in; decides where
/// `return`, `quit`, `skip` and friends may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Function,
    Class,
    Loop,
    Condition,
    Cond,
    Exception,
}

// Binding powers (low -> high):
//   2:  | or
//   3:  & and
//   4:  > >= < <=
//   5:  == != >< <=>
//   6:  ||
//   7:  ^^
//   8:  &&
//   9:  << >>
//   10: + -
//   11: * / \ %
//   12: unary prefix
//   13: ^
//   14: call, subscript
const UNARY_BP: u8 = 12;
const POSTFIX_BP: u8 = 14;

fn binary_bp(op: &str) -> u8 {
    match op {
        "^" => 13,
        "*" | "/" | "\\" | "%" => 11,
        "+" | "-" => 10,
        "<<" | ">>" => 9,
        "&&" => 8,
        "^^" => 7,
        "||" => 6,
        "==" | "!=" | "><" | "<=>" => 5,
        ">" | ">=" | "<" | "<=" => 4,
        "&" | "and" => 3,
        "|" | "or" => 2,
        // unary-only operators end an expression
        _ => 0,
    }
}

struct Parser {
    cur: TokenCursor,
    scope: Vec<Scope>,
    /// Names declared with `class` so far; calls to them become `CallClass`.
    classes: HashSet<String>,
}

impl Parser {
    fn new(toks: Vec<Tok>) -> Self {
        Self {
            cur: TokenCursor::new(toks),
            scope: Vec::new(),
            classes: HashSet::new(),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.cur.span())
    }

    /// Run `f` with `scope` pushed; the scope is popped on both paths.
    fn scoped<T>(&mut self, scope: Scope, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.scope.push(scope);
        let out = f(self);
        self.scope.pop();
        out
    }

    fn in_scope(&self, scope: Scope) -> bool {
        self.scope.contains(&scope)
    }

    fn innermost(&self) -> Option<Scope> {
        self.scope.last().copied()
    }

    fn parse_ident(&mut self) -> PResult<Ident> {
        let tok = self.cur.consume_expected(&TokKind::Name(String::new()))?;
        match tok.kind {
            TokKind::Name(text) => Ok(Ident {
                text,
                span: tok.span,
            }),
            _ => unreachable!("consume_expected checked the kind"),
        }
    }

    // ======= statements =======

    fn parse_statements(&mut self) -> PResult<Vec<Node>> {
        let mut stmts = Vec::new();
        while !self.cur.is_end() {
            match self.parse_statement()? {
                Some(stmt) => stmts.push(stmt),
                None => break,
            }
        }
        Ok(stmts)
    }

    /// `NEWLINE INDENT statements DEDENT`
    fn parse_block(&mut self) -> PResult<Vec<Node>> {
        self.cur.consume_expected(&TokKind::Newline)?;
        self.cur.consume_expected(&TokKind::Indent)?;
        let body = self.parse_statements()?;
        self.cur.consume_expected(&TokKind::Dedent)?;
        Ok(body)
    }

    /// `: block` with `scope` pushed while the body is parsed.
    fn parse_scoped_body(&mut self, scope: Scope) -> PResult<Vec<Node>> {
        self.cur.consume_expected(&TokKind::Colon)?;
        self.scoped(scope, Self::parse_block)
    }

    /// `None` when the current token cannot start a statement.
    fn parse_statement(&mut self) -> PResult<Option<Node>> {
        // snapshot the kind so the arms can borrow the parser mutably
        let kind = self.cur.current()?.kind.clone();
        let node = match kind {
            TokKind::KwFunction => self.parse_function()?,
            TokKind::KwClass => self.parse_class()?,
            TokKind::KwIf => self.parse_condition()?,
            TokKind::KwUse => self.parse_use()?,
            TokKind::KwDo => self.parse_do()?,
            TokKind::KwWhen => self.parse_when()?,
            TokKind::KwWhile => self.parse_while()?,
            TokKind::KwFor => self.parse_for()?,
            TokKind::KwReturn => self.parse_return()?,
            TokKind::KwThrow => self.parse_throw()?,
            TokKind::KwQuit => self.parse_quit()?,
            TokKind::KwContinue => self.parse_continue()?,
            TokKind::KwSkip => self.parse_skip()?,
            _ => return self.parse_expr_statement(),
        };
        Ok(Some(node))
    }

    fn parse_expr_statement(&mut self) -> PResult<Option<Node>> {
        let Some(expr) = self.parse_expr()? else {
            return Ok(None);
        };

        if !self.cur.at(&TokKind::Assign) {
            self.cur.consume_expected(&TokKind::Newline)?;
            return Ok(Some(expr));
        }

        if !matches!(expr, Node::Ident(_) | Node::Subscript { .. }) {
            return Err(SyntaxError::new("Invalid assignment target", expr.span()));
        }
        self.cur.consume()?; // '='
        let value = self.require_expr()?;
        self.cur.consume_expected(&TokKind::Newline)?;
        let span = expr.span();
        Ok(Some(Node::Assign {
            target: Box::new(expr),
            value: Box::new(value),
            span,
        }))
    }

    /// `(NAME (, NAME)*)?`
    fn parse_params(&mut self) -> PResult<Vec<Ident>> {
        let mut params = Vec::new();
        if self.cur.at(&TokKind::Name(String::new())) {
            loop {
                params.push(self.parse_ident()?);
                if !self.cur.at(&TokKind::Comma) {
                    break;
                }
                self.cur.consume()?;
            }
        }
        Ok(params)
    }

    /// `let NAME ( params ) : block`
    fn parse_function(&mut self) -> PResult<Node> {
        let kw = self.cur.consume_expected(&TokKind::KwFunction)?;
        let name = self.parse_ident()?;
        self.cur.consume_expected(&TokKind::LParen)?;
        let params = self.parse_params()?;
        self.cur.consume_expected(&TokKind::RParen)?;
        let body = self.parse_scoped_body(Scope::Function)?;
        Ok(Node::Function(Rc::new(FnDecl {
            name,
            params,
            body,
            span: kw.span,
        })))
    }

    /// `class NAME [( params )] : block`
    fn parse_class(&mut self) -> PResult<Node> {
        let kw = self.cur.consume_expected(&TokKind::KwClass)?;
        let name = self.parse_ident()?;
        let params = if self.cur.at(&TokKind::LParen) {
            self.cur.consume()?;
            let params = self.parse_params()?;
            self.cur.consume_expected(&TokKind::RParen)?;
            params
        } else {
            Vec::new()
        };
        // visible inside the body so a class can build instances of itself
        self.classes.insert(name.text.clone());
        let body = self.parse_scoped_body(Scope::Class)?;
        Ok(Node::Class(Rc::new(ClassDecl {
            name,
            params,
            body,
            span: kw.span,
        })))
    }

    /// `if expr: block (elif expr: block)* (else: block)?`
    fn parse_condition(&mut self) -> PResult<Node> {
        let kw = self.cur.consume_expected(&TokKind::KwIf)?;
        let test = self.expect_expr("Expected \"if\" condition")?;
        let if_body = self.parse_scoped_body(Scope::Condition)?;

        let mut elifs = Vec::new();
        while self.cur.at(&TokKind::KwElif) {
            let elif = self.cur.consume()?;
            let test = self.expect_expr("Expected \"elif\" condition")?;
            let body = self.parse_scoped_body(Scope::Condition)?;
            elifs.push(ConditionElif {
                test,
                body,
                span: elif.span,
            });
        }

        let else_body = if self.cur.at(&TokKind::KwElse) {
            self.cur.consume()?;
            Some(self.parse_scoped_body(Scope::Condition)?)
        } else {
            None
        };

        Ok(Node::Condition {
            test: Box::new(test),
            if_body,
            elifs,
            else_body,
            span: kw.span,
        })
    }

    /// `use NAME of NAME`
    fn parse_use(&mut self) -> PResult<Node> {
        let kw = self.cur.consume_expected(&TokKind::KwUse)?;
        let obj = self.parse_ident()?;
        self.cur.consume_expected(&TokKind::KwOf)?;
        let library = self.parse_ident()?;
        self.cur.consume_expected(&TokKind::Newline)?;
        Ok(Node::Use {
            obj,
            library,
            span: kw.span,
        })
    }

    /// `do: block (unless expr: block)* (last: block)?`
    fn parse_do(&mut self) -> PResult<Node> {
        let kw = self.cur.consume_expected(&TokKind::KwDo)?;
        let body = self.parse_scoped_body(Scope::Exception)?;

        let mut unlesses = Vec::new();
        while self.cur.at(&TokKind::KwUnless) {
            let unless = self.cur.consume()?;
            let condition = self.expect_expr("Expected \"unless\" exception")?;
            let body = self.parse_scoped_body(Scope::Exception)?;
            unlesses.push(Unless {
                condition,
                body,
                span: unless.span,
            });
        }

        let last_body = if self.cur.at(&TokKind::KwLast) {
            self.cur.consume()?;
            Some(self.parse_scoped_body(Scope::Exception)?)
        } else {
            None
        };

        Ok(Node::Do {
            body,
            unlesses,
            last_body,
            span: kw.span,
        })
    }

    /// `when expr: NEWLINE INDENT (is expr: block)+ (else: block)? DEDENT`
    fn parse_when(&mut self) -> PResult<Node> {
        let kw = self.cur.consume_expected(&TokKind::KwWhen)?;
        let test = self.expect_expr("Expected \"when\" subject")?;
        self.cur.consume_expected(&TokKind::Colon)?;
        self.cur.consume_expected(&TokKind::Newline)?;
        self.cur.consume_expected(&TokKind::Indent)?;

        let mut patterns = Vec::new();
        while self.cur.at(&TokKind::KwIs) {
            let is = self.cur.consume()?;
            let pattern = self.expect_expr("Pattern expression expected")?;
            let body = self.parse_scoped_body(Scope::Cond)?;
            patterns.push(WhenPattern {
                pattern,
                body,
                span: is.span,
            });
        }
        if patterns.is_empty() {
            return Err(self.error_here("One or more \"when\" pattern expected"));
        }

        let else_body = if self.cur.at(&TokKind::KwElse) {
            self.cur.consume()?;
            Some(self.parse_scoped_body(Scope::Cond)?)
        } else {
            None
        };
        self.cur.consume_expected(&TokKind::Dedent)?;

        Ok(Node::When {
            test: Box::new(test),
            patterns,
            else_body,
            span: kw.span,
        })
    }

    /// `while expr: block (else: block)?`; the else body is not a loop.
    fn parse_while(&mut self) -> PResult<Node> {
        let kw = self.cur.consume_expected(&TokKind::KwWhile)?;
        let test = self.expect_expr("While condition expected")?;
        let body = self.parse_scoped_body(Scope::Loop)?;
        let else_body = if self.cur.at(&TokKind::KwElse) {
            self.cur.consume()?;
            self.cur.consume_expected(&TokKind::Colon)?;
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Node::While {
            test: Box::new(test),
            body,
            else_body,
            span: kw.span,
        })
    }

    /// `for NAME in expr: block`
    fn parse_for(&mut self) -> PResult<Node> {
        let kw = self.cur.consume_expected(&TokKind::KwFor)?;
        let var = self.parse_ident()?;
        self.cur.consume_expected(&TokKind::KwIn)?;
        let collection = self.expect_expr("Loop collection expected")?;
        let body = self.parse_scoped_body(Scope::Loop)?;
        Ok(Node::For {
            var,
            collection: Box::new(collection),
            body,
            span: kw.span,
        })
    }

    /// `return [expr]`
    fn parse_return(&mut self) -> PResult<Node> {
        if !self.in_scope(Scope::Function) {
            return Err(self.error_here("Return outside of function"));
        }
        let kw = self.cur.consume()?;
        let value = self.parse_expr()?.map(Box::new);
        self.cur.consume_expected(&TokKind::Newline)?;
        Ok(Node::Return {
            value,
            span: kw.span,
        })
    }

    /// `throw [expr]`
    fn parse_throw(&mut self) -> PResult<Node> {
        if !self.in_scope(Scope::Function) {
            return Err(self.error_here("Throw outside of function"));
        }
        let kw = self.cur.consume()?;
        let value = self.parse_expr()?.map(Box::new);
        self.cur.consume_expected(&TokKind::Newline)?;
        Ok(Node::Throw {
            value,
            span: kw.span,
        })
    }

    fn parse_quit(&mut self) -> PResult<Node> {
        if self.innermost() != Some(Scope::Loop) {
            return Err(self.error_here("Quit outside of loop"));
        }
        let kw = self.cur.consume()?;
        self.cur.consume_expected(&TokKind::Newline)?;
        Ok(Node::Quit(kw.span))
    }

    fn parse_continue(&mut self) -> PResult<Node> {
        if self.innermost() != Some(Scope::Loop) {
            return Err(self.error_here("Continue outside of loop"));
        }
        let kw = self.cur.consume()?;
        self.cur.consume_expected(&TokKind::Newline)?;
        Ok(Node::Continue(kw.span))
    }

    fn parse_skip(&mut self) -> PResult<Node> {
        let allowed = match self.innermost() {
            None => false,
            Some(Scope::Loop | Scope::Condition | Scope::Cond | Scope::Exception) => true,
            Some(_) => self.in_scope(Scope::Function),
        };
        if !allowed {
            return Err(self.error_here("Skip outside of loop or function"));
        }
        let kw = self.cur.consume()?;
        self.cur.consume_expected(&TokKind::Newline)?;
        Ok(Node::Skip(kw.span))
    }

    // ======= expressions (precedence climbing) =======

    fn parse_expr(&mut self) -> PResult<Option<Node>> {
        self.parse_expr_bp(0)
    }

    fn expect_expr(&mut self, message: &str) -> PResult<Node> {
        match self.parse_expr()? {
            Some(node) => Ok(node),
            None => Err(self.error_here(message)),
        }
    }

    fn require_expr(&mut self) -> PResult<Node> {
        self.expect_expr("Expected expression")
    }

    fn require_expr_bp(&mut self, min_bp: u8) -> PResult<Node> {
        match self.parse_expr_bp(min_bp)? {
            Some(node) => Ok(node),
            None => Err(self.error_here("Expected expression")),
        }
    }

    /// Binding power of the current token in infix position.
    fn infix_bp(&self) -> u8 {
        match self.cur.peek().map(|t| &t.kind) {
            Some(TokKind::LParen | TokKind::LBrack) => POSTFIX_BP,
            Some(TokKind::Operator(op)) => binary_bp(op),
            _ => 0,
        }
    }

    /// `None` when the current token cannot start an expression.
    /// Operators of equal power group left-to-right.
    fn parse_expr_bp(&mut self, min_bp: u8) -> PResult<Option<Node>> {
        let Some(mut lhs) = self.parse_prefix()? else {
            return Ok(None);
        };

        loop {
            let bp = self.infix_bp();
            if bp <= min_bp {
                break;
            }
            let op_tok = self.cur.consume()?;
            let span = lhs.span();
            lhs = match op_tok.kind {
                TokKind::LParen => {
                    let args = self.parse_items(&TokKind::RParen)?;
                    let is_class =
                        matches!(&lhs, Node::Ident(id) if self.classes.contains(&id.text));
                    let callee = Box::new(lhs);
                    if is_class {
                        Node::CallClass { callee, args, span }
                    } else {
                        Node::Call { callee, args, span }
                    }
                }
                TokKind::LBrack => {
                    let key = self.expect_expr("Subscript operator key is required")?;
                    self.cur.consume_expected(&TokKind::RBrack)?;
                    Node::Subscript {
                        target: Box::new(lhs),
                        key: Box::new(key),
                        span,
                    }
                }
                TokKind::Operator(sym) => {
                    let Some(op) = BinOp::from_symbol(sym) else {
                        return Err(SyntaxError::new(
                            format!("Binary operator {sym} is not supported"),
                            op_tok.span,
                        ));
                    };
                    let rhs = self.require_expr_bp(bp)?;
                    Node::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                        span,
                    }
                }
                _ => unreachable!("infix_bp is zero for every other token"),
            };
        }

        Ok(Some(lhs))
    }

    fn parse_prefix(&mut self) -> PResult<Option<Node>> {
        let tok = self.cur.current()?.clone();
        let span = tok.span;

        let node = match tok.kind {
            TokKind::Int(v) => Node::Lit(Lit::Int(v), span),
            TokKind::Float(v) => Node::Lit(Lit::Float(v), span),
            TokKind::Str(s) => Node::Lit(Lit::Str(s), span),
            TokKind::Logic(Logic::True) => Node::Lit(Lit::Bool(true), span),
            TokKind::Logic(Logic::False) => Node::Lit(Lit::Bool(false), span),
            TokKind::Logic(Logic::Null) => Node::Lit(Lit::Null, span),
            TokKind::Name(text) => Node::Ident(Ident { text, span }),
            TokKind::Operator(sym) => return self.parse_unary(sym, span).map(Some),
            TokKind::LParen => return self.parse_group(span).map(Some),
            TokKind::LBrack => {
                self.cur.consume()?;
                let items = self.parse_items(&TokKind::RBrack)?;
                return Ok(Some(Node::List { items, span }));
            }
            TokKind::LBrace => return self.parse_dict(span).map(Some),
            _ => return Ok(None),
        };

        self.cur.consume()?;
        Ok(Some(node))
    }

    fn parse_unary(&mut self, sym: &'static str, span: Span) -> PResult<Node> {
        self.cur.consume()?;
        let Some(op) = UnOp::from_symbol(sym) else {
            return Err(SyntaxError::new(
                format!("Unary operator {sym} is not supported"),
                span,
            ));
        };
        let expr = self.require_expr_bp(UNARY_BP)?;
        Ok(Node::Unary {
            op,
            expr: Box::new(expr),
            span,
        })
    }

    /// `(e)` is the inner expression; `()`, `(e,)` and `(a, b)` are shells.
    fn parse_group(&mut self, span: Span) -> PResult<Node> {
        self.cur.consume_expected(&TokKind::LParen)?;
        let mut items = Vec::new();
        let mut saw_comma = false;
        while let Some(item) = self.parse_expr()? {
            items.push(item);
            if !self.cur.at(&TokKind::Comma) {
                break;
            }
            self.cur.consume()?;
            saw_comma = true;
        }
        self.cur.consume_expected(&TokKind::RParen)?;

        if !saw_comma && items.len() == 1 {
            return Ok(items.remove(0));
        }
        Ok(Node::Shell { items, span })
    }

    /// Comma-separated expressions (trailing comma allowed) up to `close`.
    fn parse_items(&mut self, close: &TokKind) -> PResult<Vec<Node>> {
        let mut items = Vec::new();
        while let Some(item) = self.parse_expr()? {
            items.push(item);
            if !self.cur.at(&TokKind::Comma) {
                break;
            }
            self.cur.consume()?;
        }
        self.cur.consume_expected(close)?;
        Ok(items)
    }

    /// `{ (expr : expr ,)* }`
    fn parse_dict(&mut self, span: Span) -> PResult<Node> {
        self.cur.consume_expected(&TokKind::LBrace)?;
        let mut pairs = Vec::new();
        while let Some(key) = self.parse_expr()? {
            self.cur.consume_expected(&TokKind::Colon)?;
            let Some(value) = self.parse_expr()? else {
                return Err(self.error_here("Dictionary value expected"));
            };
            pairs.push((key, value));
            if !self.cur.at(&TokKind::Comma) {
                break;
            }
            self.cur.consume()?;
        }
        self.cur.consume_expected(&TokKind::RBrace)?;
        Ok(Node::Dict { pairs, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_powers_follow_table() {
        assert!(binary_bp("^") > UNARY_BP);
        assert!(binary_bp("*") < UNARY_BP);
        assert!(binary_bp("or") < binary_bp("and"));
        assert_eq!(binary_bp("?"), 0);
        assert_eq!(binary_bp("!"), 0);
    }

    #[test]
    fn scope_is_popped_after_error() {
        let mut p = Parser::new(Vec::new());
        let res: PResult<()> = p.scoped(Scope::Loop, |p| Err(p.error_here("boom")));
        assert!(res.is_err());
        assert!(p.scope.is_empty());
    }
}
