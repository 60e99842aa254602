use std::fmt;

use cup_ast::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    True,
    False,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    // literals
    Int(i64),
    Float(f64),
    Str(String),
    Logic(Logic),
    Name(String),
    /// Every operator spelling, including the word operators `and`, `or`, `not`.
    Operator(&'static str),
    // punctuation
    Assign,
    Colon,
    LParen,
    RParen,
    LBrack,
    RBrack,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,
    // layout
    Newline,
    Indent,
    Dedent,
    // keywords
    KwWait,
    KwElse,
    KwUse,
    KwSkip,
    KwQuit,
    KwOf,
    KwThrow,
    KwIs,
    KwClass,
    KwLast,
    KwReturn,
    KwWhile,
    KwFor,
    KwWhen,
    KwDo,
    KwContinue,
    KwAs,
    KwFunction, // `let`
    KwFrom,
    KwLocal,
    KwGlobal,
    KwSync,
    KwElif,
    KwIf,
    KwIn,
    KwUnless,
}

impl TokKind {
    pub fn keyword(word: &str) -> Option<TokKind> {
        use TokKind::*;
        Some(match word {
            "wait" => KwWait,
            "else" => KwElse,
            "use" => KwUse,
            "skip" => KwSkip,
            "quit" => KwQuit,
            "of" => KwOf,
            "throw" => KwThrow,
            "is" => KwIs,
            "class" => KwClass,
            "last" => KwLast,
            "return" => KwReturn,
            "while" => KwWhile,
            "for" => KwFor,
            "when" => KwWhen,
            "do" => KwDo,
            "continue" => KwContinue,
            "as" => KwAs,
            "let" => KwFunction,
            "from" => KwFrom,
            "local" => KwLocal,
            "global" => KwGlobal,
            "sync" => KwSync,
            "elif" => KwElif,
            "if" => KwIf,
            "in" => KwIn,
            "unless" => KwUnless,
            _ => return None,
        })
    }

    /// Upper-case kind name used in parser diagnostics.
    pub fn name(&self) -> &'static str {
        use TokKind::*;
        match self {
            Int(_) | Float(_) => "NUMBER",
            Str(_) => "STRING",
            Logic(_) => "LOGIC",
            Name(_) => "NAME",
            Operator(_) => "OPERATOR",
            Assign => "ASSIGN",
            Colon => "COLON",
            LParen => "LPAREN",
            RParen => "RPAREN",
            LBrack => "LBRACK",
            RBrack => "RBRACK",
            LBrace => "LCBRACK",
            RBrace => "RCBRACK",
            Comma => "COMMA",
            Semicolon => "SEMICOLON",
            Dot => "DOT",
            Newline => "NEWLINE",
            Indent => "INDENT",
            Dedent => "DEDENT",
            KwWait => "WAIT",
            KwElse => "ELSE",
            KwUse => "USE",
            KwSkip => "SKIP",
            KwQuit => "QUIT",
            KwOf => "OF",
            KwThrow => "THROW",
            KwIs => "IS",
            KwClass => "CLASS",
            KwLast => "LAST",
            KwReturn => "RETURN",
            KwWhile => "WHILE",
            KwFor => "FOR",
            KwWhen => "WHEN",
            KwDo => "DO",
            KwContinue => "CONTINUE",
            KwAs => "AS",
            KwFunction => "FUNCTION",
            KwFrom => "FROM",
            KwLocal => "LOCAL",
            KwGlobal => "GLOBAL",
            KwSync => "SYNC",
            KwElif => "ELIF",
            KwIf => "IF",
            KwIn => "IN",
            KwUnless => "UNLESS",
        }
    }
}

/// Source spelling; tokenizing the text again gives back the same kind.
/// Layout tokens have no spelling and print nothing.
impl fmt::Display for TokKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokKind::*;
        let text: &str = match self {
            Int(v) => return write!(f, "{v}"),
            Float(v) => {
                let digits = v.to_string();
                return if digits.contains('.') {
                    write!(f, "{digits}")
                } else {
                    write!(f, "{digits}.0")
                };
            }
            Str(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '\'' => f.write_str("\\'")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        '\u{7}' => f.write_str("\\a")?,
                        '\u{8}' => f.write_str("\\b")?,
                        '\u{b}' => f.write_str("\\v")?,
                        '\u{c}' => f.write_str("\\f")?,
                        c => write!(f, "{c}")?,
                    }
                }
                return f.write_str("'");
            }
            Logic(self::Logic::True) => "true",
            Logic(self::Logic::False) => "false",
            Logic(self::Logic::Null) => "null",
            Name(name) => name,
            Operator(op) => op,
            Assign => "=",
            Colon => ":",
            LParen => "(",
            RParen => ")",
            LBrack => "[",
            RBrack => "]",
            LBrace => "{",
            RBrace => "}",
            Comma => ",",
            Semicolon => ";",
            Dot => ".",
            Newline | Indent | Dedent => "",
            KwWait => "wait",
            KwElse => "else",
            KwUse => "use",
            KwSkip => "skip",
            KwQuit => "quit",
            KwOf => "of",
            KwThrow => "throw",
            KwIs => "is",
            KwClass => "class",
            KwLast => "last",
            KwReturn => "return",
            KwWhile => "while",
            KwFor => "for",
            KwWhen => "when",
            KwDo => "do",
            KwContinue => "continue",
            KwAs => "as",
            KwFunction => "let",
            KwFrom => "from",
            KwLocal => "local",
            KwGlobal => "global",
            KwSync => "sync",
            KwElif => "elif",
            KwIf => "if",
            KwIn => "in",
            KwUnless => "unless",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tok {
    pub kind: TokKind,
    pub span: Span,
}

impl Tok {
    pub fn new(kind: TokKind, line: u32, column: u32) -> Self {
        Self {
            kind,
            span: Span::new(line, column),
        }
    }
}
