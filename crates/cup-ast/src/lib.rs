pub mod span {
    use serde::Serialize;

    /// 1-based position of the token a node starts at.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
    pub struct Span {
        pub line: u32,
        pub column: u32,
    }

    impl Span {
        pub fn new(line: u32, column: u32) -> Self {
            Self { line, column }
        }
    }
}

pub mod ast {
    use super::span::Span;
    use serde::Serialize;
    use std::rc::Rc;

    #[derive(Debug, Clone, Serialize)]
    pub struct Program {
        pub body: Vec<Node>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct Ident {
        pub text: String,
        pub span: Span,
    }

    /// `let name(a, b): body`
    #[derive(Debug, Clone, Serialize)]
    pub struct FnDecl {
        pub name: Ident,
        pub params: Vec<Ident>,
        pub body: Vec<Node>,
        pub span: Span,
    }

    /// `class Name: body` or `class Name(a, b): body`
    #[derive(Debug, Clone, Serialize)]
    pub struct ClassDecl {
        pub name: Ident,
        pub params: Vec<Ident>,
        pub body: Vec<Node>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct ConditionElif {
        pub test: Node,
        pub body: Vec<Node>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct Unless {
        pub condition: Node,
        pub body: Vec<Node>,
        pub span: Span,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct WhenPattern {
        pub pattern: Node,
        pub body: Vec<Node>,
        pub span: Span,
    }

    /// Every statement and expression form of the language.
    ///
    /// Statements and expressions share one type: a statement sequence
    /// evaluates to the value of its last statement, so declarations and
    /// loops are values too.
    #[derive(Debug, Clone, Serialize)]
    pub enum Node {
        Lit(Lit, Span),
        Ident(Ident),
        Assign {
            target: Box<Node>,
            value: Box<Node>,
            span: Span,
        },
        Binary {
            op: BinOp,
            lhs: Box<Node>,
            rhs: Box<Node>,
            span: Span,
        },
        Unary {
            op: UnOp,
            expr: Box<Node>,
            span: Span,
        },
        Function(Rc<FnDecl>),
        Class(Rc<ClassDecl>),
        Call {
            callee: Box<Node>,
            args: Vec<Node>,
            span: Span,
        },
        /// Call whose callee names a class declared earlier in the source.
        CallClass {
            callee: Box<Node>,
            args: Vec<Node>,
            span: Span,
        },
        Condition {
            test: Box<Node>,
            if_body: Vec<Node>,
            elifs: Vec<ConditionElif>,
            else_body: Option<Vec<Node>>,
            span: Span,
        },
        Use {
            obj: Ident,
            library: Ident,
            span: Span,
        },
        Do {
            body: Vec<Node>,
            unlesses: Vec<Unless>,
            last_body: Option<Vec<Node>>,
            span: Span,
        },
        When {
            test: Box<Node>,
            patterns: Vec<WhenPattern>,
            else_body: Option<Vec<Node>>,
            span: Span,
        },
        While {
            test: Box<Node>,
            body: Vec<Node>,
            else_body: Option<Vec<Node>>,
            span: Span,
        },
        For {
            var: Ident,
            collection: Box<Node>,
            body: Vec<Node>,
            span: Span,
        },
        Quit(Span),
        Continue(Span),
        Skip(Span),
        Return {
            value: Option<Box<Node>>,
            span: Span,
        },
        Throw {
            value: Option<Box<Node>>,
            span: Span,
        },
        List {
            items: Vec<Node>,
            span: Span,
        },
        /// Fixed-size ordered tuple: `(a, b)`.
        Shell {
            items: Vec<Node>,
            span: Span,
        },
        Dict {
            pairs: Vec<(Node, Node)>,
            span: Span,
        },
        Subscript {
            target: Box<Node>,
            key: Box<Node>,
            span: Span,
        },
    }

    impl Node {
        pub fn span(&self) -> Span {
            match self {
                Node::Lit(_, span)
                | Node::Quit(span)
                | Node::Continue(span)
                | Node::Skip(span) => *span,
                Node::Ident(id) => id.span,
                Node::Function(decl) => decl.span,
                Node::Class(decl) => decl.span,
                Node::Assign { span, .. }
                | Node::Binary { span, .. }
                | Node::Unary { span, .. }
                | Node::Call { span, .. }
                | Node::CallClass { span, .. }
                | Node::Condition { span, .. }
                | Node::Use { span, .. }
                | Node::Do { span, .. }
                | Node::When { span, .. }
                | Node::While { span, .. }
                | Node::For { span, .. }
                | Node::Return { span, .. }
                | Node::Throw { span, .. }
                | Node::List { span, .. }
                | Node::Shell { span, .. }
                | Node::Dict { span, .. }
                | Node::Subscript { span, .. } => *span,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum Lit {
        Int(i64),
        Float(f64),
        Str(String),
        Bool(bool),
        Null,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum UnOp {
        Pos,
        Neg,
        /// `!` / `not`
        Not,
        /// `?`: type name of the operand
        TypeOf,
        /// `~`: round half to even
        Round,
    }

    impl UnOp {
        pub fn from_symbol(sym: &str) -> Option<Self> {
            Some(match sym {
                "+" => UnOp::Pos,
                "-" => UnOp::Neg,
                "!" | "not" => UnOp::Not,
                "?" => UnOp::TypeOf,
                "~" => UnOp::Round,
                _ => return None,
            })
        }

        pub fn symbol(self) -> &'static str {
            match self {
                UnOp::Pos => "+",
                UnOp::Neg => "-",
                UnOp::Not => "!",
                UnOp::TypeOf => "?",
                UnOp::Round => "~",
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum BinOp {
        // arithmetic
        Add,
        Sub,
        Mul,
        Div,
        FloorDiv,
        Mod,
        Pow,
        // shifts
        Shl,
        Shr,
        // bitwise
        BitAnd,
        BitXor,
        BitOr,
        // equality
        Eq,
        Ne,
        /// `><`: the operands share no element
        Disjoint,
        /// `<=>`: equal after coercion to float
        NumEq,
        // relational
        Gt,
        Ge,
        Lt,
        Le,
        // logical (`&`/`and`, `|`/`or`)
        And,
        Or,
    }

    impl BinOp {
        pub fn from_symbol(sym: &str) -> Option<Self> {
            use BinOp::*;
            Some(match sym {
                "+" => Add,
                "-" => Sub,
                "*" => Mul,
                "/" => Div,
                "\\" => FloorDiv,
                "%" => Mod,
                "^" => Pow,
                "<<" => Shl,
                ">>" => Shr,
                "&&" => BitAnd,
                "^^" => BitXor,
                "||" => BitOr,
                "==" => Eq,
                "!=" => Ne,
                "><" => Disjoint,
                "<=>" => NumEq,
                ">" => Gt,
                ">=" => Ge,
                "<" => Lt,
                "<=" => Le,
                "&" | "and" => And,
                "|" | "or" => Or,
                _ => return None,
            })
        }

        pub fn symbol(self) -> &'static str {
            use BinOp::*;
            match self {
                Add => "+",
                Sub => "-",
                Mul => "*",
                Div => "/",
                FloorDiv => "\\",
                Mod => "%",
                Pow => "^",
                Shl => "<<",
                Shr => ">>",
                BitAnd => "&&",
                BitXor => "^^",
                BitOr => "||",
                Eq => "==",
                Ne => "!=",
                Disjoint => "><",
                NumEq => "<=>",
                Gt => ">",
                Ge => ">=",
                Lt => "<",
                Le => "<=",
                And => "and",
                Or => "or",
            }
        }
    }
}
