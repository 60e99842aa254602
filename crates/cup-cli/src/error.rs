use cup_parse::SyntaxError;
use thiserror::Error;

use crate::value::Value;

/// Failure while evaluating a Cup program.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("NameError: {0}")]
    Name(String),
    #[error("ArityError: {0}")]
    Arity(String),
    #[error("OperatorError: {0}")]
    Operator(String),
    #[error("IndexError: {0}")]
    Index(String),
    #[error("KeyError: {0}")]
    Key(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("ValueError: {0}")]
    Value(String),
    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),
    #[error("IoError: {0}")]
    Io(String),
    #[error("RecursionError: maximum call depth exceeded (limit: {0} calls)")]
    Recursion(u32),
    /// Source handed to `run`/`solve` failed to parse.
    #[error("SyntaxError: {0}")]
    Syntax(#[from] SyntaxError),
    /// `throw` reached the top of the program.
    #[error("uncaught throw: {}", .0.repr())]
    Uncaught(Value),
    /// `quit`, `continue`, `skip` or `return` escaped every enclosing construct.
    #[error("'{0}' escaped every enclosing loop and function")]
    UncaughtSignal(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Kind name, also the value a `do` block sees when it catches the error.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::Name(_) => "NameError",
            RuntimeError::Arity(_) => "ArityError",
            RuntimeError::Operator(_) => "OperatorError",
            RuntimeError::Index(_) => "IndexError",
            RuntimeError::Key(_) => "KeyError",
            RuntimeError::Type(_) => "TypeError",
            RuntimeError::Value(_) => "ValueError",
            RuntimeError::ZeroDivision(_) => "ZeroDivisionError",
            RuntimeError::Io(_) => "IoError",
            RuntimeError::Recursion(_) => "RecursionError",
            RuntimeError::Syntax(_) => "SyntaxError",
            RuntimeError::Uncaught(_) => "Uncaught",
            RuntimeError::UncaughtSignal(_) => "UncaughtSignal",
            RuntimeError::Internal(_) => "InternalError",
        }
    }

    /// Value matched against `unless` clauses; `None` if `do` must not catch it.
    pub fn caught_value(&self) -> Option<Value> {
        match self {
            RuntimeError::Uncaught(v) => Some(v.clone()),
            RuntimeError::Internal(_) | RuntimeError::UncaughtSignal(_) => None,
            other => Some(Value::str(other.kind())),
        }
    }
}

/// Error from any stage of `evaluate`.
#[derive(Debug, Error)]
pub enum CupError {
    #[error(transparent)]
    Syntax(SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<SyntaxError> for CupError {
    fn from(err: SyntaxError) -> Self {
        CupError::Syntax(err)
    }
}
