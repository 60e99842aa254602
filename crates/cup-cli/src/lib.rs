#![forbid(unsafe_code)]
#![deny(unused_must_use)]

pub mod env;
pub mod error;
pub mod eval;
pub mod natives;
mod ops;
pub mod value;

pub use env::Env;
pub use error::{CupError, RuntimeError};
pub use eval::{eval_program, evaluate, evaluate_in, ControlFlow, MAX_CALL_DEPTH};
pub use natives::{NativeArgs, NativeFn, NativeImpl, NativeRegistry};
pub use value::{Dict, Object, Value};
