#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

mod cursor;
mod error;
mod lexer;
mod parser;
mod token;

pub use cursor::TokenCursor;
pub use error::SyntaxError;
pub use lexer::{tokenize, Lexer};
pub use parser::{parse, parse_str};
pub use token::{Logic, Tok, TokKind};
