//! DDL dump import.

mod dialect;
mod lexer;
mod parser;

pub use dialect::Dialect;
pub use parser::{SqlParseError, parse_sql};
