pub mod types;
pub mod error;
pub mod parser;
pub mod job;
pub mod global;
pub mod builtin;
pub mod eval;

pub use error::{ExecError, ParseError};
pub use eval::execute;
pub use parser::parse;
