use std::fmt;

pub mod ast;
pub mod interp;
mod lexer;
mod parser;
pub mod print;

pub use interp::{run, Config, Outcome, DEFAULT_MAX_DEPTH};
pub use parser::{parse, ParseError};

fn write_separated<T, W>(f: &mut W, sep: &str, ts: impl IntoIterator<Item = T>) -> fmt::Result
    where T: fmt::Display,
          W: fmt::Write,
{
    let mut first = true;
    for t in ts {
        if first {
            write!(f, "{t}")?
        } else {
            write!(f, "{sep}{t}")?
        }
        first = false;
    }
    Ok(())
}
