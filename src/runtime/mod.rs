//! The machine a stemming program runs on: the text buffer, the register
//! file, and the two matching primitives that scan it.

pub mod among;
pub mod buffer;
pub mod env;
pub mod grouping;

pub use among::{find_among, find_among_b, AmongEntry, AmongError};
pub use buffer::{Symbol, SymbolBuffer};
pub use env::{Counts, Env};
pub use grouping::{Grouping, GroupingOutcome};

/// Conditions that abort a run. A pattern that simply fails to match is never one of these.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("line {line}: reference to optimised out variable `{name}` attempted")]
    OptimisedOut { name: String, line: usize },
    #[error("could not find an external called `stem`")]
    MissingStem,
    #[error("line {line}: {kind}: not supported by the interpreter")]
    Unsupported { kind: &'static str, line: usize },
    #[error("out of memory growing buffer to {requested} symbols")]
    Alloc { requested: usize },
    #[error("faulty slice operation: bra={bra} ket={ket} limit={limit} size={size}")]
    InvalidSlice { bra: usize, ket: usize, limit: usize, size: usize },
    #[error("line {line}: among outcome {outcome} has no command (table has {commands})")]
    AmongOutcome { outcome: usize, commands: usize, line: usize },
    #[error("line {line}: evaluation depth {depth} exceeds maximum of {max_depth}")]
    TooDeep { depth: usize, max_depth: usize, line: usize },
}
