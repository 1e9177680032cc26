pub mod runtime;
pub mod snowball;
