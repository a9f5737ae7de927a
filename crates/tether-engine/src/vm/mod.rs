//! Script execution.
//!
//! The engine evaluates the AST directly; there is no bytecode stage.

mod interpreter;

pub use interpreter::{Interpreter, get_member, set_member};
