//! Runtime types: values, objects, functions and scopes.

pub mod environment;
pub mod function;
pub mod object;
pub mod value;

pub use environment::Scope;
pub use function::{Callable, CallableKind, Function};
pub use object::{ArrayRef, ObjectRef};
pub use value::Value;
