//! Built-in global bindings.

pub mod console;

use crate::runtime::{Scope, Value};

/// Declares the built-in globals in `scope`.
pub fn register_builtins(scope: &Scope) {
    scope.declare("undefined", Value::Undefined, false);
    scope.declare("NaN", Value::Number(f64::NAN), false);
    scope.declare("Infinity", Value::Number(f64::INFINITY), false);
    scope.declare("console", Value::Object(console::console_object()), true);
}
