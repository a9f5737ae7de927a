//! Console built-in object.
//!
//! Provides `console.log`, `console.error` and `console.warn`.

use crate::runtime::{Callable, ObjectRef, Value};

/// Joins arguments the way `console.log` prints them.
pub fn format_args(args: &[Value]) -> String {
    let output: Vec<String> = args.iter().map(|v| format!("{}", v)).collect();
    output.join(" ")
}

/// Builds the `console` object.
pub fn console_object() -> ObjectRef {
    let console = ObjectRef::new();
    console.set(
        "log",
        Callable::native("log", |args: &[Value]| {
            println!("{}", format_args(args));
            Ok(Value::Undefined)
        })
        .into_value(),
    );
    console.set(
        "error",
        Callable::native("error", |args: &[Value]| {
            eprintln!("{}", format_args(args));
            Ok(Value::Undefined)
        })
        .into_value(),
    );
    console.set(
        "warn",
        Callable::native("warn", |args: &[Value]| {
            eprintln!("Warning: {}", format_args(args));
            Ok(Value::Undefined)
        })
        .into_value(),
    );
    console
}
