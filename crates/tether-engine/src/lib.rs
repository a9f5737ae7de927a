// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tether-engine
//!
//! A small embeddable script interpreter used to run module bodies.
//!
//! ## Overview
//!
//! This crate provides:
//! - A lexer and recursive-descent parser for a compact JavaScript subset
//! - A tree-walking interpreter with closures and lexical scopes
//! - Thread-safe values that hosts can inspect and build
//! - A way to compile a source text as a function body with named parameters
//!
//! ## Quick Start
//!
//! ```rust
//! use tether_engine::{Engine, Value};
//!
//! let engine = Engine::new();
//! let result = engine.eval("1 + 2;").unwrap();
//! assert_eq!(result, Value::Number(3.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod vm;

use std::sync::Arc;

pub use runtime::value::Value;
pub use runtime::{ArrayRef, Callable, ObjectRef, Scope};

use parser::Parser;
use runtime::Function;
use vm::Interpreter;

/// The script engine.
///
/// Holds the global scope that every evaluated program and compiled
/// function body sees. The engine is `Send + Sync`; each evaluation
/// runs on the calling thread.
#[derive(Debug, Clone)]
pub struct Engine {
    globals: Scope,
}

impl Engine {
    /// Creates a new engine with the built-in globals installed.
    pub fn new() -> Self {
        let globals = Scope::new();
        builtins::register_builtins(&globals);
        Self { globals }
    }

    /// The global scope.
    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    /// Binds a global variable.
    pub fn define_global(&self, name: &str, value: Value) {
        self.globals.declare(name, value, true);
    }

    /// Evaluates source code in the global scope and returns the value of
    /// the last statement.
    ///
    /// Declarations persist between calls, which is what the REPL relies on.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tether_engine::{Engine, Value};
    /// let engine = Engine::new();
    /// engine.eval("var x = 40;").unwrap();
    /// assert_eq!(engine.eval("x + 2;").unwrap(), Value::Number(42.0));
    /// ```
    pub fn eval(&self, source: &str) -> Result<Value, Error> {
        let program = Parser::new(source).parse_program()?;
        Interpreter::new().run_program(&program.body, &self.globals)
    }

    /// Evaluates a source file.
    pub fn eval_file(&self, path: &std::path::Path) -> Result<Value, Error> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::Io(e.to_string()))?;
        self.eval(&source)
    }

    /// Compiles `source` as the body of a function taking `params`.
    ///
    /// The body is parsed eagerly so syntax errors surface here, before
    /// anything runs. The returned function closes over the global scope.
    pub fn compile_function(&self, source: &str, params: &[&str]) -> Result<Value, Error> {
        let program = Parser::new(source).parse_program()?;
        let function = Function {
            params: params.iter().map(|p| p.to_string()).collect(),
            body: program.body.into(),
            closure: self.globals.clone(),
        };
        Ok(Callable::script(None, function).into_value())
    }

    /// Calls a function value.
    pub fn call(&self, function: &Value, args: &[Value]) -> Result<Value, Error> {
        Interpreter::new().call(function, args)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during script execution.
#[derive(Debug, Clone)]
pub enum Error {
    /// Syntax error during parsing
    SyntaxError(String),
    /// Type error during execution
    TypeError(String),
    /// Reference error (undefined variable)
    ReferenceError(String),
    /// Range error (call stack exhausted, etc.)
    RangeError(String),
    /// A value raised by a `throw` statement
    Thrown {
        /// The thrown value
        value: Value,
        /// Line of the `throw` statement
        line: usize,
    },
    /// An error raised by a host function, kept intact so the host can
    /// recover it on the way out
    Host(Arc<dyn std::error::Error + Send + Sync>),
    /// Internal engine error
    InternalError(String),
    /// I/O error
    Io(String),
}

impl Error {
    /// Wraps a host error.
    pub fn host<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Host(Arc::new(error))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SyntaxError(msg) => write!(f, "SyntaxError: {}", msg),
            Error::TypeError(msg) => write!(f, "TypeError: {}", msg),
            Error::ReferenceError(msg) => write!(f, "ReferenceError: {}", msg),
            Error::RangeError(msg) => write!(f, "RangeError: {}", msg),
            Error::Thrown { value, line } => write!(f, "Uncaught {} (line {})", value, line),
            Error::Host(err) => write!(f, "{}", err),
            Error::InternalError(msg) => write!(f, "InternalError: {}", msg),
            Error::Io(msg) => write!(f, "IOError: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Host(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
