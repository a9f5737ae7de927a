//! Function representation.

use super::environment::Scope;
use super::object::ObjectRef;
use super::value::Value;
use crate::Error;
use crate::ast::Statement;
use std::sync::Arc;

/// Signature of a host function exposed to scripts.
pub type NativeFunction = dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync;

/// A script-defined function closing over its defining scope.
#[derive(Clone)]
pub struct Function {
    /// The parameter names
    pub params: Vec<String>,
    /// The body statements
    pub body: Arc<[Statement]>,
    /// The scope the function was created in
    pub closure: Scope,
}

/// The code behind a callable value.
#[derive(Clone)]
pub enum CallableKind {
    /// A script function
    Script(Function),
    /// A native Rust function
    Native(Arc<NativeFunction>),
}

/// A callable value - either a script function or a native function.
///
/// Functions carry their own property bag so hosts can hang helpers off
/// them (`require.resolve`).
#[derive(Clone)]
pub struct Callable {
    name: Option<String>,
    kind: CallableKind,
    properties: ObjectRef,
}

impl Callable {
    /// Wraps a script function.
    pub fn script(name: Option<String>, function: Function) -> Self {
        Self {
            name,
            kind: CallableKind::Script(function),
            properties: ObjectRef::new(),
        }
    }

    /// Wraps a native function.
    pub fn native<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            kind: CallableKind::Native(Arc::new(func)),
            properties: ObjectRef::new(),
        }
    }

    /// Attaches a property, builder style.
    pub fn with_property(self, key: &str, value: Value) -> Self {
        self.properties.set(key, value);
        self
    }

    /// The function name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The callable code.
    pub fn kind(&self) -> &CallableKind {
        &self.kind
    }

    /// Properties attached to the function object.
    pub fn properties(&self) -> &ObjectRef {
        &self.properties
    }

    /// Number of declared parameters (0 for native functions).
    pub fn arity(&self) -> usize {
        match &self.kind {
            CallableKind::Script(func) => func.params.len(),
            CallableKind::Native(_) => 0,
        }
    }

    /// Converts into a script value.
    pub fn into_value(self) -> Value {
        Value::Function(Arc::new(self))
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            CallableKind::Script(_) => write!(f, "Function({:?})", self.name),
            CallableKind::Native(_) => write!(f, "NativeFunction({:?})", self.name),
        }
    }
}
