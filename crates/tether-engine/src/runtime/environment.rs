//! Lexical environments for variable binding.

use super::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A lexical scope. Cloning the handle shares the scope, which is how
/// closures keep their defining environment alive.
#[derive(Debug, Clone, Default)]
pub struct Scope(Arc<RwLock<Environment>>);

#[derive(Debug, Default)]
struct Environment {
    bindings: FxHashMap<String, Binding>,
    outer: Option<Scope>,
}

/// A variable binding.
#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// Why an assignment was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    /// No binding with that name is visible
    Unbound,
    /// The binding is `const`
    Constant,
}

impl Scope {
    /// Creates a new global scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child scope of `self`.
    pub fn child(&self) -> Self {
        Self(Arc::new(RwLock::new(Environment {
            bindings: FxHashMap::default(),
            outer: Some(self.clone()),
        })))
    }

    /// Declares (or redeclares) a binding in this scope.
    pub fn declare(&self, name: impl Into<String>, value: Value, mutable: bool) {
        self.0
            .write()
            .bindings
            .insert(name.into(), Binding { value, mutable });
    }

    /// Looks a name up through the scope chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        let env = self.0.read();
        if let Some(binding) = env.bindings.get(name) {
            return Some(binding.value.clone());
        }
        let outer = env.outer.clone();
        drop(env);
        outer.and_then(|scope| scope.get(name))
    }

    /// Assigns to the nearest visible binding.
    pub fn set(&self, name: &str, value: Value) -> Result<(), AssignError> {
        let mut env = self.0.write();
        if let Some(binding) = env.bindings.get_mut(name) {
            if !binding.mutable {
                return Err(AssignError::Constant);
            }
            binding.value = value;
            return Ok(());
        }
        let outer = env.outer.clone();
        drop(env);
        match outer {
            Some(scope) => scope.set(name, value),
            None => Err(AssignError::Unbound),
        }
    }

    /// Returns true if `name` is bound directly in this scope.
    pub fn has_own(&self, name: &str) -> bool {
        self.0.read().bindings.contains_key(name)
    }
}
