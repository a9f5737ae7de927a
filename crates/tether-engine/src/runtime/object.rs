//! Shared, mutable object and array storage.
//!
//! Objects are handed out as reference-counted handles so that a module's
//! `exports` object can be observed by other modules while it is still being
//! filled in.

use super::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// An object's own properties, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Object {
    properties: FxHashMap<String, Value>,
    order: Vec<String>,
}

impl Object {
    /// Creates a new empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Sets a property value, appending the key if it is new.
    pub fn set(&mut self, key: String, value: Value) {
        if !self.properties.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.properties.insert(key, value);
    }

    /// Deletes a property.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.properties.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    /// Checks if a property exists.
    pub fn has(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Property keys in insertion order.
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Number of own properties.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// A shared handle to an [`Object`]. Cloning the handle aliases the object.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl ObjectRef {
    /// Allocates a new empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an object from key/value pairs.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut object = Object::new();
        for (key, value) in pairs {
            object.set(key.into(), value);
        }
        Self(Arc::new(RwLock::new(object)))
    }

    /// Reads a property, returning `Undefined` when absent.
    pub fn get(&self, key: &str) -> Value {
        self.0.read().get(key).cloned().unwrap_or(Value::Undefined)
    }

    /// Writes a property.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.write().set(key.into(), value);
    }

    /// Removes a property.
    pub fn delete(&self, key: &str) -> bool {
        self.0.write().delete(key)
    }

    /// Checks if a property exists.
    pub fn has(&self, key: &str) -> bool {
        self.0.read().has(key)
    }

    /// Snapshot of the property keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.read().keys().to_vec()
    }

    /// Snapshot of the properties in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let object = self.0.read();
        object
            .keys()
            .iter()
            .map(|k| (k.clone(), object.get(k).cloned().unwrap_or_default()))
            .collect()
    }

    /// Number of own properties.
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Returns true if the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    // Objects may be cyclic, so only the shape is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:?})", self.keys())
    }
}

/// A shared handle to an array.
#[derive(Clone, Default)]
pub struct ArrayRef(Arc<RwLock<Vec<Value>>>);

impl ArrayRef {
    /// Creates an array from its elements.
    pub fn new(elements: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(elements)))
    }

    /// Reads an element, returning `Undefined` when out of bounds.
    pub fn get(&self, index: usize) -> Value {
        self.0.read().get(index).cloned().unwrap_or(Value::Undefined)
    }

    /// Writes an element, padding with `Undefined` when past the end.
    pub fn set(&self, index: usize, value: Value) {
        let mut elements = self.0.write();
        if index >= elements.len() {
            elements.resize(index + 1, Value::Undefined);
        }
        elements[index] = value;
    }

    /// Appends an element.
    pub fn push(&self, value: Value) {
        self.0.write().push(value);
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Returns true if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayRef(len = {})", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let obj = ObjectRef::new();
        obj.set("b", Value::Number(1.0));
        obj.set("a", Value::Number(2.0));
        obj.set("b", Value::Number(3.0));
        assert_eq!(obj.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(obj.get("b"), Value::Number(3.0));
    }

    #[test]
    fn test_clone_aliases() {
        let obj = ObjectRef::new();
        let alias = obj.clone();
        alias.set("x", Value::Boolean(true));
        assert!(obj.has("x"));
        assert!(obj.ptr_eq(&alias));
        assert!(!obj.ptr_eq(&ObjectRef::new()));
    }

    #[test]
    fn test_delete() {
        let obj = ObjectRef::from_pairs([("a", Value::Null), ("b", Value::Null)]);
        assert!(obj.delete("a"));
        assert!(!obj.delete("a"));
        assert_eq!(obj.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_array_set_pads() {
        let arr = ArrayRef::new(vec![]);
        arr.set(2, Value::Number(1.0));
        assert_eq!(arr.len(), 3);
        assert!(arr.get(0).is_undefined());
        assert!(arr.get(10).is_undefined());
    }
}
