// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module cache for require()
//!
//! Records are keyed by resolved absolute path, so a file is executed at
//! most once per loader no matter how many identifiers lead to it. The
//! cache also owns the stack of directories of the modules currently
//! executing, which is what relative identifiers resolve against.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tether_engine::Value;

/// Where a module is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The body is running; `exports` is the placeholder
    Resolving,
    /// The body completed; `exports` is final
    Loaded,
}

/// Cached module entry
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Identifier the module was first requested by
    pub id: String,
    /// Resolved absolute path
    pub path: PathBuf,
    /// The module's exports
    pub exports: Value,
    /// Lifecycle state
    pub state: LoadState,
}

impl ModuleRecord {
    /// Returns true once the module body has completed.
    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }
}

/// A Resolving record published by [`ModuleCache::reserve`].
///
/// Must be handed back to either [`ModuleCache::commit`] or
/// [`ModuleCache::abandon`].
#[derive(Debug)]
#[must_use = "a reservation must be committed or abandoned"]
pub struct Reservation {
    id: String,
    path: PathBuf,
    placeholder: Value,
}

impl Reservation {
    /// The identifier the module was requested by.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The reserved path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The empty exports object visible to circular requires.
    pub fn placeholder(&self) -> &Value {
        &self.placeholder
    }
}

/// Pops the context stack back to its depth before the push, on drop.
#[derive(Debug)]
#[must_use = "the context is popped when the guard is dropped"]
pub struct ContextGuard<'a> {
    cache: &'a ModuleCache,
    depth: usize,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.cache.context.lock().truncate(self.depth);
    }
}

/// Thread-safe module cache
#[derive(Debug, Default)]
pub struct ModuleCache {
    /// Absolute path to record
    records: DashMap<PathBuf, ModuleRecord>,
    /// (context directory, identifier) to resolved path
    index: DashMap<(PathBuf, String), PathBuf>,
    /// Directories of the modules currently executing, innermost last
    context: Mutex<Vec<PathBuf>>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports stored for `path`, in whatever state the record is.
    pub fn get(&self, path: &Path) -> Option<Value> {
        self.records.get(path).map(|record| record.exports.clone())
    }

    /// A snapshot of the record for `path`.
    pub fn record(&self, path: &Path) -> Option<ModuleRecord> {
        self.records.get(path).map(|record| record.clone())
    }

    /// Check if a module is cached
    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(path)
    }

    /// Stores a finished module directly, without running anything.
    ///
    /// An existing Loaded record is left untouched: published exports are
    /// never replaced. Returns the exports now on record.
    pub fn put(&self, id: &str, path: impl Into<PathBuf>, exports: Value) -> Value {
        let path = path.into();
        let mut record = self.records.entry(path.clone()).or_insert_with(|| ModuleRecord {
            id: id.to_string(),
            path,
            exports: exports.clone(),
            state: LoadState::Loaded,
        });
        if !record.is_loaded() {
            record.exports = exports;
            record.state = LoadState::Loaded;
        }
        record.exports.clone()
    }

    /// Publishes a Resolving record with a fresh empty placeholder.
    pub fn reserve(&self, id: &str, path: &Path) -> Reservation {
        let placeholder = Value::object();
        self.records.insert(
            path.to_path_buf(),
            ModuleRecord {
                id: id.to_string(),
                path: path.to_path_buf(),
                exports: placeholder.clone(),
                state: LoadState::Resolving,
            },
        );
        Reservation {
            id: id.to_string(),
            path: path.to_path_buf(),
            placeholder,
        }
    }

    /// Marks a reservation Loaded with its final exports.
    pub fn commit(&self, reservation: Reservation, exports: Value) -> Value {
        let Reservation { id, path, .. } = reservation;
        match self.records.get_mut(&path) {
            Some(mut record) => {
                if !record.is_loaded() {
                    record.exports = exports;
                    record.state = LoadState::Loaded;
                }
                record.exports.clone()
            }
            // Deleted while the body ran; publish anyway
            None => {
                self.records.insert(
                    path.clone(),
                    ModuleRecord {
                        id,
                        path,
                        exports: exports.clone(),
                        state: LoadState::Loaded,
                    },
                );
                exports
            }
        }
    }

    /// Drops a reservation after a failed load so a retry re-executes.
    pub fn abandon(&self, reservation: Reservation) {
        self.records
            .remove_if(&reservation.path, |_, record| !record.is_loaded());
    }

    /// Exports for a previously seen `(context, identifier)` pair, honoured
    /// only when the record it points to is Loaded.
    pub fn lookup(&self, context: &Path, id: &str) -> Option<Value> {
        let path = self
            .index
            .get(&(context.to_path_buf(), id.to_string()))
            .map(|entry| entry.value().clone())?;
        self.records
            .get(&path)
            .filter(|record| record.is_loaded())
            .map(|record| record.exports.clone())
    }

    /// Records which path `(context, identifier)` resolved to.
    pub fn remember(&self, context: &Path, id: &str, path: &Path) {
        self.index
            .insert((context.to_path_buf(), id.to_string()), path.to_path_buf());
    }

    /// Remove a module from the cache so the next require re-executes it
    pub fn delete(&self, path: &Path) -> Option<ModuleRecord> {
        self.index.retain(|_, target| target.as_path() != path);
        self.records.remove(path).map(|(_, record)| record)
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.index.clear();
        self.records.clear();
    }

    /// Get all cached module paths, sorted
    pub fn keys(&self) -> Vec<PathBuf> {
        let mut keys: Vec<PathBuf> = self.records.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Snapshots of every record, sorted by path
    pub fn records(&self) -> Vec<ModuleRecord> {
        let mut records: Vec<ModuleRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Enters a module directory. The returned guard pops it again.
    pub fn push_context(&self, dir: impl Into<PathBuf>) -> ContextGuard<'_> {
        let mut stack = self.context.lock();
        let depth = stack.len();
        stack.push(dir.into());
        ContextGuard { cache: self, depth }
    }

    /// Pops the innermost directory.
    pub fn pop_context(&self) -> Option<PathBuf> {
        self.context.lock().pop()
    }

    /// Directory of the module currently executing, if any.
    pub fn current_context(&self) -> Option<PathBuf> {
        self.context.lock().last().cloned()
    }

    /// Current nesting depth of module loads.
    pub fn context_depth(&self) -> usize {
        self.context.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reserve_then_commit() {
        let cache = ModuleCache::new();
        let path = Path::new("/app/a.js");

        let reservation = cache.reserve("./a", path);
        let placeholder = reservation.placeholder().clone();
        assert_eq!(cache.record(path).unwrap().state, LoadState::Resolving);
        assert_eq!(cache.get(path), Some(placeholder));

        let exports = Value::from("done");
        assert_eq!(cache.commit(reservation, exports.clone()), exports);
        let record = cache.record(path).unwrap();
        assert!(record.is_loaded());
        assert_eq!(record.exports, exports);
        assert_eq!(record.id, "./a");
    }

    #[test]
    fn test_commit_after_delete_keeps_identifier() {
        let cache = ModuleCache::new();
        let path = Path::new("/app/a.js");
        let reservation = cache.reserve("./a", path);
        assert_eq!(reservation.id(), "./a");
        cache.delete(path);

        let exports = cache.commit(reservation, Value::from(1.0));
        let record = cache.record(path).unwrap();
        assert!(record.is_loaded());
        assert_eq!(record.id, "./a");
        assert_eq!(record.exports, exports);
    }

    #[test]
    fn test_abandon_removes_record() {
        let cache = ModuleCache::new();
        let reservation = cache.reserve("./a", Path::new("/app/a.js"));
        cache.abandon(reservation);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_does_not_replace_loaded_exports() {
        let cache = ModuleCache::new();
        let first = Value::object();
        cache.put("a", "/app/a.js", first.clone());
        let kept = cache.put("a", "/app/a.js", Value::object());
        assert_eq!(kept, first);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lookup_only_honours_loaded_records() {
        let cache = ModuleCache::new();
        let dir = Path::new("/app");
        let path = Path::new("/app/a.js");

        let reservation = cache.reserve("./a", path);
        cache.remember(dir, "./a", path);
        assert_eq!(cache.lookup(dir, "./a"), None);

        let exports = cache.commit(reservation, Value::from(1.0));
        assert_eq!(cache.lookup(dir, "./a"), Some(exports));
        assert_eq!(cache.lookup(Path::new("/other"), "./a"), None);
    }

    #[test]
    fn test_delete_drops_index_entries() {
        let cache = ModuleCache::new();
        let dir = Path::new("/app");
        let path = Path::new("/app/a.js");
        cache.put("./a", path, Value::Null);
        cache.remember(dir, "./a", path);

        assert!(cache.delete(path).is_some());
        assert_eq!(cache.lookup(dir, "./a"), None);
        assert!(cache.delete(path).is_none());
    }

    #[test]
    fn test_clear() {
        let cache = ModuleCache::new();
        cache.put("a", "/app/a.js", Value::Null);
        cache.put("b", "/app/b.js", Value::Null);
        assert_eq!(cache.keys(), vec![PathBuf::from("/app/a.js"), PathBuf::from("/app/b.js")]);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_context_guard_pops_on_drop() {
        let cache = ModuleCache::new();
        assert_eq!(cache.current_context(), None);
        {
            let _outer = cache.push_context("/app");
            {
                let _inner = cache.push_context("/app/lib");
                assert_eq!(cache.current_context(), Some(PathBuf::from("/app/lib")));
                assert_eq!(cache.context_depth(), 2);
            }
            assert_eq!(cache.current_context(), Some(PathBuf::from("/app")));
        }
        assert_eq!(cache.context_depth(), 0);
    }

    #[test]
    fn test_context_guard_survives_manual_pop() {
        let cache = ModuleCache::new();
        let guard = cache.push_context("/app");
        assert_eq!(cache.pop_context(), Some(PathBuf::from("/app")));
        drop(guard);
        assert_eq!(cache.context_depth(), 0);
    }
}
