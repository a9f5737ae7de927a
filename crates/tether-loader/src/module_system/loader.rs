// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loader - reads, compiles and runs modules

use crate::compiler::ScriptCompiler;
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::fs::{FileSystem, OsFileSystem};
use crate::module_system::cache::{LoadState, ModuleCache, Reservation};
use crate::module_system::require;
use crate::module_system::resolver::ModuleResolver;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tether_engine::{Engine, ObjectRef, Value};
use tracing::debug;

/// Parameters every module body is compiled with
pub const MODULE_PARAMS: [&str; 3] = ["require", "exports", "module"];

/// Module loader
///
/// Always handed out as `Arc<Loader>`: the `require` functions it gives to
/// scripts hold a weak reference back to it.
pub struct Loader {
    this: Weak<Loader>,
    config: LoaderConfig,
    fs: Arc<dyn FileSystem>,
    resolver: ModuleResolver,
    cache: ModuleCache,
    compiler: Arc<dyn ScriptCompiler>,
}

impl Loader {
    /// A loader running modules on a fresh engine.
    pub fn new(config: LoaderConfig) -> Arc<Self> {
        Self::with_engine(config, Engine::new())
    }

    /// A loader running modules on `engine`; module bodies see its globals.
    pub fn with_engine(config: LoaderConfig, engine: Engine) -> Arc<Self> {
        Self::with_parts(config, Arc::new(OsFileSystem), Arc::new(engine))
    }

    /// A loader with explicit collaborators.
    pub fn with_parts(
        config: LoaderConfig,
        fs: Arc<dyn FileSystem>,
        compiler: Arc<dyn ScriptCompiler>,
    ) -> Arc<Self> {
        let resolver = ModuleResolver::new(&config, fs.clone());
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            config,
            fs,
            resolver,
            cache: ModuleCache::new(),
            compiler,
        })
    }

    /// Loads a module and returns its exports.
    ///
    /// Relative identifiers resolve against the directory of the module
    /// currently executing, or the working directory at top level.
    pub fn require(&self, identifier: &str) -> Result<Value> {
        let context = self.cache.current_context();
        let base = context.clone().unwrap_or_else(|| self.resolver.cwd().to_path_buf());

        if let Some(exports) = self.cache.lookup(&base, identifier) {
            debug!(identifier, "require cache hit");
            return Ok(exports);
        }

        let path = self.resolver.resolve(identifier, context.as_deref())?;
        let exports = self.load(identifier, &path)?;
        self.cache.remember(&base, identifier, &path);
        Ok(exports)
    }

    /// Resolves an identifier without loading it (`require.resolve`).
    pub fn resolve(&self, identifier: &str) -> Result<PathBuf> {
        let context = self.cache.current_context();
        self.resolver.resolve(identifier, context.as_deref())
    }

    /// Loads the module at an already resolved `path`.
    pub fn load(&self, identifier: &str, path: &Path) -> Result<Value> {
        if let Some(record) = self.cache.record(path) {
            match record.state {
                LoadState::Loaded => {
                    debug!(path = %path.display(), "module cache hit");
                }
                LoadState::Resolving => {
                    debug!(path = %path.display(), "circular require, returning partial exports");
                }
            }
            return Ok(record.exports);
        }

        let source = self.fs.read_text(path).map_err(|source| LoaderError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let reservation = self.cache.reserve(identifier, path);
        match self.execute(identifier, &source, &reservation) {
            Ok(exports) => Ok(self.cache.commit(reservation, exports)),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "module failed, dropping cache entry");
                self.cache.abandon(reservation);
                Err(err)
            }
        }
    }

    /// Runs a module body and harvests its exports.
    fn execute(&self, identifier: &str, source: &str, reservation: &Reservation) -> Result<Value> {
        let path = reservation.path();
        let load_error = |source| LoaderError::Load {
            path: path.to_path_buf(),
            source,
        };

        let unit = self
            .compiler
            .compile(source, &MODULE_PARAMS, path)
            .map_err(load_error)?;

        let placeholder = reservation.placeholder().clone();
        let module = ObjectRef::from_pairs([
            ("id", Value::from(identifier)),
            ("path", Value::from(path.display().to_string())),
            ("exports", placeholder.clone()),
        ]);
        let args = [
            self.require_function(),
            placeholder.clone(),
            Value::Object(module.clone()),
        ];

        debug!(path = %path.display(), "executing module");
        {
            let dir = path.parent().unwrap_or(path);
            let _context = self.cache.push_context(dir);
            unit.invoke(&args).map_err(load_error)?;
        }

        let exported = module.get("exports");
        if exported != placeholder && !exported.is_nullish() {
            Ok(exported)
        } else {
            Ok(placeholder)
        }
    }

    /// A script-callable `require` bound to this loader, with
    /// `require.resolve` attached.
    pub fn require_function(&self) -> Value {
        require::require_function(self.this.clone())
    }

    /// The extra search directories (`require.paths`).
    pub fn paths(&self) -> Vec<PathBuf> {
        self.resolver.paths()
    }

    /// Replaces the extra search directories.
    pub fn set_paths(&self, paths: Vec<PathBuf>) {
        self.resolver.set_paths(paths);
    }

    /// Appends an extra search directory.
    pub fn add_path(&self, path: impl AsRef<Path>) {
        self.resolver.add_path(path);
    }

    /// The module cache (`require.cache`).
    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// The resolver.
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// The configuration the loader was built from.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The working directory bare identifiers start from.
    pub fn cwd(&self) -> &Path {
        self.resolver.cwd()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("cwd", &self.resolver.cwd())
            .field("modules", &self.cache.len())
            .finish()
    }
}
