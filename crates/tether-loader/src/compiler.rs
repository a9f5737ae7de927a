// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The compile-and-run primitive the loader executes module bodies with

use std::path::Path;
use tether_engine::{Engine, Error, Value};

/// Turns source text into something callable.
pub trait ScriptCompiler: Send + Sync {
    /// Compiles `source` as a function body taking `params`. `origin` is
    /// the file the source came from.
    fn compile(
        &self,
        source: &str,
        params: &[&str],
        origin: &Path,
    ) -> Result<Box<dyn CompiledUnit>, Error>;
}

/// A compiled module body.
pub trait CompiledUnit {
    /// Runs the body with one argument per declared parameter.
    fn invoke(&self, args: &[Value]) -> Result<Value, Error>;
}

/// A function compiled by the engine.
struct EngineUnit {
    engine: Engine,
    function: Value,
}

impl CompiledUnit for EngineUnit {
    fn invoke(&self, args: &[Value]) -> Result<Value, Error> {
        self.engine.call(&self.function, args)
    }
}

impl ScriptCompiler for Engine {
    fn compile(
        &self,
        source: &str,
        params: &[&str],
        origin: &Path,
    ) -> Result<Box<dyn CompiledUnit>, Error> {
        tracing::trace!(path = %origin.display(), "compiling module body");
        let function = self.compile_function(source, params)?;
        Ok(Box::new(EngineUnit {
            engine: self.clone(),
            function,
        }))
    }
}
