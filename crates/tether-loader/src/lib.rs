// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tether-loader
//!
//! A synchronous CommonJS-style module loader built on `tether-engine`.
//!
//! Given an identifier, the loader finds a source file, runs it once with
//! `require`, `exports` and `module` in scope, and memoizes the exports:
//!
//! - Relative identifiers (`./x`, `../x`) resolve against the requiring
//!   module's directory
//! - Bare identifiers are tried from the working directory, then under
//!   `require.paths` and every ancestor `node_modules`
//! - Package directories honour `package.json` `main`, else `index.js`
//! - Circular requires receive the partially built exports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether_loader::{Loader, LoaderConfig};
//!
//! let loader = Loader::new(LoaderConfig::with_cwd("/srv/app"));
//! let exports = loader.require("./main").unwrap();
//! println!("{}", exports);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod fs;
pub mod manifest;
pub mod module_system;
pub mod path;

// Re-exports
pub use compiler::{CompiledUnit, ScriptCompiler};
pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use fs::{FileSystem, OsFileSystem, PathKind};
pub use manifest::Manifest;
pub use module_system::{Loader, LoadState, ModuleCache, ModuleRecord, ModuleResolver};
