// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS-style module system
//!
//! - `require()` function with `require.resolve`
//! - `module.exports` / `exports`
//! - Synchronous loading with per-path memoization
//! - Circular requires see the partially built exports

mod cache;
mod loader;
mod require;
mod resolver;

pub use cache::{ContextGuard, LoadState, ModuleCache, ModuleRecord, Reservation};
pub use loader::{Loader, MODULE_PARAMS};
pub use resolver::ModuleResolver;
