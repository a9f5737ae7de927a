// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The script-side `require()` function

use crate::module_system::loader::Loader;
use std::sync::{Arc, Weak};
use tether_engine::{Callable, Error, Value};

/// Builds `require`, with `require.resolve` attached, bound to `loader`.
///
/// Loader errors travel through the engine as host errors so the caller
/// that started the outermost load can recover them intact.
pub(crate) fn require_function(loader: Weak<Loader>) -> Value {
    let resolve_loader = loader.clone();
    let resolve = Callable::native("resolve", move |args: &[Value]| {
        let loader = upgrade(&resolve_loader)?;
        let identifier = identifier_arg(args)?;
        let path = loader.resolve(identifier).map_err(Error::host)?;
        Ok(Value::String(path.display().to_string()))
    });

    Callable::native("require", move |args: &[Value]| {
        let loader = upgrade(&loader)?;
        let identifier = identifier_arg(args)?;
        loader.require(identifier).map_err(Error::host)
    })
    .with_property("resolve", resolve.into_value())
    .into_value()
}

fn upgrade(loader: &Weak<Loader>) -> Result<Arc<Loader>, Error> {
    loader
        .upgrade()
        .ok_or_else(|| Error::InternalError("module loader is no longer alive".to_string()))
}

fn identifier_arg(args: &[Value]) -> Result<&str, Error> {
    match args.first() {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.as_str()),
        Some(Value::String(_)) => Err(Error::TypeError(
            "The argument 'id' must be a non-empty string".to_string(),
        )),
        other => Err(Error::TypeError(format!(
            "The \"id\" argument must be of type string. Received {}",
            other.cloned().unwrap_or_default().type_of()
        ))),
    }
}
