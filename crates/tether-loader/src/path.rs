// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lexical path helpers

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Normalizes a path without touching the file system: `.` segments are
/// dropped and `..` collapses the previous segment. Symbolic links are not
/// followed. `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::ParentDir) | None => components.push(component),
                Some(_) => {}
            },
            c => components.push(c),
        }
    }

    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

/// Joins `path` onto `base` (unless it is already absolute) and normalizes.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    normalize(&base.join(path))
}

/// Appends `.ext` to the full file name (`foo.min` becomes `foo.min.js`).
pub fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Returns true for identifiers resolved against the current module's
/// directory: `./x`, `../x`, `.` and `..`.
pub fn is_relative_identifier(identifier: &str) -> bool {
    identifier == "."
        || identifier == ".."
        || identifier.starts_with("./")
        || identifier.starts_with("../")
}

/// The final extension of an identifier, if any.
pub fn identifier_extension(identifier: &str) -> Option<&str> {
    Path::new(identifier).extension().and_then(|ext| ext.to_str())
}
