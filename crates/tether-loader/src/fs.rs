// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! File system access used by the resolver and loader

use std::io;
use std::path::Path;

/// What a path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Nothing exists at the path
    Missing,
    /// A regular file
    File,
    /// A directory
    Directory,
}

/// The file primitives the loader needs.
pub trait FileSystem: Send + Sync {
    /// Classifies `path`.
    fn probe(&self, path: &Path) -> PathKind;

    /// Reads a file as UTF-8 text.
    fn read_text(&self, path: &Path) -> io::Result<String>;

    /// Returns true if `path` is a regular file.
    fn is_file(&self, path: &Path) -> bool {
        self.probe(path) == PathKind::File
    }

    /// Returns true if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool {
        self.probe(path) == PathKind::Directory
    }
}

/// The host file system
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn probe(&self, path: &Path) -> PathKind {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => PathKind::File,
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            // Sockets, fifos and the like are not loadable
            Ok(_) | Err(_) => PathKind::Missing,
        }
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}
