// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution
//!
//! Candidates are tried in a fixed order and the first hit wins:
//!
//! 1. the identifier as a file, verbatim and then with the script extension
//! 2. the identifier as a directory: its manifest `main`, else `index.<ext>`
//! 3. for bare identifiers, the same two steps under every `require.paths`
//!    entry and then under `<ancestor>/node_modules` for each ancestor of
//!    the working directory
//!
//! Relative identifiers (`./x`, `../x`) resolve against the directory of
//! the module currently executing; bare identifiers start from the working
//! directory.

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::fs::{FileSystem, PathKind};
use crate::manifest::Manifest;
use crate::path::{
    absolutize, identifier_extension, is_relative_identifier, normalize, with_appended_extension,
};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{trace, warn};

/// Module resolver
pub struct ModuleResolver {
    fs: Arc<dyn FileSystem>,
    /// Absolute working directory
    cwd: PathBuf,
    /// Script extension, without the dot
    extension: String,
    /// Manifest file name
    manifest: String,
    /// Dependency directory name
    dependencies_dir: String,
    /// Recognized but unloadable extensions
    unsupported: Vec<String>,
    /// Extra search directories (`require.paths`)
    paths: RwLock<Vec<PathBuf>>,
}

impl ModuleResolver {
    /// Create a resolver from configuration
    pub fn new(config: &LoaderConfig, fs: Arc<dyn FileSystem>) -> Self {
        let cwd = config.working_dir();
        let paths: Vec<PathBuf> = config.paths.iter().map(|p| absolutize(p, &cwd)).collect();
        for dir in paths.iter().filter(|dir| !fs.is_dir(dir)) {
            warn!(dir = %dir.display(), "search path does not exist, skipping");
        }
        Self {
            fs,
            cwd,
            extension: config.extension.clone(),
            manifest: config.manifest.clone(),
            dependencies_dir: config.dependencies_dir.clone(),
            unsupported: config.unsupported_extensions.clone(),
            paths: RwLock::new(paths),
        }
    }

    /// The working directory bare identifiers start from.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The extra search directories.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.read().clone()
    }

    /// Replaces the extra search directories. Relative entries are taken
    /// relative to the working directory.
    pub fn set_paths(&self, paths: Vec<PathBuf>) {
        let paths = paths.iter().map(|p| absolutize(p, &self.cwd)).collect();
        *self.paths.write() = paths;
    }

    /// Appends an extra search directory.
    pub fn add_path(&self, path: impl AsRef<Path>) {
        let path = absolutize(path.as_ref(), &self.cwd);
        self.paths.write().push(path);
    }

    /// Resolves `identifier` to an absolute file path.
    ///
    /// `context` is the directory of the module currently executing, if
    /// any; without one, relative identifiers resolve against the working
    /// directory.
    pub fn resolve(&self, identifier: &str, context: Option<&Path>) -> Result<PathBuf> {
        if identifier.is_empty() {
            return Err(LoaderError::not_found(identifier, Vec::new()));
        }

        let relative = is_relative_identifier(identifier);
        let base = match context {
            Some(dir) if relative => dir,
            _ => self.cwd.as_path(),
        };
        let root = absolutize(Path::new(identifier), base);

        if let Some(ext) = identifier_extension(identifier) {
            if self.is_unsupported(ext) {
                return Err(LoaderError::UnsupportedFormat {
                    identifier: identifier.to_string(),
                    path: root,
                });
            }
        }

        let mut tried = vec![root.clone()];
        if let Some(path) = self.load_as_path(identifier, &root)? {
            return Ok(path);
        }

        if !relative && !Path::new(identifier).is_absolute() {
            for dir in self.search_dirs() {
                let root = normalize(&dir.join(identifier));
                tried.push(root.clone());
                if let Some(path) = self.load_as_path(identifier, &root)? {
                    return Ok(path);
                }
            }
        }

        trace!(identifier, tried = tried.len(), "module not found");
        Err(LoaderError::NotFound {
            identifier: identifier.to_string(),
            tried,
        })
    }

    /// Directories searched for bare identifiers, in order: existing
    /// `require.paths` entries, then dependency directories from the
    /// working directory up to the root.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .paths
            .read()
            .iter()
            .filter(|dir| self.fs.is_dir(dir))
            .cloned()
            .collect();

        for ancestor in self.cwd.ancestors() {
            let candidate = ancestor.join(&self.dependencies_dir);
            if self.fs.is_dir(&candidate) {
                dirs.push(candidate);
            }
        }
        dirs
    }

    fn is_unsupported(&self, ext: &str) -> bool {
        self.unsupported.iter().any(|e| e == ext)
    }

    /// An identifier with a trailing slash names a directory and skips the
    /// file step.
    fn load_as_path(&self, identifier: &str, root: &Path) -> Result<Option<PathBuf>> {
        if identifier.ends_with('/') {
            return self.load_as_directory(identifier, root);
        }
        if let Some(path) = self.load_as_file(identifier, root)? {
            return Ok(Some(path));
        }
        self.load_as_directory(identifier, root)
    }

    /// `root` verbatim, then `root.<ext>`. A match or sibling with an
    /// unsupported extension is an error rather than a miss.
    fn load_as_file(&self, identifier: &str, root: &Path) -> Result<Option<PathBuf>> {
        trace!(candidate = %root.display(), "trying file");
        if self.fs.is_file(root) {
            let ext = root.extension().and_then(|ext| ext.to_str());
            if ext.is_some_and(|ext| self.is_unsupported(ext)) {
                return Err(LoaderError::UnsupportedFormat {
                    identifier: identifier.to_string(),
                    path: root.to_path_buf(),
                });
            }
            return Ok(Some(root.to_path_buf()));
        }

        let with_ext = with_appended_extension(root, &self.extension);
        if self.fs.is_file(&with_ext) {
            return Ok(Some(with_ext));
        }

        for ext in &self.unsupported {
            let native = with_appended_extension(root, ext);
            if self.fs.is_file(&native) {
                return Err(LoaderError::UnsupportedFormat {
                    identifier: identifier.to_string(),
                    path: native,
                });
            }
        }

        Ok(None)
    }

    /// `root` as a package directory. When `root` is not a directory its
    /// parent is used instead, if that is one.
    fn load_as_directory(&self, identifier: &str, root: &Path) -> Result<Option<PathBuf>> {
        let dir = match self.fs.probe(root) {
            PathKind::Directory => root,
            _ => match root.parent() {
                Some(parent) if self.fs.is_dir(parent) => parent,
                _ => return Ok(None),
            },
        };
        trace!(dir = %dir.display(), "trying directory");

        if let Some(main) = self.read_manifest_main(dir)? {
            let entry = normalize(&dir.join(main));
            trace!(entry = %entry.display(), "following manifest main");
            if let Some(path) = self.load_as_file(identifier, &entry)? {
                return Ok(Some(path));
            }
            let index = self.index_file(&entry);
            return Ok(self.fs.is_file(&index).then_some(index));
        }

        let index = self.index_file(dir);
        Ok(self.fs.is_file(&index).then_some(index))
    }

    /// The `main` named by `dir`'s manifest, if the manifest exists.
    fn read_manifest_main(&self, dir: &Path) -> Result<Option<String>> {
        let path = dir.join(&self.manifest);
        if !self.fs.is_file(&path) {
            return Ok(None);
        }

        let content = self.fs.read_text(&path).map_err(|source| LoaderError::Read {
            path: path.clone(),
            source,
        })?;
        let manifest =
            Manifest::parse(&content).map_err(|source| LoaderError::Manifest { path, source })?;
        Ok(manifest.main().map(str::to_string))
    }

    fn index_file(&self, dir: &Path) -> PathBuf {
        dir.join(format!("index.{}", self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    /// A temp tree plus a resolver whose cwd is `cwd` inside it.
    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.root().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn mkdir(&self, rel: &str) -> PathBuf {
            let path = self.root().join(rel);
            fs::create_dir_all(&path).unwrap();
            path
        }

        fn resolver(&self, cwd: &str) -> ModuleResolver {
            let cwd = self.mkdir(cwd);
            ModuleResolver::new(&LoaderConfig::with_cwd(cwd), Arc::new(OsFileSystem))
        }
    }

    #[test]
    fn test_relative_uses_context_directory() {
        let fx = Fixture::new();
        let target = fx.write("a/b/x.js", "");
        let resolver = fx.resolver("elsewhere");

        let context = fx.root().join("a/b");
        assert_eq!(resolver.resolve("./x", Some(&context)).unwrap(), target);
        assert_eq!(
            resolver.resolve("../b/x.js", Some(&context)).unwrap(),
            target
        );
    }

    #[test]
    fn test_relative_without_context_uses_cwd() {
        let fx = Fixture::new();
        let target = fx.write("app/x.js", "");
        let resolver = fx.resolver("app");
        assert_eq!(resolver.resolve("./x", None).unwrap(), target);
    }

    #[test]
    fn test_verbatim_file_before_extension() {
        let fx = Fixture::new();
        let verbatim = fx.write("app/data", "");
        fx.write("app/data.js", "");
        let resolver = fx.resolver("app");
        assert_eq!(resolver.resolve("./data", None).unwrap(), verbatim);
    }

    #[test]
    fn test_extension_appended_to_full_name() {
        let fx = Fixture::new();
        let target = fx.write("app/jquery.min.js", "");
        let resolver = fx.resolver("app");
        assert_eq!(resolver.resolve("./jquery.min", None).unwrap(), target);
    }

    #[test]
    fn test_file_beats_directory() {
        let fx = Fixture::new();
        let file = fx.write("r/foo.js", "");
        fx.write("r/foo/index.js", "");
        let resolver = fx.resolver("r");
        assert_eq!(resolver.resolve("./foo", None).unwrap(), file);
    }

    #[test]
    fn test_directory_index() {
        let fx = Fixture::new();
        let index = fx.write("r/foo/index.js", "");
        let resolver = fx.resolver("r");
        assert_eq!(resolver.resolve("./foo", None).unwrap(), index);
    }

    #[test]
    fn test_manifest_main() {
        let fx = Fixture::new();
        fx.write("r/pkg/package.json", r#"{"main": "lib/entry"}"#);
        let entry = fx.write("r/pkg/lib/entry.js", "");
        fx.write("r/pkg/index.js", "");
        let resolver = fx.resolver("r");
        assert_eq!(resolver.resolve("./pkg", None).unwrap(), entry);
    }

    #[test]
    fn test_manifest_main_directory_uses_its_index() {
        let fx = Fixture::new();
        fx.write("r/pkg/package.json", r#"{"main": "lib"}"#);
        let index = fx.write("r/pkg/lib/index.js", "");
        let resolver = fx.resolver("r");
        assert_eq!(resolver.resolve("./pkg", None).unwrap(), index);
    }

    #[test]
    fn test_broken_manifest_main_has_no_index_fallback() {
        let fx = Fixture::new();
        fx.write("r/pkg/package.json", r#"{"main": "missing.js"}"#);
        fx.write("r/pkg/index.js", "");
        let resolver = fx.resolver("r");
        assert!(matches!(
            resolver.resolve("./pkg", None),
            Err(LoaderError::NotFound { .. })
        ));
    }

    #[test]
    fn test_manifest_main_with_unsupported_extension() {
        let fx = Fixture::new();
        fx.write("r/pkg/package.json", r#"{"main": "addon.node"}"#);
        let native = fx.write("r/pkg/addon.node", "exports.ran = true;");
        let resolver = fx.resolver("r");
        match resolver.resolve("./pkg", None) {
            Err(LoaderError::UnsupportedFormat { identifier, path }) => {
                assert_eq!(identifier, "./pkg");
                assert_eq!(path, native);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_manifest_without_main_uses_index() {
        let fx = Fixture::new();
        fx.write("r/pkg/package.json", r#"{"name": "pkg"}"#);
        let index = fx.write("r/pkg/index.js", "");
        let resolver = fx.resolver("r");
        assert_eq!(resolver.resolve("./pkg", None).unwrap(), index);
    }

    #[test]
    fn test_invalid_manifest_is_an_error() {
        let fx = Fixture::new();
        fx.write("r/pkg/package.json", "{ not json");
        fx.write("r/pkg/index.js", "");
        let resolver = fx.resolver("r");
        assert!(matches!(
            resolver.resolve("./pkg", None),
            Err(LoaderError::Manifest { .. })
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_parent_directory() {
        let fx = Fixture::new();
        let index = fx.write("r/lib/index.js", "");
        let resolver = fx.resolver("r");
        assert_eq!(resolver.resolve("./lib/nothing", None).unwrap(), index);
    }

    #[test]
    fn test_trailing_slash_skips_file_step() {
        let fx = Fixture::new();
        fx.write("r/lib.js", "");
        let index = fx.write("r/lib/index.js", "");
        let resolver = fx.resolver("r");
        assert_eq!(resolver.resolve("./lib/", None).unwrap(), index);
        assert_eq!(resolver.resolve("./lib", None).unwrap(), fx.root().join("r/lib.js"));
    }

    #[test]
    fn test_ancestor_dependency_search() {
        let fx = Fixture::new();
        let target = fx.write("a/node_modules/foo.js", "");
        let resolver = fx.resolver("a/b/c");
        assert_eq!(resolver.resolve("foo", None).unwrap(), target);
    }

    #[test]
    fn test_nearest_dependency_dir_wins() {
        let fx = Fixture::new();
        fx.write("a/node_modules/foo.js", "");
        let near = fx.write("a/b/node_modules/foo/index.js", "");
        let resolver = fx.resolver("a/b/c");
        assert_eq!(resolver.resolve("foo", None).unwrap(), near);
    }

    #[test]
    fn test_package_in_dependency_dir() {
        let fx = Fixture::new();
        fx.write(
            "app/node_modules/left-pad/package.json",
            r#"{"main": "./src/pad.js"}"#,
        );
        let entry = fx.write("app/node_modules/left-pad/src/pad.js", "");
        let resolver = fx.resolver("app/src");
        assert_eq!(resolver.resolve("left-pad", None).unwrap(), entry);
    }

    #[test]
    fn test_bare_identifier_tries_cwd_first() {
        let fx = Fixture::new();
        let local = fx.write("app/util.js", "");
        fx.write("app/node_modules/util.js", "");
        let resolver = fx.resolver("app");
        assert_eq!(resolver.resolve("util", None).unwrap(), local);
    }

    #[test]
    fn test_require_paths_searched_before_ancestors() {
        let fx = Fixture::new();
        let shared = fx.write("shared/foo.js", "");
        fx.write("app/node_modules/foo.js", "");
        let resolver = fx.resolver("app/sub");
        resolver.add_path(fx.root().join("does-not-exist"));
        resolver.add_path(fx.root().join("shared"));
        assert_eq!(resolver.resolve("foo", None).unwrap(), shared);
    }

    #[test]
    fn test_set_paths_absolutizes_against_cwd() {
        let fx = Fixture::new();
        let resolver = fx.resolver("app");
        resolver.set_paths(vec![PathBuf::from("lib")]);
        assert_eq!(resolver.paths(), vec![fx.root().join("app/lib")]);
    }

    #[test]
    fn test_relative_identifier_skips_dependency_search() {
        let fx = Fixture::new();
        fx.write("node_modules/foo.js", "");
        let resolver = fx.resolver("app");
        let context = fx.mkdir("elsewhere/deep");
        assert!(matches!(
            resolver.resolve("./foo", Some(&context)),
            Err(LoaderError::NotFound { .. })
        ));
    }

    #[test]
    fn test_absolute_identifier() {
        let fx = Fixture::new();
        let target = fx.write("abs/x.js", "");
        let resolver = fx.resolver("app");
        let id = fx.root().join("abs/x");
        assert_eq!(resolver.resolve(id.to_str().unwrap(), None).unwrap(), target);
    }

    #[test]
    fn test_unsupported_identifier_extension() {
        let fx = Fixture::new();
        let resolver = fx.resolver("app");
        assert!(matches!(
            resolver.resolve("./addon.node", None),
            Err(LoaderError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_unsupported_sibling_short_circuits() {
        let fx = Fixture::new();
        let native = fx.write("app/addon.node", "");
        fx.write("app/node_modules/addon.js", "");
        let resolver = fx.resolver("app");
        match resolver.resolve("addon", None) {
            Err(LoaderError::UnsupportedFormat { path, .. }) => assert_eq!(path, native),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_not_found_lists_tried_roots() {
        let fx = Fixture::new();
        fx.mkdir("app/node_modules");
        let resolver = fx.resolver("app");
        match resolver.resolve("ghost/x", None) {
            Err(LoaderError::NotFound { identifier, tried }) => {
                assert_eq!(identifier, "ghost/x");
                assert_eq!(
                    tried,
                    vec![
                        fx.root().join("app/ghost/x"),
                        fx.root().join("app/node_modules/ghost/x"),
                    ]
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_identifier() {
        let fx = Fixture::new();
        let resolver = fx.resolver("app");
        assert!(matches!(
            resolver.resolve("", None),
            Err(LoaderError::NotFound { .. })
        ));
    }

    #[test]
    fn test_resolved_paths_are_normalized() {
        let fx = Fixture::new();
        let target = fx.write("app/lib/x.js", "");
        let resolver = fx.resolver("app");
        let context = fx.root().join("app/./src/..");
        assert_eq!(resolver.resolve("./lib/./x", Some(&context)).unwrap(), target);
    }
}
