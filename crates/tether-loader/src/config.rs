// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration.
//!
//! Values are layered, lowest precedence first: built-in defaults, the
//! `[loader]` table of `tether.toml` in the working directory, then the
//! `TETHER_PATH` environment variable. The CLI applies its flags last.

use crate::error::{LoaderError, Result};
use crate::path::{absolutize, normalize};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "tether.toml";

/// Environment variable holding extra search directories
pub const PATH_ENV: &str = "TETHER_PATH";

/// Configuration for a [`Loader`](crate::Loader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Script file extension, without the dot
    pub extension: String,

    /// Package manifest file name
    pub manifest: String,

    /// Name of the dependency directories searched in ancestors
    pub dependencies_dir: String,

    /// Extensions that are recognized but cannot be loaded
    pub unsupported_extensions: Vec<String>,

    /// Extra search directories (`require.paths`)
    pub paths: Vec<PathBuf>,

    /// Working directory for bare identifiers; the process working
    /// directory when unset
    pub cwd: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extension: "js".to_string(),
            manifest: "package.json".to_string(),
            dependencies_dir: "node_modules".to_string(),
            unsupported_extensions: vec!["node".to_string()],
            paths: Vec::new(),
            cwd: None,
        }
    }
}

/// Shape of `tether.toml`
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    loader: LoaderConfig,
}

impl LoaderConfig {
    /// Defaults rooted at `cwd`.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }

    /// Loads configuration for a project rooted at `dir`: defaults, then
    /// `dir/tether.toml` if present, then the environment.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        let mut config = if config_path.is_file() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        if config.cwd.is_none() {
            config.cwd = Some(dir.to_path_buf());
        }
        config.load_from_env();

        Ok(config)
    }

    /// Parses a configuration file. Relative paths inside it are taken
    /// relative to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content).map_err(|source| LoaderError::Config {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().unwrap_or(Path::new("."));
        config.paths = config.paths.iter().map(|p| absolutize(p, base)).collect();
        config.cwd = config.cwd.map(|cwd| absolutize(&cwd, base));

        Ok(config)
    }

    /// Parses the `[loader]` table out of TOML text.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.loader)
    }

    /// Appends directories from `TETHER_PATH`.
    pub fn load_from_env(&mut self) {
        if let Some(value) = std::env::var_os(PATH_ENV) {
            self.append_search_path(&value);
        }
    }

    /// Appends directories from a platform search-path string
    /// (`a:b:c` on Unix). Empty entries are skipped.
    pub fn append_search_path(&mut self, value: &OsStr) {
        let cwd = self.working_dir();
        for dir in std::env::split_paths(value) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            self.paths.push(absolutize(&dir, &cwd));
        }
    }

    /// The absolute working directory bare identifiers resolve against.
    pub fn working_dir(&self) -> PathBuf {
        let process_cwd = || {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from(std::path::MAIN_SEPARATOR_STR))
        };
        match &self.cwd {
            Some(cwd) if cwd.is_absolute() => normalize(cwd),
            Some(cwd) => absolutize(cwd, &process_cwd()),
            None => process_cwd(),
        }
    }

    /// Returns true if files with `ext` are recognized but not loadable.
    pub fn is_unsupported(&self, ext: &str) -> bool {
        self.unsupported_extensions.iter().any(|e| e == ext)
    }
}
