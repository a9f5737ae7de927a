// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module loader

use std::path::PathBuf;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving or loading a module
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No candidate path matched the identifier
    #[error("Cannot find module '{identifier}'")]
    NotFound {
        /// The identifier as requested
        identifier: String,
        /// Candidate roots that were tried, in order
        tried: Vec<PathBuf>,
    },

    /// The identifier names a file format the loader cannot execute
    #[error("Cannot load module '{identifier}': unsupported format ({})", .path.display())]
    UnsupportedFormat {
        /// The identifier as requested
        identifier: String,
        /// The offending file
        path: PathBuf,
    },

    /// The resolved file could not be read
    #[error("Cannot read '{}': {source}", .path.display())]
    Read {
        /// The file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Compiling or running the module body failed
    #[error("Error loading module '{}': {source}", .path.display())]
    Load {
        /// The module that failed
        path: PathBuf,
        /// Error raised by the script engine
        source: tether_engine::Error,
    },

    /// A package manifest exists but is not valid JSON
    #[error("Invalid package manifest '{}': {source}", .path.display())]
    Manifest {
        /// The manifest file
        path: PathBuf,
        /// Parse error
        source: serde_json::Error,
    },

    /// The configuration file could not be parsed
    #[error("Invalid configuration '{}': {source}", .path.display())]
    Config {
        /// The configuration file
        path: PathBuf,
        /// Parse error
        source: toml::de::Error,
    },
}

impl LoaderError {
    /// Create a not-found error
    pub fn not_found(identifier: impl Into<String>, tried: Vec<PathBuf>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
            tried,
        }
    }

    /// Follows nested `require` failures down to the innermost loader error.
    ///
    /// When module A requires B and B fails, the error surfacing from A is a
    /// `Load` error for A whose engine error wraps B's error.
    pub fn root_cause(&self) -> &LoaderError {
        match self {
            LoaderError::Load {
                source: tether_engine::Error::Host(inner),
                ..
            } => match inner.downcast_ref::<LoaderError>() {
                Some(nested) => nested.root_cause(),
                None => self,
            },
            _ => self,
        }
    }
}
