// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Package manifest (`package.json`) parsing

use serde::Deserialize;

/// The parts of a package manifest the resolver consults
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// Entry file, relative to the package directory
    #[serde(default)]
    pub main: Option<String>,
}

impl Manifest {
    /// Parses manifest JSON. Fields other than `main` are ignored.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The entry file, if one is named. An empty `main` counts as absent.
    pub fn main(&self) -> Option<&str> {
        self.main.as_deref().filter(|main| !main.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_main() {
        let manifest = Manifest::parse(r#"{"name": "pkg", "version": "1.0.0", "main": "lib/entry"}"#).unwrap();
        assert_eq!(manifest.main(), Some("lib/entry"));
    }

    #[test]
    fn test_missing_or_empty_main() {
        assert_eq!(Manifest::parse(r#"{"name": "pkg"}"#).unwrap().main(), None);
        assert_eq!(Manifest::parse(r#"{"main": ""}"#).unwrap().main(), None);
    }

    #[test]
    fn test_invalid_json() {
        assert!(Manifest::parse("{ main: nope").is_err());
    }
}
