//! Per-directory configuration.
//!
//! Every directory of the workspace may carry a `.wollemi.json` file. The
//! effective configuration of a directory is the shallow merge of all config
//! files from the workspace root down to it, closer directories winning.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::warn;

use crate::util::read_to_string;

/// Name of the per-directory configuration file.
pub const CONFIG_FILE: &str = ".wollemi.json";

/// Configuration merged from `.wollemi.json` files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Visibility assigned to newly created rules when none applies.
    pub default_visibility: String,

    /// Build file name, honored at the workspace root.
    pub default_build_file_name: String,

    /// Explicit import path to label overrides. These win over every other
    /// resolution step.
    pub known_dependency: FxHashMap<String, String>,
}

impl Config {
    /// Shallow-merge `that` over `self`. Scalar fields are replaced when the
    /// closer value is non-empty; `known_dependency` merges key-wise.
    #[must_use]
    pub fn merge(&self, that: &Self) -> Self {
        let mut merge = self.clone();

        if !that.default_visibility.is_empty() {
            merge.default_visibility = that.default_visibility.clone();
        }

        if !that.default_build_file_name.is_empty() {
            merge.default_build_file_name = that.default_build_file_name.clone();
        }

        for (key, value) in &that.known_dependency {
            merge.known_dependency.insert(key.clone(), value.clone());
        }

        merge
    }

    /// Read a single config file. A missing file contributes nothing; an
    /// unreadable or malformed one is logged and contributes nothing.
    pub fn read(dir: &Path) -> Option<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return None;
        }

        let text = match read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read config");
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not parse config");
                None
            }
        }
    }

    /// The effective configuration of the workspace-relative directory `dir`,
    /// merged from the root down.
    pub fn load(root: &Path, dir: &str) -> Self {
        let mut config = Self::read(root).unwrap_or_default();

        if dir == "." {
            return config;
        }

        let mut current = root.to_path_buf();
        for segment in dir.split('/') {
            current.push(segment);
            if let Some(next) = Self::read(&current) {
                config = config.merge(&next);
            }
        }

        config
    }
}
