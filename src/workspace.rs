//! Workspace discovery.
//!
//! The workspace root is the nearest ancestor directory carrying a
//! `.plzconfig`, falling back to the nearest ancestor carrying a `go.mod`.
//! The root fixes the process-wide constants: the Go import path under which
//! workspace-internal packages live, the directory holding third-party BUILD
//! files, and the build file name.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::Config;
use crate::util::read_to_string;

/// Directory under which third-party Go modules declare their BUILD rules.
pub const THIRD_PARTY: &str = "third_party/go";

/// Default name of the per-directory build file.
pub const DEFAULT_BUILD_FILE: &str = "BUILD.plz";

/// A resolved workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Absolute path of the workspace root.
    pub root: PathBuf,

    /// Import path prefix of workspace-internal packages, from the root
    /// `go.mod`. Empty when the workspace has none; every import is then
    /// resolved through the third-party namespace.
    pub import_root: String,

    /// Workspace-relative directory of third-party BUILD files.
    pub third_party: String,

    /// Name of the build file, `BUILD.plz` unless overridden by the root
    /// config.
    pub build_file: String,
}

impl Workspace {
    /// Locate the workspace containing `start`.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = start
            .canonicalize()
            .with_context(|| format!("could not resolve {}", start.display()))?;

        let root = find_root(&start).with_context(|| {
            format!("could not locate a workspace above {} (no .plzconfig or go.mod)", start.display())
        })?;

        let import_root = read_go_module(&root).unwrap_or_default();

        let config = Config::read(&root).unwrap_or_default();
        let build_file = if config.default_build_file_name.is_empty() {
            DEFAULT_BUILD_FILE.to_owned()
        } else {
            config.default_build_file_name
        };

        Ok(Self { root, import_root, third_party: THIRD_PARTY.to_owned(), build_file })
    }

    /// Absolute path of the workspace-relative directory `dir`.
    pub fn abs(&self, dir: &str) -> PathBuf {
        if dir == "." { self.root.clone() } else { self.root.join(dir) }
    }

    /// Rebase user-supplied paths onto the workspace root.
    ///
    /// Paths are interpreted relative to `cwd`; a trailing `...` survives the
    /// rebase. Paths outside the workspace are rejected.
    pub fn rebase_paths(&self, cwd: &Path, paths: &[String]) -> Result<Vec<String>> {
        let mut rebased = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.trim_end_matches('/');

            let (base, recursive) = match path.strip_suffix("...") {
                Some(base) => (base.trim_end_matches('/'), true),
                None => (path, false),
            };

            let abs = if base.is_empty() || base == "." {
                cwd.to_path_buf()
            } else if Path::new(base).is_absolute() {
                PathBuf::from(base)
            } else {
                cwd.join(base)
            };

            let rel = match abs.strip_prefix(&self.root) {
                Ok(rel) if rel.as_os_str().is_empty() => ".".to_owned(),
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => bail!("path lies outside the workspace: {path}"),
            };

            if recursive {
                rebased.push(if rel == "." { "...".to_owned() } else { format!("{rel}/...") });
            } else {
                rebased.push(rel);
            }
        }

        Ok(rebased)
    }
}

fn find_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".plzconfig").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }

    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join("go.mod").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }

    None
}

/// The `module` directive of the root `go.mod`, if any.
fn read_go_module(root: &Path) -> Option<String> {
    let text = read_to_string(&root.join("go.mod")).ok()?;

    for line in text.lines() {
        let line = line.split("//").next().unwrap_or(line).trim();
        if let Some(module) = line.strip_prefix("module ") {
            return Some(module.trim().trim_matches('"').to_owned());
        }
    }

    None
}
