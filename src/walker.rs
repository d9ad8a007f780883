//! Workspace walk.
//!
//! Turns the user-supplied paths into a stream of directories. A path ending
//! in `...` walks its subtree; a plain path names a single directory. The
//! walk skips hidden directories and `plz-out`.

use anyhow::{Result, bail};
use ignore::WalkBuilder;
use tracing::warn;

use crate::format::Directory;
use crate::workspace::Workspace;

/// Strip trailing slashes and default to the whole workspace.
pub fn normalize(paths: &[String]) -> Vec<String> {
    let mut paths: Vec<String> =
        paths.iter().map(|path| path.trim_end_matches('/').to_owned()).collect();
    if paths.is_empty() {
        paths.push("...".to_owned());
    }
    paths
}

/// Whether the workspace-relative `path` lies under at least one user path.
/// A `...` suffix covers the subtree; a plain path matches exactly.
pub fn in_run_path(path: &str, paths: &[String]) -> bool {
    paths.iter().any(|run_path| {
        if run_path == "..." {
            return true;
        }
        match run_path.strip_suffix("/...") {
            Some(dir) => path == dir || path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/')),
            None => path == run_path,
        }
    })
}

/// Stream the directories named by `paths` into `tx`. Fails fast when a path
/// does not exist; closing of the channel is the sender drop at return.
pub fn walk(workspace: &Workspace, paths: &[String], tx: &flume::Sender<Directory>) -> Result<()> {
    for path in paths {
        let (base, recursive) = match path.strip_suffix("...") {
            Some(base) => (base.trim_end_matches('/'), true),
            None => (path.as_str(), false),
        };
        let base = if base.is_empty() { "." } else { base };

        let abs = workspace.abs(base);
        if !abs.is_dir() {
            bail!("could not walk: no such directory: {base}");
        }

        if !recursive {
            if tx.send(Directory::new(base)).is_err() {
                return Ok(());
            }
            continue;
        }

        let entries = WalkBuilder::new(&abs)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .follow_links(false)
            .sort_by_file_name(std::cmp::Ord::cmp)
            .filter_entry(|entry| entry.file_name() != "plz-out")
            .build();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "could not walk entry");
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|file_type| file_type.is_dir()) {
                continue;
            }

            let rel = entry.path().strip_prefix(&workspace.root).unwrap_or(entry.path());
            let rel = if rel.as_os_str().is_empty() {
                ".".to_owned()
            } else {
                rel.to_string_lossy().into_owned()
            };

            if tx.send(Directory::new(&rel)).is_err() {
                return Ok(());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|path| (*path).to_owned()).collect()
    }

    #[test]
    fn normalize_defaults_to_everything() {
        assert_eq!(normalize(&[]), ["..."]);
        assert_eq!(normalize(&paths(&["foo/", "bar/..."])), ["foo", "bar/..."]);
    }

    #[test]
    fn run_path_recursive() {
        let run = paths(&["foo/..."]);
        assert!(in_run_path("foo", &run));
        assert!(in_run_path("foo/bar", &run));
        assert!(!in_run_path("foobar", &run));
        assert!(!in_run_path("bar", &run));
    }

    #[test]
    fn run_path_exact() {
        let run = paths(&["foo"]);
        assert!(in_run_path("foo", &run));
        assert!(!in_run_path("foo/bar", &run));
    }

    #[test]
    fn run_path_everything() {
        let run = paths(&["..."]);
        assert!(in_run_path(".", &run));
        assert!(in_run_path("any/where", &run));
    }
}
