//! # wollemi
//!
//! A tool that keeps the `BUILD.plz` files of a Please-built Go monorepo in
//! agreement with the Go sources on disk.
//!
//! ## Overview
//!
//! `wollemi` walks the workspace, parses every Go package it finds, indexes
//! the rules declared in existing BUILD files, and rewrites the `go_binary`,
//! `go_library`, and `go_test` rules so that source lists and dependency
//! edges match what each package actually imports. Rules annotated with a
//! leading `# wollemi:keep` comment are never touched.
//!
//! ## Architecture
//!
//! The codebase is organized into several focused modules:
//!
//! - `walker` - Streams the directories named on the command line
//! - `go_package` - Parses a directory's Go sources into a file inventory
//! - `build_file` - Parses, mutates, and prints BUILD files
//! - `format` - The walk → parse → collect pipeline and its indices
//! - `resolver` - Maps import paths to build target labels
//! - `rewriter` - Regenerates rule attributes and persists changes
//!
//! ## Usage
//!
//! ```no_run
//! use wollemi::{Wollemi, WollemiOptions};
//!
//! let options = WollemiOptions::new_for_test(
//!     std::path::PathBuf::from("."),
//!     true, // rewrite rule attributes
//!     vec![],
//! );
//! let exit_code = Wollemi::new(options).run();
//! ```

mod build_file;
mod config;
mod format;
mod go_package;
mod label;
mod resolver;
mod rewriter;
mod util;
mod walker;
mod workspace;

use std::{env, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use bpaf::Bpaf;

use crate::workspace::Workspace;

const VERSION: &str = match option_env!("WOLLEMI_VERSION") {
    Some(version) => version,
    None => "dev",
};

/// Command-line options for wollemi.
///
/// This struct is parsed from command-line arguments using `bpaf`.
#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version(VERSION))]
pub struct WollemiOptions {
    /// Run as if wollemi was started in this directory.
    #[bpaf(long, argument("DIR"))]
    chdir: Option<PathBuf>,

    #[bpaf(external(command))]
    command: Command,
}

/// The wollemi subcommands.
#[derive(Debug, Clone, Bpaf)]
pub enum Command {
    /// Reformat BUILD files without regenerating rule attributes.
    #[bpaf(command)]
    Fmt {
        /// Paths to cover; a trailing `...` means recursive.
        ///
        /// Defaults to the whole workspace.
        #[bpaf(positional("PATH"))]
        paths: Vec<String>,
    },

    /// Synchronize go rule sources and dependencies with the tree.
    #[bpaf(command)]
    Gofmt {
        /// Paths to cover; a trailing `...` means recursive.
        ///
        /// Defaults to the whole workspace.
        #[bpaf(positional("PATH"))]
        paths: Vec<String>,
    },
}

impl WollemiOptions {
    /// Create a new `WollemiOptions` for testing purposes.
    #[must_use]
    pub const fn new_for_test(dir: PathBuf, rewrite: bool, paths: Vec<String>) -> Self {
        let command = if rewrite { Command::Gofmt { paths } } else { Command::Fmt { paths } };
        Self { chdir: Some(dir), command }
    }
}

/// The main struct that orchestrates discovery, resolution, and rewriting.
pub struct Wollemi {
    /// Configuration options for the run
    options: WollemiOptions,
}

impl Wollemi {
    /// Create a new `Wollemi` instance with the given options.
    #[must_use]
    pub const fn new(options: WollemiOptions) -> Self {
        Self { options }
    }

    /// Run the selected command.
    ///
    /// # Returns
    ///
    /// Returns an `ExitCode` indicating success or failure:
    /// - `0` on success, including runs that rewrote nothing
    /// - `1` when the walk or workspace setup failed
    #[must_use]
    pub fn run(self) -> ExitCode {
        match self.go_format() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err:?}");
                ExitCode::FAILURE
            }
        }
    }

    fn go_format(self) -> Result<()> {
        let cwd = match self.options.chdir {
            Some(dir) => dir,
            None => env::current_dir().context("could not determine working directory")?,
        };
        let cwd = cwd
            .canonicalize()
            .with_context(|| format!("could not resolve {}", cwd.display()))?;

        let workspace = Workspace::discover(&cwd)?;

        let (rewrite, user_paths) = match self.options.command {
            Command::Fmt { paths } => (false, paths),
            Command::Gofmt { paths } => (true, paths),
        };

        // With no paths given the whole workspace is covered; explicit paths
        // are interpreted relative to the invocation directory.
        let paths = if user_paths.is_empty() {
            vec!["...".to_owned()]
        } else {
            workspace.rebase_paths(&cwd, &user_paths)?
        };

        format::go_format(&workspace, rewrite, &paths)
    }
}
