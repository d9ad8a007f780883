//! Go package parsing.
//!
//! Lists and classifies the `.go` files of a single directory and scans each
//! one for its package clause and import declarations. Only the file
//! inventory and the import graph are needed here, so the scanner stops at
//! the first top-level declaration instead of parsing whole files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::util::read_to_string;

/// The parsed source inventory of one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoPackage {
    /// Package name, `main` for binaries.
    pub name: String,

    /// Non-test sources, sorted.
    pub go_files: Vec<String>,
    /// In-package test sources (`*_test.go`, package `<name>`), sorted.
    pub test_go_files: Vec<String>,
    /// External test sources (`*_test.go`, package `<name>_test`), sorted.
    pub xtest_go_files: Vec<String>,

    /// Imports of `go_files`, sorted and deduplicated.
    pub imports: Vec<String>,
    /// Imports of `test_go_files`, sorted and deduplicated.
    pub test_imports: Vec<String>,
    /// Imports of `xtest_go_files`, sorted and deduplicated.
    pub xtest_imports: Vec<String>,
}

impl GoPackage {
    /// Parse the Go package rooted at `dir`.
    ///
    /// Returns `None` when the directory holds no Go sources. Files whose
    /// names start with `.` or `_` are ignored, matching the Go toolchain.
    pub fn parse(dir: &Path) -> Result<Option<Self>> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .with_context(|| format!("could not read directory {}", dir.display()))?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|ty| ty.is_file() || ty.is_symlink()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                name.ends_with(".go") && !name.starts_with('.') && !name.starts_with('_')
            })
            .collect();

        if names.is_empty() {
            return Ok(None);
        }

        names.sort_unstable();

        let mut package = Self::default();
        let mut test_package_name = String::new();

        for name in names {
            let source = read_to_string(&dir.join(&name))
                .with_context(|| format!("could not read {}", dir.join(&name).display()))?;
            let scanned = scan_source(&source)
                .with_context(|| format!("could not parse {}", dir.join(&name).display()))?;

            if name.ends_with("_test.go") {
                if scanned.package.ends_with("_test") {
                    package.xtest_go_files.push(name);
                    package.xtest_imports.extend(scanned.imports);
                } else {
                    package.test_go_files.push(name);
                    package.test_imports.extend(scanned.imports);
                }
                if test_package_name.is_empty() {
                    test_package_name = scanned.package;
                }
            } else {
                if package.name.is_empty() {
                    package.name = scanned.package.clone();
                }
                package.go_files.push(name);
                package.imports.extend(scanned.imports);
            }
        }

        if package.name.is_empty() {
            package.name = test_package_name.trim_end_matches("_test").to_owned();
        }

        for imports in
            [&mut package.imports, &mut package.test_imports, &mut package.xtest_imports]
        {
            imports.sort_unstable();
            imports.dedup();
        }

        Ok(Some(package))
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ScannedSource {
    package: String,
    imports: Vec<String>,
}

/// Scan one Go source for its package clause and import declarations.
fn scan_source(source: &str) -> Result<ScannedSource> {
    let source = strip_comments(source);
    let mut lines = source.lines();

    let package = lines
        .by_ref()
        .find_map(|line| line.trim().strip_prefix("package "))
        .map(|name| name.trim().to_owned())
        .ok_or_else(|| anyhow!("missing package clause"))?;

    let mut imports = Vec::new();

    while let Some(line) = lines.next() {
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("import") {
            let rest = rest.trim_start();
            if rest.starts_with('(') {
                // Grouped import declaration, one spec per line until `)`.
                for line in lines.by_ref() {
                    let line = line.trim();
                    if line.starts_with(')') {
                        break;
                    }
                    if let Some(path) = quoted(line) {
                        imports.push(path);
                    }
                }
            } else if let Some(path) = quoted(rest) {
                imports.push(path);
            }
            continue;
        }

        // Imports must precede all other declarations.
        if ["func", "var", "const", "type"].iter().any(|kw| {
            line == *kw || line.strip_prefix(kw).is_some_and(|rest| rest.starts_with([' ', '(']))
        }) {
            break;
        }
    }

    Ok(ScannedSource { package, imports })
}

/// The content of the first interpreted string literal on `line`, if any.
/// Import specs are optionally prefixed with an alias, `.`, or `_`.
fn quoted(line: &str) -> Option<String> {
    let start = line.find('"')?;
    let rest = &line[start + 1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_owned())
}

/// Remove line and block comments, leaving string literals intact.
fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    // Keep newlines so line-oriented scanning stays aligned.
                    if bytes[i] == b'\n' {
                        out.push('\n');
                    }
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b'"' => {
                out.push('"');
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        out.push('\\');
                        i += 1;
                        if i >= bytes.len() {
                            break;
                        }
                    }
                    out.push(bytes[i] as char);
                    i += 1;
                }
                if i < bytes.len() {
                    out.push('"');
                    i += 1;
                }
            }
            b'`' => {
                out.push('`');
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    out.push(bytes[i] as char);
                    i += 1;
                }
                if i < bytes.len() {
                    out.push('`');
                    i += 1;
                }
            }
            byte => {
                out.push(byte as char);
                i += 1;
            }
        }
    }

    out
}
