//! Rule synthesis.
//!
//! Regenerates the `go_binary`, `go_library`, and `go_test` rules of every
//! in-scope directory from its parsed package, then persists the BUILD file.
//! The tool prefers leaving a file alone over guessing: pinned rules,
//! duplicated kinds, and unresolved imports all abandon the rewrite.

use std::fs;

use globset::{Glob, GlobMatcher};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{error, warn};

use crate::build_file::{Rule, Value};
use crate::config::Config;
use crate::format::Directory;
use crate::go_package::GoPackage;
use crate::label;
use crate::resolver::Resolver;
use crate::util::join_rel;
use crate::workspace::Workspace;

/// Rewrite every in-scope directory, spreading the work over a pool of
/// `numCPU - 1` workers. Each directory is owned by exactly one worker; the
/// indices are only read.
pub fn rewrite(
    workspace: &Workspace,
    resolver: &Resolver,
    paths: &[String],
    directories: FxHashMap<String, Directory>,
) {
    let mut directories: Vec<Directory> =
        directories.into_values().filter(|dir| dir.in_scope).collect();
    directories.sort_by(|a, b| a.path.cmp(&b.path));

    let workers = std::thread::available_parallelism()
        .map_or(1, |threads| threads.get().saturating_sub(1).max(1));

    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| {
            directories
                .into_par_iter()
                .for_each(|dir| rewrite_directory(workspace, resolver, paths, dir));
        }),
        Err(err) => {
            warn!(error = %err, "could not build rewriter pool");
            for dir in directories {
                rewrite_directory(workspace, resolver, paths, dir);
            }
        }
    }
}

/// The inputs a rule kind is synthesized from.
struct RuleInputs {
    include_pattern: &'static str,
    exclude_pattern: &'static str,
    go_files: Vec<String>,
    imports: Vec<String>,
    external: bool,
}

impl RuleInputs {
    fn for_kind(kind: &str, package: &GoPackage) -> Self {
        if kind != "go_test" {
            return Self {
                include_pattern: "*.go",
                exclude_pattern: "*_test.go",
                go_files: package.go_files.clone(),
                imports: package.imports.clone(),
                external: false,
            };
        }

        // An external test package takes over the test rule entirely.
        if package.xtest_go_files.is_empty() {
            Self {
                include_pattern: "*.go",
                exclude_pattern: "",
                go_files: [package.go_files.as_slice(), package.test_go_files.as_slice()].concat(),
                imports: [package.imports.as_slice(), package.test_imports.as_slice()].concat(),
                external: false,
            }
        } else {
            Self {
                include_pattern: "*_test.go",
                exclude_pattern: "",
                go_files: package.xtest_go_files.clone(),
                imports: package.xtest_imports.clone(),
                external: true,
            }
        }
    }
}

fn matcher(pattern: &str) -> Option<GlobMatcher> {
    if pattern.is_empty() {
        return None;
    }
    Glob::new(pattern).ok().map(|glob| glob.compile_matcher())
}

#[expect(clippy::too_many_lines, reason = "One pass over the fixed rule kind order")]
fn rewrite_directory(
    workspace: &Workspace,
    resolver: &Resolver,
    paths: &[String],
    mut dir: Directory,
) {
    let config = Config::load(&workspace.root, &dir.path);

    let mut rules_by_kind: FxHashMap<&str, Vec<Rule>> = FxHashMap::default();
    for rule in dir.build.rules() {
        match rule.kind() {
            "go_binary" => rules_by_kind.entry("go_binary").or_default().push(rule.clone()),
            "go_library" => rules_by_kind.entry("go_library").or_default().push(rule.clone()),
            "go_test" => rules_by_kind.entry("go_test").or_default().push(rule.clone()),
            _ => {}
        }
    }

    if dir.ok
        && dir.rewrite
        && let Some(package) = dir.package.clone()
    {
        if !package.go_files.is_empty() {
            let kind = if package.name == "main" { "go_binary" } else { "go_library" };
            rules_by_kind
                .entry(kind)
                .or_insert_with(|| vec![Rule::new(kind, basename(&dir.path))]);
        }

        if !package.test_go_files.is_empty() || !package.xtest_go_files.is_empty() {
            rules_by_kind
                .entry("go_test")
                .or_insert_with(|| vec![Rule::new("go_test", "test")]);
        }

        for kind in ["go_binary", "go_library", "go_test"] {
            let Some(rules) = rules_by_kind.remove(kind) else { continue };

            if rules.len() > 1 {
                let names: Vec<&str> = rules.iter().map(Rule::name).collect();
                warn!(
                    path = %dir.path,
                    kind,
                    names = ?names,
                    "multiples of rule kind not supported"
                );
                continue;
            }

            let Some(mut rule) = rules.into_iter().next() else { continue };

            // The user pinned this directory; leave the file untouched.
            if rule.has_keep_pragma() {
                return;
            }

            let inputs = RuleInputs::for_kind(kind, &package);

            let rule_name = if rule.name().is_empty() {
                let name = basename(&dir.path).to_owned();
                rule.set_attr("name", Value::string(&name));
                name
            } else {
                rule.name().to_owned()
            };

            let remove = if kind == "go_test" {
                package.test_go_files.is_empty() && package.xtest_go_files.is_empty()
            } else {
                inputs.go_files.is_empty()
            };

            if remove {
                warn!(
                    path = %dir.path,
                    build_rule = %rule_name,
                    reason = "no source files",
                    "removed"
                );
                dir.build.del_rule(&rule_name);
                continue;
            }

            let include_matcher = matcher(inputs.include_pattern);
            let exclude_matcher = matcher(inputs.exclude_pattern);

            let mut include = vec![inputs.include_pattern.to_owned()];
            let mut exclude = if inputs.exclude_pattern.is_empty() {
                Vec::new()
            } else {
                vec![inputs.exclude_pattern.to_owned()]
            };
            let mut targets: Vec<String> = Vec::new();
            let mut local_sources = 0usize;

            for filename in &inputs.go_files {
                let relpath = join_rel(&dir.path, filename);

                match resolver.resolve(&config, &relpath, true) {
                    None => {
                        let abs = workspace.abs(&dir.path).join(filename);
                        let meta = match fs::symlink_metadata(&abs) {
                            Ok(meta) => meta,
                            Err(err) => {
                                warn!(
                                    path = %dir.path,
                                    file = %filename,
                                    error = %err,
                                    "could not lstat"
                                );
                                continue;
                            }
                        };

                        if meta.file_type().is_symlink() {
                            continue;
                        }

                        local_sources += 1;

                        let covered = include_matcher
                            .as_ref()
                            .is_some_and(|include| include.is_match(filename))
                            && !exclude_matcher
                                .as_ref()
                                .is_some_and(|exclude| exclude.is_match(filename));
                        if !covered {
                            include.push(filename.clone());
                        }
                    }
                    Some(target) => {
                        exclude.push(filename.clone());
                        targets.push(label::collapse(&target, &dir.path));
                    }
                }
            }

            // Every file belongs to another target; nothing here to manage.
            if local_sources == 0 {
                continue;
            }

            let srcs = Value::glob(include, exclude, targets);

            let mut deps: Vec<String> = Vec::with_capacity(inputs.imports.len());
            let mut seen: FxHashSet<String> = FxHashSet::default();
            let mut unresolved = 0usize;

            for import in &inputs.imports {
                match resolver.resolve(&config, import, false) {
                    None => {
                        error!(path = %dir.path, godep = %import, "could not resolve godep");
                        unresolved += 1;
                    }
                    Some(target) => {
                        let target = label::collapse(&target, &dir.path);
                        if seen.insert(target.clone()) {
                            deps.push(target);
                        }
                    }
                }
            }

            // Unresolved dependencies: leave the rule exactly as found.
            if unresolved > 0 {
                continue;
            }

            rule.set_attr("srcs", srcs);

            if kind == "go_test" {
                if inputs.external {
                    rule.set_attr("external", Value::ident("True"));
                } else {
                    rule.del_attr("external");
                }
            } else if rule.attr_strings("visibility").is_none() {
                let mut visibility = config.default_visibility.clone();
                if visibility.is_empty() {
                    visibility = "PUBLIC".to_owned();
                    for run_path in paths {
                        if let Some(prefix) = run_path.strip_suffix("/...")
                            && !prefix.is_empty()
                            && (dir.path == prefix
                                || dir
                                    .path
                                    .strip_prefix(prefix)
                                    .is_some_and(|rest| rest.starts_with('/')))
                        {
                            visibility = format!("//{prefix}/...");
                            break;
                        }
                    }
                }
                rule.set_attr("visibility", Value::strings([visibility]));
            }

            label::sort_deps(&mut deps);
            if deps.is_empty() {
                rule.del_attr("deps");
            } else {
                rule.set_attr("deps", Value::strings(deps));
            }

            dir.build.set_rule(rule);
        }
    }

    if let Err(err) = dir.build.write() {
        warn!(path = %dir.path, error = %err, "could not write");
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
