//! The discovery pipeline.
//!
//! Three cooperating groups connected by channels: a walker streaming
//! directories, a parser enriching each directory with its BUILD model and Go
//! package, and a single-threaded collector that indexes rules and chases
//! imports into subtrees the walk never visits. Once the pipeline drains, the
//! frozen indices feed the rewriter.

use std::fs;
use std::io;
use std::thread;

use anyhow::{Context, Result, anyhow};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::build_file::{BuildFile, Rule};
use crate::go_package::GoPackage;
use crate::resolver::Resolver;
use crate::rewriter;
use crate::util::join_rel;
use crate::walker::{self, in_run_path};
use crate::workspace::Workspace;

/// The unit of work flowing through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    /// Workspace-relative path, `.` for the root.
    pub path: String,

    /// Parsed package info, absent when the directory holds no Go sources.
    pub package: Option<GoPackage>,

    /// The BUILD model, possibly empty.
    pub build: BuildFile,

    /// Whether the directory lies under a user-supplied path.
    pub in_scope: bool,

    /// Whether rule attributes may be regenerated.
    pub rewrite: bool,

    /// Parse succeeded.
    pub ok: bool,

    /// Import path under which this directory was delegated, when it was
    /// enqueued by the collector rather than the walk.
    pub rule: Option<String>,
}

impl Directory {
    pub fn new(path: &str) -> Self {
        Self { path: path.to_owned(), ..Self::default() }
    }

    fn delegated(path: &str, import: &str) -> Self {
        Self { path: path.to_owned(), rule: Some(import.to_owned()), ok: true, ..Self::default() }
    }
}

/// Synchronize the BUILD files under `user_paths` with the tree.
///
/// With `rewrite` unset, BUILD files are reparsed and reprinted but rule
/// attributes are left alone.
pub fn go_format(workspace: &Workspace, rewrite: bool, user_paths: &[String]) -> Result<()> {
    let paths = walker::normalize(user_paths);

    debug!(
        rewrite,
        import_root = %workspace.import_root,
        build_file = %workspace.build_file,
        "run"
    );

    let (walk_tx, walk_rx) = flume::bounded::<Directory>(1024);
    let (parse_tx, parse_rx) = flume::unbounded::<Directory>();
    let (collect_tx, collect_rx) = flume::bounded::<Directory>(1024);

    let mut collector = Collector::new(workspace, &paths);

    let paths_ref = paths.as_slice();
    let walked = thread::scope(|scope| {
        let walk = scope.spawn(move || {
            let result = walker::walk(workspace, paths_ref, &walk_tx);
            drop(walk_tx);
            result
        });

        scope.spawn(move || {
            for dir in parse_rx.iter() {
                let parsed = parse_directory(workspace, paths_ref, rewrite, dir);
                if collect_tx.send(parsed).is_err() {
                    break;
                }
            }
        });

        collector.run(&walk_rx, &collect_rx, parse_tx);

        walk.join().map_err(|_| anyhow!("walker thread panicked"))?
    });
    walked.context("could not walk")?;

    let Collector { directories, internal, external, genfiles, .. } = collector;
    let resolver = Resolver::new(workspace.import_root.clone(), internal, external, genfiles);

    rewriter::rewrite(workspace, &resolver, &paths, directories);

    Ok(())
}

/// Enrich one directory: BUILD model, Go package, scope flags. Any parse
/// failure marks the directory not ok; the collector drops those.
fn parse_directory(
    workspace: &Workspace,
    paths: &[String],
    rewrite: bool,
    mut dir: Directory,
) -> Directory {
    dir.in_scope = in_run_path(&dir.path, paths);
    dir.rewrite = rewrite;
    dir.ok = true;

    let build_path = workspace.abs(&dir.path).join(&workspace.build_file);
    match BuildFile::load(build_path) {
        Ok(build) => dir.build = build,
        Err(err) => {
            debug!(path = %dir.path, error = %err, "could not parse build file");
            dir.ok = false;
            return dir;
        }
    }

    match GoPackage::parse(&workspace.abs(&dir.path)) {
        Ok(package) => dir.package = package,
        Err(err) => {
            debug!(path = %dir.path, error = %err, "could not parse go package");
            dir.ok = false;
        }
    }

    dir
}

/// Single-threaded aggregator. Sole writer of the directory registry and of
/// the three resolution indices.
struct Collector<'a> {
    workspace: &'a Workspace,
    paths: &'a [String],

    /// Every successfully parsed directory.
    directories: FxHashMap<String, Directory>,

    /// Workspace-relative path to target label, from workspace-internal rule
    /// kinds.
    internal: FxHashMap<String, String>,

    /// Third-party import path to target labels, from the `go_get` family.
    /// One import may map to several labels.
    external: FxHashMap<String, Vec<String>>,

    /// Generated file path to owning label, without the leading `//`.
    genfiles: FxHashMap<String, String>,

    /// Paths already enqueued as delegated probes.
    delegated: FxHashSet<String>,
}

enum Event {
    Walk(Option<Directory>),
    Collect(Option<Directory>),
}

impl<'a> Collector<'a> {
    fn new(workspace: &'a Workspace, paths: &'a [String]) -> Self {
        Self {
            workspace,
            paths,
            directories: FxHashMap::default(),
            internal: FxHashMap::default(),
            external: FxHashMap::default(),
            genfiles: FxHashMap::default(),
            delegated: FxHashSet::default(),
        }
    }

    /// Multiplex the walk and collect channels until the walk closes and no
    /// parse is outstanding. Dropping `parse_tx` on return drains the parser.
    fn run(
        &mut self,
        walk_rx: &flume::Receiver<Directory>,
        collect_rx: &flume::Receiver<Directory>,
        parse_tx: flume::Sender<Directory>,
    ) {
        let mut parsing = 0usize;
        let mut walk_open = true;

        loop {
            if !walk_open && parsing == 0 {
                break;
            }

            let event = if walk_open {
                flume::Selector::new()
                    .recv(walk_rx, |result| Event::Walk(result.ok()))
                    .recv(collect_rx, |result| Event::Collect(result.ok()))
                    .wait()
            } else {
                Event::Collect(collect_rx.recv().ok())
            };

            match event {
                Event::Walk(Some(dir)) => {
                    parsing += 1;
                    // The parse queue is unbounded, so this never blocks the
                    // collector against its own pipeline.
                    let _ = parse_tx.send(dir);
                }
                Event::Walk(None) => walk_open = false,
                Event::Collect(Some(dir)) => {
                    parsing -= 1;
                    parsing += self.collect(dir, &parse_tx);
                }
                Event::Collect(None) => break,
            }
        }
    }

    /// Register one parsed directory. Returns how many delegated parses were
    /// enqueued on its behalf.
    fn collect(&mut self, dir: Directory, parse_tx: &flume::Sender<Directory>) -> usize {
        if !dir.ok {
            return 0;
        }

        let imports: Vec<String> = dir
            .package
            .as_ref()
            .map(|package| {
                package
                    .imports
                    .iter()
                    .chain(&package.test_imports)
                    .chain(&package.xtest_imports)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let rules: Vec<Rule> = dir.build.rules().cloned().collect();
        let path = dir.path.clone();
        let delegated_under = dir.rule.clone();

        self.directories.insert(path.clone(), dir);

        let mut enqueued = 0;
        for import in &imports {
            enqueued += self.delegate(import, parse_tx);
        }

        self.index_rules(&path, &rules);

        // A delegated directory was parsed on behalf of one concrete import,
        // possibly of a sub-package it owns. Alias that import onto the
        // directory's own label so the resolver lands on it.
        if let Some(import) = delegated_under
            && let Some(rel) = strip_import_root(&self.workspace.import_root, &import)
            && !self.internal.contains_key(&rel)
            && let Some(target) = self.internal.get(&path).cloned()
        {
            self.internal.insert(rel, target);
        }

        enqueued
    }

    /// Chase one import into a subtree the walk will not visit: find the
    /// longest prefix that owns a BUILD file and enqueue it for parsing, so
    /// its rules join the index.
    fn delegate(&mut self, import: &str, parse_tx: &flume::Sender<Directory>) -> usize {
        let root = &self.workspace.import_root;
        let path = match strip_import_root(root, import) {
            Some(rel) => rel,
            None => format!("{}/{import}", self.workspace.third_party),
        };

        if self.external.contains_key(import) {
            return 0;
        }

        if in_run_path(&path, self.paths) {
            return 0;
        }

        let segments: Vec<&str> = path.split('/').collect();
        for len in (1..=segments.len()).rev() {
            let prefix = segments[..len].join("/");

            if self.delegated.contains(&prefix) || self.directories.contains_key(&prefix) {
                return 0;
            }

            let build_path = self.workspace.abs(&prefix).join(&self.workspace.build_file);
            match fs::metadata(&build_path) {
                Ok(_) => {
                    self.delegated.insert(prefix.clone());
                    let _ = parse_tx.send(Directory::delegated(&prefix, import));
                    return 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %prefix, error = %err, "could not stat build file");
                }
            }
        }

        0
    }

    /// Index the rules of one BUILD file into `internal`, `external`, and
    /// `genfiles`.
    fn index_rules(&mut self, dir_path: &str, rules: &[Rule]) {
        for rule in rules {
            match rule.kind() {
                "go_copy" | "go_mock" | "go_library" | "go_test" | "grpc_library" => {
                    let name = rule.attr_string("name").unwrap_or_default();
                    if name.is_empty() {
                        continue;
                    }

                    let (target, path) = if basename(dir_path) == name {
                        (dir_path.to_owned(), dir_path.to_owned())
                    } else {
                        (format!("{dir_path}:{name}"), join_rel(dir_path, name))
                    };

                    self.internal.insert(path.clone(), format!("//{target}"));

                    if rule.kind() == "go_copy" {
                        self.genfiles.insert(format!("{path}.cp.go"), target);
                    }
                }
                "go_get" | "go_get_with_sources" => {
                    let name = rule.attr_string("name").unwrap_or_default();

                    let get = if rule.kind() == "go_get_with_sources" {
                        rule.attr_strings("outs")
                            .and_then(|outs| outs.first())
                            .cloned()
                            .unwrap_or_default()
                    } else {
                        rule.attr_string("get")
                            .unwrap_or_default()
                            .trim_end_matches("/...")
                            .to_owned()
                    };

                    let target = if basename(dir_path) == name {
                        dir_path.to_owned()
                    } else {
                        format!("{dir_path}:{name}")
                    };

                    if !get.is_empty() && rule.attr_literal("binary") != Some("True") {
                        self.external.entry(get).or_default().push(format!("//{target}"));
                    }
                }
                _ => {}
            }
        }
    }
}

/// Map an import onto a workspace-relative path when it lives under the
/// workspace import root.
fn strip_import_root(root: &str, import: &str) -> Option<String> {
    if root.is_empty() {
        return None;
    }
    let rel = import.strip_prefix(root)?.strip_prefix('/')?;
    Some(rel.to_owned())
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::build_file::Value;

    fn workspace(root: PathBuf) -> Workspace {
        Workspace {
            root,
            import_root: "github.com/acme/repo".to_owned(),
            third_party: "third_party/go".to_owned(),
            build_file: "BUILD.plz".to_owned(),
        }
    }

    fn collector_fixture() -> (tempfile::TempDir, Workspace) {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().canonicalize().expect("canonicalize");
        (temp, workspace(root))
    }

    #[test]
    fn indexes_internal_rules() {
        let (_temp, workspace) = collector_fixture();
        let paths = vec!["...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);

        let named_after_dir = Rule::new("go_library", "bar");
        let named_otherwise = Rule::new("go_mock", "mocks");
        collector.index_rules("foo/bar", &[named_after_dir, named_otherwise]);

        assert_eq!(collector.internal["foo/bar"], "//foo/bar");
        assert_eq!(collector.internal["foo/bar/mocks"], "//foo/bar:mocks");
    }

    #[test]
    fn genfiles_keep_no_label_prefix() {
        let (_temp, workspace) = collector_fixture();
        let paths = vec!["...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);

        collector.index_rules("foo", &[Rule::new("go_copy", "gen")]);

        // The owning label is recorded without the leading `//`, unlike
        // `internal`; the resolver hands it back as-is.
        assert_eq!(collector.genfiles["foo/gen.cp.go"], "foo:gen");
        assert_eq!(collector.internal["foo/gen"], "//foo:gen");
    }

    #[test]
    fn go_get_rules_accumulate_by_import() {
        let (_temp, workspace) = collector_fixture();
        let paths = vec!["...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);

        let mut first = Rule::new("go_get", "errors");
        first.set_attr("get", Value::string("github.com/pkg/errors/..."));
        collector.index_rules("third_party/go/errors", &[first]);

        let mut second = Rule::new("go_get", "errors-fork");
        second.set_attr("get", Value::string("github.com/pkg/errors"));
        collector.index_rules("third_party/go/fork", &[second]);

        assert_eq!(
            collector.external["github.com/pkg/errors"],
            ["//third_party/go/errors", "//third_party/go/fork:errors-fork"]
        );
    }

    #[test]
    fn go_get_binary_rules_are_not_indexed() {
        let (_temp, workspace) = collector_fixture();
        let paths = vec!["...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);

        let mut rule = Rule::new("go_get", "protoc");
        rule.set_attr("get", Value::string("github.com/golang/protobuf/protoc-gen-go"));
        rule.set_attr("binary", Value::ident("True"));
        collector.index_rules("third_party/go/protoc", &[rule]);

        assert!(collector.external.is_empty());
    }

    #[test]
    fn go_get_with_sources_takes_import_from_outs() {
        let (_temp, workspace) = collector_fixture();
        let paths = vec!["...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);

        let mut rule = Rule::new("go_get_with_sources", "grpc");
        rule.set_attr("get", Value::string("google.golang.org/grpc/..."));
        rule.set_attr("outs", Value::strings(["google.golang.org/grpc"]));
        collector.index_rules("third_party/go/grpc", &[rule]);

        assert_eq!(collector.external["google.golang.org/grpc"], ["//third_party/go/grpc"]);
    }

    #[test]
    fn delegates_to_nearest_ancestor_with_build_file() {
        let (temp, workspace) = collector_fixture();
        std::fs::create_dir_all(temp.path().join("x/y/z")).expect("mkdir");
        std::fs::write(temp.path().join("x/y/BUILD.plz"), "go_library(name = \"y\")\n")
            .expect("write");

        let paths = vec!["a/...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);
        let (parse_tx, parse_rx) = flume::unbounded();

        let enqueued = collector.delegate("github.com/acme/repo/x/y/z", &parse_tx);
        assert_eq!(enqueued, 1);
        assert!(collector.delegated.contains("x/y"));

        let probe = parse_rx.try_recv().expect("delegated directory");
        assert_eq!(probe.path, "x/y");
        assert_eq!(probe.rule.as_deref(), Some("github.com/acme/repo/x/y/z"));
        assert!(probe.ok);
    }

    #[test]
    fn delegation_skips_imports_already_external() {
        let (_temp, workspace) = collector_fixture();
        let paths = vec!["a/...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);
        collector
            .external
            .insert("github.com/pkg/errors".to_owned(), vec!["//third_party/go/errors".to_owned()]);

        let (parse_tx, parse_rx) = flume::unbounded();
        assert_eq!(collector.delegate("github.com/pkg/errors", &parse_tx), 0);
        assert!(parse_rx.try_recv().is_err());
    }

    #[test]
    fn delegation_skips_in_scope_imports() {
        let (temp, workspace) = collector_fixture();
        std::fs::create_dir_all(temp.path().join("lib")).expect("mkdir");
        std::fs::write(temp.path().join("lib/BUILD.plz"), "").expect("write");

        let paths = vec!["...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);

        let (parse_tx, parse_rx) = flume::unbounded();
        assert_eq!(collector.delegate("github.com/acme/repo/lib", &parse_tx), 0);
        assert!(parse_rx.try_recv().is_err());
    }

    #[test]
    fn delegation_enqueues_each_prefix_once() {
        let (temp, workspace) = collector_fixture();
        std::fs::create_dir_all(temp.path().join("x/y")).expect("mkdir");
        std::fs::write(temp.path().join("x/y/BUILD.plz"), "").expect("write");

        let paths = vec!["a/...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);
        let (parse_tx, parse_rx) = flume::unbounded();

        assert_eq!(collector.delegate("github.com/acme/repo/x/y/z", &parse_tx), 1);
        assert_eq!(collector.delegate("github.com/acme/repo/x/y/w", &parse_tx), 0);
        assert_eq!(parse_rx.try_iter().count(), 1);
    }

    #[test]
    fn delegated_directory_aliases_its_import() {
        let (_temp, workspace) = collector_fixture();
        let paths = vec!["a/...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);
        let (parse_tx, _parse_rx) = flume::unbounded();

        let build = BuildFile::parse(
            workspace.root.join("x/y/BUILD.plz"),
            "go_library(\n    name = \"y\",\n)\n".to_owned(),
        )
        .expect("parse");

        let mut dir = Directory::delegated("x/y", "github.com/acme/repo/x/y/z");
        dir.build = build;
        collector.collect(dir, &parse_tx);

        assert_eq!(collector.internal["x/y"], "//x/y");
        assert_eq!(collector.internal["x/y/z"], "//x/y");
    }

    #[test]
    fn third_party_imports_probe_under_third_party_root() {
        let (temp, workspace) = collector_fixture();
        std::fs::create_dir_all(temp.path().join("third_party/go/github.com/pkg")).expect("mkdir");
        std::fs::write(temp.path().join("third_party/go/github.com/pkg/BUILD.plz"), "")
            .expect("write");

        let paths = vec!["a/...".to_owned()];
        let mut collector = Collector::new(&workspace, &paths);
        let (parse_tx, parse_rx) = flume::unbounded();

        assert_eq!(collector.delegate("github.com/pkg/errors", &parse_tx), 1);
        let probe = parse_rx.try_recv().expect("delegated directory");
        assert_eq!(probe.path, "third_party/go/github.com/pkg");
    }
}
