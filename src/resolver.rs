//! Import resolution.
//!
//! Maps an import path (or a source file path) to a build target label
//! across three namespaces: workspace-internal targets, third-party modules,
//! and generated files. The indices are frozen once collection ends, so the
//! resolver is shared immutably across the rewriter pool.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::config::Config;
use crate::util::dirname;

/// The frozen resolution indices.
#[derive(Debug, Default)]
pub struct Resolver {
    import_root: String,
    internal: FxHashMap<String, String>,
    external: FxHashMap<String, Vec<String>>,
    genfiles: FxHashMap<String, String>,
}

impl Resolver {
    pub fn new(
        import_root: String,
        internal: FxHashMap<String, String>,
        external: FxHashMap<String, Vec<String>>,
        genfiles: FxHashMap<String, String>,
    ) -> Self {
        Self { import_root, internal, external, genfiles }
    }

    /// Resolve `path` to a target label, or `None` when nothing claims it.
    ///
    /// Explicit `known_dependency` overrides win. A `.go` file path resolves
    /// through the generated-files index only. A path under the workspace
    /// import root resolves through `internal`, speculatively falling back to
    /// `//<rel>`. Anything else consults the third-party index, walking up
    /// through ancestor paths so an import of a sub-package lands on its
    /// module's label.
    pub fn resolve(&self, config: &Config, path: &str, is_file: bool) -> Option<String> {
        if let Some(target) = config.known_dependency.get(path) {
            return Some(target.clone());
        }

        if is_file && path.ends_with(".go") {
            return self.genfiles.get(path).cloned();
        }

        if !self.import_root.is_empty()
            && let Some(rel) =
                path.strip_prefix(&self.import_root).and_then(|rest| rest.strip_prefix('/'))
        {
            if let Some(target) = self.internal.get(rel) {
                return Some(target.clone());
            }
            return Some(format!("//{rel}"));
        }

        if let Some(targets) = self.external.get(path) {
            if targets.len() > 1 {
                warn!(godep = %path, choices = ?targets, chose = %targets[0], "ambiguous godep");
            }
            return targets.first().cloned();
        }

        let parent = dirname(path);
        if parent == "." {
            return None;
        }

        self.resolve(config, parent, is_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        let mut internal = FxHashMap::default();
        internal.insert("lib".to_owned(), "//lib".to_owned());
        internal.insert("pkg/util".to_owned(), "//pkg/util".to_owned());

        let mut external = FxHashMap::default();
        external.insert(
            "github.com/pkg/errors".to_owned(),
            vec!["//third_party/go/errors".to_owned(), "//third_party/go/fork:errors".to_owned()],
        );
        external.insert("google.golang.org/grpc".to_owned(), vec!["//third_party/go/grpc".to_owned()]);

        let mut genfiles = FxHashMap::default();
        genfiles.insert("foo/gen.cp.go".to_owned(), "foo:gen".to_owned());

        Resolver::new("github.com/acme/repo".to_owned(), internal, external, genfiles)
    }

    #[test]
    fn known_dependency_wins() {
        let mut config = Config::default();
        config
            .known_dependency
            .insert("github.com/pkg/errors".to_owned(), "//vendored:errors".to_owned());

        let target = resolver().resolve(&config, "github.com/pkg/errors", false);
        assert_eq!(target.as_deref(), Some("//vendored:errors"));
    }

    #[test]
    fn go_file_resolves_through_genfiles_only() {
        let config = Config::default();
        let resolver = resolver();

        // The genfiles index stores labels without the leading `//` and the
        // resolver hands them back untouched.
        assert_eq!(resolver.resolve(&config, "foo/gen.cp.go", true).as_deref(), Some("foo:gen"));
        assert_eq!(resolver.resolve(&config, "foo/other.go", true), None);
    }

    #[test]
    fn internal_import_resolves_to_indexed_label() {
        let config = Config::default();
        let target = resolver().resolve(&config, "github.com/acme/repo/lib", false);
        assert_eq!(target.as_deref(), Some("//lib"));
    }

    #[test]
    fn unindexed_internal_import_is_speculative() {
        let config = Config::default();
        let target = resolver().resolve(&config, "github.com/acme/repo/does/not/exist", false);
        assert_eq!(target.as_deref(), Some("//does/not/exist"));
    }

    #[test]
    fn ambiguous_external_import_picks_first_candidate() {
        let config = Config::default();
        let target = resolver().resolve(&config, "github.com/pkg/errors", false);
        assert_eq!(target.as_deref(), Some("//third_party/go/errors"));
    }

    #[test]
    fn sub_package_falls_back_to_module_ancestor() {
        let config = Config::default();
        let target = resolver().resolve(&config, "google.golang.org/grpc/codes", false);
        assert_eq!(target.as_deref(), Some("//third_party/go/grpc"));
    }

    #[test]
    fn unknown_import_walks_to_dot_and_gives_up() {
        let config = Config::default();
        assert_eq!(resolver().resolve(&config, "example.org/unknown/pkg", false), None);
        assert_eq!(resolver().resolve(&config, "strings", false), None);
    }
}
