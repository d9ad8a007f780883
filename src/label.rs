//! Build label helpers.
//!
//! A label names a build target as `//<path>[:<name>]`. A label pointing into
//! the directory of its consumer collapses to `:<name>`.

/// Split a label into its path and name parts.
///
/// The leading `//` is removed and the label is split at the last `:`.
/// A label without `:` yields the whole label as path and an empty name.
pub fn split(label: &str) -> (&str, &str) {
    let label = label.strip_prefix("//").unwrap_or(label);
    match label.rsplit_once(':') {
        Some((path, name)) => (path, name),
        None => (label, ""),
    }
}

/// Collapse `label` to `:<name>` when it points into `dir`.
pub fn collapse(label: &str, dir: &str) -> String {
    let (path, name) = split(label);
    if path == dir { format!(":{name}") } else { label.to_owned() }
}

/// Order `deps` by (path, name) after splitting each label at the last `:`.
pub fn sort_deps(deps: &mut [String]) {
    deps.sort_by(|a, b| split(a).cmp(&split(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_label() {
        assert_eq!(split("//foo/bar:baz"), ("foo/bar", "baz"));
        assert_eq!(split("//foo/bar"), ("foo/bar", ""));
        assert_eq!(split(":baz"), ("", "baz"));
        assert_eq!(split("foo/bar:baz"), ("foo/bar", "baz"));
    }

    #[test]
    fn collapse_same_directory() {
        assert_eq!(collapse("//foo/bar:baz", "foo/bar"), ":baz");
        assert_eq!(collapse("//foo/bar:baz", "foo"), "//foo/bar:baz");
        assert_eq!(collapse("//foo/bar", "foo/bar"), ":");
    }

    #[test]
    fn deps_sorted_by_path_then_name() {
        let mut deps = vec![
            "//foo:b".to_owned(),
            "//bar".to_owned(),
            "//foo:a".to_owned(),
            "//bar/baz".to_owned(),
        ];
        sort_deps(&mut deps);
        assert_eq!(deps, ["//bar", "//bar/baz", "//foo:a", "//foo:b"]);
    }
}
