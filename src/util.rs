//! Small helpers shared across the pipeline: file reading and the
//! workspace-relative path arithmetic used by the collector and resolver.

use std::{fs, io, path::Path};

/// Read a whole file to a string, validating UTF-8 with `simdutf8`.
///
/// Every stage reads files through this: BUILD files, `.go` sources, and
/// `.wollemi.json` configs. A format run reads thousands of small files, so
/// the SIMD validation is worth having over `fs::read_to_string`; the error
/// for non-UTF-8 content is shaped the same way.
///
/// # Errors
///
/// Fails when the file cannot be read or is not valid UTF-8.
#[expect(unsafe_code, reason = "from_utf8_unchecked after simdutf8 has validated the bytes")]
pub fn read_to_string(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;

    if simdutf8::basic::from_utf8(&bytes).is_err() {
        #[cold]
        fn invalid_utf8_error() -> io::Error {
            io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")
        }
        return Err(invalid_utf8_error());
    }

    // SAFETY: the bytes were validated as UTF-8 just above.
    Ok(unsafe { String::from_utf8_unchecked(bytes) })
}

/// Join a workspace-relative directory and a file name, collapsing the `"."`
/// root directory the way `filepath.Join` does.
pub fn join_rel(dir: &str, name: &str) -> String {
    if dir == "." || dir.is_empty() { name.to_owned() } else { format!("{dir}/{name}") }
}

/// The parent of a workspace-relative path, with `"."` once the path has no
/// directory component left.
pub fn dirname(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => ".",
        Some((dir, _)) => dir,
    }
}
