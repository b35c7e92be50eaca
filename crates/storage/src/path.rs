//! Logical path validation and security utilities.
//!
//! Logical paths are the keys of a repository manifest: forward-slash
//! separated, relative to the repository root, never touching the real
//! filesystem. They still get scrubbed of traversal sequences so that a
//! manifest can be materialized on disk without escaping its destination.

use crate::error::{ErrorKind, Result};

/// Reserved final segment of a directory marker entry.
///
/// An otherwise empty directory `docs` is represented by a zero-length entry
/// at `docs/.vellumdir`.
pub const DIRECTORY_MARKER: &str = ".vellumdir";

/// Validates a logical path for security and correctness.
/// Ensures that paths don't escape the repository root (no `..` traversal).
///
/// Both `/` and `\` are treated as separators, so whatever the client
/// platform the stored key only ever contains `/`. Empty and `.` segments
/// are dropped; `..` pops the previous segment and is an error once there is
/// nothing left to pop. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use vellum_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("docs/readme.md").is_ok());
/// assert!(validate_path("a/../file.txt").is_ok()); // (never leaves the root)
/// // Invalid paths
/// assert!(validate_path("../../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err());
/// assert!(validate_path("a\0b").is_err());
/// // Paths get resolved
/// assert_eq!(validate_path("wrong/../still-wrong/.././correct//./file.txt/").unwrap(), "correct/file.txt");
/// ```
pub fn validate(path: impl AsRef<str>) -> Result<String> {
    let segments = resolve(path.as_ref())?;
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_string())),
        false => Ok(segments.join("/")),
    }
}

/// Same as [`validate`], but the repository root itself (an empty string,
/// `/` or `.`) is accepted and returned as `""`.
///
/// Used for directory listing prefixes.
pub fn validate_prefix(prefix: impl AsRef<str>) -> Result<String> {
    Ok(resolve(prefix.as_ref())?.join("/"))
}

/// Returns `true` if the final segment of an already validated path is the
/// reserved [`DIRECTORY_MARKER`].
pub fn is_directory_marker(path: &str) -> bool {
    path.rsplit('/').next() == Some(DIRECTORY_MARKER)
}

/// Builds the marker path for a directory (validated first).
pub fn directory_marker(directory: impl AsRef<str>) -> Result<String> {
    let directory = validate(directory)?;
    if is_directory_marker(&directory) {
        exn::bail!(ErrorKind::InvalidPath(directory));
    }
    Ok(format!("{directory}/{DIRECTORY_MARKER}"))
}

/// Joins a (possibly empty) validated prefix with a single segment.
pub fn join(prefix: &str, segment: &str) -> String {
    match prefix.is_empty() {
        true => segment.to_string(),
        false => format!("{prefix}/{segment}"),
    }
}

/// Sanitizes a value that arrived as a *single* segment (a bare file or
/// directory name typed into a form field).
///
/// A single field must never add path depth the caller cannot see, so
/// separators and traversal sequences are **replaced** with `_` rather than
/// rejected. Surrounding whitespace is trimmed. Null bytes are rejected, as
/// is a result that is empty, a bare `.`/`..`, or the reserved directory
/// marker.
///
/// ```
/// use vellum_storage::sanitize_segment;
/// assert_eq!(sanitize_segment("notes/../../secret.txt").unwrap(), "notes___secret.txt");
/// assert_eq!(sanitize_segment("  report.pdf ").unwrap(), "report.pdf");
/// assert!(sanitize_segment("..").is_err());
/// ```
pub fn sanitize_segment(value: impl AsRef<str>) -> Result<String> {
    let raw = value.as_ref();
    if raw.contains('\0') {
        exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
    }
    let replaced = raw.replace("../", "_").replace("..\\", "_").replace(['/', '\\'], "_");
    let segment = replaced.trim();
    if segment.is_empty() || segment == "." || segment == ".." || segment == DIRECTORY_MARKER {
        exn::bail!(ErrorKind::InvalidPath(raw.to_string()));
    }
    Ok(segment.to_string())
}

fn resolve(path: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_string()));
                }
            },
            // Null bytes cause truncation in C-based consumers of the key.
            s if s.contains('\0') => exn::bail!(ErrorKind::InvalidPath(path.to_string())),
            s => segments.push(s),
        }
    }
    Ok(segments)
}
