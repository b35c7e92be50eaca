//! Repository name sanitization.
//!
//! Repository files live side by side in a single flat directory, so a name
//! is reduced to one file name and nothing else.

use crate::error::{ErrorKind, Result};

/// File extension carried by every repository file.
pub const REPOSITORY_EXTENSION: &str = "vellum";

/// Turns a user supplied repository name into a file name inside the
/// repository directory.
///
/// Names containing a traversal sequence or a null byte are rejected before
/// anything else happens. Otherwise the name is reduced to its basename,
/// every character outside `[A-Za-z0-9._-]` is dropped, and the
/// [`REPOSITORY_EXTENSION`] is appended when missing.
///
/// ```
/// use vellum_storage::sanitize_name;
/// assert_eq!(sanitize_name("notes").unwrap(), "notes.vellum");
/// assert_eq!(sanitize_name("my notes!.vellum").unwrap(), "mynotes.vellum");
/// assert!(sanitize_name("../../etc/passwd").is_err());
/// ```
pub fn sanitize_name(name: impl AsRef<str>) -> Result<String> {
    let raw = name.as_ref();
    if raw.contains("../") || raw.contains("..\\") || raw.contains('\0') {
        exn::bail!(ErrorKind::InvalidName(raw.to_string()));
    }

    let basename = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let filtered: String = basename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let stem = display_name(&filtered);
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        exn::bail!(ErrorKind::InvalidName(raw.to_string()));
    }
    Ok(format!("{stem}.{REPOSITORY_EXTENSION}"))
}

/// Strips the repository extension from a file name, if present.
pub fn display_name(file_name: &str) -> &str {
    file_name
        .strip_suffix(REPOSITORY_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("notes", "notes.vellum")]
    #[case("notes.vellum", "notes.vellum")]
    #[case("Project_2024-v1", "Project_2024-v1.vellum")]
    #[case("dir/inner", "inner.vellum")]
    #[case("dir\\inner", "inner.vellum")]
    #[case("with space", "withspace.vellum")]
    #[case("émoji✓name", "mojiname.vellum")]
    #[case("archive.tar", "archive.tar.vellum")]
    fn test_sanitize_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_name(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("../../etc/passwd")]
    #[case("..\\..\\boot.ini")]
    #[case("repo\0name")]
    #[case("dir/")]
    #[case("!!!")]
    #[case(".vellum")]
    #[case("..")]
    #[case("...")]
    fn test_sanitize_name_rejects(#[case] input: &str) {
        let err = sanitize_name(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(_)));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("notes.vellum"), "notes");
        assert_eq!(display_name("notes"), "notes");
        assert_eq!(display_name("notesvellum"), "notesvellum");
    }
}
