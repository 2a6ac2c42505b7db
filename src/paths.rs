use crate::error::{Error, Result};

/// Prefix of local branch refs.
pub const BRANCH_PREFIX: &str = "refs/heads/";

/// Ref holding the stash stack.
pub const STASH_REF: &str = "refs/stash";

/// Normalize a working-tree path.
///
/// Leading, trailing and repeated slashes are dropped and `.` segments are
/// collapsed, so `/a//./b/` becomes `a/b`. The root is the empty string.
///
/// # Errors
/// Returns [`Error::InvalidPath`] for `..` segments, NUL bytes, or a path
/// made only of `.` segments.
pub fn normalize_path(path: &str) -> Result<String> {
    if path.contains('\0') {
        return Err(Error::invalid_path(format!("{:?} contains a NUL byte", path)));
    }

    let mut segments = Vec::new();
    let mut saw_dot = false;
    for seg in path.split('/') {
        match seg {
            "" => {}
            "." => saw_dot = true,
            ".." => {
                return Err(Error::invalid_path(format!(
                    "'..' is not allowed in {:?}",
                    path
                )))
            }
            _ => segments.push(seg),
        }
    }

    if segments.is_empty() && saw_dot {
        return Err(Error::invalid_path(format!("{:?} names no entry", path)));
    }
    Ok(segments.join("/"))
}

/// Returns `true` when the path refers to the root of the tree
/// (empty string or only slashes).
pub fn is_root_path(path: &str) -> bool {
    path.bytes().all(|b| b == b'/')
}

/// Split a normalized path into its parent directory and final name.
///
/// `"a/b/c"` yields `("a/b", "c")`, `"c"` yields `("", "c")`.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Join a normalized directory path and a child name.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Validate a git reference name (short or full).
///
/// Follows git's `check-ref-format` rules: no spaces, control characters,
/// `~^:?*[\`, `..`, `@{`, empty components, trailing `.` or `.lock`.
///
/// # Errors
/// Returns [`Error::InvalidRefName`] if the name violates any rule.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let reject = |why: &str| Err(Error::invalid_ref_name(format!("{:?}: {}", name, why)));

    if name.is_empty() {
        return reject("must not be empty");
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_control() || matches!(c, ' ' | ':' | '\\' | '^' | '~' | '?' | '*' | '['))
    {
        return reject(&format!("contains invalid character {:?}", ch));
    }
    if name.contains("..") {
        return reject("must not contain '..'");
    }
    if name.contains("@{") || name == "@" {
        return reject("must not contain '@{'");
    }
    if name.split('/').any(|c| c.is_empty() || c.starts_with('.')) {
        return reject("components must be non-empty and not start with '.'");
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return reject("must not end with '.' or '.lock'");
    }
    Ok(())
}

/// Full ref name for a short branch name.
pub fn branch_ref(branch: &str) -> String {
    if branch.starts_with(BRANCH_PREFIX) {
        branch.to_string()
    } else {
        format!("{}{}", BRANCH_PREFIX, branch)
    }
}

/// Short branch name for a full `refs/heads/...` ref, if it is one.
pub fn short_branch_name(full: &str) -> Option<&str> {
    full.strip_prefix(BRANCH_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_empty_is_root() {
        assert_eq!(normalize_path("").unwrap(), "");
        assert_eq!(normalize_path("/").unwrap(), "");
        assert_eq!(normalize_path("///").unwrap(), "");
    }

    #[test]
    fn normalize_strips_slashes() {
        assert_eq!(normalize_path("/a/b/c/").unwrap(), "a/b/c");
        assert_eq!(normalize_path("a//b///c").unwrap(), "a/b/c");
    }

    #[test]
    fn normalize_collapses_dot() {
        assert_eq!(normalize_path("./a/./b/.").unwrap(), "a/b");
    }

    #[test]
    fn normalize_rejects_dot_only_and_dotdot() {
        assert!(normalize_path(".").is_err());
        assert!(normalize_path("/./.").is_err());
        assert!(normalize_path("a/../b").is_err());
        assert!(normalize_path("a\0b").is_err());
    }

    #[test]
    fn split_and_join() {
        assert_eq!(split_path("a/b/c"), ("a/b", "c"));
        assert_eq!(split_path("c"), ("", "c"));
        assert_eq!(join_path("", "c"), "c");
        assert_eq!(join_path("a/b", "c"), "a/b/c");
    }

    #[test]
    fn root_detection() {
        assert!(is_root_path(""));
        assert!(is_root_path("//"));
        assert!(!is_root_path("a"));
    }

    #[test]
    fn validate_ref_accepts_common_names() {
        assert!(validate_ref_name("main").is_ok());
        assert!(validate_ref_name("feature/login-form").is_ok());
        assert!(validate_ref_name("refs/heads/main").is_ok());
    }

    #[test]
    fn validate_ref_rejects_bad_names() {
        for bad in [
            "",
            "my branch",
            "a:b",
            "a..b",
            "a@{0}",
            "a.",
            "a.lock",
            "a//b",
            "/a",
            "a/",
            ".hidden",
            "a~1",
            "a\tb",
        ] {
            assert!(validate_ref_name(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn branch_ref_names() {
        assert_eq!(branch_ref("main"), "refs/heads/main");
        assert_eq!(branch_ref("refs/heads/main"), "refs/heads/main");
        assert_eq!(short_branch_name("refs/heads/dev"), Some("dev"));
        assert_eq!(short_branch_name("refs/tags/v1"), None);
    }
}
