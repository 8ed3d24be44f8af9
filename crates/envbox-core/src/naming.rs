//! Deterministic project-path -> guest-user identity mapping.
//!
//! Pure function of its input: the same absolute path always produces the
//! same name, on any machine, with no lookup against persisted state.

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use thiserror::Error;

/// Names are truncated so the full `<prefix>-<hex4>` stays well under the
/// 32-char login-name ceiling enforced by [`is_valid_name`].
const MAX_PREFIX_LEN: usize = 27;
const FALLBACK_PREFIX: &str = "env";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPath {
    #[error("path has no usable basename: {0:?}")]
    EmptyBasename(PathBuf),
}

/// Derive a valid guest-user identifier from a project path.
///
/// See the module-level docs for the algorithm. `project_path` does not
/// need to exist on disk; this function never touches the filesystem
/// beyond resolving a relative path against the current directory.
pub fn generate(project_path: &Path) -> Result<String, InvalidPath> {
    let absolute = resolve_absolute(project_path);

    let basename = absolute
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    if basename.is_empty() || basename == "." || basename == "/" {
        return Err(InvalidPath::EmptyBasename(absolute));
    }

    let mut prefix = sanitize(basename);
    if prefix.is_empty() {
        prefix = FALLBACK_PREFIX.to_string();
    }
    if !prefix.starts_with(|c: char| c.is_ascii_lowercase()) {
        prefix = format!("env-{prefix}");
    }
    if prefix.len() > MAX_PREFIX_LEN {
        prefix.truncate(MAX_PREFIX_LEN);
        while prefix.ends_with('-') {
            prefix.pop();
        }
    }

    let digest = digest4(absolute.to_string_lossy().as_ref());
    Ok(format!("{prefix}-{digest}"))
}

/// Resolve `path` to an absolute form without touching the filesystem
/// (no symlink resolution, no existence check) beyond reading the
/// current directory when `path` is relative.
fn resolve_absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Lowercase, map non-`[a-z0-9_-]` to `-`, fold `_` into `-`, collapse
/// runs of `-`, trim leading/trailing `-`.
fn sanitize(basename: &str) -> String {
    let mut out = String::with_capacity(basename.len());
    let mut last_was_dash = false;

    for ch in basename.chars() {
        let lower = ch.to_ascii_lowercase();
        let mapped = if lower.is_ascii_digit() || (lower.is_ascii_lowercase() && lower != '_') {
            lower
        } else {
            '-'
        };

        if mapped == '-' {
            if last_was_dash {
                continue;
            }
            last_was_dash = true;
        } else {
            last_was_dash = false;
        }
        out.push(mapped);
    }

    out.trim_matches('-').to_string()
}

/// First 2 bytes of SHA-1 over the full absolute path, as 4 lowercase hex
/// characters.
fn digest4(absolute_path: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(absolute_path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..2])
}

/// `1..32` chars, first char in `[a-z_]`, all chars in `[a-z0-9_-]`.
/// Any valid Linux login name satisfies this, not just names Naming
/// produces.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 32 {
        return false;
    }
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_lowercase() || first == '_') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// `is_valid_name` plus the `<prefix>-<hex4>` shape Naming actually
/// produces: `^[a-z][a-z0-9-]*-[0-9a-f]{4}$`.
pub fn is_environment_name(name: &str) -> bool {
    if !is_valid_name(name) {
        return false;
    }
    if name.contains('_') {
        return false;
    }
    let Some(first) = name.chars().next() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }
    let Some(dash_idx) = name.rfind('-') else {
        return false;
    };
    let suffix = &name[dash_idx + 1..];
    if suffix.len() != 4 || !suffix.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
    {
        return false;
    }
    // everything before the final dash must be non-empty and itself
    // [a-z0-9-], which is already guaranteed by is_valid_name.
    dash_idx > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_deterministic() {
        let p = Path::new("/Users/alice/my-project");
        assert_eq!(generate(p).unwrap(), generate(p).unwrap());
    }

    #[test]
    fn generate_basic_prefix_and_suffix() {
        let name = generate(Path::new("/Users/alice/my-project")).unwrap();
        assert!(name.starts_with("my-project-"));
        assert!(is_environment_name(&name));
    }

    #[test]
    fn generate_sanitizes_spaces_and_case() {
        let name = generate(Path::new("/Users/alice/My Cool App")).unwrap();
        assert!(name.starts_with("my-cool-app-"));
    }

    #[test]
    fn generate_prefixes_digit_leading_names() {
        let name = generate(Path::new("/Users/alice/123-project")).unwrap();
        assert!(name.starts_with("env-123-project-"));
    }

    #[test]
    fn generate_strips_non_ascii() {
        let name = generate(Path::new("/Users/alice/project-α-β")).unwrap();
        assert!(name.starts_with("project"));
        assert!(name.is_ascii());
    }

    #[test]
    fn generate_truncates_long_basenames() {
        let long = "a".repeat(100);
        let path = PathBuf::from(format!("/Users/alice/{long}"));
        let name = generate(&path).unwrap();
        let dash_idx = name.rfind('-').unwrap();
        assert_eq!(&name[..dash_idx], "a".repeat(27));
    }

    #[test]
    fn generate_rejects_root() {
        assert!(generate(Path::new("/")).is_err());
    }

    #[test]
    fn generate_differs_by_parent_same_basename() {
        let a = generate(Path::new("/Users/alice/project")).unwrap();
        let b = generate(Path::new("/Users/bob/project")).unwrap();
        let (prefix_a, suffix_a) = a.rsplit_once('-').unwrap();
        let (prefix_b, suffix_b) = b.rsplit_once('-').unwrap();
        assert_eq!(prefix_a, prefix_b);
        assert_ne!(suffix_a, suffix_b);
    }

    #[test]
    fn generate_is_always_valid_and_bounded() {
        for p in [
            "/Users/alice/my-project",
            "/Users/alice/My Cool App",
            "/Users/alice/123-project",
            "/Users/alice/_weird_.dir",
            "/a",
        ] {
            let name = generate(Path::new(p)).unwrap();
            assert!(name.len() <= 32, "{name} too long");
            assert!(is_valid_name(&name), "{name} not a valid login name");
        }
    }

    #[test]
    fn is_valid_name_rules() {
        assert!(is_valid_name("my-project-ab12"));
        assert!(is_valid_name("_leading_underscore"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(&"a".repeat(33)));
        assert!(!is_valid_name("Upper"));
        assert!(!is_valid_name("1leading"));
    }

    #[test]
    fn is_environment_name_rules() {
        assert!(is_environment_name("my-project-ab12"));
        assert!(is_environment_name("env-123-project-ab12"));
        assert!(!is_environment_name("my_project-ab12"));
        assert!(!is_environment_name("my-project-zz12"));
        assert!(!is_environment_name("my-project-ab1"));
        assert!(!is_environment_name("Myproject-ab12"));
    }
}
