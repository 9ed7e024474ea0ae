//! File discovery and naming.
//!
//! Enumerates candidate files for import, derives POSIX-style object keys
//! from host paths, and enforces the repository/image naming policy.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tessera_core::error::{Result, TesseraError};

/// Names must start with a letter, continue with letters, digits, `-` or
/// `_`, and be 2-128 characters overall.
const NAME_PATTERN: &str = "^[A-Za-z][A-Za-z0-9_-]{1,127}$";

/// Recursively list files under `root` whose extension is in `extensions`.
///
/// Extensions are compared with their leading dot and the source file's own
/// casing (`.tif` does not match `.TIF`). Order is filesystem-traversal
/// order; callers must not rely on it for correctness.
pub fn list_by_extension(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    walk(root, extensions, &mut files);
    tracing::debug!(count = files.len(), root = %root.display(), "Discovered files");
    files
}

fn walk(dir: &Path, extensions: &[&str], files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "Cannot read directory: {}", e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, extensions, files);
        } else if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
            if extensions.iter().any(|wanted| wanted.trim_start_matches('.') == ext) {
                files.push(path);
            }
        }
    }
}

/// List direct children of `dir` whose filename matches `pattern` from the
/// start. Non-recursive; non-matching files are skipped with a debug log.
pub fn list_by_pattern(dir: &Path, pattern: &Regex) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "Cannot read directory: {}", e);
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let name = match path.file_name().and_then(|s| s.to_str()) {
            Some(name) => name,
            None => continue,
        };
        match pattern.find(name) {
            Some(m) if m.start() == 0 => files.push(path),
            _ => {
                tracing::debug!(file = name, "Skipping file not matching pattern");
            }
        }
    }
    files
}

/// Derive a POSIX-style object key from a host path.
///
/// Backslashes are normalized to `/` and a leading drive letter (`C:`) is
/// stripped, so keys look the same regardless of host OS path syntax.
/// Idempotent under re-normalization.
pub fn derive_key(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let bytes = normalized.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        normalized[2..].to_string()
    } else {
        normalized
    }
}

/// Validate a repository or image name against the naming policy.
///
/// `kind` names the entity being validated ("repository", "image") for the
/// error message. This is a hard stop before any network or upload activity.
pub fn validate_name(name: &str, kind: &str) -> Result<()> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(NAME_PATTERN).expect("valid regex"));

    if re.is_match(name) {
        Ok(())
    } else {
        Err(TesseraError::InvalidName {
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(path: &Path) {
        File::create(path).unwrap();
    }

    #[test]
    fn test_list_by_extension_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        touch(&dir.path().join("a.tif"));
        touch(&dir.path().join("b.rcpnl"));
        touch(&dir.path().join("ignored.txt"));
        touch(&sub.join("c.tif"));

        let mut files = list_by_extension(dir.path(), &[".tif", ".rcpnl"]);
        files.sort();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.tif", "b.rcpnl", "c.tif"]);
    }

    #[test]
    fn test_list_by_extension_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("upper.TIF"));
        touch(&dir.path().join("lower.tif"));

        let files = list_by_extension(dir.path(), &[".tif"]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("lower.tif"));
    }

    #[test]
    fn test_list_by_pattern_non_recursive_and_anchored() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        touch(&dir.path().join("C0-T0-Z0-L0-Y0-X0.png"));
        touch(&dir.path().join("xC0-T0-Z0-L0-Y0-X0.png"));
        touch(&dir.path().join("notes.txt"));
        touch(&sub.join("C1-T0-Z0-L0-Y0-X0.png"));

        let pattern = Regex::new(r"C\d+-T\d+-Z\d+-L\d+-Y\d+-X\d+\.png").unwrap();
        let files = list_by_pattern(dir.path(), &pattern);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("C0-T0-Z0-L0-Y0-X0.png"));
    }

    #[test]
    fn test_derive_key_windows_path() {
        assert_eq!(derive_key(r"C:\a\b\c.tif"), "/a/b/c.tif");
    }

    #[test]
    fn test_derive_key_posix_path() {
        assert_eq!(derive_key("/a/b/c.tif"), "/a/b/c.tif");
    }

    #[test]
    fn test_derive_key_idempotent() {
        let once = derive_key(r"D:\scans\slide1.tif");
        assert_eq!(derive_key(&once), once);
    }

    #[test]
    fn test_validate_name_accepts_policy_names() {
        let max_len = "x".repeat(128);
        for name in ["slides", "My-Repo_2", "a1", max_len.as_str()] {
            assert!(validate_name(name, "repository").is_ok(), "{name}");
        }
    }

    #[test]
    fn test_validate_name_rejects_violations() {
        let too_long = "x".repeat(129);
        for name in [
            "",
            "a",              // too short
            "9lives",         // starts with digit
            "-dash",          // starts with dash
            "has space",      // illegal character
            "dot.name",       // illegal character
            too_long.as_str(),
        ] {
            let err = validate_name(name, "repository").unwrap_err();
            assert!(matches!(err, TesseraError::InvalidName { .. }), "{name}");
        }
    }
}
