//! Path utilities.
//!
//! Tilde expansion for user supplied paths and the default locations
//! Skypaper writes to.

use std::path::{Path, PathBuf};

/// Directory name used under the pictures folder.
const OUTPUT_DIR_NAME: &str = "skypaper";

/// Expands a leading `~` to the user's home directory.
///
/// Absolute and relative paths are returned unchanged; blank input yields an
/// empty path.
#[must_use]
pub fn expand(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return PathBuf::new();
    }

    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

/// Expands `~` and resolves relative paths against `base_dir`.
///
/// Tilde paths are never joined onto the base.
#[must_use]
pub fn expand_and_resolve(path: &str, base_dir: &Path) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return PathBuf::new();
    }

    let expanded = expand(path);
    if expanded.is_absolute() { expanded } else { base_dir.join(expanded) }
}

/// Default directory for downloaded wallpapers.
///
/// `<Pictures>/skypaper`, falling back to `~/skypaper` and finally to the
/// system temp directory when no home directory is known.
#[must_use]
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(OUTPUT_DIR_NAME)
}

/// Resolves a path given on the command line against the working directory.
#[must_use]
pub fn resolve_cli_path(path: &str) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_default();
    expand_and_resolve(path, &cwd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_empty() {
        let result = expand("");
        assert_eq!(result, PathBuf::new());
    }

    #[test]
    fn test_expand_absolute_path() {
        let result = expand("/absolute/path/to/file");
        assert_eq!(result, PathBuf::from("/absolute/path/to/file"));
    }

    #[test]
    fn test_expand_relative_path() {
        let result = expand("relative/path");
        assert_eq!(result, PathBuf::from("relative/path"));
    }

    #[test]
    fn test_expand_tilde_path() {
        let result = expand("~/Documents/file.txt");
        assert!(!result.to_string_lossy().starts_with('~'));
        assert!(result.to_string_lossy().ends_with("Documents/file.txt"));
    }

    #[test]
    fn test_expand_and_resolve_absolute() {
        let base = PathBuf::from("/base/dir");
        let result = expand_and_resolve("/absolute/path", &base);
        assert_eq!(result, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_and_resolve_relative() {
        let base = PathBuf::from("/base/dir");
        let result = expand_and_resolve("relative/path", &base);
        assert_eq!(result, PathBuf::from("/base/dir/relative/path"));
    }

    #[test]
    fn test_expand_and_resolve_dot_file() {
        let base = PathBuf::from("/config/dir");
        let result = expand_and_resolve("config.jsonc", &base);
        assert_eq!(result, PathBuf::from("/config/dir/config.jsonc"));
    }

    #[test]
    fn test_expand_and_resolve_tilde() {
        let base = PathBuf::from("/base/dir");
        let result = expand_and_resolve("~/some/path", &base);
        assert!(!result.to_string_lossy().starts_with('~'));
        assert!(result.to_string_lossy().ends_with("some/path"));
        assert!(!result.to_string_lossy().contains("/base/dir"));
    }

    #[test]
    fn test_expand_and_resolve_whitespace_trimmed() {
        let base = PathBuf::from("/base/dir");
        let result = expand_and_resolve("  relative/path  ", &base);
        assert_eq!(result, PathBuf::from("/base/dir/relative/path"));
    }

    #[test]
    fn test_default_output_dir_is_named() {
        let dir = default_output_dir();
        assert!(dir.ends_with(OUTPUT_DIR_NAME));
        assert!(dir.is_absolute());
    }

    #[test]
    fn test_resolve_cli_path_is_absolute() {
        assert!(resolve_cli_path("walls").is_absolute());
        assert_eq!(resolve_cli_path("/srv/walls"), PathBuf::from("/srv/walls"));
    }
}
