//! Common path helpers used across the pipeline.

use std::path::Path;

use crate::app_error::{AppError, Result};

/// Prefix of AppleDouble resource-fork files (`._IMG_0001.JPG`).
pub const OS_METADATA_PREFIX: &str = "._";

/// Lowercase extension without the dot, empty when there is none.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::get_extension_lowercase;
///
/// assert_eq!(get_extension_lowercase(Path::new("test.JPG")), "jpg");
/// assert_eq!(get_extension_lowercase(Path::new("clip.mp4")), "mp4");
/// assert_eq!(get_extension_lowercase(Path::new("noext")), "");
/// ```
pub fn get_extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Name starts with `.`.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::is_hidden_file;
///
/// assert!(is_hidden_file(Path::new("/photos/.thumbnails")));
/// assert!(!is_hidden_file(Path::new("/photos/2023")));
/// ```
pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// AppleDouble companion file left by macOS on foreign filesystems.
pub fn is_os_metadata_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(OS_METADATA_PREFIX))
        .unwrap_or(false)
}

/// `create_dir_all` with the path in the error.
pub fn ensure_dir_exists(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| AppError::io(dir, "create directory", e))
}

/// `path` relative to `base` as a `/`-joined string; "" when they are equal.
///
/// Falls back to the full path when `path` is not under `base`.
pub fn relative_path_string(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_os_metadata_file() {
        assert!(is_os_metadata_file(Path::new("/a/._IMG_0001.JPG")));
        assert!(!is_os_metadata_file(Path::new("/a/.hidden")));
        assert!(!is_os_metadata_file(Path::new("/a/IMG_0001.JPG")));
    }

    #[test]
    fn test_relative_path_string() {
        let base = Path::new("/in");
        assert_eq!(relative_path_string(Path::new("/in/a/b/c.jpg"), base), "a/b/c.jpg");
        assert_eq!(relative_path_string(Path::new("/in"), base), "");
        assert_eq!(relative_path_string(Path::new("/other/x"), base), "/other/x");
    }

    #[test]
    fn test_ensure_dir_exists_nested() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a").join("b").join("c");
        ensure_dir_exists(&dir).unwrap();
        assert!(dir.is_dir());
        ensure_dir_exists(&dir).unwrap();
    }
}
