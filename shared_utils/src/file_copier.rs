//! File Copier Module
//!
//! Verbatim copies for files that are not transformed: unsupported types and
//! anything the threshold policy lets through untouched. The destination gets
//! the source's timestamps so a copied file is indistinguishable from its input.

use std::fs::{self, Metadata};
use std::path::Path;

use crate::app_error::{AppError, Result};
use crate::metadata::apply_file_timestamps;

/// Copy `src` to `dst` byte-for-byte and carry over its timestamps.
///
/// Returns the number of bytes copied. The parent of `dst` must exist.
pub fn copy_preserving_mtime(src: &Path, dst: &Path, src_meta: &Metadata) -> Result<u64> {
    let bytes = fs::copy(src, dst).map_err(|e| AppError::io(src, "copy", e))?;
    apply_file_timestamps(src_meta, dst).map_err(|e| AppError::io(dst, "set file times", e))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    #[test]
    fn test_copy_is_byte_identical_with_mtime() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("notes.txt");
        let dst = temp.path().join("out.txt");
        let content: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        fs::write(&src, &content).unwrap();
        let mtime = FileTime::from_unix_time(1_400_000_000, 0);
        filetime::set_file_mtime(&src, mtime).unwrap();

        let meta = fs::metadata(&src).unwrap();
        let copied = copy_preserving_mtime(&src, &dst, &meta).unwrap();

        assert_eq!(copied, content.len() as u64);
        assert_eq!(fs::read(&dst).unwrap(), content);
        let dst_meta = fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&dst_meta), mtime);
    }

    #[test]
    fn test_copy_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.bin");
        fs::write(&src, b"x").unwrap();
        let meta = fs::metadata(&src).unwrap();
        let err = copy_preserving_mtime(&src, &temp.path().join("no/such/dir/a.bin"), &meta)
            .unwrap_err();
        assert!(matches!(err, AppError::Io { operation: "copy", .. }));
    }
}
