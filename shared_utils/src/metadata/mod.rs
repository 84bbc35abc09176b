//! Metadata Preservation Module
//!
//! Two layers:
//! - `jpeg`: the APP1/Exif segment codec (find, extract, reinsert)
//! - `exif`: the TIFF structure inside that segment (orientation read/clear)
//!
//! File timestamps go through `apply_file_timestamps`, always after the last
//! write to the destination.

use std::fs::Metadata;
use std::io;
use std::path::Path;

pub mod exif;
pub mod jpeg;

pub use exif::{clear_orientation, read_orientation, Orientation};
pub use jpeg::{extract_exif, insert_exif, SegmentError};

/// Copy access and modification times from `src_meta` onto `dst`.
pub fn apply_file_timestamps(src_meta: &Metadata, dst: &Path) -> io::Result<()> {
    let atime = filetime::FileTime::from_last_access_time(src_meta);
    let mtime = filetime::FileTime::from_last_modification_time(src_meta);
    filetime::set_file_times(dst, atime, mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_apply_file_timestamps_copies_mtime() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.bin");
        let dst = temp.path().join("dst.bin");
        fs::write(&src, b"a").unwrap();
        fs::write(&dst, b"b").unwrap();

        let old = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        let meta = fs::metadata(&src).unwrap();
        apply_file_timestamps(&meta, &dst).unwrap();

        let dst_meta = fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&dst_meta), old);
    }

    #[test]
    fn test_apply_file_timestamps_missing_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.bin");
        fs::write(&src, b"a").unwrap();
        let meta = fs::metadata(&src).unwrap();
        assert!(apply_file_timestamps(&meta, &temp.path().join("nope")).is_err());
    }
}
