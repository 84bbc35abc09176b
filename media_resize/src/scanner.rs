//! Directory discovery
//!
//! Lists every non-hidden directory under the input root, deepest first.
//! The root itself is only returned when it has no subdirectories.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use shared_utils::common_utils::is_hidden_file;
use shared_utils::{AppError, Result};

pub fn scan_directories(root: &Path) -> Result<Vec<String>> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        // hidden directories are pruned with everything below them
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_hidden_file(e.path())));

    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| AppError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }

    // stable: siblings keep walk order
    dirs.sort_by_key(|d| Reverse(d.components().count()));
    if dirs.is_empty() {
        dirs.push(root.to_path_buf());
    }

    Ok(dirs
        .into_iter()
        .map(|d| d.to_string_lossy().into_owned())
        .collect())
}
