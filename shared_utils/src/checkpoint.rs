//! Checkpoint & Resume Module
//!
//! Directory-granular progress for a batch run:
//! - `ProgressState`: the persisted document `{directories: [{path, completed, timestamp?}], last_update}`
//! - `ProgressTracker`: load, seed-or-resume, mark completed, persist
//!
//! The file lives under the output root and is named per extension filter
//! (see [`progress_file_name`]) so filtered runs never share progress.
//!
//! # Usage
//! ```no_run
//! use shared_utils::checkpoint::{progress_file_name, ProgressTracker};
//! use std::path::Path;
//!
//! fn main() -> shared_utils::Result<()> {
//!     let path = Path::new("/tmp/out").join(progress_file_name(None));
//!     let mut tracker = ProgressTracker::open(path, true)?;
//!     tracker.resume_or_seed(|| Ok(vec!["/tmp/in/a".to_string()]))?;
//!     for dir in tracker.uncompleted() {
//!         // ... process dir ...
//!         tracker.complete(&dir)?;
//!     }
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::app_error::{AppError, Result};

// ============================================================================
// Constants
// ============================================================================

const PROGRESS_FILE_STEM: &str = "progress";

/// `progress.json`, or `progress_<filter>.json` with commas turned into
/// underscores and spaces dropped.
pub fn progress_file_name(extension_filter: Option<&str>) -> String {
    let suffix = extension_filter
        .map(|filter| filter.replace(',', "_").replace(' ', ""))
        .filter(|suffix| !suffix.is_empty());
    match suffix {
        Some(suffix) => format!("{}_{}.json", PROGRESS_FILE_STEM, suffix),
        None => format!("{}.json", PROGRESS_FILE_STEM),
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

// ============================================================================
// Persisted document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProgress {
    pub path: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(default)]
    pub directories: Vec<DirectoryProgress>,
    #[serde(default)]
    pub last_update: Option<DateTime<FixedOffset>>,
}

impl ProgressState {
    /// Fresh state, every directory pending.
    pub fn seeded<I>(directories: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            directories: directories
                .into_iter()
                .map(|path| DirectoryProgress {
                    path,
                    completed: false,
                    timestamp: None,
                })
                .collect(),
            last_update: None,
        }
    }

    /// Read the document at `path`; a missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(AppError::io(path, "read progress file", e)),
        };
        serde_json::from_str(&text).map_err(|source| AppError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Stamp `last_update` and replace the file atomically.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_update = Some(now());
        let json = serde_json::to_vec_pretty(self).map_err(|source| AppError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| AppError::io(dir, "create progress directory", e))?;

        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|e| AppError::io(dir, "create temp file", e))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AppError::io(tmp.path(), "write progress file", e))?;
        tmp.persist(path)
            .map_err(|e| AppError::io(path, "replace progress file", e.error))?;
        Ok(())
    }

    /// Mark `dir` done; `false` when no entry has that path.
    pub fn mark_completed(&mut self, dir: &str) -> bool {
        match self.directories.iter_mut().find(|d| d.path == dir) {
            Some(entry) => {
                entry.completed = true;
                entry.timestamp = Some(now());
                true
            }
            None => false,
        }
    }

    /// Pending directories in stored order.
    pub fn uncompleted(&self) -> Vec<String> {
        self.directories
            .iter()
            .filter(|d| !d.completed)
            .map(|d| d.path.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.directories.iter().filter(|d| d.completed).count()
    }
}

// ============================================================================
// Tracker
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// Nothing was stored; the directory list came from a fresh scan.
    Fresh { directories: usize },
    /// A stored list was reused verbatim.
    Resumed { completed: usize, remaining: usize },
}

/// Single owner of the progress document for one run.
///
/// With `persist == false` (dry-run) every mutation stays in memory.
#[derive(Debug)]
pub struct ProgressTracker {
    state: ProgressState,
    path: PathBuf,
    persist: bool,
}

impl ProgressTracker {
    pub fn open(path: impl Into<PathBuf>, persist: bool) -> Result<Self> {
        let path = path.into();
        let state = ProgressState::load(&path)?;
        Ok(Self {
            state,
            path,
            persist,
        })
    }

    /// Reuse the stored list if there is one, otherwise seed it from `scan`
    /// and persist immediately.
    pub fn resume_or_seed<F>(&mut self, scan: F) -> Result<ResumeMode>
    where
        F: FnOnce() -> Result<Vec<String>>,
    {
        if !self.state.is_empty() {
            let completed = self.state.completed_count();
            let remaining = self.state.directories.len() - completed;
            info!(
                progress_file = %self.path.display(),
                completed,
                remaining,
                "Resuming from saved progress"
            );
            return Ok(ResumeMode::Resumed {
                completed,
                remaining,
            });
        }

        let directories = scan()?;
        let count = directories.len();
        self.state = ProgressState::seeded(directories);
        if self.persist {
            self.state.save(&self.path)?;
        }
        info!(directories = count, "Scanned input tree");
        Ok(ResumeMode::Fresh { directories: count })
    }

    /// Mark `dir` completed and persist.
    pub fn complete(&mut self, dir: &str) -> Result<bool> {
        let found = self.state.mark_completed(dir);
        if self.persist {
            self.state.save(&self.path)?;
        }
        Ok(found)
    }

    pub fn uncompleted(&self) -> Vec<String> {
        self.state.uncompleted()
    }
}
