//! Batch Statistics Module
//!
//! Per-file records, per-directory and global counters, and the synchronized
//! aggregator workers merge into. All merges are additive, so totals do not
//! depend on completion order.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Processed,
    VideoProcessed,
    Copied,
    Skipped,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Processed => "processed",
            RecordKind::VideoProcessed => "video_processed",
            RecordKind::Copied => "copied",
            RecordKind::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Outcome of one file. Built once at the end of its pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub kind: RecordKind,
    pub input_size: u64,
    pub output_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_dimensions: Option<Dimensions>,
    pub compression_ratio: f64,
}

impl FileRecord {
    /// A transformed file; ratio is `output / input`.
    pub fn converted(
        path: impl Into<String>,
        kind: RecordKind,
        input_size: u64,
        output_size: u64,
        original_dimensions: Option<Dimensions>,
        new_dimensions: Option<Dimensions>,
    ) -> Self {
        let compression_ratio = if input_size == 0 {
            1.0
        } else {
            output_size as f64 / input_size as f64
        };
        Self {
            path: path.into(),
            kind,
            input_size,
            output_size,
            original_dimensions,
            new_dimensions,
            compression_ratio,
        }
    }

    /// A byte-identical copy (copied or skipped); ratio is exactly 1.0.
    pub fn passthrough(
        path: impl Into<String>,
        kind: RecordKind,
        size: u64,
        dimensions: Option<Dimensions>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            input_size: size,
            output_size: size,
            original_dimensions: dimensions,
            new_dimensions: dimensions,
            compression_ratio: 1.0,
        }
    }
}

/// Counters shared by the directory and global scopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Counters {
    pub total_files: usize,
    pub processed_images: usize,
    pub copied_files: usize,
    pub skipped_images: usize,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
}

impl Counters {
    fn count(&mut self, record: &FileRecord) {
        match record.kind {
            RecordKind::Processed | RecordKind::VideoProcessed => self.processed_images += 1,
            RecordKind::Copied => self.copied_files += 1,
            RecordKind::Skipped => self.skipped_images += 1,
        }
        self.total_input_bytes += record.input_size;
        self.total_output_bytes += record.output_size;
    }

    fn add(&mut self, other: &Counters) {
        self.total_files += other.total_files;
        self.processed_images += other.processed_images;
        self.copied_files += other.copied_files;
        self.skipped_images += other.skipped_images;
        self.total_input_bytes += other.total_input_bytes;
        self.total_output_bytes += other.total_output_bytes;
    }

    /// Percentage of input bytes saved, 0 when nothing was read.
    pub fn space_saved_percent(&self) -> f64 {
        if self.total_input_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.total_output_bytes as f64 / self.total_input_bytes as f64) * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectoryStats {
    /// Directory relative to the input root ("" for the root itself).
    pub directory: String,
    #[serde(flatten)]
    pub counters: Counters,
    pub files: Vec<FileRecord>,
}

impl DirectoryStats {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Count a file before it is routed, whatever its outcome.
    pub fn note_file(&mut self) {
        self.counters.total_files += 1;
    }

    /// Dry-run accounting: input bytes only.
    pub fn note_planned(&mut self, input_size: u64) {
        self.counters.total_input_bytes += input_size;
    }

    pub fn record(&mut self, record: FileRecord) {
        self.counters.count(&record);
        self.files.push(record);
    }

    fn absorb(&mut self, other: DirectoryStats) {
        self.counters.add(&other.counters);
        self.files.extend(other.files);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalStats {
    #[serde(flatten)]
    pub counters: Counters,
    pub files: Vec<FileRecord>,
    pub directories: BTreeMap<String, DirectoryStats>,
}

impl GlobalStats {
    fn directory_mut(&mut self, directory: &str) -> &mut DirectoryStats {
        self.directories
            .entry(directory.to_string())
            .or_insert_with(|| DirectoryStats::new(directory))
    }

    /// Fold a finished directory scope into the run totals.
    pub fn merge_directory(&mut self, stats: DirectoryStats) {
        self.counters.add(&stats.counters);
        self.files.extend(stats.files.iter().cloned());
        let directory = stats.directory.clone();
        self.directory_mut(&directory).absorb(stats);
    }

    pub fn note_file(&mut self, directory: &str) {
        self.counters.total_files += 1;
        self.directory_mut(directory).note_file();
    }

    pub fn record(&mut self, directory: &str, record: FileRecord) {
        self.counters.count(&record);
        self.files.push(record.clone());
        self.directory_mut(directory).record(record);
    }
}

/// Thread-safe front of [`GlobalStats`].
///
/// A poisoned lock is recovered: every merge is a plain addition, so a panic
/// mid-merge at worst loses that one update.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<GlobalStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_file(&self, directory: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .note_file(directory);
    }

    pub fn record(&self, directory: &str, record: FileRecord) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(directory, record);
    }

    pub fn merge_directory(&self, stats: DirectoryStats) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge_directory(stats);
    }

    pub fn into_inner(self) -> GlobalStats {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn processed(path: &str, input: u64, output: u64) -> FileRecord {
        FileRecord::converted(
            path,
            RecordKind::Processed,
            input,
            output,
            Some(Dimensions::new(4000, 3000)),
            Some(Dimensions::new(2000, 1500)),
        )
    }

    #[test]
    fn test_compression_ratio() {
        let rec = processed("a.jpg", 1000, 250);
        assert!((rec.compression_ratio - 0.25).abs() < f64::EPSILON);

        let copy = FileRecord::passthrough("b.txt", RecordKind::Copied, 77, None);
        assert_eq!(copy.compression_ratio, 1.0);
        assert_eq!(copy.input_size, copy.output_size);

        let empty = FileRecord::converted("c.jpg", RecordKind::Processed, 0, 10, None, None);
        assert_eq!(empty.compression_ratio, 1.0);
    }

    #[test]
    fn test_skipped_record_keeps_dimensions() {
        let dims = Some(Dimensions::new(800, 600));
        let rec = FileRecord::passthrough("small.jpg", RecordKind::Skipped, 10, dims);
        assert_eq!(rec.original_dimensions, rec.new_dimensions);
    }

    #[test]
    fn test_directory_counters() {
        let mut dir = DirectoryStats::new("a/b");
        for _ in 0..4 {
            dir.note_file();
        }
        dir.record(processed("a/b/1.jpg", 100, 40));
        dir.record(FileRecord::converted(
            "a/b/2.mp4",
            RecordKind::VideoProcessed,
            1000,
            500,
            None,
            None,
        ));
        dir.record(FileRecord::passthrough("a/b/3.txt", RecordKind::Copied, 5, None));
        dir.record(FileRecord::passthrough("a/b/4.jpg", RecordKind::Skipped, 7, None));

        assert_eq!(dir.counters.total_files, 4);
        assert_eq!(dir.counters.processed_images, 2);
        assert_eq!(dir.counters.copied_files, 1);
        assert_eq!(dir.counters.skipped_images, 1);
        assert_eq!(dir.counters.total_input_bytes, 1112);
        assert_eq!(dir.counters.total_output_bytes, 552);
        assert_eq!(dir.files.len(), 4);
    }

    #[test]
    fn test_space_saved_percent() {
        let mut c = Counters::default();
        assert_eq!(c.space_saved_percent(), 0.0);
        c.total_input_bytes = 200;
        c.total_output_bytes = 50;
        assert!((c.space_saved_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_directory_keeps_per_directory_view() {
        let mut global = GlobalStats::default();

        let mut a = DirectoryStats::new("a");
        a.note_file();
        a.record(processed("a/1.jpg", 10, 5));
        let mut b = DirectoryStats::new("b");
        b.note_file();
        b.note_file();
        b.record(FileRecord::passthrough("b/x.txt", RecordKind::Copied, 3, None));

        global.merge_directory(b);
        global.merge_directory(a);

        assert_eq!(global.counters.total_files, 3);
        assert_eq!(global.files.len(), 2);
        assert_eq!(global.directories.len(), 2);
        assert_eq!(global.directories["a"].counters.processed_images, 1);
        assert_eq!(global.directories["b"].counters.total_files, 2);
    }

    #[test]
    fn test_concurrent_record_loses_nothing() {
        let agg = Arc::new(StatsAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let agg = Arc::clone(&agg);
                thread::spawn(move || {
                    let dir = format!("dir{}", t % 3);
                    for i in 0..50 {
                        agg.note_file(&dir);
                        agg.record(&dir, processed(&format!("{}/{}.jpg", dir, i), 10, 4));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = Arc::try_unwrap(agg).expect("all threads joined").into_inner();
        assert_eq!(stats.counters.total_files, 400);
        assert_eq!(stats.counters.processed_images, 400);
        assert_eq!(stats.counters.total_input_bytes, 4000);
        assert_eq!(stats.files.len(), 400);
        let per_dir: usize = stats.directories.values().map(|d| d.files.len()).sum();
        assert_eq!(per_dir, 400);
        assert_eq!(stats.directories["dir0"].files.len(), 150);
        assert_eq!(stats.directories["dir0"].counters.total_files, 150);
    }

    #[test]
    fn test_serialized_kind_names() {
        let rec = FileRecord::passthrough("x", RecordKind::Skipped, 1, None);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["kind"], "skipped");
        assert!(json.get("original_dimensions").is_none());
        assert_eq!(
            serde_json::to_value(RecordKind::VideoProcessed).unwrap(),
            "video_processed"
        );
    }
}
