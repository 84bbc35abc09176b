//! Report Module
//!
//! Statistics handoff: every completed directory's stats go to a list of
//! [`StatsSink`]s, and the run ends with a summary box on stdout.

use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::app_error::{AppError, Result};
use crate::progress::{format_bytes, format_duration};
use crate::stats::{DirectoryStats, GlobalStats};

pub const REPORT_FILE_NAME: &str = "processing_report.json";

/// Receives each directory's stats as soon as it completes.
pub trait StatsSink {
    fn directory_finished(&mut self, stats: &DirectoryStats) -> Result<()>;
}

/// One log line per directory.
#[derive(Debug, Default)]
pub struct ConsoleSummary;

impl StatsSink for ConsoleSummary {
    fn directory_finished(&mut self, stats: &DirectoryStats) -> Result<()> {
        let c = &stats.counters;
        let name = if stats.directory.is_empty() {
            "."
        } else {
            stats.directory.as_str()
        };
        info!(
            directory = %name,
            files = c.total_files,
            processed = c.processed_images,
            copied = c.copied_files,
            skipped = c.skipped_images,
            "📁 Directory done: {} → {} ({:.1}% saved)",
            format_bytes(c.total_input_bytes),
            format_bytes(c.total_output_bytes),
            c.space_saved_percent()
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct DirectoryReport<'a> {
    generated_at: String,
    space_saved_percent: f64,
    #[serde(flatten)]
    stats: &'a DirectoryStats,
}

/// Writes `processing_report.json` into each directory's mirrored output dir.
#[derive(Debug)]
pub struct JsonReportWriter {
    output_root: PathBuf,
}

impl JsonReportWriter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn report_path(&self, directory: &str) -> PathBuf {
        self.output_root.join(directory).join(REPORT_FILE_NAME)
    }
}

impl StatsSink for JsonReportWriter {
    fn directory_finished(&mut self, stats: &DirectoryStats) -> Result<()> {
        let path = self.report_path(&stats.directory);
        let report = DirectoryReport {
            generated_at: chrono::Local::now().to_rfc3339(),
            space_saved_percent: stats.counters.space_saved_percent(),
            stats,
        };
        let json = serde_json::to_vec_pretty(&report).map_err(|source| {
            AppError::Json {
                path: path.clone(),
                source,
            }
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AppError::io(parent, "create report directory", e))?;
        }
        fs::write(&path, json).map_err(|e| AppError::io(&path, "write report", e))?;
        Ok(())
    }
}

/// Figures for the closing summary that the stats alone do not hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    pub directories_completed: usize,
    pub directories_failed: usize,
    pub duration: Duration,
    pub dry_run: bool,
}

pub fn print_summary_report(stats: &GlobalStats, totals: &RunTotals) {
    let c = &stats.counters;
    let title = if totals.dry_run {
        "Dry Run Summary"
    } else {
        "Summary Report"
    };

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  📊 {:<57}║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  📂 Directories done:   {:>10}                           ║", totals.directories_completed);
    println!("║  ❌ Directories failed: {:>10}                           ║", totals.directories_failed);
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  📁 Files seen:         {:>10}                           ║", c.total_files);
    println!("║  ✅ Processed:          {:>10}                           ║", c.processed_images);
    println!("║  📋 Copied:             {:>10}                           ║", c.copied_files);
    println!("║  ⏭️  Skipped:            {:>10}                           ║", c.skipped_images);
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  💾 Input Size:         {:>10}                           ║", format_bytes(c.total_input_bytes));
    if !totals.dry_run {
        println!("║  💾 Output Size:        {:>10}                           ║", format_bytes(c.total_output_bytes));
        println!("║  📉 Space Saved:        {:>9.1}%                           ║", c.space_saved_percent());
    }
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  ⏱️  Total Time:         {:>10}                           ║", format_duration(totals.duration));
    println!("╚══════════════════════════════════════════════════════════════╝");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{FileRecord, RecordKind};
    use tempfile::TempDir;

    fn sample(directory: &str) -> DirectoryStats {
        let mut stats = DirectoryStats::new(directory);
        stats.note_file();
        stats.record(FileRecord::passthrough(
            format!("{}/a.txt", directory),
            RecordKind::Copied,
            12,
            None,
        ));
        stats
    }

    #[test]
    fn test_json_report_written_to_mirrored_dir() {
        let temp = TempDir::new().unwrap();
        let mut writer = JsonReportWriter::new(temp.path());
        writer.directory_finished(&sample("2023/trip")).unwrap();

        let path = temp.path().join("2023/trip").join(REPORT_FILE_NAME);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["directory"], "2023/trip");
        assert_eq!(value["total_files"], 1);
        assert_eq!(value["copied_files"], 1);
        assert_eq!(value["files"][0]["kind"], "copied");
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn test_json_report_for_root_directory() {
        let temp = TempDir::new().unwrap();
        let mut writer = JsonReportWriter::new(temp.path());
        writer.directory_finished(&sample("")).unwrap();
        assert!(temp.path().join(REPORT_FILE_NAME).exists());
    }

    #[test]
    fn test_console_summary_and_box_do_not_fail() {
        let mut sink = ConsoleSummary;
        sink.directory_finished(&sample("x")).unwrap();

        let mut global = GlobalStats::default();
        global.merge_directory(sample("x"));
        print_summary_report(
            &global,
            &RunTotals {
                directories_completed: 1,
                directories_failed: 0,
                duration: Duration::from_secs(3),
                dry_run: false,
            },
        );
    }
}
