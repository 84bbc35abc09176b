//! Run orchestration
//!
//! Directories are handed out deepest first. With more than one worker they
//! go to a fixed-size rayon pool (`spawn_fifo`, one directory per task) and
//! each result comes back over a channel; this thread alone owns the progress
//! tracker, the statistics merge and the sinks, so completion order does not
//! matter.

use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use shared_utils::progress::create_progress_bar;
use shared_utils::{
    AppError, DirectoryStats, GlobalStats, ProgressTracker, Result, ResumeMode, RunTotals,
    StatsAggregator, StatsSink,
};

use crate::config::RunConfig;
use crate::context::RunContext;
use crate::dispatch::process_directory;
use crate::scanner::scan_directories;

#[derive(Debug)]
pub struct RunReport {
    pub mode: ResumeMode,
    pub completed: Vec<String>,
    /// Directory and the error that stopped it; retried next run.
    pub failed: Vec<(String, String)>,
    pub stats: GlobalStats,
    pub duration: Duration,
    pub dry_run: bool,
}

impl RunReport {
    pub fn totals(&self) -> RunTotals {
        RunTotals {
            directories_completed: self.completed.len(),
            directories_failed: self.failed.len(),
            duration: self.duration,
            dry_run: self.dry_run,
        }
    }
}

struct DirectoryOutcome {
    directory: String,
    result: Result<DirectoryStats>,
}

/// Receives outcomes in completion order.
struct Collector {
    tracker: ProgressTracker,
    sinks: Vec<Box<dyn StatsSink>>,
    aggregator: StatsAggregator,
    progress: ProgressBar,
    completed: Vec<String>,
    failed: Vec<(String, String)>,
}

impl Collector {
    fn accept(&mut self, outcome: DirectoryOutcome) {
        let DirectoryOutcome { directory, result } = outcome;
        match result {
            Ok(stats) => {
                if let Err(e) = self.tracker.complete(&directory) {
                    warn!(directory = %directory, error = %e, "⚠️ Could not save progress");
                }
                for sink in &mut self.sinks {
                    if let Err(e) = sink.directory_finished(&stats) {
                        warn!(directory = %directory, error = %e, "⚠️ Report sink failed");
                    }
                }
                self.aggregator.merge_directory(stats);
                self.completed.push(directory);
            }
            Err(e) => {
                error!(directory = %directory, error = %e, "❌ Directory failed, it will be retried next run");
                self.failed.push((directory, e.to_string()));
            }
        }
        self.progress.inc(1);
    }

    /// Dispatched directories that never reported back (their worker
    /// panicked) are failed and stay pending for the next run.
    fn reconcile(&mut self, dispatched: &[String]) {
        let reported: HashSet<&str> = self
            .completed
            .iter()
            .chain(self.failed.iter().map(|(dir, _)| dir))
            .map(String::as_str)
            .collect();
        let lost: Vec<String> = dispatched
            .iter()
            .filter(|dir| !reported.contains(dir.as_str()))
            .cloned()
            .collect();
        for directory in lost {
            error!(directory = %directory, "❌ Worker panicked, directory will be retried next run");
            self.failed.push((directory, "worker panicked".to_string()));
            self.progress.inc(1);
        }
    }
}

pub fn run(config: RunConfig, sinks: Vec<Box<dyn StatsSink>>) -> Result<RunReport> {
    let started = Instant::now();
    let dry_run = config.dry_run;

    let mut tracker = ProgressTracker::open(config.progress_file(), !dry_run)?;
    let mode = tracker.resume_or_seed(|| scan_directories(&config.input_dir))?;
    let pending = tracker.uncompleted();
    info!(
        "📂 {} directories to process ({} worker{})",
        pending.len(),
        config.workers.max(1),
        if config.workers > 1 { "s" } else { "" }
    );

    let ctx = Arc::new(RunContext::new(config));
    let mut collector = Collector {
        tracker,
        sinks,
        aggregator: StatsAggregator::new(),
        progress: create_progress_bar(pending.len() as u64, "📂 Dirs", dry_run),
        completed: Vec::new(),
        failed: Vec::new(),
    };

    if pending.is_empty() {
        info!("✅ Nothing left to do, every directory is already completed");
    } else if ctx.config.workers <= 1 || pending.len() == 1 {
        run_sequential(&ctx, pending, &mut collector);
    } else {
        run_parallel(&ctx, pending, &mut collector)?;
    }
    collector.progress.finish_and_clear();

    Ok(RunReport {
        mode,
        completed: collector.completed,
        failed: collector.failed,
        stats: collector.aggregator.into_inner(),
        duration: started.elapsed(),
        dry_run,
    })
}

fn run_sequential(ctx: &RunContext, pending: Vec<String>, collector: &mut Collector) {
    for directory in pending {
        let result = process_directory(ctx, Path::new(&directory), 0);
        collector.accept(DirectoryOutcome { directory, result });
    }
}

fn run_parallel(
    ctx: &Arc<RunContext>,
    pending: Vec<String>,
    collector: &mut Collector,
) -> Result<()> {
    let workers = ctx.config.workers.min(pending.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("dir-worker-{}", i))
        // a panicking directory is logged and left unmarked
        .panic_handler(|_| error!("❌ A directory worker panicked; that directory stays pending"))
        .build()
        .map_err(|e| AppError::InvalidConfig(format!("cannot start {} workers: {}", workers, e)))?;

    let (tx, rx) = mpsc::channel::<DirectoryOutcome>();
    for directory in pending.iter().cloned() {
        let tx = tx.clone();
        let ctx = Arc::clone(ctx);
        pool.spawn_fifo(move || {
            let worker = rayon::current_thread_index().unwrap_or(0);
            let result = process_directory(&ctx, Path::new(&directory), worker);
            // the receiver outlives every task
            let _ = tx.send(DirectoryOutcome { directory, result });
        });
    }
    drop(tx);

    for outcome in rx {
        collector.accept(outcome);
    }
    collector.reconcile(&pending);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOptions;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl StatsSink for Recorder {
        fn directory_finished(&mut self, stats: &DirectoryStats) -> Result<()> {
            self.0.lock().unwrap().push(stats.directory.clone());
            Ok(())
        }
    }

    fn tree(temp: &TempDir) -> std::path::PathBuf {
        let input = temp.path().join("in");
        for dir in ["a", "a/b", "c", "d/e/f"] {
            fs::create_dir_all(input.join(dir)).unwrap();
            fs::write(input.join(dir).join("note.txt"), dir.as_bytes()).unwrap();
        }
        input
    }

    fn config(temp: &TempDir, workers: usize) -> RunConfig {
        let mut opts = ConfigOptions::new(tree(temp), temp.path().join("out"));
        opts.ratio = Some(0.5);
        opts.workers = workers;
        RunConfig::from_options(opts).unwrap()
    }

    #[test]
    fn test_sequential_run_marks_everything() {
        let temp = TempDir::new().unwrap();
        let cfg = config(&temp, 1);
        let progress_file = cfg.progress_file();
        let recorder = Recorder::default();

        let report = run(cfg, vec![Box::new(recorder.clone())]).unwrap();
        assert_eq!(report.mode, ResumeMode::Fresh { directories: 6 });
        assert_eq!(report.completed.len(), 6);
        assert!(report.failed.is_empty());
        assert_eq!(report.stats.counters.copied_files, 4);
        assert_eq!(recorder.0.lock().unwrap().len(), 6);
        // deepest first
        assert!(report.completed[0].ends_with("f"));

        let saved = shared_utils::ProgressState::load(&progress_file).unwrap();
        assert_eq!(saved.completed_count(), 6);
    }

    #[test]
    fn test_parallel_totals_match_sequential() {
        let temp = TempDir::new().unwrap();
        let report = run(config(&temp, 4), Vec::new()).unwrap();
        assert_eq!(report.completed.len(), 6);
        assert_eq!(report.stats.counters.total_files, 4);
        assert_eq!(report.stats.counters.copied_files, 4);
        assert_eq!(report.stats.counters.total_input_bytes, (1 + 3 + 1 + 5) as u64);
        assert_eq!(report.totals().directories_completed, 6);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let cfg = config(&temp, 2);
        run(cfg.clone(), Vec::new()).unwrap();

        let report = run(cfg, Vec::new()).unwrap();
        assert_eq!(
            report.mode,
            ResumeMode::Resumed {
                completed: 6,
                remaining: 0
            }
        );
        assert!(report.completed.is_empty());
        assert_eq!(report.stats.counters.total_files, 0);
    }

    #[test]
    fn test_unreported_directory_counts_as_failed() {
        let temp = TempDir::new().unwrap();
        let dirs = vec!["/in/a".to_string(), "/in/b".to_string(), "/in/c".to_string()];
        let mut tracker = ProgressTracker::open(temp.path().join("progress.json"), false).unwrap();
        tracker.resume_or_seed(|| Ok(dirs.clone())).unwrap();
        let mut collector = Collector {
            tracker,
            sinks: Vec::new(),
            aggregator: StatsAggregator::new(),
            progress: create_progress_bar(3, "dirs", true),
            completed: Vec::new(),
            failed: Vec::new(),
        };

        collector.accept(DirectoryOutcome {
            directory: "/in/a".into(),
            result: Ok(DirectoryStats::new("a")),
        });
        collector.accept(DirectoryOutcome {
            directory: "/in/b".into(),
            result: Err(AppError::InvalidConfig("boom".into())),
        });
        collector.reconcile(&dirs);

        assert_eq!(collector.completed, vec!["/in/a".to_string()]);
        assert_eq!(collector.failed.len(), 2);
        assert_eq!(collector.failed[1], ("/in/c".to_string(), "worker panicked".to_string()));
        assert_eq!(collector.progress.position(), 3);
        assert_eq!(collector.tracker.uncompleted(), vec!["/in/b".to_string(), "/in/c".to_string()]);
    }

    #[test]
    fn test_dry_run_leaves_no_progress_file() {
        let temp = TempDir::new().unwrap();
        let mut cfg = config(&temp, 1);
        cfg.dry_run = true;
        let progress_file = cfg.progress_file();

        let report = run(cfg, Vec::new()).unwrap();
        assert_eq!(report.completed.len(), 6);
        assert_eq!(report.stats.counters.total_files, 4);
        assert!(!progress_file.exists());
        assert!(!temp.path().join("out").exists());
    }
}
