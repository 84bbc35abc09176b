//! Per-directory processing: list, classify and route every file, strictly
//! one after another.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use shared_utils::common_utils::{ensure_dir_exists, relative_path_string};
use shared_utils::progress::percent;
use shared_utils::{AppError, DirectoryStats, Result};

use crate::classifier::{output_path, Classification, Classifier, FileKind};
use crate::context::RunContext;
use crate::pipeline::{FileJob, Pipelines};

/// Non-directory entries of `dir`, sorted by path.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| AppError::io(dir, "list directory", e))? {
        let path = entry
            .map_err(|e| AppError::io(dir, "list directory", e))?
            .path();
        if !path.is_dir() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Process every direct file of `dir`.
///
/// An `Err` means the directory could not be listed or its output directory
/// could not be created; it must not be marked completed. Individual file
/// failures are logged and leave the file out of the statistics.
pub fn process_directory(ctx: &RunContext, dir: &Path, worker: usize) -> Result<DirectoryStats> {
    let config = &ctx.config;
    let relative_dir = dir.strip_prefix(&config.input_dir).map_err(|_| {
        AppError::InvalidConfig(format!(
            "{} is not under the input directory {}",
            dir.display(),
            config.input_dir.display()
        ))
    })?;
    let out_dir = config.output_dir.join(relative_dir);
    let mut stats = DirectoryStats::new(relative_path_string(dir, &config.input_dir));

    let classifier = Classifier::new(config);
    let candidates: Vec<(PathBuf, FileKind)> = list_files(dir)?
        .into_iter()
        .filter_map(|path| match classifier.classify(&path) {
            Classification::Route(kind) => Some((path, kind)),
            Classification::OsMetadata | Classification::Filtered => None,
        })
        .collect();

    if candidates.is_empty() {
        debug!(directory = %dir.display(), "No files to process");
        return Ok(stats);
    }
    if !config.dry_run {
        ensure_dir_exists(&out_dir)?;
    }

    let pipelines = Pipelines::new(ctx);
    let total = candidates.len();
    for (index, (path, kind)) in candidates.iter().enumerate() {
        stats.note_file();
        let position = index + 1;
        let pct = percent(position, total);
        let relative = relative_path_string(path, &config.input_dir);

        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!(file = %relative, error = %e, "❌ Cannot stat file, skipping");
                continue;
            }
        };

        if config.dry_run {
            info!(
                "[worker-{}] [{}/{}] ({:.1}%) Would {}: {}",
                worker,
                position,
                total,
                pct,
                kind.action(),
                relative
            );
            stats.note_planned(metadata.len());
            continue;
        }

        let Some(file_name) = path.file_name() else {
            continue;
        };
        info!(
            "[worker-{}] [{}/{}] ({:.1}%) {}",
            worker, position, total, pct, relative
        );
        let job = FileJob {
            input: path,
            output: output_path(&out_dir, file_name, *kind),
            relative,
            metadata,
        };
        match pipelines.select(*kind).process(&job) {
            Ok(record) => stats.record(record),
            Err(e) => warn!(file = %job.relative, error = %e, "❌ Failed, continuing with next file"),
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOptions, RunConfig};
    use shared_utils::RecordKind;
    use tempfile::TempDir;

    fn context(temp: &TempDir, dry_run: bool, extensions: Option<&str>) -> RunContext {
        let input = temp.path().join("in");
        fs::create_dir_all(&input).unwrap();
        let mut opts = ConfigOptions::new(&input, temp.path().join("out"));
        opts.ratio = Some(0.5);
        opts.dry_run = dry_run;
        opts.extensions = extensions.map(str::to_string);
        RunContext::new(RunConfig::from_options(opts).unwrap())
    }

    #[test]
    fn test_copies_and_counts_unsupported_files() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, false, None);
        let dir = ctx.config.input_dir.join("docs");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b.txt"), b"bbb").unwrap();
        fs::write(dir.join("a.txt"), b"a").unwrap();
        fs::write(dir.join("._a.txt"), b"resource fork").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();

        let stats = process_directory(&ctx, &dir, 0).unwrap();
        assert_eq!(stats.directory, "docs");
        assert_eq!(stats.counters.total_files, 2);
        assert_eq!(stats.counters.copied_files, 2);
        assert_eq!(stats.counters.total_input_bytes, 4);
        assert_eq!(stats.files[0].path, "docs/a.txt");
        assert_eq!(stats.files[1].kind, RecordKind::Copied);
        assert!(temp.path().join("out/docs/b.txt").exists());
        assert!(!temp.path().join("out/docs/._a.txt").exists());
    }

    #[test]
    fn test_failed_file_is_counted_but_not_recorded() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, false, None);
        let dir = &ctx.config.input_dir;
        fs::write(dir.join("broken.jpg"), b"not a jpeg").unwrap();
        fs::write(dir.join("ok.txt"), b"fine").unwrap();

        let stats = process_directory(&ctx, dir, 0).unwrap();
        assert_eq!(stats.counters.total_files, 2);
        assert_eq!(stats.files.len(), 1);
        assert_eq!(stats.counters.copied_files, 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, true, None);
        let dir = &ctx.config.input_dir;
        fs::write(dir.join("a.txt"), b"12345").unwrap();
        fs::write(dir.join("b.mp4"), b"12").unwrap();

        let stats = process_directory(&ctx, dir, 3).unwrap();
        assert_eq!(stats.counters.total_files, 2);
        assert_eq!(stats.counters.total_input_bytes, 7);
        assert!(stats.files.is_empty());
        assert!(!temp.path().join("out").exists());
    }

    #[test]
    fn test_extension_filter_skips_silently() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, false, Some("png"));
        let dir = &ctx.config.input_dir;
        fs::write(dir.join("a.txt"), b"x").unwrap();

        let stats = process_directory(&ctx, dir, 0).unwrap();
        assert_eq!(stats.counters.total_files, 0);
        assert!(!temp.path().join("out").exists());
    }

    #[test]
    fn test_unlistable_directory_is_an_error() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, false, None);
        let missing = ctx.config.input_dir.join("gone");
        assert!(process_directory(&ctx, &missing, 0).is_err());

        let outside = temp.path().join("elsewhere");
        fs::create_dir_all(&outside).unwrap();
        assert!(matches!(
            process_directory(&ctx, &outside, 0),
            Err(AppError::InvalidConfig(_))
        ));
    }
}
