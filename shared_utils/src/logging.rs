//! Logging Module
//!
//! tracing-based logging shared by the library and the binary:
//! - coloured human output on stderr
//! - a daily-rotated plain-text file in the system temp directory (or `--log-dir`)
//! - structured records for every external tool invocation
//!
//! ```no_run
//! use shared_utils::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::new().with_level(tracing::Level::DEBUG);
//! init_logging("media_resize", config).expect("subscriber");
//! tracing::info!(dirs = 3, "scan finished");
//! ```

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose events pass the default filter.
const LOG_TARGETS: &[&str] = &["media_resize", "shared_utils"];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for rotated log files (system temp dir by default)
    pub log_dir: PathBuf,
    /// Number of rotated files kept, default 5
    pub max_files: usize,
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            max_files: 5,
            level: Level::INFO,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// Log files are named `{program_name}.YYYY-MM-DD.log`; the appender prunes
/// anything beyond `config.max_files`.
///
/// # Errors
///
/// Fails when the log directory cannot be created, the appender cannot open
/// its file, or a global subscriber is already installed.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(program_name)
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&config.log_dir)
        .with_context(|| format!("Failed to open log file in {:?}", config.log_dir))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::debug!(program = program_name, dir = ?config.log_dir, keep = config.max_files, "logging ready");

    Ok(())
}

/// Record one external tool run (ffmpeg, ffprobe).
///
/// Success logs the command line at debug and the tool's output at trace;
/// failure logs both at error.
pub fn log_external_tool<S: AsRef<OsStr>>(
    tool_name: &str,
    args: &[S],
    output: &str,
    exit_code: Option<i32>,
    duration: Duration,
) {
    let mut command = tool_name.to_string();
    for arg in args {
        command.push(' ');
        command.push_str(&arg.as_ref().to_string_lossy());
    }
    match exit_code {
        Some(0) => {
            tracing::debug!(
                tool = tool_name,
                command = %command,
                duration_secs = duration.as_secs_f64(),
                exit_code = 0,
                "tool finished"
            );
            tracing::trace!(tool = tool_name, output = %output, "tool output");
        }
        Some(code) => {
            tracing::error!(
                tool = tool_name,
                command = %command,
                duration_secs = duration.as_secs_f64(),
                exit_code = code,
                output = %output,
                "tool exited with an error"
            );
        }
        None => {
            tracing::error!(
                tool = tool_name,
                command = %command,
                duration_secs = duration.as_secs_f64(),
                output = %output,
                "tool killed by a signal"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.max_files, 5);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.log_dir, std::env::temp_dir());
    }

    #[test]
    fn test_log_config_builder() {
        let temp_dir = TempDir::new().unwrap();
        let config = LogConfig::new()
            .with_log_dir(temp_dir.path())
            .with_level(Level::DEBUG);

        assert_eq!(config.log_dir, temp_dir.path());
        assert_eq!(config.max_files, 5);
        assert_eq!(config.level, Level::DEBUG);
    }

    #[test]
    fn test_default_directive_covers_both_crates() {
        let config = LogConfig::new().with_level(Level::WARN);
        assert_eq!(
            config.default_directive(),
            "media_resize=warn,shared_utils=warn"
        );
    }

    #[test]
    fn test_log_external_tool_does_not_panic_without_subscriber() {
        let args = vec!["-i".to_string(), "in.mp4".to_string()];
        log_external_tool("ffmpeg", &args, "", Some(0), Duration::from_millis(5));
        log_external_tool("ffmpeg", &args, "boom", Some(1), Duration::from_millis(5));
        log_external_tool("ffmpeg", &args, "killed", None, Duration::from_millis(5));
    }
}
