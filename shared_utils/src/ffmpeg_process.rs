//! FFmpeg process management
//!
//! ffmpeg writes its whole log to stderr. A separate thread drains the pipe so
//! a chatty encode never blocks on a full 64KB buffer while we wait on the child.
//!
//! ```ignore
//! use shared_utils::ffmpeg_process::run_ffmpeg;
//!
//! let args: Vec<std::ffi::OsString> = vec!["-y".into(), "-i".into(), "in.mov".into(), "out.mp4".into()];
//! run_ffmpeg(&args, std::path::Path::new("in.mov"))?;
//! ```

use std::ffi::OsString;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::app_error::{AppError, Result};
use crate::logging::log_external_tool;

/// Lines of stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 8;

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess
// ═══════════════════════════════════════════════════════════════

pub struct FfmpegProcess {
    child: Child,
    stderr_thread: Option<JoinHandle<String>>,
}

impl FfmpegProcess {
    /// Start `cmd` with stdout discarded and stderr drained in the background.
    pub fn spawn(cmd: &mut Command) -> std::io::Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let stderr = child.stderr.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stderr was not captured")
        })?;

        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(|l| l.ok()) {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        Ok(Self {
            child,
            stderr_thread: Some(stderr_thread),
        })
    }

    /// Block until the child exits; returns its status and full stderr.
    pub fn wait_with_output(mut self) -> std::io::Result<(ExitStatus, String)> {
        let status = self.child.wait()?;
        let stderr = self
            .stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default();
        Ok((status, stderr))
    }
}

/// Last `lines` non-empty lines of ffmpeg's stderr, joined by " | ".
pub fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = kept.len().saturating_sub(lines);
    kept[start..].join(" | ")
}

/// Run `ffmpeg <args>` to completion. `file_path` names the input in errors.
pub fn run_ffmpeg(args: &[OsString], file_path: &Path) -> Result<()> {
    let started = Instant::now();
    let mut cmd = Command::new("ffmpeg");
    cmd.args(args);

    let process = FfmpegProcess::spawn(&mut cmd).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::ToolNotFound {
            tool_name: "ffmpeg".to_string(),
        },
        _ => AppError::io(file_path, "spawn ffmpeg", e),
    })?;
    let (status, stderr) = process
        .wait_with_output()
        .map_err(|e| AppError::io(file_path, "wait for ffmpeg", e))?;

    log_external_tool("ffmpeg", args, &stderr, status.code(), started.elapsed());

    if status.success() {
        Ok(())
    } else {
        Err(AppError::FfmpegError {
            file_path: file_path.to_path_buf(),
            exit_code: status.code(),
            stderr: stderr_tail(&stderr, STDERR_TAIL_LINES),
        })
    }
}

pub fn is_ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok()
}
