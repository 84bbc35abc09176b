//! Video pipeline: probe, plan, one ffmpeg transcode per audio strategy.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use shared_utils::metadata::apply_file_timestamps;
use shared_utils::{
    probe_video, run_ffmpeg, AppError, Dimensions, FileRecord, HdrTransfer, RecordKind, Result,
    VideoProbe,
};

use crate::config::{ScaleMode, VideoSettings};
use crate::context::RunContext;
use crate::pipeline::{copy_through, FileJob, Pipeline};
use crate::threshold::{target_dimensions, ThresholdPolicy};

pub const FALLBACK_AUDIO_CODEC: &str = "aac";
pub const FALLBACK_AUDIO_BITRATE: &str = "192k";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioStrategy {
    Copy,
    Encode { codec: String, bitrate: String },
    Drop,
}

impl AudioStrategy {
    fn args(&self) -> Vec<String> {
        match self {
            AudioStrategy::Copy => strings(&["-map", "0:a", "-c:a", "copy"]),
            AudioStrategy::Encode { codec, bitrate } => vec![
                "-map".into(),
                "0:a".into(),
                "-c:a".into(),
                codec.clone(),
                "-b:a".into(),
                bitrate.clone(),
            ],
            AudioStrategy::Drop => strings(&["-an"]),
        }
    }
}

impl fmt::Display for AudioStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioStrategy::Copy => f.write_str("stream copy"),
            AudioStrategy::Encode { codec, bitrate } => write!(f, "{} @ {}", codec, bitrate),
            AudioStrategy::Drop => f.write_str("no audio"),
        }
    }
}

/// Primary audio handling plus what to retry with when it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPolicy {
    pub primary: AudioStrategy,
    pub fallback: Option<AudioStrategy>,
}

impl AudioPolicy {
    pub fn for_source(has_audio: bool) -> Self {
        if has_audio {
            Self {
                primary: AudioStrategy::Copy,
                fallback: Some(AudioStrategy::Encode {
                    codec: FALLBACK_AUDIO_CODEC.to_string(),
                    bitrate: FALLBACK_AUDIO_BITRATE.to_string(),
                }),
            }
        } else {
            Self {
                primary: AudioStrategy::Drop,
                fallback: None,
            }
        }
    }

    pub fn attempts(&self) -> impl Iterator<Item = &AudioStrategy> {
        std::iter::once(&self.primary).chain(self.fallback.as_ref())
    }
}

/// The `-vf scale=` argument and the size it should produce, when known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScalePlan {
    pub filter: Option<String>,
    pub dimensions: Option<Dimensions>,
}

/// 4:2:0 encoders need even sizes.
fn even(n: u32) -> u32 {
    (n & !1).max(2)
}

fn parse_resolution(resolution: &str) -> Option<Dimensions> {
    let (w, h) = resolution.split_once(|c: char| c == 'x' || c == 'X')?;
    Some(Dimensions::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
}

pub fn plan_scale(video: &VideoSettings, scale: ScaleMode, source: Dimensions) -> ScalePlan {
    if let Some(resolution) = video.resolution.as_deref().filter(|r| !r.trim().is_empty()) {
        return match parse_resolution(resolution) {
            Some(d) => ScalePlan {
                filter: Some(format!("scale={}:{}", d.width, d.height)),
                dimensions: Some(d),
            },
            None => ScalePlan {
                filter: Some(format!("scale={}", resolution.trim())),
                dimensions: None,
            },
        };
    }

    match scale {
        ScaleMode::Width(width) => {
            let width = even(width);
            let target = target_dimensions(ScaleMode::Width(width), source);
            ScalePlan {
                filter: Some(format!("scale={}:-2", width)),
                dimensions: Some(Dimensions::new(width, even(target.height))),
            }
        }
        ScaleMode::Ratio(_) => {
            let target = target_dimensions(scale, source);
            let target = Dimensions::new(even(target.width), even(target.height));
            ScalePlan {
                filter: Some(format!("scale={}:{}", target.width, target.height)),
                dimensions: Some(target),
            }
        }
        ScaleMode::Unscaled => ScalePlan::default(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Codec, preset, rate control and codec-specific color/profile flags.
pub fn encode_params(video: &VideoSettings, hdr: Option<HdrTransfer>) -> Vec<String> {
    let mut args = vec![
        "-c:v".to_string(),
        video.codec.clone(),
        "-preset".to_string(),
        video.preset.clone(),
    ];
    match video.bitrate.as_deref().filter(|b| !b.trim().is_empty()) {
        Some(bitrate) => args.extend(["-b:v".to_string(), bitrate.trim().to_string()]),
        None => args.extend(["-crf".to_string(), video.crf.to_string()]),
    }

    match video.codec.as_str() {
        "libx265" => {
            args.extend(strings(&[
                "-pix_fmt",
                "yuv420p10le",
                "-profile:v",
                "main10",
                "-tag:v",
                "hvc1",
            ]));
            match hdr {
                Some(transfer) => {
                    let trc = transfer.as_ffmpeg();
                    args.push("-x265-params".into());
                    args.push(format!(
                        "hdr-opt=1:repeat-headers=1:colorprim=bt2020:transfer={}:colormatrix=bt2020nc",
                        trc
                    ));
                    args.extend(strings(&[
                        "-color_primaries",
                        "bt2020",
                        "-color_trc",
                        trc,
                        "-colorspace",
                        "bt2020nc",
                    ]));
                }
                None => args.extend(strings(&[
                    "-color_primaries",
                    "bt709",
                    "-color_trc",
                    "bt709",
                    "-colorspace",
                    "bt709",
                ])),
            }
        }
        "libx264" => args.extend(strings(&[
            "-pix_fmt",
            "yuv420p",
            "-profile:v",
            "high",
            "-level",
            "4.1",
            "-movflags",
            "+faststart",
        ])),
        _ => {}
    }
    args
}

/// Paths go in as-is, so non-UTF-8 file names reach ffmpeg intact.
pub fn build_ffmpeg_args(
    input: &Path,
    output: &Path,
    plan: &ScalePlan,
    encode: &[String],
    audio: &AudioStrategy,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-y", "-i"].map(OsString::from).into();
    args.push(input.as_os_str().to_owned());
    args.extend(["-map", "0:v:0"].map(OsString::from));
    if let Some(filter) = &plan.filter {
        args.push("-vf".into());
        args.push(filter.into());
    }
    args.extend(encode.iter().map(OsString::from));
    args.extend(audio.args().into_iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

/// Runs one ffmpeg command line. `file_path` names the input in errors.
pub type FfmpegRunner = fn(&[OsString], &Path) -> Result<()>;

pub struct VideoPipeline<'a, R = FfmpegRunner> {
    scale: ScaleMode,
    policy: &'a ThresholdPolicy,
    video: &'a VideoSettings,
    runner: R,
}

impl<'a> VideoPipeline<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self::with_runner(ctx, run_ffmpeg)
    }
}

impl<'a, R> VideoPipeline<'a, R>
where
    R: Fn(&[OsString], &Path) -> Result<()>,
{
    pub fn with_runner(ctx: &'a RunContext, runner: R) -> Self {
        Self {
            scale: ctx.config.scale,
            policy: &ctx.policy,
            video: &ctx.config.video,
            runner,
        }
    }

    fn probe(&self, path: &Path) -> VideoProbe {
        probe_video(path).unwrap_or_else(|e| {
            warn!(file = %path.display(), error = %e, "⚠️ Probe failed, assuming 1920x1080 SDR without audio");
            VideoProbe::fallback()
        })
    }

    fn transcode(&self, job: &FileJob<'_>, plan: &ScalePlan, probe: &VideoProbe) -> Result<()> {
        let encode = encode_params(self.video, probe.hdr);
        let audio = AudioPolicy::for_source(probe.has_audio);

        let mut result = Ok(());
        for (attempt, strategy) in audio.attempts().enumerate() {
            if attempt > 0 {
                remove_partial(&job.output);
                warn!(file = %job.relative, "🔄 Retrying with audio {}", strategy);
            }
            let args = build_ffmpeg_args(job.input, &job.output, plan, &encode, strategy);
            result = (self.runner)(&args, job.input);
            if matches!(result, Ok(()) | Err(AppError::ToolNotFound { .. })) {
                break;
            }
        }
        if result.is_err() {
            remove_partial(&job.output);
        }
        result
    }
}

fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(file = %path.display(), error = %e, "Could not remove partial output");
        }
    }
}

impl<R> Pipeline for VideoPipeline<'_, R>
where
    R: Fn(&[OsString], &Path) -> Result<()>,
{
    fn process(&self, job: &FileJob<'_>) -> Result<FileRecord> {
        let probe = self.probe(job.input);
        if self.policy.should_skip(probe.dimensions) {
            info!("⏭️ Skipping video {} ({})", job.relative, probe.dimensions);
            return copy_through(job, RecordKind::Skipped, Some(probe.dimensions));
        }

        let plan = plan_scale(self.video, self.scale, probe.dimensions);
        if let Some(transfer) = probe.hdr {
            info!("🌈 HDR source ({}) for {}", transfer.as_ffmpeg(), job.relative);
        }
        self.transcode(job, &plan, &probe)?;

        let output_size = fs::metadata(&job.output)
            .map_err(|e| AppError::io(&job.output, "stat", e))?
            .len();
        apply_file_timestamps(&job.metadata, &job.output)
            .map_err(|e| AppError::io(&job.output, "set file times", e))?;

        Ok(FileRecord::converted(
            job.relative.clone(),
            RecordKind::VideoProcessed,
            job.metadata.len(),
            output_size,
            Some(probe.dimensions),
            plan.dimensions,
        ))
    }
}
