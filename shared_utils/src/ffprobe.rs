//! FFprobe wrapper
//!
//! One `ffprobe -print_format json -show_streams` call per video, parsed with
//! serde into the three facts the video pipeline needs: frame size, whether an
//! audio stream exists, and whether the picture is HDR.

use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use crate::app_error::{AppError, Result};
use crate::logging::log_external_tool;
use crate::stats::Dimensions;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FfprobeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub color_primaries: Option<String>,
    #[serde(default)]
    pub color_transfer: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

/// HDR transfer characteristic; only meaningful together with BT.2020 primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdrTransfer {
    /// SMPTE ST 2084 (PQ)
    Pq,
    /// ARIB STD-B67 (HLG)
    Hlg,
}

impl HdrTransfer {
    pub fn from_ffprobe(transfer: &str) -> Option<Self> {
        match transfer {
            "smpte2084" => Some(HdrTransfer::Pq),
            "arib-std-b67" => Some(HdrTransfer::Hlg),
            _ => None,
        }
    }

    /// Name accepted by ffmpeg's `-color_trc` and x265's `transfer=`.
    pub fn as_ffmpeg(self) -> &'static str {
        match self {
            HdrTransfer::Pq => "smpte2084",
            HdrTransfer::Hlg => "arib-std-b67",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoProbe {
    pub dimensions: Dimensions,
    pub has_audio: bool,
    pub hdr: Option<HdrTransfer>,
}

impl VideoProbe {
    /// Assumed size when probing fails.
    pub const FALLBACK_DIMENSIONS: Dimensions = Dimensions::new(1920, 1080);

    pub fn fallback() -> Self {
        Self {
            dimensions: Self::FALLBACK_DIMENSIONS,
            has_audio: false,
            hdr: None,
        }
    }
}

/// Interpret ffprobe's JSON. The first video stream supplies size and colour.
pub fn parse_probe_json(json: &str) -> std::result::Result<VideoProbe, String> {
    let parsed: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| format!("invalid ffprobe JSON: {}", e))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no frame size".to_string()),
    };

    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let hdr = match (video.color_primaries.as_deref(), video.color_transfer.as_deref()) {
        (Some("bt2020"), Some(transfer)) => HdrTransfer::from_ffprobe(transfer),
        _ => None,
    };

    Ok(VideoProbe {
        dimensions: Dimensions::new(width, height),
        has_audio,
        hdr,
    })
}

/// Everything before the file; `--` keeps a leading `-` in a name from
/// being read as an option.
fn probe_flags() -> [&'static str; 6] {
    ["-v", "error", "-print_format", "json", "-show_streams", "--"]
}

pub fn probe_video(path: &Path) -> Result<VideoProbe> {
    let mut args: Vec<OsString> = probe_flags().into_iter().map(OsString::from).collect();
    args.push(path.as_os_str().to_owned());

    let started = Instant::now();
    let output = Command::new("ffprobe")
        .args(&args)
        .output()
        .map_err(|e| AppError::FfprobeError {
            file_path: path.to_path_buf(),
            message: format!("failed to run ffprobe: {}", e),
        })?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    log_external_tool("ffprobe", &args, &stderr, output.status.code(), started.elapsed());

    if !output.status.success() {
        return Err(AppError::FfprobeError {
            file_path: path.to_path_buf(),
            message: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_json(&stdout).map_err(|message| AppError::FfprobeError {
        file_path: path.to_path_buf(),
        message,
    })
}

pub fn is_ffprobe_available() -> bool {
    which::which("ffprobe").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_sdr_with_audio() {
        let json = r#"{"streams":[
            {"codec_type":"video","width":3840,"height":2160,"color_primaries":"bt709","color_transfer":"bt709"},
            {"codec_type":"audio","sample_rate":"48000"}
        ]}"#;
        let probe = parse_probe_json(json).unwrap();
        assert_eq!(probe.dimensions, Dimensions::new(3840, 2160));
        assert!(probe.has_audio);
        assert_eq!(probe.hdr, None);
    }

    #[test]
    fn test_parse_hdr_pq_and_hlg() {
        let pq = r#"{"streams":[{"codec_type":"video","width":1920,"height":1080,
            "color_primaries":"bt2020","color_transfer":"smpte2084"}]}"#;
        assert_eq!(parse_probe_json(pq).unwrap().hdr, Some(HdrTransfer::Pq));

        let hlg = r#"{"streams":[{"codec_type":"video","width":1920,"height":1080,
            "color_primaries":"bt2020","color_transfer":"arib-std-b67"}]}"#;
        assert_eq!(parse_probe_json(hlg).unwrap().hdr, Some(HdrTransfer::Hlg));
    }

    #[test]
    fn test_wide_gamut_without_hdr_transfer_is_sdr() {
        let json = r#"{"streams":[{"codec_type":"video","width":1920,"height":1080,
            "color_primaries":"bt2020","color_transfer":"bt2020-10"}]}"#;
        assert_eq!(parse_probe_json(json).unwrap().hdr, None);

        let json = r#"{"streams":[{"codec_type":"video","width":1920,"height":1080,
            "color_primaries":"bt709","color_transfer":"smpte2084"}]}"#;
        assert_eq!(parse_probe_json(json).unwrap().hdr, None);
    }

    #[test]
    fn test_video_stream_not_first() {
        let json = r#"{"streams":[{"codec_type":"audio"},{"codec_type":"video","width":640,"height":480}]}"#;
        let probe = parse_probe_json(json).unwrap();
        assert_eq!(probe.dimensions, Dimensions::new(640, 480));
        assert!(probe.has_audio);
    }

    #[test]
    fn test_parse_failures() {
        assert!(parse_probe_json("not json").is_err());
        assert!(parse_probe_json(r#"{"streams":[]}"#).is_err());
        assert!(parse_probe_json(r#"{"streams":[{"codec_type":"audio"}]}"#).is_err());
        assert!(parse_probe_json(r#"{"streams":[{"codec_type":"video","width":0,"height":10}]}"#).is_err());
        assert!(parse_probe_json(r#"{}"#).is_err());
    }

    #[test]
    fn test_fallback_probe() {
        let probe = VideoProbe::fallback();
        assert_eq!(probe.dimensions, Dimensions::new(1920, 1080));
        assert!(!probe.has_audio);
        assert!(probe.hdr.is_none());
    }

    #[test]
    fn test_hdr_transfer_names_round_trip() {
        for t in [HdrTransfer::Pq, HdrTransfer::Hlg] {
            assert_eq!(HdrTransfer::from_ffprobe(t.as_ffmpeg()), Some(t));
        }
    }

    #[test]
    fn test_file_follows_option_terminator() {
        assert_eq!(probe_flags().last(), Some(&"--"));
    }

    #[test]
    fn test_probe_missing_file_is_error() {
        let result = probe_video(Path::new("/definitely/not/here.mp4"));
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(s in ".{0,200}") {
            let _ = parse_probe_json(&s);
        }
    }
}
