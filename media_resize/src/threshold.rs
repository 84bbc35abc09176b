//! Skip decisions and target sizing.

use shared_utils::Dimensions;

use crate::config::{RunConfig, ScaleMode, Thresholds};

/// Thresholds assumed for a shrinking run when none are given.
pub const DOWNSCALE_DEFAULT: Thresholds = Thresholds::new(1920, 1080);
/// Thresholds assumed for an enlarging run when none are given.
pub const UPSCALE_DEFAULT: Thresholds = Thresholds::new(3840, 2160);
/// Width mode targets at or below this are treated as downscaling.
pub const WIDTH_DOWNSCALE_MAX: u32 = 1920;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    Downscale,
    Upscale,
    Neutral,
}

impl ScaleDirection {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 1.0 {
            ScaleDirection::Upscale
        } else if ratio > 0.0 && ratio < 1.0 {
            ScaleDirection::Downscale
        } else {
            ScaleDirection::Neutral
        }
    }

    /// Direction used to pick default thresholds. A fixed width is only a
    /// guess, so it is inferred from the target width.
    pub fn inferred(scale: ScaleMode) -> Self {
        match scale {
            ScaleMode::Ratio(ratio) => Self::from_ratio(ratio),
            ScaleMode::Width(width) if width <= WIDTH_DOWNSCALE_MAX => ScaleDirection::Downscale,
            ScaleMode::Width(_) => ScaleDirection::Upscale,
            ScaleMode::Unscaled => ScaleDirection::Neutral,
        }
    }

    /// Direction used for skip decisions. Without a ratio the run counts
    /// as shrinking, so width mode skips files below the thresholds.
    pub fn for_skip(scale: ScaleMode) -> Self {
        match scale {
            ScaleMode::Ratio(ratio) => Self::from_ratio(ratio),
            ScaleMode::Width(_) | ScaleMode::Unscaled => ScaleDirection::Downscale,
        }
    }
}

/// Fill unset (0) threshold axes from the direction's defaults.
pub fn smart_thresholds(scale: ScaleMode, requested: Thresholds) -> Thresholds {
    let defaults = match ScaleDirection::inferred(scale) {
        ScaleDirection::Downscale => DOWNSCALE_DEFAULT,
        ScaleDirection::Upscale => UPSCALE_DEFAULT,
        ScaleDirection::Neutral => return requested,
    };
    Thresholds {
        width: if requested.width == 0 {
            defaults.width
        } else {
            requested.width
        },
        height: if requested.height == 0 {
            defaults.height
        } else {
            requested.height
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdPolicy {
    direction: ScaleDirection,
    thresholds: Thresholds,
}

impl ThresholdPolicy {
    pub fn new(direction: ScaleDirection, thresholds: Thresholds) -> Self {
        Self {
            direction,
            thresholds,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(ScaleDirection::for_skip(config.scale), config.thresholds)
    }

    pub fn direction(&self) -> ScaleDirection {
        self.direction
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Downscaling skips files already smaller than a threshold on any set
    /// axis; upscaling skips files already larger. Equal is never skipped.
    pub fn should_skip(&self, dims: Dimensions) -> bool {
        let t = self.thresholds;
        match self.direction {
            ScaleDirection::Downscale => {
                (t.width > 0 && dims.width < t.width) || (t.height > 0 && dims.height < t.height)
            }
            ScaleDirection::Upscale => {
                (t.width > 0 && dims.width > t.width) || (t.height > 0 && dims.height > t.height)
            }
            ScaleDirection::Neutral => false,
        }
    }
}

fn scale_len(len: u32, factor: f64) -> u32 {
    // `as` saturates, so oversized products clamp to u32::MAX
    ((len as f64 * factor).round() as u32).max(1)
}

pub fn target_dimensions(scale: ScaleMode, original: Dimensions) -> Dimensions {
    match scale {
        ScaleMode::Ratio(ratio) => Dimensions::new(
            scale_len(original.width, ratio),
            scale_len(original.height, ratio),
        ),
        ScaleMode::Width(width) if original.width > 0 => Dimensions::new(
            width,
            scale_len(original.height, width as f64 / original.width as f64),
        ),
        ScaleMode::Width(_) | ScaleMode::Unscaled => original,
    }
}
