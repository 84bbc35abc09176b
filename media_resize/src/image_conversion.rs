//! Image pipeline: JPEG, PNG and HEIC in, resized JPEG out.
//!
//! Steps per file:
//! 1. read the whole file
//! 2. pull the Exif TIFF payload (JPEG segment scan / HEIF Exif item)
//! 3. decode, and for JPEG apply the orientation tag to the pixels
//! 4. threshold check; a skipped file is copied unchanged
//! 5. Lanczos3 resize, JPEG encode at quality 85
//! 6. reinsert the metadata with orientation reset to 1
//! 7. write, then restore the source timestamps

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use shared_utils::metadata::{
    apply_file_timestamps, clear_orientation, extract_exif, insert_exif, read_orientation,
    Orientation, SegmentError,
};
use shared_utils::{AppError, Dimensions, FileRecord, RecordKind, Result};

use crate::classifier::ImageFormat;
use crate::config::ScaleMode;
use crate::context::RunContext;
use crate::heic;
use crate::pipeline::{copy_through, FileJob, Pipeline};
use crate::threshold::{target_dimensions, ThresholdPolicy};

pub const JPEG_QUALITY: u8 = 85;

pub struct ImagePipeline<'a> {
    scale: ScaleMode,
    policy: &'a ThresholdPolicy,
    format: ImageFormat,
}

impl<'a> ImagePipeline<'a> {
    pub fn new(ctx: &'a RunContext, format: ImageFormat) -> Self {
        Self {
            scale: ctx.config.scale,
            policy: &ctx.policy,
            format,
        }
    }

    /// Metadata failures never fail the file.
    fn extract_metadata(&self, data: &[u8], path: &Path) -> Option<Vec<u8>> {
        let extracted = match self.format {
            ImageFormat::Jpeg => extract_exif(data)
                .map(|tiff| tiff.map(<[u8]>::to_vec))
                .map_err(|e| e.to_string()),
            ImageFormat::Heic => heic::extract_exif(data),
            ImageFormat::Png => Ok(None),
        };
        match extracted {
            Ok(tiff) => tiff,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "⚠️ Metadata extraction failed, continuing without it");
                None
            }
        }
    }

    fn decode(&self, data: &[u8], path: &Path) -> Result<DynamicImage> {
        let format = match self.format {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Heic => return heic::decode(data, path),
        };
        image::load_from_memory_with_format(data, format)
            .map_err(|e| AppError::decode(path, e.to_string()))
    }
}

impl Pipeline for ImagePipeline<'_> {
    fn process(&self, job: &FileJob<'_>) -> Result<FileRecord> {
        let data = fs::read(job.input).map_err(|e| AppError::io(job.input, "read", e))?;
        let exif = self.extract_metadata(&data, job.input);

        let mut image = self.decode(&data, job.input)?;
        // libheif already applies HEIF rotation properties
        if self.format == ImageFormat::Jpeg {
            if let Some(orientation) = exif.as_deref().and_then(read_orientation) {
                image = apply_orientation(image, orientation);
            }
        }

        let original = Dimensions::new(image.width(), image.height());
        if self.policy.should_skip(original) {
            info!(
                "⏭️ Skipping {} ({}) against threshold {}x{}",
                job.relative,
                original,
                self.policy.thresholds().width,
                self.policy.thresholds().height
            );
            return copy_through(job, RecordKind::Skipped, Some(original));
        }

        let target = target_dimensions(self.scale, original);
        let resized = if target == original {
            image
        } else {
            image.resize_exact(target.width, target.height, FilterType::Lanczos3)
        };

        let mut encoded = encode_jpeg(&resized, job.input)?;
        if let Some(tiff) = exif {
            encoded = reinsert_metadata(encoded, &tiff, job.input);
        }

        fs::write(&job.output, &encoded).map_err(|e| AppError::io(&job.output, "write", e))?;
        apply_file_timestamps(&job.metadata, &job.output)
            .map_err(|e| AppError::io(&job.output, "set file times", e))?;

        debug!(file = %job.relative, from = %original, to = %target, "Image resized");
        Ok(FileRecord::converted(
            job.relative.clone(),
            RecordKind::Processed,
            job.metadata.len(),
            encoded.len() as u64,
            Some(original),
            Some(Dimensions::new(resized.width(), resized.height())),
        ))
    }
}

/// Bake an Exif orientation into the pixels.
pub fn apply_orientation(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => image,
        Orientation::FlipHorizontal => image.fliph(),
        Orientation::Rotate180 => image.rotate180(),
        Orientation::FlipVertical => image.flipv(),
        Orientation::Transpose => image.rotate90().fliph(),
        Orientation::Rotate90 => image.rotate90(),
        Orientation::Transverse => image.rotate270().fliph(),
        Orientation::Rotate270 => image.rotate270(),
    }
}

/// Baseline JPEG, alpha dropped.
pub fn encode_jpeg(image: &DynamicImage, path: &Path) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
        .map_err(|source| AppError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(buf)
}

fn with_exif(encoded: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
    Ok(insert_exif(encoded, &clear_orientation(tiff))?)
}

/// Put `tiff` back with orientation 1. Oversized or unplaceable metadata is
/// dropped and the plain encode is kept.
fn reinsert_metadata(encoded: Vec<u8>, tiff: &[u8], path: &Path) -> Vec<u8> {
    match with_exif(&encoded, tiff) {
        Ok(tagged) => tagged,
        Err(AppError::Metadata(SegmentError::TooLarge { size })) => {
            warn!(file = %path.display(), size, "⚠️ Exif block too large for one APP1 segment, dropped");
            encoded
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "⚠️ Could not reinsert metadata");
            encoded
        }
    }
}
