//! Per-file pipelines behind one `process` seam.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use shared_utils::{copy_preserving_mtime, Dimensions, FileRecord, RecordKind, Result};

use crate::classifier::{FileKind, ImageFormat};
use crate::context::RunContext;
use crate::image_conversion::ImagePipeline;
use crate::video_conversion::VideoPipeline;

/// One file on its way through a pipeline.
#[derive(Debug)]
pub struct FileJob<'a> {
    pub input: &'a Path,
    /// Destination for both converted and copied files (`.heic` becomes `.jpg`).
    pub output: PathBuf,
    /// Input path relative to the input root, `/`-separated.
    pub relative: String,
    pub metadata: Metadata,
}

pub trait Pipeline {
    fn process(&self, job: &FileJob<'_>) -> Result<FileRecord>;
}

/// Copy the input unchanged to the job's output, keeping its mtime.
pub fn copy_through(
    job: &FileJob<'_>,
    kind: RecordKind,
    dimensions: Option<Dimensions>,
) -> Result<FileRecord> {
    copy_preserving_mtime(job.input, &job.output, &job.metadata)?;
    Ok(FileRecord::passthrough(
        job.relative.clone(),
        kind,
        job.metadata.len(),
        dimensions,
    ))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CopyPipeline;

impl Pipeline for CopyPipeline {
    fn process(&self, job: &FileJob<'_>) -> Result<FileRecord> {
        copy_through(job, RecordKind::Copied, None)
    }
}

/// One pipeline per `FileKind`, built once per directory.
pub struct Pipelines<'a> {
    jpeg: ImagePipeline<'a>,
    png: ImagePipeline<'a>,
    heic: ImagePipeline<'a>,
    video: VideoPipeline<'a>,
    copy: CopyPipeline,
}

impl<'a> Pipelines<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self {
            jpeg: ImagePipeline::new(ctx, ImageFormat::Jpeg),
            png: ImagePipeline::new(ctx, ImageFormat::Png),
            heic: ImagePipeline::new(ctx, ImageFormat::Heic),
            video: VideoPipeline::new(ctx),
            copy: CopyPipeline,
        }
    }

    pub fn select(&self, kind: FileKind) -> &dyn Pipeline {
        match kind {
            FileKind::Image(ImageFormat::Jpeg) => &self.jpeg,
            FileKind::Image(ImageFormat::Png) => &self.png,
            FileKind::Image(ImageFormat::Heic) => &self.heic,
            FileKind::Video => &self.video,
            FileKind::Other => &self.copy,
        }
    }
}
