use crate::video::{open_reader, VideoBackend, VideoReader};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use opencv::core::Mat;
use std::path::Path;
use std::time::Instant;

/// A trait for handling sampled frames. This separates "what to do with a
/// frame" from "which frames to pick".
pub trait FrameProcessor {
    /// `index` is the zero-based decode index of `frame` in its source video.
    fn process(&mut self, index: usize, frame: Mat) -> Result<()>;
}

/// Blanket implementation so any closure with the right signature
/// automatically implements FrameProcessor.
impl<F> FrameProcessor for F
where
    F: FnMut(usize, Mat) -> Result<()>,
{
    fn process(&mut self, index: usize, frame: Mat) -> Result<()> {
        self(index, frame)
    }
}

/// An open video plus its progress reporting. The reader is released when
/// the session is dropped, including when sampling stops early.
pub struct VideoSession {
    pub reader: Box<dyn VideoReader>,
    pub pb: ProgressBar,
    pub start_time: Instant,
}

impl VideoSession {
    pub fn open(video_path: &Path, backend: VideoBackend) -> Result<Self> {
        let reader = open_reader(video_path, backend)?;
        Ok(Self::new(reader, progress_bar(0)?))
    }

    pub fn new(reader: Box<dyn VideoReader>, pb: ProgressBar) -> Self {
        Self {
            reader,
            pb,
            start_time: Instant::now(),
        }
    }
}

/// Progress bar in the style used across the pipeline stages.
pub fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow}, {eta}) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
