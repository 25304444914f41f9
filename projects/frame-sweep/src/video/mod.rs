pub mod ffmpeg_reader;
pub mod opencv_reader;
pub mod processor;

use anyhow::{anyhow, Result};
use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sequential frame source. Frames come back in decode order starting at
/// index 0; any error from `next_frame` means no further frames.
pub trait VideoReader {
    /// Frame count reported by the container metadata.
    fn frame_count(&self) -> Result<usize>;
    fn next_frame(&mut self) -> Result<Mat>;
    fn source_fps(&self) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoBackend {
    Opencv,
    Ffmpeg,
}

impl VideoBackend {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "opencv" => Ok(Self::Opencv),
            "ffmpeg" => Ok(Self::Ffmpeg),
            _ => Err(anyhow!("Unsupported backend: {}", name)),
        }
    }
}

/// Open `path` with the selected decoding backend.
pub fn open_reader(path: &Path, backend: VideoBackend) -> Result<Box<dyn VideoReader>> {
    let reader: Box<dyn VideoReader> = match backend {
        VideoBackend::Opencv => Box::new(opencv_reader::OpencvReader::new(path)?),
        VideoBackend::Ffmpeg => Box::new(ffmpeg_reader::FfmpegReader::new(path)?),
    };
    Ok(reader)
}

/// Fallback used when container metadata reports no usable frame rate.
pub const FALLBACK_FPS: f64 = 30.0;
