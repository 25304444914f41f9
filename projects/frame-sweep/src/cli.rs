use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target number of sampled frames per second of video
    #[arg(long, env = "FRAME_SWEEP_FRAME_RATE", default_value_t = 4.0)]
    pub frame_rate: f64,

    /// Directory containing the input videos
    #[arg(long, env = "FRAME_SWEEP_VIDEO_DIR", default_value = "video")]
    pub video_dir: PathBuf,

    /// Root directory for all outputs (wiped at the start of every run)
    #[arg(long, env = "FRAME_SWEEP_RESULTS_DIR", default_value = "result")]
    pub results_dir: PathBuf,

    /// Subdirectory of the results root receiving sampled frames
    #[arg(long, env = "FRAME_SWEEP_RAW_SUBDIR", default_value = "raw")]
    pub raw_subdir: String,

    /// Subdirectory of the results root receiving detector output
    #[arg(long, env = "FRAME_SWEEP_PROCESSED_SUBDIR", default_value = "processed")]
    pub processed_subdir: String,

    /// Extension identifying video files in the input directory
    #[arg(long, env = "FRAME_SWEEP_VIDEO_EXTENSION", default_value = "mp4")]
    pub video_extension: String,

    /// Video decoding backend ("opencv" or "ffmpeg")
    #[arg(long, env = "FRAME_SWEEP_BACKEND", default_value = "opencv")]
    pub backend: String,

    /// Path to the RT-DETR ONNX model
    #[arg(long, env = "FRAME_SWEEP_MODEL_PATH")]
    pub model_path: String,

    /// Detections below this confidence are discarded
    #[arg(long, env = "FRAME_SWEEP_MIN_CONFIDENCE", default_value_t = 0.25)]
    pub min_confidence: f32,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
