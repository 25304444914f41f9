// Run artifact struct definitions
//
// Structs persisted inside the results tree: the run summary written as
// run.json and the per-frame label rows written next to annotated frames.

use crate::config::PipelineConfig;
use crate::video::VideoBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bounding box in pixel coordinates of the source frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// A single detection kept after confidence filtering
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
    pub class_id: usize,
    pub class_name: Option<String>,
}

/// One row of a `labels/<frame>.csv` file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LabelRow {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl From<&Detection> for LabelRow {
    fn from(d: &Detection) -> Self {
        Self {
            class_id: d.class_id,
            class_name: d.class_name.clone().unwrap_or_default(),
            confidence: d.confidence,
            x: d.bbox.x,
            y: d.bbox.y,
            w: d.bbox.w,
            h: d.bbox.h,
        }
    }
}

/// Sampling outcome for one input video
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VideoSummary {
    pub file_name: String,
    pub stem: String,
    pub native_fps: f64,
    pub frame_count: usize,
    pub effective_rate: f64,
    pub scheduled_samples: usize,
    pub decoded_frames: usize,
    pub written_frames: usize,
    pub output_dir: PathBuf,
}

/// Settings echoed into run.json so a results tree documents how it was made
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSettings {
    pub frame_rate: f64,
    pub video_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub video_extension: String,
    pub backend: VideoBackend,
    pub model_path: String,
    pub min_confidence: f32,
}

impl From<&PipelineConfig> for RunSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            video_dir: config.video_dir.clone(),
            raw_dir: config.raw_dir.clone(),
            processed_dir: config.processed_dir.clone(),
            video_extension: config.video_extension.clone(),
            backend: config.backend,
            model_path: config.model_path.clone(),
            min_confidence: config.min_confidence,
        }
    }
}

/// Contents of `<results>/run.json`, written only after a successful run
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub settings: RunSettings,
    pub videos: Vec<VideoSummary>,
    pub detector_invocations: usize,
}

impl RunSummary {
    pub fn total_frames_written(&self) -> usize {
        self.videos.iter().map(|v| v.written_frames).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_row_from_detection() {
        let detection = Detection {
            bbox: BBox {
                x: 1.0,
                y: 2.0,
                w: 3.0,
                h: 4.0,
            },
            confidence: 0.9,
            class_id: 0,
            class_name: Some("person".to_string()),
        };
        let row = LabelRow::from(&detection);
        assert_eq!(row.class_name, "person");
        assert_eq!((row.x, row.y, row.w, row.h), (1.0, 2.0, 3.0, 4.0));

        let unnamed = Detection {
            class_name: None,
            ..detection
        };
        assert_eq!(LabelRow::from(&unnamed).class_name, "");
    }
}
