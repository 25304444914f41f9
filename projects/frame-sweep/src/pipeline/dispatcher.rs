// Detection dispatcher: one detector call per sampled frame

use crate::pipeline::runner::{DetectionRequest, Detector};
use crate::run_context::{list_frame_dirs, list_frames};
use crate::video::processor::progress_bar;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};

/// A sampled frame and the per-video folder name its results go under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionJob {
    pub source: PathBuf,
    pub name: String,
}

/// Every frame image under `<raw_root>/<video>/`, grouped by video folder.
pub fn collect_jobs(raw_root: &Path, frame_extension: &str) -> Result<Vec<DetectionJob>> {
    let mut jobs = Vec::new();
    for frame_dir in list_frame_dirs(raw_root)? {
        let name = frame_dir
            .file_name()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Invalid frame folder name: {:?}", frame_dir))?
            .to_string();

        for source in list_frames(&frame_dir, frame_extension)? {
            jobs.push(DetectionJob {
                source,
                name: name.clone(),
            });
        }
    }
    Ok(jobs)
}

/// Run `detector` once per sampled frame, sending all frames of one video to
/// `<processed_root>/<video>`. The first detector failure aborts dispatch.
/// Returns the number of detector invocations.
pub fn dispatch_detections<D>(
    raw_root: &Path,
    processed_root: &Path,
    frame_extension: &str,
    detector: &mut D,
) -> Result<usize>
where
    D: Detector + ?Sized,
{
    let jobs = collect_jobs(raw_root, frame_extension)?;
    let pb = progress_bar(jobs.len() as u64)?;
    let invocations = run_jobs(&jobs, processed_root, detector, &pb)?;
    pb.finish_with_message("Detection done");
    Ok(invocations)
}

fn run_jobs<D>(
    jobs: &[DetectionJob],
    processed_root: &Path,
    detector: &mut D,
    pb: &ProgressBar,
) -> Result<usize>
where
    D: Detector + ?Sized,
{
    if !processed_root.exists() {
        fs::create_dir_all(processed_root)
            .with_context(|| format!("Failed to create {:?}", processed_root))?;
    }

    tracing::info!(
        "Dispatching {} frame(s) to the detector, output under {:?}",
        jobs.len(),
        processed_root
    );

    for job in jobs {
        let request = DetectionRequest {
            source: &job.source,
            project: processed_root,
            name: &job.name,
        };
        detector
            .run(&request)
            .with_context(|| format!("Detector failed on {:?}", job.source))?;
        pb.inc(1);
    }

    Ok(jobs.len())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashSet;
    use tempfile::tempdir;

    /// Records every request instead of running a model.
    #[derive(Default)]
    pub(crate) struct RecordingDetector {
        pub calls: Vec<(PathBuf, PathBuf, String)>,
        pub fail_on: Option<String>,
    }

    impl Detector for RecordingDetector {
        fn run(&mut self, request: &DetectionRequest<'_>) -> Result<()> {
            let file = request.source.file_name().unwrap().to_str().unwrap();
            if self.fail_on.as_deref() == Some(file) {
                return Err(anyhow!("model crashed"));
            }
            self.calls.push((
                request.source.to_path_buf(),
                request.project.to_path_buf(),
                request.name.to_string(),
            ));
            Ok(())
        }
    }

    fn raw_tree() -> tempfile::TempDir {
        let root = tempdir().unwrap();
        let raw = root.path().join("raw");
        for (video, frames) in [("clip_b", vec![0, 8]), ("clip_a", vec![0, 8, 15])] {
            let dir = raw.join(video);
            fs::create_dir_all(&dir).unwrap();
            for i in frames {
                fs::write(dir.join(format!("frame-{}.jpg", i)), b"jpg").unwrap();
            }
        }
        fs::write(raw.join("clip_a").join("notes.txt"), b"skip").unwrap();
        fs::write(raw.join("stray.jpg"), b"skip").unwrap();
        root
    }

    #[test]
    fn test_one_invocation_per_frame() {
        let root = raw_tree();
        let raw = root.path().join("raw");
        let processed = root.path().join("processed");
        let mut detector = RecordingDetector::default();

        let count = dispatch_detections(&raw, &processed, "jpg", &mut detector).unwrap();

        assert_eq!(count, 5);
        assert_eq!(detector.calls.len(), 5);
        assert!(processed.is_dir());

        let sources: HashSet<_> = detector.calls.iter().map(|c| &c.0).collect();
        assert_eq!(sources.len(), 5);

        for (source, project, name) in &detector.calls {
            assert_eq!(project, &processed);
            assert_eq!(source.parent().unwrap(), raw.join(name));
        }
        assert_eq!(detector.calls[0].2, "clip_a");
        assert_eq!(detector.calls[4].2, "clip_b");
    }

    #[test]
    fn test_empty_raw_tree_makes_no_calls() {
        let root = tempdir().unwrap();
        let raw = root.path().join("raw");
        fs::create_dir(&raw).unwrap();
        let mut detector = RecordingDetector::default();

        let count = dispatch_detections(&raw, &root.path().join("p"), "jpg", &mut detector)
            .unwrap();
        assert_eq!(count, 0);
        assert!(detector.calls.is_empty());
    }

    #[test]
    fn test_detector_failure_halts_dispatch() {
        let root = raw_tree();
        let mut detector = RecordingDetector {
            fail_on: Some("frame-8.jpg".to_string()),
            ..Default::default()
        };

        let result = dispatch_detections(
            &root.path().join("raw"),
            &root.path().join("processed"),
            "jpg",
            &mut detector,
        );

        assert!(result.is_err());
        // clip_a/frame-0.jpg succeeded, clip_a/frame-15.jpg sorts before frame-8.jpg
        assert_eq!(detector.calls.len(), 2);
    }
}
