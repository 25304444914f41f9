// Pipeline orchestrator: CLEAN -> SAMPLE -> DETECT
//
// Runs strictly in sequence. Any error aborts the whole run; since the
// output tree is wiped first, a failed run leaves previous results destroyed.

use crate::config::PipelineConfig;
use crate::pipeline::dispatcher::dispatch_detections;
use crate::pipeline::runner::Detector;
use crate::pipeline::sampler::{sample_frames, write_frame};
use crate::run_artifacts::{RunSettings, RunSummary, VideoSummary};
use crate::run_context::{
    list_videos, prepare_output_tree, prepare_video_folder, video_stem, write_run_summary,
};
use crate::video::processor::VideoSession;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use opencv::core::Mat;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Run the full pipeline once with `detector` handling the DETECT phase.
pub fn run_pipeline<D>(config: &PipelineConfig, detector: &mut D) -> Result<RunSummary>
where
    D: Detector + ?Sized,
{
    run_pipeline_with(config, detector, |path| VideoSession::open(path, config.backend))
}

/// Same as `run_pipeline`, with video opening delegated to `open_video`.
pub(crate) fn run_pipeline_with<D, O>(
    config: &PipelineConfig,
    detector: &mut D,
    mut open_video: O,
) -> Result<RunSummary>
where
    D: Detector + ?Sized,
    O: FnMut(&Path) -> Result<VideoSession>,
{
    let started_at = Utc::now();

    // Inputs are resolved before CLEAN so a bad video set leaves old results intact.
    let videos = list_videos(&config.video_dir, &config.video_extension)?;
    let videos = with_unique_stems(videos)?;
    tracing::info!(
        "Found {} video(s) in {:?}",
        videos.len(),
        config.video_dir
    );

    // Phase 1: CLEAN
    prepare_output_tree(config)?;

    // Phase 2: SAMPLE
    let mut summaries = Vec::with_capacity(videos.len());
    for (video_path, stem) in videos {
        let summary = sample_video(config, &video_path, stem, &mut open_video)
            .with_context(|| format!("Failed to sample {:?}", video_path))?;
        summaries.push(summary);
    }

    // Phase 3: DETECT
    let detector_invocations = dispatch_detections(
        &config.raw_dir,
        &config.processed_dir,
        &config.frame_extension,
        detector,
    )?;

    let summary = RunSummary {
        started_at,
        finished_at: Utc::now(),
        settings: RunSettings::from(config),
        videos: summaries,
        detector_invocations,
    };
    let summary_path = write_run_summary(&config.results_dir, &summary)?;
    tracing::info!("Run summary written to {:?}", summary_path);

    Ok(summary)
}

/// Pair each video with its folder name. Two videos mapping to the same
/// folder (e.g. `clip.mp4` and `clip.MP4`) would overwrite each other.
fn with_unique_stems(videos: Vec<PathBuf>) -> Result<Vec<(PathBuf, String)>> {
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut named = Vec::with_capacity(videos.len());
    for path in videos {
        let stem = video_stem(&path)?;
        if let Some(first) = seen.get(&stem) {
            bail!(
                "Videos {:?} and {:?} would both write frames to '{}'",
                first,
                path,
                stem
            );
        }
        seen.insert(stem.clone(), path.clone());
        named.push((path, stem));
    }
    Ok(named)
}

fn sample_video<O>(
    config: &PipelineConfig,
    video_path: &Path,
    stem: String,
    open_video: &mut O,
) -> Result<VideoSummary>
where
    O: FnMut(&Path) -> Result<VideoSession>,
{
    let folder = prepare_video_folder(&config.raw_dir, &stem)?;
    tracing::info!("Sampling {:?} into {:?}", video_path, folder);

    // The reader lives only for this scope and is released on every exit path.
    let mut session = open_video(video_path)?;

    let extension = config.frame_extension.as_str();
    let stats = sample_frames(
        &mut *session.reader,
        config.frame_rate,
        &session.pb,
        |index: usize, frame: Mat| -> Result<()> {
            write_frame(&folder, index, extension, &frame)?;
            Ok(())
        },
    )?;
    session.pb.finish_with_message(stem.clone());

    tracing::info!(
        "{}: wrote {}/{} scheduled frame(s) after decoding {} in {:.2}s",
        stem,
        stats.written_frames,
        stats.scheduled,
        stats.decoded_frames,
        session.start_time.elapsed().as_secs_f64()
    );

    Ok(VideoSummary {
        file_name: video_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        stem,
        native_fps: stats.native_fps,
        frame_count: stats.frame_count,
        effective_rate: stats.effective_rate,
        scheduled_samples: stats.scheduled,
        decoded_frames: stats.decoded_frames,
        written_frames: stats.written_frames,
        output_dir: folder,
    })
}
