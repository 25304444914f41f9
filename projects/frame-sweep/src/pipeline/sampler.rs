// Frame sampler: picks the first decoded frame at or after each scheduled timestamp

use crate::pipeline::schedule::{effective_rate, SamplingSchedule};
use crate::video::processor::FrameProcessor;
use crate::video::VideoReader;
use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SamplingStats {
    pub native_fps: f64,
    pub frame_count: usize,
    pub effective_rate: f64,
    pub scheduled: usize,
    pub decoded_frames: usize,
    pub written_frames: usize,
}

/// Decode `reader` from the start and hand every frame that satisfies the
/// next pending schedule entry to `processor`.
///
/// `configured_rate` is capped at the native frame rate before scheduling.
/// Decoding stops once the schedule is exhausted or the reader fails; a
/// read failure is indistinguishable from end of stream and is not an error.
/// Errors from `processor` abort sampling.
pub fn sample_frames<P>(
    reader: &mut dyn VideoReader,
    configured_rate: f64,
    pb: &ProgressBar,
    mut processor: P,
) -> Result<SamplingStats>
where
    P: FrameProcessor,
{
    let native_fps = reader.source_fps()?;
    let frame_count = reader.frame_count()?;
    let rate = effective_rate(configured_rate, native_fps);

    let mut schedule = SamplingSchedule::new(frame_count, native_fps, rate);
    let scheduled = schedule.len();
    pb.set_length(scheduled as u64);

    tracing::info!(
        "Sampling: fps={:.2}, frames={}, duration={:.2}s, rate={:.2}/s, scheduled={}",
        native_fps,
        frame_count,
        frame_count as f64 / native_fps,
        rate,
        scheduled
    );

    let mut decoded = 0usize;
    let mut written = 0usize;

    while !schedule.is_empty() {
        let frame = match reader.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(
                    "Sampling stopped after {} frames ({} samples pending from {:?}s): {}",
                    decoded,
                    schedule.len(),
                    schedule.front(),
                    e
                );
                break;
            }
        };

        let index = decoded;
        decoded += 1;

        let frame_time = index as f64 / native_fps;
        if schedule.consume_if_due(frame_time) {
            processor.process(index, frame)?;
            written += 1;
            pb.inc(1);
        }
    }

    Ok(SamplingStats {
        native_fps,
        frame_count,
        effective_rate: rate,
        scheduled,
        decoded_frames: decoded,
        written_frames: written,
    })
}

pub fn frame_file_name(index: usize, extension: &str) -> String {
    format!("frame-{}.{}", index, extension)
}

/// Write `frame` as `<folder>/frame-<index>.<extension>`.
pub fn write_frame(folder: &Path, index: usize, extension: &str, frame: &Mat) -> Result<PathBuf> {
    let path = folder.join(frame_file_name(index, extension));
    let path_str = path
        .to_str()
        .with_context(|| format!("Frame path is not valid UTF-8: {:?}", path))?;

    let written = imgcodecs::imwrite(path_str, frame, &Vector::new())
        .with_context(|| format!("Failed to encode frame {}", path_str))?;
    if !written {
        bail!("Failed to write frame {}", path_str);
    }

    Ok(path)
}
