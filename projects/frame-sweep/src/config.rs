use crate::cli::Args;
use crate::video::VideoBackend;
use anyhow::{bail, Result};
use std::path::{Component, Path, PathBuf};

/// Extension of the sampled frame images.
pub const FRAME_EXTENSION: &str = "jpg";

/// Immutable run configuration. Every path is resolved once, up front,
/// and the value is passed by reference to each pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub frame_rate: f64,
    pub video_dir: PathBuf,
    pub results_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub video_extension: String,
    pub frame_extension: String,
    pub backend: VideoBackend,
    pub model_path: String,
    pub min_confidence: f32,
}

impl PipelineConfig {
    /// Validate the CLI arguments and derive all paths relative to `cwd`.
    pub fn from_args(args: &Args, cwd: &Path) -> Result<Self> {
        if !args.frame_rate.is_finite() || args.frame_rate <= 0.0 {
            bail!("frame rate must be a positive number, got {}", args.frame_rate);
        }
        if !(0.0..=1.0).contains(&args.min_confidence) {
            bail!(
                "minimum confidence must be within [0, 1], got {}",
                args.min_confidence
            );
        }

        let raw_subdir = validate_subdir("raw", &args.raw_subdir)?;
        let processed_subdir = validate_subdir("processed", &args.processed_subdir)?;
        if raw_subdir == processed_subdir {
            bail!(
                "raw and processed subdirectories must differ (both are '{}')",
                raw_subdir
            );
        }

        let video_extension = args.video_extension.trim_start_matches('.').to_string();
        if video_extension.is_empty() {
            bail!("video extension must not be empty");
        }

        let backend = VideoBackend::parse(&args.backend)?;

        let video_dir = normalize(&cwd.join(&args.video_dir));
        let results_dir = normalize(&cwd.join(&args.results_dir));
        // The results tree is wiped on every run and must stay clear of the inputs.
        if video_dir.starts_with(&results_dir) {
            bail!(
                "results directory {:?} contains the video directory {:?}",
                results_dir,
                video_dir
            );
        }
        if results_dir.starts_with(&video_dir) {
            bail!(
                "results directory {:?} is inside the video directory {:?}",
                results_dir,
                video_dir
            );
        }
        let raw_dir = results_dir.join(raw_subdir);
        let processed_dir = results_dir.join(processed_subdir);

        Ok(Self {
            frame_rate: args.frame_rate,
            video_dir,
            results_dir,
            raw_dir,
            processed_dir,
            video_extension,
            frame_extension: FRAME_EXTENSION.to_string(),
            backend,
            model_path: args.model_path.clone(),
            min_confidence: args.min_confidence,
        })
    }
}

/// A subdirectory must be a single plain name directly under the results root.
fn validate_subdir<'a>(label: &str, name: &'a str) -> Result<&'a str> {
    let trimmed = name.trim_matches('/');
    let mut components = Path::new(trimmed).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !trimmed.contains('\\') => Ok(trimmed),
        _ => bail!("{} subdirectory name is invalid: '{}'", label, name),
    }
}

/// Resolve `.` and `..` lexically, without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_args() -> Args {
        Args {
            frame_rate: 4.0,
            video_dir: PathBuf::from("video"),
            results_dir: PathBuf::from("result"),
            raw_subdir: "raw".to_string(),
            processed_subdir: "processed".to_string(),
            video_extension: "mp4".to_string(),
            backend: "opencv".to_string(),
            model_path: "rtdetr.onnx".to_string(),
            min_confidence: 0.25,
        }
    }

    #[test]
    fn test_paths_are_derived_from_cwd() {
        let cwd = Path::new("/work");
        let config = PipelineConfig::from_args(&sample_args(), cwd).unwrap();

        assert_eq!(config.video_dir, PathBuf::from("/work/video"));
        assert_eq!(config.results_dir, PathBuf::from("/work/result"));
        assert_eq!(config.raw_dir, PathBuf::from("/work/result/raw"));
        assert_eq!(config.processed_dir, PathBuf::from("/work/result/processed"));
        assert_eq!(config.frame_extension, "jpg");
        assert_eq!(config.backend, VideoBackend::Opencv);
    }

    #[test]
    fn test_absolute_results_dir_is_kept() {
        let mut args = sample_args();
        args.results_dir = PathBuf::from("/data/out");
        let config = PipelineConfig::from_args(&args, Path::new("/work")).unwrap();
        assert_eq!(config.raw_dir, PathBuf::from("/data/out/raw"));
    }

    #[test]
    fn test_rejects_non_positive_frame_rate() {
        let mut args = sample_args();
        args.frame_rate = 0.0;
        assert!(PipelineConfig::from_args(&args, Path::new("/work")).is_err());

        args.frame_rate = f64::NAN;
        assert!(PipelineConfig::from_args(&args, Path::new("/work")).is_err());
    }

    #[test]
    fn test_rejects_identical_subdirs() {
        let mut args = sample_args();
        args.processed_subdir = "raw/".to_string();
        assert!(PipelineConfig::from_args(&args, Path::new("/work")).is_err());
    }

    #[test]
    fn test_rejects_subdirs_that_leave_the_results_root() {
        for bad in ["..", "../video", "a/b", "./raw", "", "/", "a\\b"] {
            let mut args = sample_args();
            args.raw_subdir = bad.to_string();
            assert!(
                PipelineConfig::from_args(&args, Path::new("/work")).is_err(),
                "accepted raw subdir {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_results_dir_overlapping_video_dir() {
        for results in ["video", ".", "./video/", "video/out", "result/../video", "/work"] {
            let mut args = sample_args();
            args.results_dir = PathBuf::from(results);
            assert!(
                PipelineConfig::from_args(&args, Path::new("/work")).is_err(),
                "accepted results dir {:?}",
                results
            );
        }

        let mut args = sample_args();
        args.video_dir = PathBuf::from("result/clips");
        assert!(PipelineConfig::from_args(&args, Path::new("/work")).is_err());
    }

    #[test]
    fn test_sibling_named_like_video_dir_is_allowed() {
        let mut args = sample_args();
        args.results_dir = PathBuf::from("video_results/");
        let config = PipelineConfig::from_args(&args, Path::new("/work")).unwrap();
        assert_eq!(config.results_dir, PathBuf::from("/work/video_results"));
    }

    #[test]
    fn test_extension_leading_dot_is_stripped() {
        let mut args = sample_args();
        args.video_extension = ".mov".to_string();
        let config = PipelineConfig::from_args(&args, Path::new("/work")).unwrap();
        assert_eq!(config.video_extension, "mov");
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let mut args = sample_args();
        args.backend = "gstreamer".to_string();
        assert!(PipelineConfig::from_args(&args, Path::new("/work")).is_err());
    }
}
